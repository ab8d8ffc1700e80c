//! ReQL Term tree.
//!
//! A query is a tree of `Term` nodes, each with:
//!
//! - A `TermType` specifying the operation
//! - Positional arguments (`args`): child terms
//! - Optional named arguments (`optargs`): ordered key/value pairs
//! - A datum value, for `DATUM` literals only
//!
//! # Example
//!
//! The compiled form of `|p| p.active`:
//!
//! ```rust
//! use reql_core::reql::Term;
//!
//! let predicate = Term::func(&[1], Term::get_field(Term::var(1), "active"));
//! assert_eq!(
//!     predicate.to_compact_string(),
//!     "FUNC(MAKE_ARRAY(1), GET_FIELD(VAR(1), \"active\"))"
//! );
//! ```

use super::datum::Datum;
use super::terms::TermType;
use serde::{Deserialize, Serialize};

/// A ReQL Term - one node of the query tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    /// The type of this term
    pub term_type: TermType,

    /// Positional arguments
    pub args: Vec<Term>,

    /// Optional named arguments, in insertion order
    pub optargs: Vec<(String, Term)>,

    /// Datum value (for Datum terms)
    pub datum: Option<Datum>,
}

impl Term {
    /// Create a new term with given type
    pub fn new(term_type: TermType) -> Self {
        Self {
            term_type,
            args: Vec::new(),
            optargs: Vec::new(),
            datum: None,
        }
    }

    /// Create a datum term
    pub fn datum(datum: Datum) -> Self {
        Self {
            term_type: TermType::Datum,
            args: Vec::new(),
            optargs: Vec::new(),
            datum: Some(datum),
        }
    }

    /// Add a positional argument
    pub fn with_arg(mut self, arg: Term) -> Self {
        self.args.push(arg);
        self
    }

    /// Add multiple positional arguments
    pub fn with_args(mut self, args: impl IntoIterator<Item = Term>) -> Self {
        self.args.extend(args);
        self
    }

    /// Add or replace an optional named argument
    pub fn with_optarg<S: Into<String>>(mut self, name: S, value: Term) -> Self {
        let name = name.into();
        match self.optargs.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.optargs.push((name, value)),
        }
        self
    }

    /// Get the first argument
    pub fn first_arg(&self) -> Option<&Term> {
        self.args.first()
    }

    /// Get argument at index
    pub fn arg(&self, index: usize) -> Option<&Term> {
        self.args.get(index)
    }

    /// Get optional argument by name
    pub fn optarg(&self, name: &str) -> Option<&Term> {
        self.optargs.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Check if this is a datum term
    pub fn is_datum(&self) -> bool {
        self.term_type == TermType::Datum
    }

    /// Get datum value if this is a datum term
    pub fn as_datum(&self) -> Option<&Datum> {
        self.datum.as_ref()
    }

    /// Compact one-line rendering, e.g. `GT(GET_FIELD(VAR(1), "age"), 18)`.
    pub fn to_compact_string(&self) -> String {
        if let Some(datum) = &self.datum {
            return datum.to_string();
        }
        let mut parts: Vec<String> = self.args.iter().map(Term::to_compact_string).collect();
        parts.extend(
            self.optargs
                .iter()
                .map(|(k, v)| format!("{}={}", k, v.to_compact_string())),
        );
        format!("{}({})", self.term_type.name(), parts.join(", "))
    }

    /// Pretty print the term tree
    pub fn pretty_print(&self, indent: usize) -> String {
        let indent_str = "  ".repeat(indent);
        let mut result = format!("{}{}(", indent_str, self.term_type.name());

        if let Some(datum) = &self.datum {
            result.push_str(&datum.to_string());
        }

        if !self.args.is_empty() {
            result.push('\n');
            for (i, arg) in self.args.iter().enumerate() {
                result.push_str(&arg.pretty_print(indent + 1));
                if i < self.args.len() - 1 {
                    result.push(',');
                }
                result.push('\n');
            }
            result.push_str(&indent_str);
        }

        if !self.optargs.is_empty() {
            result.push_str(" {");
            for (key, value) in &self.optargs {
                result.push_str(&format!("\n{}  {}: ", indent_str, key));
                result.push_str(value.pretty_print(indent + 2).trim_start());
            }
            result.push_str(&format!("\n{}}}", indent_str));
        }

        result.push(')');
        result
    }
}

// === Convenience constructors ===

impl Term {
    /// `VAR(slot)` - reference to a lambda parameter.
    pub fn var(slot: u64) -> Self {
        Term::new(TermType::Var).with_arg(Term::datum(Datum::Number(slot as f64)))
    }

    /// `FUNC(MAKE_ARRAY(slots...), body)`.
    pub fn func(slots: &[u64], body: Term) -> Self {
        let params = Term::make_array(
            slots
                .iter()
                .map(|slot| Term::datum(Datum::Number(*slot as f64))),
        );
        Term::new(TermType::Func).with_arg(params).with_arg(body)
    }

    pub fn make_array(items: impl IntoIterator<Item = Term>) -> Self {
        Term::new(TermType::MakeArray).with_args(items)
    }

    /// `MAKE_OBJ` carries its members as optargs.
    pub fn make_obj<S: Into<String>>(members: impl IntoIterator<Item = (S, Term)>) -> Self {
        members
            .into_iter()
            .fold(Term::new(TermType::MakeObj), |term, (k, v)| {
                term.with_optarg(k, v)
            })
    }

    pub fn get_field<S: Into<String>>(object: Term, field: S) -> Self {
        Term::new(TermType::GetField)
            .with_arg(object)
            .with_arg(Term::datum(Datum::String(field.into())))
    }

    pub fn branch(test: Term, if_true: Term, if_false: Term) -> Self {
        Term::new(TermType::Branch)
            .with_arg(test)
            .with_arg(if_true)
            .with_arg(if_false)
    }

    pub fn count(sequence: Term) -> Self {
        Term::new(TermType::Count).with_arg(sequence)
    }

    // Math operations
    pub fn sub(terms: Vec<Term>) -> Self {
        Term::new(TermType::Sub).with_args(terms)
    }

    // Logic operations
    pub fn not(term: Term) -> Self {
        Term::new(TermType::Not).with_arg(term)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_term_creation() {
        let term = Term::new(TermType::Db);
        assert_eq!(term.term_type, TermType::Db);
        assert!(term.args.is_empty());
    }

    #[test]
    fn test_datum_term() {
        let term = Term::datum(Datum::String("test".to_string()));
        assert!(term.is_datum());
        assert_eq!(term.as_datum().unwrap().as_string(), Some("test"));
    }

    #[test]
    fn test_func_term_shape() {
        let func = Term::func(&[3, 4], Term::var(3));
        assert_eq!(func.term_type, TermType::Func);
        let params = func.first_arg().unwrap();
        assert_eq!(params.term_type, TermType::MakeArray);
        assert_eq!(params.args.len(), 2);
        assert_eq!(func.to_compact_string(), "FUNC(MAKE_ARRAY(3, 4), VAR(3))");
    }

    #[test]
    fn test_optargs_keep_order_and_replace() {
        let term = Term::make_obj([
            ("b", Term::datum(Datum::from(1.0))),
            ("a", Term::datum(Datum::from(2.0))),
        ])
        .with_optarg("b", Term::datum(Datum::from(3.0)));
        let keys: Vec<&str> = term.optargs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(term.optarg("b").unwrap().as_datum(), Some(&Datum::Number(3.0)));
    }
}
