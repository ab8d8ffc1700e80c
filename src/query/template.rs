//! Declarative term shapes for member and method mappings.
//!
//! A template names where the compiled target and arguments go; the
//! compiler compiles those first and then instantiates the template.

use crate::error::{Error, Result};
use crate::reql::{Datum, Term, TermType};

#[derive(Debug, Clone, PartialEq)]
pub enum TermTemplate {
    /// The compiled receiver of the member access or call.
    Target,
    /// The compiled argument at this position.
    Arg(usize),
    Literal(Datum),
    Node {
        term_type: TermType,
        args: Vec<TermTemplate>,
        optargs: Vec<(String, TermTemplate)>,
    },
}

impl TermTemplate {
    pub fn node(term_type: TermType, args: impl IntoIterator<Item = TermTemplate>) -> Self {
        TermTemplate::Node {
            term_type,
            args: args.into_iter().collect(),
            optargs: Vec::new(),
        }
    }

    /// `term_type(target)`
    pub fn unary(term_type: TermType) -> Self {
        Self::node(term_type, [TermTemplate::Target])
    }

    /// `term_type(target, arg0)`
    pub fn with_arg(term_type: TermType) -> Self {
        Self::node(term_type, [TermTemplate::Target, TermTemplate::Arg(0)])
    }

    pub fn literal<D: Into<Datum>>(datum: D) -> Self {
        TermTemplate::Literal(datum.into())
    }

    pub fn optarg<S: Into<String>>(mut self, name: S, value: TermTemplate) -> Self {
        if let TermTemplate::Node { optargs, .. } = &mut self {
            optargs.push((name.into(), value));
        }
        self
    }

    /// Highest argument position referenced, plus one.
    pub fn arity(&self) -> usize {
        match self {
            TermTemplate::Arg(i) => i + 1,
            TermTemplate::Node { args, optargs, .. } => args
                .iter()
                .chain(optargs.iter().map(|(_, v)| v))
                .map(TermTemplate::arity)
                .max()
                .unwrap_or(0),
            TermTemplate::Target | TermTemplate::Literal(_) => 0,
        }
    }

    /// Rejects a call whose argument count differs from [`arity`](Self::arity).
    pub fn check_arity(&self, call: &dyn std::fmt::Display, given: usize) -> Result<()> {
        if given == self.arity() {
            return Ok(());
        }
        Err(Error::TranslationUnsupported(format!(
            "{} passes {} arguments to a template taking {}",
            call,
            given,
            self.arity()
        )))
    }

    pub fn uses_target(&self) -> bool {
        match self {
            TermTemplate::Target => true,
            TermTemplate::Node { args, optargs, .. } => {
                args.iter().any(TermTemplate::uses_target)
                    || optargs.iter().any(|(_, v)| v.uses_target())
            }
            _ => false,
        }
    }

    pub fn instantiate(&self, target: Option<&Term>, args: &[Term]) -> Result<Term> {
        match self {
            TermTemplate::Target => target.cloned().ok_or_else(|| {
                Error::TranslationUnsupported("template needs a target but none was given".into())
            }),
            TermTemplate::Arg(i) => args.get(*i).cloned().ok_or_else(|| {
                Error::TranslationUnsupported(format!(
                    "template uses argument {} but only {} were given",
                    i,
                    args.len()
                ))
            }),
            TermTemplate::Literal(datum) => Ok(Term::datum(datum.clone())),
            TermTemplate::Node {
                term_type,
                args: children,
                optargs,
            } => {
                let mut term = Term::new(*term_type);
                for child in children {
                    term = term.with_arg(child.instantiate(target, args)?);
                }
                for (name, child) in optargs {
                    term = term.with_optarg(name.clone(), child.instantiate(target, args)?);
                }
                Ok(term)
            }
        }
    }
}
