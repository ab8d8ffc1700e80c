//! JSON wire form of terms.
//!
//! # Wire Protocol Format
//!
//! Terms are transmitted as JSON arrays:
//! ```json
//! [term_type, [arg1, arg2, ...], {"optarg1": value1, ...}]
//! ```
//!
//! Literal datums are written raw, except that a JSON array inside a
//! literal would be read back as a term, so every array nested in a datum
//! goes out as `[MAKE_ARRAY, [...]]`.
//!
//! # Example
//!
//! `r.table("users").filter(lambda x: x["active"])`:
//!
//! ```json
//! [39, [[15, ["users"]], [69, [[2, [1]], [31, [[10, [1]], "active"]]]]]]
//! ```

use super::{Datum, Term, TermType};
use crate::error::{Error, Result};
use serde_json::Value;

impl Term {
    /// Serialise this term into its JSON wire form.
    pub fn to_wire(&self) -> Result<Value> {
        if self.is_datum() {
            let datum = self
                .as_datum()
                .ok_or_else(|| Error::Wire("DATUM term missing value".to_string()))?;
            return datum_to_wire(datum);
        }

        let mut parts = vec![Value::from(self.term_type.to_u64())];
        let args = self
            .args
            .iter()
            .map(Term::to_wire)
            .collect::<Result<Vec<_>>>()?;
        parts.push(Value::Array(args));

        if !self.optargs.is_empty() {
            let mut optargs = serde_json::Map::new();
            for (key, value) in &self.optargs {
                optargs.insert(key.clone(), value.to_wire()?);
            }
            parts.push(Value::Object(optargs));
        }

        Ok(Value::Array(parts))
    }

    /// Parse a term from its JSON wire form.
    pub fn from_wire(json: &Value) -> Result<Term> {
        match json {
            Value::Array(arr) => {
                let Some(first) = arr.first() else {
                    return Err(Error::Wire("Empty term array".to_string()));
                };
                let id = first.as_u64().ok_or_else(|| {
                    Error::Wire(format!("Invalid term type: expected number, got {}", first))
                })?;
                let term_type = TermType::from_u64(id)
                    .ok_or_else(|| Error::Wire(format!("Unknown term type: {}", id)))?;

                if term_type == TermType::Datum {
                    let value = arr
                        .get(1)
                        .ok_or_else(|| Error::Wire("DATUM term requires value argument".to_string()))?;
                    return Ok(Term::datum(Datum::from(value.clone())));
                }

                let mut term = Term::new(term_type);
                if let Some(args) = arr.get(1) {
                    let args = args
                        .as_array()
                        .ok_or_else(|| Error::Wire(format!("{} arguments must be an array", term_type)))?;
                    for arg in args {
                        term = term.with_arg(Term::from_wire(arg)?);
                    }
                }
                if let Some(optargs) = arr.get(2) {
                    let optargs = optargs
                        .as_object()
                        .ok_or_else(|| Error::Wire(format!("{} optargs must be an object", term_type)))?;
                    for (key, value) in optargs {
                        term = term.with_optarg(key.clone(), Term::from_wire(value)?);
                    }
                }

                // Collapse literal arrays back into datums.
                if term_type == TermType::MakeArray && term.args.iter().all(Term::is_datum) {
                    let items = term.args.into_iter().filter_map(|t| t.datum).collect();
                    return Ok(Term::datum(Datum::Array(items)));
                }
                Ok(term)
            }
            Value::Object(obj) => {
                let members = obj
                    .iter()
                    .map(|(k, v)| Term::from_wire(v).map(|t| (k.clone(), t)))
                    .collect::<Result<Vec<_>>>()?;
                if members.iter().all(|(_, t)| t.is_datum()) {
                    Ok(Term::datum(Datum::Object(
                        members
                            .into_iter()
                            .filter_map(|(k, t)| t.datum.map(|d| (k, d)))
                            .collect(),
                    )))
                } else {
                    Ok(Term::make_obj(members))
                }
            }
            scalar => Ok(Term::datum(Datum::from(scalar.clone()))),
        }
    }
}

fn datum_to_wire(datum: &Datum) -> Result<Value> {
    match datum {
        Datum::Array(items) => {
            let items = items.iter().map(datum_to_wire).collect::<Result<Vec<_>>>()?;
            Ok(Value::Array(vec![
                Value::from(TermType::MakeArray.to_u64()),
                Value::Array(items),
            ]))
        }
        Datum::Object(pairs) => {
            let mut obj = serde_json::Map::new();
            for (key, value) in pairs {
                obj.insert(key.clone(), datum_to_wire(value)?);
            }
            Ok(Value::Object(obj))
        }
        Datum::Number(n) if !n.is_finite() => Err(Error::Wire(format!(
            "Non-finite number {} cannot be sent",
            n
        ))),
        other => serde_json::to_value(other).map_err(|e| Error::Wire(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_datum_arrays_are_wrapped() {
        let term = Term::datum(Datum::object([(
            "tags",
            Datum::Array(vec![Datum::from("a"), Datum::from("b")]),
        )]));
        assert_eq!(term.to_wire().unwrap(), json!({"tags": [2, ["a", "b"]]}));
    }

    #[test]
    fn test_filter_lambda_wire_form() {
        let predicate = Term::func(&[1], Term::get_field(Term::var(1), "active"));
        let term = Term::new(TermType::Filter)
            .with_arg(Term::new(TermType::Table).with_arg(Term::datum(Datum::from("users"))))
            .with_arg(predicate);
        assert_eq!(
            term.to_wire().unwrap(),
            json!([39, [[15, ["users"]], [69, [[2, [1]], [31, [[10, [1]], "active"]]]]]])
        );
    }

    #[test]
    fn test_object_keys_keep_insertion_order() {
        let term = Term::datum(Datum::object([
            ("name", Datum::from("Ann")),
            ("age", Datum::from(3)),
        ]));
        let wire = term.to_wire().unwrap();
        assert_eq!(serde_json::to_string(&wire).unwrap(), r#"{"name":"Ann","age":3}"#);

        let obj = Term::make_obj([
            ("zeta", Term::datum(Datum::from(1))),
            ("alpha", Term::var(1)),
        ]);
        assert_eq!(
            serde_json::to_string(&obj.to_wire().unwrap()).unwrap(),
            r#"[3,[],{"zeta":1,"alpha":[10,[1]]}]"#
        );
    }

    #[test]
    fn test_from_wire_roundtrip() {
        let json = json!([15, ["users"], {"read_mode": "outdated"}]);
        let term = Term::from_wire(&json).unwrap();
        assert_eq!(term.term_type, TermType::Table);
        assert_eq!(
            term.optarg("read_mode").unwrap().as_datum().unwrap().as_string(),
            Some("outdated")
        );
        assert_eq!(term.to_wire().unwrap(), json);
    }

    #[test]
    fn test_from_wire_collapses_literal_arrays() {
        let term = Term::from_wire(&json!([2, [1, 2]])).unwrap();
        assert_eq!(
            term.as_datum(),
            Some(&Datum::Array(vec![Datum::Number(1.0), Datum::Number(2.0)]))
        );
    }

    #[test]
    fn test_unknown_term_type_is_rejected() {
        assert!(matches!(
            Term::from_wire(&json!([9999, []])),
            Err(Error::Wire(_))
        ));
    }

    #[test]
    fn test_non_finite_numbers_are_rejected() {
        assert!(Term::datum(Datum::Number(f64::NAN)).to_wire().is_err());
    }
}
