//! Typed filter expression tree and its parser.
//!
//! On the wire a filter is a JSON array whose first element is the operator:
//!
//! ```text
//! ["==", "color", "blue"]
//! ["<", "age", 21]
//! ["and", ["==", "service", "prosody"], [">=", "severity_level", 3]]
//! ["or", ["not", ["==", "service", "java"]], [">=", "severity_level", 3]]
//! ["==", "player.color", "blue"]
//! ```

use crate::error::{DataSyncError, Result};
use serde_json::Value;
use std::fmt;

/// Comparison operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
        }
    }
}

/// Dot-separated path into a record snapshot.
#[derive(Clone, PartialEq, Eq)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn parse(path: &str) -> Self {
        FieldPath(path.split('.').map(str::to_string).collect())
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Debug for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldPath({})", self.0.join("."))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// A parsed filter expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    Compare {
        op: CompareOp,
        field: FieldPath,
        value: Value,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    /// Parse the wire form. Fails with `BadQuery` on any structural problem.
    pub fn parse(query: &Value) -> Result<Self> {
        let Value::Array(parts) = query else {
            return Err(bad_query(format!("expected an expression list, got {query}")));
        };
        let Some((head, args)) = parts.split_first() else {
            return Err(bad_query("empty expression"));
        };
        let Value::String(op) = head else {
            return Err(bad_query(format!("operator must be a string, got {head}")));
        };

        match op.as_str() {
            "==" => Self::parse_compare(CompareOp::Eq, args),
            "<" => Self::parse_compare(CompareOp::Lt, args),
            "<=" => Self::parse_compare(CompareOp::Lte, args),
            ">" => Self::parse_compare(CompareOp::Gt, args),
            ">=" => Self::parse_compare(CompareOp::Gte, args),
            "and" => Ok(Filter::And(Self::parse_all(args)?)),
            "or" => Ok(Filter::Or(Self::parse_all(args)?)),
            "not" => match args {
                [inner] => Ok(Filter::Not(Box::new(Self::parse(inner)?))),
                _ => Err(bad_query(format!(
                    "'not' takes one expression, got {}",
                    args.len()
                ))),
            },
            other => Err(bad_query(format!("unknown operator '{other}'"))),
        }
    }

    fn parse_compare(op: CompareOp, args: &[Value]) -> Result<Self> {
        match args {
            [Value::String(field), value] => Ok(Filter::Compare {
                op,
                field: FieldPath::parse(field),
                value: value.clone(),
            }),
            [field, _] => Err(bad_query(format!(
                "'{}' field path must be a string, got {field}",
                op.as_str()
            ))),
            _ => Err(bad_query(format!(
                "'{}' takes a field and a value, got {} arguments",
                op.as_str(),
                args.len()
            ))),
        }
    }

    fn parse_all(args: &[Value]) -> Result<Vec<Filter>> {
        args.iter().map(Self::parse).collect()
    }

    /// Render back to the wire form.
    pub fn to_value(&self) -> Value {
        match self {
            Filter::Compare { op, field, value } => Value::Array(vec![
                Value::String(op.as_str().to_string()),
                Value::String(field.to_string()),
                value.clone(),
            ]),
            Filter::And(children) => Self::connective("and", children),
            Filter::Or(children) => Self::connective("or", children),
            Filter::Not(inner) => {
                Value::Array(vec![Value::String("not".to_string()), inner.to_value()])
            }
        }
    }

    fn connective(op: &str, children: &[Filter]) -> Value {
        let mut parts = Vec::with_capacity(children.len() + 1);
        parts.push(Value::String(op.to_string()));
        parts.extend(children.iter().map(Filter::to_value));
        Value::Array(parts)
    }
}

fn bad_query(reason: impl Into<String>) -> DataSyncError {
    DataSyncError::BadQuery(reason.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_comparison() {
        let filter = Filter::parse(&json!(["==", "player.color", "blue"])).unwrap();
        match filter {
            Filter::Compare { op, field, value } => {
                assert_eq!(op, CompareOp::Eq);
                assert_eq!(field.segments().collect::<Vec<_>>(), vec!["player", "color"]);
                assert_eq!(value, json!("blue"));
            }
            other => panic!("Expected comparison, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_nested() {
        let wire = json!(["or", ["not", ["==", "service", "java"]], [">=", "severity_level", 3]]);
        let filter = Filter::parse(&wire).unwrap();
        assert!(matches!(filter, Filter::Or(ref children) if children.len() == 2));
        assert_eq!(filter.to_value(), wire);
    }

    #[test]
    fn test_rejects_non_list() {
        let result = Filter::parse(&json!("color"));
        assert!(matches!(result, Err(DataSyncError::BadQuery(_))));
    }

    #[test]
    fn test_rejects_malformed_nodes() {
        for wire in [
            json!([]),
            json!([1, "a", 2]),
            json!(["~", "a", 2]),
            json!(["==", "a"]),
            json!(["==", 3, 2]),
            json!(["not"]),
            json!(["not", ["==", "a", 1], ["==", "b", 1]]),
            json!(["and", ["==", "a", 1], "b"]),
        ] {
            let result = Filter::parse(&wire);
            assert!(
                matches!(result, Err(DataSyncError::BadQuery(_))),
                "expected BadQuery for {wire}"
            );
        }
    }

    #[test]
    fn test_empty_connectives_are_valid() {
        assert_eq!(Filter::parse(&json!(["and"])).unwrap(), Filter::And(vec![]));
        assert_eq!(Filter::parse(&json!(["or"])).unwrap(), Filter::Or(vec![]));
    }
}
