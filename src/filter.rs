// Filter expressions for list queries
// Rendered as OData; every interpolated text literal goes through quote_literal.

use crate::model::{Record, VendorId};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq { field: String, value: Literal },
    Or(Vec<Filter>),
    And(Vec<Filter>),
}

/// Wrap in single quotes, doubling any embedded single quote
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

impl Filter {
    pub fn eq_int(field: impl Into<String>, value: i64) -> Self {
        Filter::Eq {
            field: field.into(),
            value: Literal::Int(value),
        }
    }

    pub fn eq_text(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Eq {
            field: field.into(),
            value: Literal::Text(value.into()),
        }
    }

    pub fn eq_vendor(field: impl Into<String>, vendor: &VendorId) -> Self {
        match vendor {
            VendorId::Id(id) => Filter::eq_int(field, *id),
            VendorId::Key(key) => Filter::eq_text(field, key.as_str()),
        }
    }

    /// `field eq a or field eq b or ...`
    pub fn any_eq(field: &str, ids: &[i64]) -> Self {
        match ids {
            [single] => Filter::eq_int(field, *single),
            _ => Filter::Or(ids.iter().map(|id| Filter::eq_int(field, *id)).collect()),
        }
    }

    /// Evaluate against a record the way the list service would
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::Eq { field, value } => match (record.get(field), value) {
                (Some(v), Literal::Int(expected)) => value_as_int(v) == Some(*expected),
                (Some(Value::String(s)), Literal::Text(expected)) => s == expected,
                _ => false,
            },
            Filter::Or(parts) => parts.iter().any(|p| p.matches(record)),
            Filter::And(parts) => parts.iter().all(|p| p.matches(record)),
        }
    }

    fn is_compound(&self) -> bool {
        matches!(self, Filter::Or(parts) | Filter::And(parts) if parts.len() > 1)
    }

    fn fmt_joined(f: &mut fmt::Formatter<'_>, parts: &[Filter], op: &str) -> fmt::Result {
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                write!(f, " {} ", op)?;
            }
            if part.is_compound() {
                write!(f, "({})", part)?;
            } else {
                write!(f, "{}", part)?;
            }
        }
        Ok(())
    }
}

fn value_as_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Text(s) => f.write_str(&quote_literal(s)),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Eq { field, value } => write!(f, "{} eq {}", field, value),
            Filter::Or(parts) => Filter::fmt_joined(f, parts, "or"),
            Filter::And(parts) => Filter::fmt_joined(f, parts, "and"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_quote_literal_doubles_quotes() {
        assert_eq!(quote_literal("Acme"), "'Acme'");
        assert_eq!(quote_literal("O'Brien's"), "'O''Brien''s'");
        assert_eq!(quote_literal(""), "''");
    }

    #[test]
    fn test_injection_stays_inside_literal() {
        let filter = Filter::eq_text("Title", "x' or Title ne 'y");
        assert_eq!(filter.to_string(), "Title eq 'x'' or Title ne ''y'");
    }

    #[test]
    fn test_vendor_filter_rendering() {
        assert_eq!(Filter::eq_vendor("VendorId", &VendorId::Id(7)).to_string(), "VendorId eq 7");
        assert_eq!(
            Filter::eq_vendor("VendorKey", &VendorId::Key("D'Arcy".into())).to_string(),
            "VendorKey eq 'D''Arcy'"
        );
    }

    #[test]
    fn test_any_eq_or_chain() {
        assert_eq!(Filter::any_eq("PO_IDId", &[1]).to_string(), "PO_IDId eq 1");
        assert_eq!(
            Filter::any_eq("PO_IDId", &[1, 2, 3]).to_string(),
            "PO_IDId eq 1 or PO_IDId eq 2 or PO_IDId eq 3"
        );
    }

    #[test]
    fn test_nested_filters_parenthesized() {
        let filter = Filter::And(vec![
            Filter::eq_text("Status", "Open"),
            Filter::any_eq("PO_IDId", &[4, 5]),
        ]);
        assert_eq!(filter.to_string(), "Status eq 'Open' and (PO_IDId eq 4 or PO_IDId eq 5)");
    }

    #[test]
    fn test_matches() {
        let rec = record(json!({"PO_IDId": 4, "Title": "Acme", "Legacy": "12"}));

        assert!(Filter::eq_int("PO_IDId", 4).matches(&rec));
        assert!(!Filter::eq_int("PO_IDId", 5).matches(&rec));
        assert!(Filter::any_eq("PO_IDId", &[1, 4]).matches(&rec));
        assert!(Filter::eq_text("Title", "Acme").matches(&rec));
        assert!(!Filter::eq_text("Title", "acme").matches(&rec));
        assert!(Filter::eq_int("Legacy", 12).matches(&rec));
        assert!(!Filter::eq_int("Missing", 1).matches(&rec));
    }
}
