//! Common data types for histbook

use std::collections::HashMap;
use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Symbol table handed to a fill: column name to equal-length column.
pub type Symbols = HashMap<String, Column>;

/// One named column of per-event values.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Real-valued data
    Real(Vec<f64>),
    /// Boolean data (selections)
    Bool(Vec<bool>),
    /// Text data (categories)
    Text(Vec<String>),
}

impl Column {
    /// Number of events in the column.
    pub fn len(&self) -> usize {
        match self {
            Column::Real(v) => v.len(),
            Column::Bool(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    /// Whether the column holds no events.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short name of the element kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Column::Real(_) => "real",
            Column::Bool(_) => "bool",
            Column::Text(_) => "text",
        }
    }
}

impl From<Vec<f64>> for Column {
    fn from(v: Vec<f64>) -> Self {
        Column::Real(v)
    }
}

impl From<&[f64]> for Column {
    fn from(v: &[f64]) -> Self {
        Column::Real(v.to_vec())
    }
}

impl From<Vec<bool>> for Column {
    fn from(v: Vec<bool>) -> Self {
        Column::Bool(v)
    }
}

impl From<Vec<String>> for Column {
    fn from(v: Vec<String>) -> Self {
        Column::Text(v)
    }
}

impl From<Vec<&str>> for Column {
    fn from(v: Vec<&str>) -> Self {
        Column::Text(v.into_iter().map(str::to_string).collect())
    }
}

/// Category key labelling one entry of a group level.
///
/// Real keys are totally ordered through [`OrderedFloat`], so a content tree
/// can be stored in ordered maps and iterated deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GroupKey {
    /// Numeric category (distinct value or sparse-bin coordinate)
    Real(OrderedFloat<f64>),
    /// Named category
    Text(String),
}

impl GroupKey {
    /// Numeric key.
    pub fn real(v: f64) -> Self {
        GroupKey::Real(OrderedFloat(v))
    }

    /// Numeric value, if this is a numeric key.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            GroupKey::Real(v) => Some(v.0),
            GroupKey::Text(_) => None,
        }
    }

    /// Name, if this is a text key.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            GroupKey::Real(_) => None,
            GroupKey::Text(s) => Some(s),
        }
    }
}

impl From<f64> for GroupKey {
    fn from(v: f64) -> Self {
        GroupKey::real(v)
    }
}

impl From<&str> for GroupKey {
    fn from(s: &str) -> Self {
        GroupKey::Text(s.to_string())
    }
}

impl From<String> for GroupKey {
    fn from(s: String) -> Self {
        GroupKey::Text(s)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Real(v) => write!(f, "{}", v.0),
            GroupKey::Text(s) => write!(f, "{s:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_lengths() {
        assert_eq!(Column::from(vec![1.0, 2.0]).len(), 2);
        assert_eq!(Column::from(vec!["a", "b", "c"]).len(), 3);
        assert!(Column::Bool(vec![]).is_empty());
    }

    #[test]
    fn keys_order_reals_before_text() {
        let mut keys = vec![GroupKey::from("b"), GroupKey::real(2.0), GroupKey::from("a"), GroupKey::real(-1.0)];
        keys.sort();
        assert_eq!(
            keys,
            vec![GroupKey::real(-1.0), GroupKey::real(2.0), GroupKey::from("a"), GroupKey::from("b")]
        );
    }

    #[test]
    fn key_accessors() {
        assert_eq!(GroupKey::real(3.0).as_real(), Some(3.0));
        assert_eq!(GroupKey::from("x").as_text(), Some("x"));
        assert_eq!(GroupKey::from("x").as_real(), None);
    }
}
