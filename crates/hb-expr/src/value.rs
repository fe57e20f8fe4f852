//! Results of evaluating an expression.

use std::borrow::Cow;

use hb_core::{Column, Error, GroupKey, Result};

/// Distinct category keys plus, per event, the position of its key.
///
/// `inverse[i] == None` marks event `i` as invalid: it has no key and is
/// dropped from every group.
#[derive(Debug, Clone, PartialEq)]
pub struct Groups {
    /// Sorted distinct keys.
    pub uniques: Vec<GroupKey>,
    /// Per-event index into `uniques`.
    pub inverse: Vec<Option<usize>>,
}

impl Groups {
    /// Build from per-event keys; `None` entries are invalid.
    pub fn from_keys(keys: Vec<Option<GroupKey>>) -> Self {
        let mut uniques: Vec<GroupKey> = keys.iter().flatten().cloned().collect();
        uniques.sort();
        uniques.dedup();
        let inverse = keys
            .iter()
            .map(|k| k.as_ref().and_then(|k| uniques.binary_search(k).ok()))
            .collect();
        Self { uniques, inverse }
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.inverse.len()
    }

    /// Whether there are no events.
    pub fn is_empty(&self) -> bool {
        self.inverse.is_empty()
    }
}

/// Value produced by a symbol lookup, a constant, or a kernel call.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Scalar constant, broadcast against vectors.
    Scalar(f64),
    /// Constant sequence (bin edges).
    Sequence(Vec<f64>),
    /// Per-event reals.
    Real(Vec<f64>),
    /// Per-event booleans.
    Bool(Vec<bool>),
    /// Per-event text.
    Text(Vec<String>),
    /// Per-event bin index; `None` is the masked ("no bin") marker.
    Index(Vec<Option<usize>>),
    /// Per-event category assignment.
    Groups(Groups),
}

impl From<Column> for Value {
    fn from(c: Column) -> Self {
        match c {
            Column::Real(v) => Value::Real(v),
            Column::Bool(v) => Value::Bool(v),
            Column::Text(v) => Value::Text(v),
        }
    }
}

impl Value {
    /// Per-event length, or `None` for constants.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Scalar(_) | Value::Sequence(_) => None,
            Value::Real(v) => Some(v.len()),
            Value::Bool(v) => Some(v.len()),
            Value::Text(v) => Some(v.len()),
            Value::Index(v) => Some(v.len()),
            Value::Groups(g) => Some(g.len()),
        }
    }

    /// Short name of the value kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "scalar",
            Value::Sequence(_) => "sequence",
            Value::Real(_) => "real array",
            Value::Bool(_) => "bool array",
            Value::Text(_) => "text array",
            Value::Index(_) => "index array",
            Value::Groups(_) => "groups",
        }
    }

    /// The scalar held by a constant.
    pub fn scalar(&self) -> Result<f64> {
        match self {
            Value::Scalar(v) => Ok(*v),
            other => Err(type_error("scalar", other)),
        }
    }

    /// The sequence held by a constant.
    pub fn sequence(&self) -> Result<&[f64]> {
        match self {
            Value::Sequence(v) => Ok(v.as_slice()),
            other => Err(type_error("sequence", other)),
        }
    }

    /// Per-event reals; booleans read as 0/1.
    pub fn reals(&self) -> Result<Cow<'_, [f64]>> {
        match self {
            Value::Real(v) => Ok(Cow::Borrowed(v.as_slice())),
            Value::Bool(v) => Ok(Cow::Owned(v.iter().map(|&b| f64::from(u8::from(b))).collect())),
            other => Err(type_error("real array", other)),
        }
    }

    /// Per-event booleans; reals are true when non-zero.
    pub fn bools(&self) -> Result<Cow<'_, [bool]>> {
        match self {
            Value::Bool(v) => Ok(Cow::Borrowed(v.as_slice())),
            Value::Real(v) => Ok(Cow::Owned(v.iter().map(|&x| x != 0.0).collect())),
            other => Err(type_error("bool array", other)),
        }
    }

    /// Consume into per-event reals, broadcasting a scalar to `n` events.
    pub fn into_reals(self, n: usize) -> Result<Vec<f64>> {
        match self {
            Value::Real(v) => Ok(v),
            Value::Scalar(s) => Ok(vec![s; n]),
            Value::Bool(v) => Ok(v.into_iter().map(|b| f64::from(u8::from(b))).collect()),
            other => Err(type_error("real array", &other)),
        }
    }

    /// Consume into a masked index array.
    pub fn into_index(self) -> Result<Vec<Option<usize>>> {
        match self {
            Value::Index(v) => Ok(v),
            other => Err(type_error("index array", &other)),
        }
    }

    /// Consume into a category assignment.
    pub fn into_groups(self) -> Result<Groups> {
        match self {
            Value::Groups(g) => Ok(g),
            other => Err(type_error("groups", &other)),
        }
    }
}

pub(crate) fn type_error(expected: &str, got: &Value) -> Error {
    Error::Type(format!("expected {expected}, got {}", got.kind()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_from_keys_sorted_with_invalid() {
        let g = Groups::from_keys(vec![
            Some(GroupKey::from("y")),
            None,
            Some(GroupKey::from("x")),
            Some(GroupKey::from("y")),
        ]);
        assert_eq!(g.uniques, vec![GroupKey::from("x"), GroupKey::from("y")]);
        assert_eq!(g.inverse, vec![Some(1), None, Some(0), Some(1)]);
    }

    #[test]
    fn bools_read_as_reals() {
        let v = Value::Bool(vec![true, false]);
        assert_eq!(v.reals().unwrap().as_ref(), &[1.0, 0.0]);
    }

    #[test]
    fn scalar_broadcasts() {
        assert_eq!(Value::Scalar(2.0).into_reals(3).unwrap(), vec![2.0, 2.0, 2.0]);
    }

    #[test]
    fn kind_mismatch_is_type_error() {
        let err = Value::Real(vec![1.0]).into_index().unwrap_err();
        assert!(matches!(err, Error::Type(_)));
        assert!(Value::Text(vec![]).reals().is_err());
    }
}
