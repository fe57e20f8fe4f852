//! Accumulated histogram content: a key tree over dense blocks.
//!
//! One level of [`Content::Node`] per group axis, keyed by category, with a
//! dense [`Content::Leaf`] block at the bottom. Every leaf of a histogram
//! has the same shape: one dimension per fixed axis, then a trailing
//! dimension holding the profile and weight accumulators.

use std::collections::BTreeMap;

use hb_core::{Error, GroupKey, Result};
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

/// A node of the content tree.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Content {
    /// Dense accumulator block.
    Leaf(ArrayD<f64>),
    /// One child per observed category.
    Node(#[serde_as(as = "Vec<(_, _)>")] BTreeMap<GroupKey, Content>),
}

impl Content {
    /// Zero-filled leaf.
    pub fn zeros(shape: &[usize]) -> Self {
        Content::Leaf(ArrayD::zeros(IxDyn(shape)))
    }

    /// Empty tree with `depth` key levels above leaves of `shape`.
    pub fn empty(depth: usize, shape: &[usize]) -> Self {
        if depth == 0 { Content::zeros(shape) } else { Content::Node(BTreeMap::new()) }
    }

    /// Leaf block, if this is a leaf.
    pub fn leaf(&self) -> Option<&ArrayD<f64>> {
        match self {
            Content::Leaf(a) => Some(a),
            Content::Node(_) => None,
        }
    }

    /// Children, if this is a node.
    pub fn children(&self) -> Option<&BTreeMap<GroupKey, Content>> {
        match self {
            Content::Node(m) => Some(m),
            Content::Leaf(_) => None,
        }
    }

    /// Follow `keys` down the tree.
    pub fn get(&self, keys: &[GroupKey]) -> Option<&Content> {
        match keys.split_first() {
            None => Some(self),
            Some((k, rest)) => self.children()?.get(k)?.get(rest),
        }
    }

    /// Every leaf with its key path, in key order.
    pub fn leaves(&self) -> Vec<(Vec<GroupKey>, &ArrayD<f64>)> {
        let mut out = Vec::new();
        self.collect_leaves(&mut Vec::new(), &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, path: &mut Vec<GroupKey>, out: &mut Vec<(Vec<GroupKey>, &'a ArrayD<f64>)>) {
        match self {
            Content::Leaf(a) => out.push((path.clone(), a)),
            Content::Node(m) => {
                for (k, child) in m {
                    path.push(k.clone());
                    child.collect_leaves(path, out);
                    path.pop();
                }
            }
        }
    }

    /// Check this tree has exactly `depth` key levels above leaves of `shape`.
    pub fn validate(&self, depth: usize, shape: &[usize]) -> Result<()> {
        match (self, depth) {
            (Content::Leaf(a), 0) => {
                if a.shape() == shape {
                    Ok(())
                } else {
                    Err(Error::AxisMismatch(format!(
                        "leaf shape {:?} does not match {:?}",
                        a.shape(),
                        shape
                    )))
                }
            }
            (Content::Node(m), d) if d > 0 => m.values().try_for_each(|c| c.validate(d - 1, shape)),
            (Content::Leaf(_), d) => {
                Err(Error::AxisMismatch(format!("leaf found where {d} more key level(s) expected")))
            }
            (Content::Node(_), _) => Err(Error::AxisMismatch("key level found below the last group axis".into())),
        }
    }

    /// Check `other` can be merged into `self` without a shape conflict.
    pub fn check_mergeable(&self, other: &Content) -> Result<()> {
        match (self, other) {
            (Content::Leaf(a), Content::Leaf(b)) => {
                if a.shape() == b.shape() {
                    Ok(())
                } else {
                    Err(Error::AxisMismatch(format!(
                        "cannot merge leaves of shape {:?} and {:?}",
                        a.shape(),
                        b.shape()
                    )))
                }
            }
            (Content::Node(a), Content::Node(b)) => b
                .iter()
                .filter_map(|(k, cb)| a.get(k).map(|ca| (ca, cb)))
                .try_for_each(|(ca, cb)| ca.check_mergeable(cb)),
            _ => Err(Error::AxisMismatch("cannot merge a leaf with a key level".into())),
        }
    }

    /// Element-wise sum over the union of keys. Neither input is modified.
    pub fn merged(&self, other: &Content) -> Result<Content> {
        self.check_mergeable(other)?;
        let mut out = self.clone();
        out.absorb(other);
        Ok(out)
    }

    /// Add `other` into `self` over the union of keys. On error `self` is
    /// left unchanged.
    pub fn merge_from(&mut self, other: &Content) -> Result<()> {
        self.check_mergeable(other)?;
        self.absorb(other);
        Ok(())
    }

    // Caller has run `check_mergeable`.
    fn absorb(&mut self, other: &Content) {
        match (self, other) {
            (Content::Leaf(a), Content::Leaf(b)) => *a += b,
            (Content::Node(a), Content::Node(b)) => {
                for (k, cb) in b {
                    match a.get_mut(k) {
                        Some(ca) => ca.absorb(cb),
                        None => {
                            a.insert(k.clone(), cb.clone());
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// Multiply every accumulator by `factor`.
    pub fn scale(&mut self, factor: f64) {
        match self {
            Content::Leaf(a) => a.mapv_inplace(|x| x * factor),
            Content::Node(m) => m.values_mut().for_each(|c| c.scale(factor)),
        }
    }

    /// Scaled copy.
    pub fn scaled(&self, factor: f64) -> Content {
        let mut out = self.clone();
        out.scale(factor);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::arr1;

    fn leaf(v: &[f64]) -> Content {
        Content::Leaf(arr1(v).into_dyn())
    }

    fn node(entries: Vec<(GroupKey, Content)>) -> Content {
        Content::Node(entries.into_iter().collect())
    }

    #[test]
    fn merge_takes_key_union() {
        let a = node(vec![(GroupKey::from("x"), leaf(&[1.0, 2.0])), (GroupKey::from("y"), leaf(&[3.0, 0.0]))]);
        let b = node(vec![(GroupKey::from("y"), leaf(&[1.0, 1.0])), (GroupKey::from("z"), leaf(&[5.0, 5.0]))]);
        let m = a.merged(&b).unwrap();
        assert_eq!(m.get(&["x".into()]), Some(&leaf(&[1.0, 2.0])));
        assert_eq!(m.get(&["y".into()]), Some(&leaf(&[4.0, 1.0])));
        assert_eq!(m.get(&["z".into()]), Some(&leaf(&[5.0, 5.0])));
        // inputs untouched
        assert_eq!(a.get(&["y".into()]), Some(&leaf(&[3.0, 0.0])));
        assert_eq!(m.leaves().len(), 3);
    }

    #[test]
    fn shape_conflict_leaves_target_unchanged() {
        let mut a = node(vec![(GroupKey::from("x"), leaf(&[1.0])), (GroupKey::from("y"), leaf(&[1.0, 2.0]))]);
        let before = a.clone();
        let b = node(vec![(GroupKey::from("x"), leaf(&[1.0])), (GroupKey::from("y"), leaf(&[1.0]))]);
        let err = a.merge_from(&b).unwrap_err();
        assert!(matches!(err, Error::AxisMismatch(_)));
        assert_eq!(a, before);
    }

    #[test]
    fn scale_reaches_every_leaf() {
        let mut a = node(vec![(GroupKey::real(1.0), leaf(&[1.0, 2.0])), (GroupKey::real(2.0), leaf(&[4.0, 0.5]))]);
        a.scale(2.0);
        let total: f64 = a.leaves().iter().map(|(_, l)| l.sum()).sum();
        assert_relative_eq!(total, 15.0);
    }

    #[test]
    fn validate_depth_and_shape() {
        let a = node(vec![(GroupKey::from("x"), leaf(&[0.0, 0.0]))]);
        assert!(a.validate(1, &[2]).is_ok());
        assert!(a.validate(0, &[2]).is_err());
        assert!(a.validate(2, &[2]).is_err());
        assert!(a.validate(1, &[3]).is_err());
        assert!(Content::empty(2, &[2]).validate(2, &[2]).is_ok());
    }

    #[test]
    fn json_round_trip() {
        let a = node(vec![(GroupKey::real(0.5), leaf(&[1.0, 2.0])), (GroupKey::from("b"), leaf(&[3.0, 4.0]))]);
        let json = serde_json::to_string(&a).unwrap();
        let back: Content = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }
}
