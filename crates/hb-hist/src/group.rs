//! Combining histograms under a new categorical axis.

use std::collections::BTreeMap;
use std::sync::Arc;

use hb_core::{Error, GroupKey, Result};

use crate::axis::AxisSpec;
use crate::config::HistConfig;
use crate::content::Content;
use crate::hist::Hist;

impl Hist {
    /// Combine compatible histograms as categories of a new outermost
    /// `groupby(by)` axis.
    ///
    /// Every member must have the same axes and weight. Repeated keys are
    /// summed. Members keep their content; the result holds copies.
    pub fn group<'a, K>(by: &str, members: impl IntoIterator<Item = (K, &'a Hist)>) -> Result<Hist>
    where
        K: Into<GroupKey>,
    {
        let members: Vec<(GroupKey, &Hist)> = members.into_iter().map(|(k, h)| (k.into(), h)).collect();
        let Some(&(_, first)) = members.first() else {
            return Err(Error::Config("group needs at least one histogram".into()));
        };
        if first.group.iter().any(|a| *a.spec() == AxisSpec::groupby(by)) {
            return Err(Error::Config(format!("{first} already has groupby({by:?})")));
        }
        let mut defs = BTreeMap::new();
        for (key, h) in &members {
            first.check_compatible(h)?;
            if h.weight != first.weight {
                return Err(Error::AxisMismatch(format!("member {key} has a different weight")));
            }
            defs.extend(h.defs.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let base = first.config();
        let config = HistConfig {
            axes: std::iter::once(AxisSpec::groupby(by)).chain(base.axes).collect(),
            weight: base.weight,
            defs,
        };
        let mut out = Hist::new(config)?;

        let depth = first.group.len();
        let mut children: BTreeMap<GroupKey, Content> = BTreeMap::new();
        for (key, h) in members {
            let theirs = h.content().cloned().unwrap_or_else(|| Content::empty(depth, &first.shape));
            match children.get_mut(&key) {
                Some(ours) => ours.merge_from(&theirs)?,
                None => {
                    children.insert(key, theirs);
                }
            }
        }
        out.content = Some(Arc::new(Content::Node(children)));
        log::debug!("grouped {} histogram(s) by {by:?}", out.content().and_then(Content::children).map_or(0, BTreeMap::len));
        Ok(out)
    }

    /// Add histograms as categories of this histogram's outermost
    /// `groupby` axis, merging into keys that already exist.
    ///
    /// Each member must match this histogram with its first axis removed.
    /// Nothing is modified if any member is incompatible.
    pub fn to_group<'a, K>(&mut self, members: impl IntoIterator<Item = (K, &'a Hist)>) -> Result<()>
    where
        K: Into<GroupKey>,
    {
        if !matches!(self.group.first().map(|a| a.spec()), Some(AxisSpec::GroupBy { .. })) {
            return Err(Error::Config(format!("{self}: outermost axis is not a groupby")));
        }
        let members: Vec<(GroupKey, &Hist)> = members.into_iter().map(|(k, h)| (k.into(), h)).collect();
        let depth = self.group.len() - 1;

        for (key, h) in &members {
            let matches = h.group.as_slice() == &self.group[1..]
                && h.fixed == self.fixed
                && h.profile == self.profile
                && h.shape == self.shape;
            if !matches {
                return Err(Error::AxisMismatch(format!("member {key} does not match {self} below its first axis")));
            }
            if let (Some(ours), Some(theirs)) = (self.content_at(std::slice::from_ref(key)), h.content()) {
                ours.check_mergeable(theirs)?;
            }
        }

        let shape = self.shape.clone();
        let Content::Node(children) = self.content_mut() else {
            return Err(Error::Config("content depth does not match group axes".into()));
        };
        for (key, h) in members {
            let theirs = h.content().cloned().unwrap_or_else(|| Content::empty(depth, &shape));
            match children.get_mut(&key) {
                Some(ours) => ours.merge_from(&theirs)?,
                None => {
                    children.insert(key, theirs);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_core::{Column, Symbols};

    fn filled(values: &[f64]) -> Hist {
        let mut h = Hist::from_axes([AxisSpec::cut("x > 0")]).unwrap();
        let mut s = Symbols::new();
        s.insert("x".into(), Column::from(values));
        h.fill(&s).unwrap();
        h
    }

    fn sumw(h: &Hist, keys: &[GroupKey]) -> Vec<f64> {
        h.content_at(keys).unwrap().leaf().unwrap().iter().copied().collect()
    }

    #[test]
    fn group_nests_members() {
        let sig = filled(&[1.0, 2.0]);
        let bkg = filled(&[-1.0]);
        let g = Hist::group("sample", [("sig", &sig), ("bkg", &bkg)]).unwrap();
        assert_eq!(g.group_axes().len(), 1);
        assert_eq!(g.group_axes()[0].spec(), &AxisSpec::groupby("sample"));
        assert_eq!(sumw(&g, &["sig".into()]), vec![0.0, 2.0]);
        assert_eq!(sumw(&g, &["bkg".into()]), vec![1.0, 0.0]);
        // members untouched
        assert_eq!(sumw(&sig, &[]), vec![0.0, 2.0]);
    }

    #[test]
    fn group_sums_repeated_keys() {
        let a = filled(&[1.0]);
        let g = Hist::group("s", [("a", &a), ("a", &a)]).unwrap();
        assert_eq!(sumw(&g, &["a".into()]), vec![0.0, 2.0]);
    }

    #[test]
    fn group_rejects_mismatches() {
        let a = filled(&[1.0]);
        let b = Hist::from_axes([AxisSpec::cut("x > 1")]).unwrap();
        assert!(matches!(Hist::group("s", [("a", &a), ("b", &b)]), Err(Error::AxisMismatch(_))));
        let w = a.with_weight("w").unwrap();
        assert!(matches!(Hist::group("s", [("a", &a), ("w", &w)]), Err(Error::AxisMismatch(_))));
        assert!(matches!(Hist::group("s", Vec::<(&str, &Hist)>::new()), Err(Error::Config(_))));
        let g = Hist::group("s", [("a", &a)]).unwrap();
        assert!(matches!(Hist::group("s", [("g", &g)]), Err(Error::Config(_))));
    }

    #[test]
    fn to_group_merges_and_adds_keys() {
        let a = filled(&[1.0]);
        let mut g = Hist::group("s", [("a", &a)]).unwrap();
        g.to_group([("a", &filled(&[-1.0])), ("b", &filled(&[2.0]))]).unwrap();
        assert_eq!(sumw(&g, &["a".into()]), vec![1.0, 1.0]);
        assert_eq!(sumw(&g, &["b".into()]), vec![0.0, 1.0]);
    }

    #[test]
    fn to_group_is_all_or_nothing() {
        let a = filled(&[1.0]);
        let mut g = Hist::group("s", [("a", &a)]).unwrap();
        let before = g.content().cloned();
        let bad = Hist::from_axes([AxisSpec::bin("x", 2, 0.0, 1.0)]).unwrap();
        let res = g.to_group([("b", &a), ("c", &bad)]);
        assert!(matches!(res, Err(Error::AxisMismatch(_))));
        assert_eq!(g.content().cloned(), before);

        let mut plain = filled(&[1.0]);
        assert!(matches!(plain.to_group([("a", &a)]), Err(Error::Config(_))));
    }
}
