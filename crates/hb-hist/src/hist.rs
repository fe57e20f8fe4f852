//! The histogram type: bound axes, weight and accumulated content.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Add, Mul, MulAssign};
use std::sync::Arc;

use hb_core::{Error, GroupKey, Result};
use hb_expr::{Destinations, Expr, Library, Literal};

use crate::axis::{Axis, AxisKind, AxisRole, AxisSpec};
use crate::config::{HistConfig, WeightSpec};
use crate::content::Content;

/// Resolved weight and the trailing slots it accumulates into.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Weighting {
    /// Every event counts once.
    Unit { sumw: usize },
    /// Every event counts `value`.
    Constant { value: f64, sumw: usize },
    /// Per-event weight; also accumulates the sum of squares.
    Expr { sumw: usize, sumw2: usize, slots: [usize; 2] },
}

impl Weighting {
    fn width(&self) -> usize {
        match self {
            Weighting::Unit { .. } | Weighting::Constant { .. } => 1,
            Weighting::Expr { .. } => 2,
        }
    }
}

/// A multi-dimensional histogram.
///
/// Group axes nest the content by category, fixed axes give every leaf
/// block its dimensions, and profile axes plus the weight add trailing
/// accumulators. Content is created on the first fill.
#[derive(Debug, Clone)]
pub struct Hist {
    pub(crate) group: Vec<Axis>,
    pub(crate) fixed: Vec<Axis>,
    pub(crate) profile: Vec<Axis>,
    pub(crate) weight: Option<WeightSpec>,
    pub(crate) weighting: Weighting,
    pub(crate) defs: BTreeMap<String, String>,
    pub(crate) shape: Vec<usize>,
    pub(crate) destinations: Destinations,
    pub(crate) content: Option<Arc<Content>>,
    pub(crate) copy_on_fill: bool,
}

impl Hist {
    /// Build a histogram from its configuration.
    ///
    /// Axes are validated, parsed with `defs` expanded, checked against the
    /// kernel library, and then laid out group first, fixed second, profile
    /// last, each kind keeping its declaration order.
    pub fn new(config: HistConfig) -> Result<Self> {
        let HistConfig { axes, weight, defs } = config;

        let mut parsed = Vec::with_capacity(axes.len());
        for spec in axes {
            let expr = Axis::parse(&spec, &defs)?;
            parsed.push((spec, expr));
        }
        let of_kind = |kind: AxisKind| parsed.iter().filter(move |(spec, _)| spec.kind() == kind);

        let mut destinations = Destinations::new();

        let mut group = Vec::new();
        for (spec, expr) in of_kind(AxisKind::Group) {
            let slots = destinations.register(&spec.goals(expr));
            let role = AxisRole::Group { depth: group.len(), slot: slots[0] };
            group.push(Axis::new(spec.clone(), expr.clone(), role));
        }

        let mut fixed = Vec::new();
        let mut shape = Vec::new();
        for (spec, expr) in of_kind(AxisKind::Fixed) {
            let totbins = spec
                .totbins()
                .ok_or_else(|| Error::Config(format!("{spec}: cannot size this axis")))?;
            let slots = destinations.register(&spec.goals(expr));
            let role = AxisRole::Fixed { shape_index: shape.len(), totbins, slot: slots[0] };
            shape.push(totbins);
            fixed.push(Axis::new(spec.clone(), expr.clone(), role));
        }

        let mut profile = Vec::new();
        let mut trailing = 0;
        for (spec, expr) in of_kind(AxisKind::Profile) {
            let slots = destinations.register(&spec.goals(expr));
            let role = AxisRole::Profile {
                sumwx: trailing,
                sumwx2: trailing + 1,
                slots: [slots[0], slots[1]],
            };
            trailing += 2;
            profile.push(Axis::new(spec.clone(), expr.clone(), role));
        }

        let weighting = match &weight {
            None => Weighting::Unit { sumw: trailing },
            Some(WeightSpec::Number(value)) => Weighting::Constant { value: *value, sumw: trailing },
            Some(WeightSpec::Expr(source)) => {
                let parsed = Expr::parse_with_defs(source, &defs)?;
                Library::global().check(&parsed)?;
                match parsed {
                    Expr::Const(Literal::Number(value)) => {
                        Weighting::Constant { value: value.into_inner(), sumw: trailing }
                    }
                    parsed => {
                        let squared = Expr::call("multiply", vec![parsed.clone(), parsed.clone()]);
                        let slots = destinations.register(&[parsed, squared]);
                        Weighting::Expr { sumw: trailing, sumw2: trailing + 1, slots: [slots[0], slots[1]] }
                    }
                }
            }
        };
        trailing += weighting.width();
        shape.push(trailing);

        log::debug!(
            "histogram: {} group, {} fixed, {} profile axis(es); leaf shape {:?}; {} goal(s) in {} slot(s)",
            group.len(),
            fixed.len(),
            profile.len(),
            shape,
            destinations.goals().len(),
            destinations.len()
        );

        Ok(Self {
            group,
            fixed,
            profile,
            weight,
            weighting,
            defs,
            shape,
            destinations,
            content: None,
            copy_on_fill: false,
        })
    }

    /// Build from axes alone: unit weight, no definitions.
    pub fn from_axes(axes: impl IntoIterator<Item = AxisSpec>) -> Result<Self> {
        Self::new(HistConfig { axes: axes.into_iter().collect(), ..HistConfig::default() })
    }

    /// Build from a JSON [`HistConfig`].
    pub fn from_json(json: &str) -> Result<Self> {
        Self::new(HistConfig::from_json(json)?)
    }

    // ── Accessors ───────────────────────────────────────────────

    /// Leaf block shape: one entry per fixed axis, then the trailing
    /// accumulator count.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Every axis in layout order: group, fixed, profile.
    pub fn axes(&self) -> impl Iterator<Item = &Axis> {
        self.group.iter().chain(&self.fixed).chain(&self.profile)
    }

    /// Group axes, outermost first.
    pub fn group_axes(&self) -> &[Axis] {
        &self.group
    }

    /// Fixed axes in dimension order.
    pub fn fixed_axes(&self) -> &[Axis] {
        &self.fixed
    }

    /// Profile axes in accumulator order.
    pub fn profile_axes(&self) -> &[Axis] {
        &self.profile
    }

    /// Configured weight.
    pub fn weight(&self) -> Option<&WeightSpec> {
        self.weight.as_ref()
    }

    /// Named definitions.
    pub fn defs(&self) -> &BTreeMap<String, String> {
        &self.defs
    }

    /// Trailing offset of the summed weight.
    pub fn sumw_index(&self) -> usize {
        match self.weighting {
            Weighting::Unit { sumw } | Weighting::Constant { sumw, .. } | Weighting::Expr { sumw, .. } => sumw,
        }
    }

    /// Trailing offset of the summed squared weight, when one is kept.
    pub fn sumw2_index(&self) -> Option<usize> {
        match self.weighting {
            Weighting::Expr { sumw2, .. } => Some(sumw2),
            _ => None,
        }
    }

    /// Accumulated content; `None` until the first fill.
    pub fn content(&self) -> Option<&Content> {
        self.content.as_deref()
    }

    /// Subtree reached by following one key per group axis from the root.
    pub fn content_at(&self, keys: &[GroupKey]) -> Option<&Content> {
        self.content()?.get(keys)
    }

    /// Configuration that rebuilds this histogram (without content).
    pub fn config(&self) -> HistConfig {
        HistConfig {
            axes: self.axes().map(|a| a.spec().clone()).collect(),
            weight: self.weight.clone(),
            defs: self.defs.clone(),
        }
    }

    /// Mutable content, created empty if absent. Honors a pending
    /// copy-on-fill by detaching from the shared content first.
    pub(crate) fn content_mut(&mut self) -> &mut Content {
        if std::mem::take(&mut self.copy_on_fill)
            && let Some(shared) = &self.content
        {
            self.content = Some(Arc::new(Content::clone(shared)));
        }
        let depth = self.group.len();
        let shape = &self.shape;
        Arc::make_mut(self.content.get_or_insert_with(|| Arc::new(Content::empty(depth, shape))))
    }

    // ── Copies ──────────────────────────────────────────────────

    /// Independent deep copy.
    pub fn copy(&self) -> Hist {
        let mut out = self.cleared();
        out.content = self.content.as_deref().map(|c| Arc::new(c.clone()));
        out
    }

    /// Copy that shares content until its next fill.
    pub fn copy_on_fill(&self) -> Hist {
        let mut out = self.clone();
        out.copy_on_fill = true;
        out
    }

    /// Whether the next fill will first detach from shared content.
    pub fn is_copy_on_fill(&self) -> bool {
        self.copy_on_fill
    }

    /// Drop all content.
    pub fn clear(&mut self) {
        self.content = None;
        self.copy_on_fill = false;
        self.destinations.clear();
    }

    /// Same axes and weight, no content.
    pub fn cleared(&self) -> Hist {
        let mut out = self.clone();
        out.clear();
        out
    }

    /// Same axes, no content, new weight.
    pub fn with_weight(&self, weight: impl Into<WeightSpec>) -> Result<Hist> {
        Hist::new(HistConfig { weight: Some(weight.into()), ..self.config() })
    }

    // ── Algebra ─────────────────────────────────────────────────

    /// Whether `other` has the same axes and leaf shape.
    pub fn compatible(&self, other: &Hist) -> bool {
        self.group == other.group
            && self.fixed == other.fixed
            && self.profile == other.profile
            && self.shape == other.shape
    }

    pub(crate) fn check_compatible(&self, other: &Hist) -> Result<()> {
        if self.compatible(other) {
            Ok(())
        } else {
            Err(Error::AxisMismatch(format!("cannot combine {self} with {other}")))
        }
    }

    /// Sum of two compatible histograms over the union of their keys.
    pub fn try_add(&self, other: &Hist) -> Result<Hist> {
        self.check_compatible(other)?;
        let content = match (self.content(), other.content()) {
            (Some(a), Some(b)) => Some(a.merged(b)?),
            (Some(a), None) => Some(a.clone()),
            (None, Some(b)) => Some(b.clone()),
            (None, None) => None,
        };
        let mut out = self.cleared();
        out.content = content.map(Arc::new);
        Ok(out)
    }

    /// Add `other` into `self` in place. On error `self` is unchanged.
    pub fn merge(&mut self, other: &Hist) -> Result<()> {
        self.check_compatible(other)?;
        let Some(theirs) = other.content() else {
            return Ok(());
        };
        if let Some(ours) = self.content() {
            ours.check_mergeable(theirs)?;
        }
        self.content_mut().merge_from(theirs)
    }

    /// Copy with every accumulator multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Hist {
        let mut out = self.cleared();
        out.content = self.content().map(|c| Arc::new(c.scaled(factor)));
        out
    }

    /// Multiply every accumulator by `factor` in place.
    pub fn scale(&mut self, factor: f64) {
        if self.content.is_some() {
            self.content_mut().scale(factor);
        }
    }
}

impl Add for &Hist {
    type Output = Result<Hist>;

    fn add(self, rhs: &Hist) -> Result<Hist> {
        self.try_add(rhs)
    }
}

impl Mul<f64> for &Hist {
    type Output = Hist;

    fn mul(self, factor: f64) -> Hist {
        self.scaled(factor)
    }
}

impl Mul<&Hist> for f64 {
    type Output = Hist;

    fn mul(self, hist: &Hist) -> Hist {
        hist.scaled(self)
    }
}

impl MulAssign<f64> for Hist {
    fn mul_assign(&mut self, factor: f64) {
        self.scale(factor);
    }
}

impl fmt::Display for Hist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hist(")?;
        for (i, axis) in self.axes().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{axis}")?;
        }
        if let Some(w) = &self.weight {
            write!(f, ", weight={w}")?;
        }
        write!(f, ")")
    }
}
