//! Axis specifications and their placement inside a histogram.

use std::collections::BTreeMap;
use std::fmt;

use hb_core::{Error, Result};
use hb_expr::kernels::{MAX_EXACT_INT, bin_name, intbin_name, partition_name, sparse_name};
use hb_expr::{Expr, FlowFlags, Library};
use serde::{Deserialize, Serialize};

fn yes() -> bool {
    true
}

/// One configured dimension of a histogram.
///
/// Group flavors produce data-dependent categories, fixed flavors produce a
/// bin index into a statically sized dimension, and `profile` accumulates a
/// dependent variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", deny_unknown_fields)]
pub enum AxisSpec {
    /// One category per distinct value.
    GroupBy {
        /// Source expression.
        expr: String,
    },
    /// One category per occupied bin of width `binwidth`.
    GroupBin {
        /// Source expression.
        expr: String,
        /// Bin width.
        binwidth: f64,
        /// Position of a bin edge.
        #[serde(default)]
        origin: f64,
        /// `[lo, hi)` bins when true, `(lo, hi]` when false.
        #[serde(default = "yes")]
        closedlow: bool,
    },
    /// `numbins` equal-width bins over `[low, high]`.
    Bin {
        /// Source expression.
        expr: String,
        /// Number of ordinary bins.
        numbins: usize,
        /// Low edge.
        low: f64,
        /// High edge.
        high: f64,
        /// Keep an underflow slot.
        #[serde(default = "yes")]
        underflow: bool,
        /// Keep an overflow slot.
        #[serde(default = "yes")]
        overflow: bool,
        /// Keep a NaN slot.
        #[serde(default = "yes")]
        nanflow: bool,
        /// `[lo, hi)` bins when true, `(lo, hi]` when false.
        #[serde(default = "yes")]
        closedlow: bool,
    },
    /// One bin per integer in `[min, max]`.
    IntBin {
        /// Source expression.
        expr: String,
        /// Smallest integer with its own bin.
        min: i64,
        /// Largest integer with its own bin.
        max: i64,
        /// Keep an underflow slot.
        #[serde(default = "yes")]
        underflow: bool,
        /// Keep an overflow slot.
        #[serde(default = "yes")]
        overflow: bool,
    },
    /// Bins between explicit ascending edges.
    Split {
        /// Source expression.
        expr: String,
        /// Bin edges.
        edges: Vec<f64>,
        /// Keep an underflow slot.
        #[serde(default = "yes")]
        underflow: bool,
        /// Keep an overflow slot.
        #[serde(default = "yes")]
        overflow: bool,
        /// Keep a NaN slot.
        #[serde(default = "yes")]
        nanflow: bool,
        /// `[lo, hi)` bins when true, `(lo, hi]` when false.
        #[serde(default = "yes")]
        closedlow: bool,
    },
    /// Two bins: predicate false, predicate true.
    Cut {
        /// Source expression.
        expr: String,
    },
    /// Dependent variable: weighted sum and sum of squares per cell.
    Profile {
        /// Source expression.
        expr: String,
    },
}

/// How an axis participates in the content layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisKind {
    /// Adds a level of keyed nesting.
    Group,
    /// Adds a dimension to every dense block.
    Fixed,
    /// Adds two accumulator slots to every cell.
    Profile,
}

impl AxisSpec {
    /// Distinct-value grouping.
    pub fn groupby(expr: impl Into<String>) -> Self {
        AxisSpec::GroupBy { expr: expr.into() }
    }

    /// Sparse binning with origin 0, closed low.
    pub fn groupbin(expr: impl Into<String>, binwidth: f64) -> Self {
        AxisSpec::GroupBin { expr: expr.into(), binwidth, origin: 0.0, closedlow: true }
    }

    /// Equal-width binning with every flow slot enabled, closed low.
    pub fn bin(expr: impl Into<String>, numbins: usize, low: f64, high: f64) -> Self {
        AxisSpec::Bin {
            expr: expr.into(),
            numbins,
            low,
            high,
            underflow: true,
            overflow: true,
            nanflow: true,
            closedlow: true,
        }
    }

    /// Integer binning with under- and overflow slots.
    pub fn intbin(expr: impl Into<String>, min: i64, max: i64) -> Self {
        AxisSpec::IntBin { expr: expr.into(), min, max, underflow: true, overflow: true }
    }

    /// Edge-list binning with every flow slot enabled, closed low.
    pub fn split(expr: impl Into<String>, edges: Vec<f64>) -> Self {
        AxisSpec::Split {
            expr: expr.into(),
            edges,
            underflow: true,
            overflow: true,
            nanflow: true,
            closedlow: true,
        }
    }

    /// Predicate axis.
    pub fn cut(expr: impl Into<String>) -> Self {
        AxisSpec::Cut { expr: expr.into() }
    }

    /// Profile axis.
    pub fn profile(expr: impl Into<String>) -> Self {
        AxisSpec::Profile { expr: expr.into() }
    }

    /// Set the underflow switch (no effect on flavors without one).
    pub fn underflow(mut self, on: bool) -> Self {
        if let AxisSpec::Bin { underflow, .. }
        | AxisSpec::IntBin { underflow, .. }
        | AxisSpec::Split { underflow, .. } = &mut self
        {
            *underflow = on;
        }
        self
    }

    /// Set the overflow switch (no effect on flavors without one).
    pub fn overflow(mut self, on: bool) -> Self {
        if let AxisSpec::Bin { overflow, .. }
        | AxisSpec::IntBin { overflow, .. }
        | AxisSpec::Split { overflow, .. } = &mut self
        {
            *overflow = on;
        }
        self
    }

    /// Set the NaN switch (no effect on flavors without one).
    pub fn nanflow(mut self, on: bool) -> Self {
        if let AxisSpec::Bin { nanflow, .. } | AxisSpec::Split { nanflow, .. } = &mut self {
            *nanflow = on;
        }
        self
    }

    /// Set bin closedness (no effect on flavors without it).
    pub fn closedlow(mut self, on: bool) -> Self {
        if let AxisSpec::GroupBin { closedlow, .. }
        | AxisSpec::Bin { closedlow, .. }
        | AxisSpec::Split { closedlow, .. } = &mut self
        {
            *closedlow = on;
        }
        self
    }

    /// Set the sparse-bin origin (no effect on other flavors).
    pub fn origin(mut self, at: f64) -> Self {
        if let AxisSpec::GroupBin { origin, .. } = &mut self {
            *origin = at;
        }
        self
    }

    /// Source expression.
    pub fn expr(&self) -> &str {
        match self {
            AxisSpec::GroupBy { expr }
            | AxisSpec::GroupBin { expr, .. }
            | AxisSpec::Bin { expr, .. }
            | AxisSpec::IntBin { expr, .. }
            | AxisSpec::Split { expr, .. }
            | AxisSpec::Cut { expr }
            | AxisSpec::Profile { expr } => expr,
        }
    }

    fn expr_mut(&mut self) -> &mut String {
        match self {
            AxisSpec::GroupBy { expr }
            | AxisSpec::GroupBin { expr, .. }
            | AxisSpec::Bin { expr, .. }
            | AxisSpec::IntBin { expr, .. }
            | AxisSpec::Split { expr, .. }
            | AxisSpec::Cut { expr }
            | AxisSpec::Profile { expr } => expr,
        }
    }

    /// Flavor name.
    pub fn flavor(&self) -> &'static str {
        match self {
            AxisSpec::GroupBy { .. } => "groupby",
            AxisSpec::GroupBin { .. } => "groupbin",
            AxisSpec::Bin { .. } => "bin",
            AxisSpec::IntBin { .. } => "intbin",
            AxisSpec::Split { .. } => "split",
            AxisSpec::Cut { .. } => "cut",
            AxisSpec::Profile { .. } => "profile",
        }
    }

    /// Layout role of this flavor.
    pub fn kind(&self) -> AxisKind {
        match self {
            AxisSpec::GroupBy { .. } | AxisSpec::GroupBin { .. } => AxisKind::Group,
            AxisSpec::Bin { .. }
            | AxisSpec::IntBin { .. }
            | AxisSpec::Split { .. }
            | AxisSpec::Cut { .. } => AxisKind::Fixed,
            AxisSpec::Profile { .. } => AxisKind::Profile,
        }
    }

    /// Total bin count of a fixed axis, flow slots included.
    pub fn totbins(&self) -> Option<usize> {
        match self {
            AxisSpec::Bin { numbins, underflow, overflow, nanflow, closedlow, .. } => {
                Some(numbins + FlowFlags::new(*underflow, *overflow, *nanflow, *closedlow).extra_bins())
            }
            AxisSpec::IntBin { min, max, underflow, overflow, .. } => {
                let span = usize::try_from(max.checked_sub(*min)?).ok()?;
                span.checked_add(1 + usize::from(*underflow) + usize::from(*overflow))
            }
            AxisSpec::Split { edges, underflow, overflow, nanflow, closedlow, .. } => {
                let intervals = edges.len().checked_sub(1)?;
                Some(intervals + FlowFlags::new(*underflow, *overflow, *nanflow, *closedlow).extra_bins())
            }
            AxisSpec::Cut { .. } => Some(2),
            _ => None,
        }
    }

    /// Check parameter consistency.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(Error::Config(format!("{self}: {msg}")));
        match self {
            AxisSpec::GroupBin { binwidth, origin, .. } => {
                if !(*binwidth > 0.0 && binwidth.is_finite()) {
                    return bad(format!("binwidth must be positive and finite, got {binwidth}"));
                }
                if !origin.is_finite() {
                    return bad(format!("origin must be finite, got {origin}"));
                }
            }
            AxisSpec::Bin { numbins, low, high, .. } => {
                if *numbins == 0 {
                    return bad("numbins must be at least 1".into());
                }
                if !(low.is_finite() && high.is_finite() && low < high) {
                    return bad(format!("need finite low < high, got [{low}, {high}]"));
                }
            }
            AxisSpec::IntBin { min, max, .. } => {
                if min > max {
                    return bad(format!("need min <= max, got [{min}, {max}]"));
                }
                if min.unsigned_abs() > MAX_EXACT_INT || max.unsigned_abs() > MAX_EXACT_INT {
                    return bad(format!("min and max must lie within ±{MAX_EXACT_INT}"));
                }
                if self.totbins().is_none() {
                    return bad(format!("range [{min}, {max}] has too many bins"));
                }
            }
            AxisSpec::Split { edges, .. } => {
                if edges.len() < 2 || edges.iter().any(|e| !e.is_finite()) {
                    return bad("need at least two finite edges".into());
                }
                if edges.windows(2).any(|w| w[0] >= w[1]) {
                    return bad("edges must be strictly ascending".into());
                }
            }
            AxisSpec::GroupBy { .. } | AxisSpec::Cut { .. } | AxisSpec::Profile { .. } => {}
        }
        Ok(())
    }

    /// Sub-expressions this axis needs evaluated, in slot order.
    pub fn goals(&self, parsed: &Expr) -> Vec<Expr> {
        let x = parsed.clone();
        match self {
            AxisSpec::GroupBy { .. } => vec![Expr::call("unique", vec![x])],
            AxisSpec::GroupBin { binwidth, origin, closedlow, .. } => vec![Expr::call(
                sparse_name(*closedlow),
                vec![x, Expr::number(*binwidth), Expr::number(*origin)],
            )],
            AxisSpec::Bin { numbins, low, high, underflow, overflow, nanflow, closedlow, .. } => {
                let flags = FlowFlags::new(*underflow, *overflow, *nanflow, *closedlow);
                vec![Expr::call(
                    bin_name(flags),
                    vec![x, Expr::number(*numbins as f64), Expr::number(*low), Expr::number(*high)],
                )]
            }
            AxisSpec::IntBin { min, max, underflow, overflow, .. } => vec![Expr::call(
                intbin_name(*underflow, *overflow),
                vec![x, Expr::number(*min as f64), Expr::number(*max as f64)],
            )],
            AxisSpec::Split { edges, underflow, overflow, nanflow, closedlow, .. } => {
                let flags = FlowFlags::new(*underflow, *overflow, *nanflow, *closedlow);
                vec![Expr::call(partition_name(flags), vec![x, Expr::sequence(edges)])]
            }
            AxisSpec::Cut { .. } => vec![Expr::call("cut", vec![x])],
            AxisSpec::Profile { .. } => {
                vec![x.clone(), Expr::call("multiply", vec![x.clone(), x])]
            }
        }
    }

    /// Whether two specs agree on everything but the source text.
    fn same_parameters(&self, other: &AxisSpec) -> bool {
        let mut a = self.clone();
        let mut b = other.clone();
        a.expr_mut().clear();
        b.expr_mut().clear();
        a == b
    }
}

impl fmt::Display for AxisSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?}", self.flavor(), self.expr())?;
        match self {
            AxisSpec::GroupBin { binwidth, origin, closedlow, .. } => {
                write!(f, ", {binwidth}")?;
                if *origin != 0.0 {
                    write!(f, ", origin={origin}")?;
                }
                flag(f, "closedlow", *closedlow, true)?;
            }
            AxisSpec::Bin { numbins, low, high, underflow, overflow, nanflow, closedlow, .. } => {
                write!(f, ", {numbins}, {low}, {high}")?;
                flag(f, "underflow", *underflow, true)?;
                flag(f, "overflow", *overflow, true)?;
                flag(f, "nanflow", *nanflow, true)?;
                flag(f, "closedlow", *closedlow, true)?;
            }
            AxisSpec::IntBin { min, max, underflow, overflow, .. } => {
                write!(f, ", {min}, {max}")?;
                flag(f, "underflow", *underflow, true)?;
                flag(f, "overflow", *overflow, true)?;
            }
            AxisSpec::Split { edges, underflow, overflow, nanflow, closedlow, .. } => {
                write!(f, ", {edges:?}")?;
                flag(f, "underflow", *underflow, true)?;
                flag(f, "overflow", *overflow, true)?;
                flag(f, "nanflow", *nanflow, true)?;
                flag(f, "closedlow", *closedlow, true)?;
            }
            AxisSpec::GroupBy { .. } | AxisSpec::Cut { .. } | AxisSpec::Profile { .. } => {}
        }
        write!(f, ")")
    }
}

fn flag(f: &mut fmt::Formatter<'_>, name: &str, on: bool, default: bool) -> fmt::Result {
    if on != default { write!(f, ", {name}={on}") } else { Ok(()) }
}

/// Where a bound axis reads its results and writes its accumulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisRole {
    /// Nesting level `depth` of the content tree.
    Group {
        /// Level, 0 being the outermost.
        depth: usize,
        /// Destination slot of the (keys, inverse) result.
        slot: usize,
    },
    /// Dimension `shape_index` of every dense block.
    Fixed {
        /// Position in the shape.
        shape_index: usize,
        /// Size of that dimension.
        totbins: usize,
        /// Destination slot of the index result.
        slot: usize,
    },
    /// Two trailing accumulators per cell.
    Profile {
        /// Trailing offset of the weighted sum.
        sumwx: usize,
        /// Trailing offset of the weighted sum of squares.
        sumwx2: usize,
        /// Destination slots of the value and squared-value results.
        slots: [usize; 2],
    },
}

/// An axis bound into a histogram: parsed, labelled and placed.
#[derive(Debug, Clone)]
pub struct Axis {
    spec: AxisSpec,
    parsed: Expr,
    label: String,
    role: AxisRole,
}

impl Axis {
    /// Parse `spec` against `defs` and check every call it makes exists.
    pub(crate) fn parse(spec: &AxisSpec, defs: &BTreeMap<String, String>) -> Result<Expr> {
        spec.validate()?;
        let parsed = Expr::parse_with_defs(spec.expr(), defs)?;
        for goal in spec.goals(&parsed) {
            Library::global().check(&goal)?;
        }
        Ok(parsed)
    }

    pub(crate) fn new(spec: AxisSpec, parsed: Expr, role: AxisRole) -> Self {
        let label = parsed.to_string();
        Self { spec, parsed, label, role }
    }

    /// Specification as configured.
    pub fn spec(&self) -> &AxisSpec {
        &self.spec
    }

    /// Parsed expression, definitions expanded.
    pub fn parsed(&self) -> &Expr {
        &self.parsed
    }

    /// Human-readable label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Placement inside the histogram.
    pub fn role(&self) -> AxisRole {
        self.role
    }

    /// Layout role.
    pub fn kind(&self) -> AxisKind {
        self.spec.kind()
    }
}

/// Axes are interchangeable when their flavor, parameters and parsed
/// expression agree; source spelling and placement do not matter.
impl PartialEq for Axis {
    fn eq(&self, other: &Self) -> bool {
        self.parsed == other.parsed && self.spec.same_parameters(&other.spec)
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.spec.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totbins_per_flavor() {
        assert_eq!(AxisSpec::bin("x", 10, 0.0, 1.0).totbins(), Some(13));
        assert_eq!(AxisSpec::bin("x", 10, 0.0, 1.0).nanflow(false).totbins(), Some(12));
        assert_eq!(
            AxisSpec::bin("x", 10, 0.0, 1.0).underflow(false).overflow(false).nanflow(false).totbins(),
            Some(10)
        );
        assert_eq!(AxisSpec::intbin("n", 0, 4).totbins(), Some(7));
        assert_eq!(AxisSpec::intbin("n", 0, 4).underflow(false).totbins(), Some(6));
        assert_eq!(AxisSpec::split("x", vec![0.0, 1.0, 5.0]).totbins(), Some(5));
        assert_eq!(AxisSpec::cut("x > 1").totbins(), Some(2));
        assert_eq!(AxisSpec::groupby("c").totbins(), None);
        assert_eq!(AxisSpec::profile("y").totbins(), None);
    }

    #[test]
    fn kinds() {
        assert_eq!(AxisSpec::groupbin("x", 0.5).kind(), AxisKind::Group);
        assert_eq!(AxisSpec::cut("x > 1").kind(), AxisKind::Fixed);
        assert_eq!(AxisSpec::profile("y").kind(), AxisKind::Profile);
    }

    #[test]
    fn validation() {
        assert!(AxisSpec::bin("x", 0, 0.0, 1.0).validate().is_err());
        assert!(AxisSpec::bin("x", 3, 1.0, 1.0).validate().is_err());
        assert!(AxisSpec::intbin("n", 3, 2).validate().is_err());
        assert!(AxisSpec::intbin("n", i64::MIN, 0).validate().is_err());
        assert!(AxisSpec::intbin("n", 0, i64::MAX).validate().is_err());
        assert!(AxisSpec::intbin("n", -(1 << 53) - 1, 0).validate().is_err());
        assert!(AxisSpec::split("x", vec![0.0]).validate().is_err());
        assert!(AxisSpec::split("x", vec![0.0, 2.0, 1.0]).validate().is_err());
        assert!(AxisSpec::groupbin("x", 0.0).validate().is_err());
        assert!(AxisSpec::bin("x", 3, 0.0, 1.0).validate().is_ok());
    }

    #[test]
    fn goals_name_flagged_kernels() {
        let x = Expr::name("x");
        let goals = AxisSpec::bin("x", 10, 0.0, 10.0).overflow(false).closedlow(false).goals(&x);
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].to_string(), "binU_NH(x, 10, 0, 10)");

        let goals = AxisSpec::profile("x").goals(&x);
        assert_eq!(goals, vec![x.clone(), Expr::parse("x * x").unwrap()]);
    }

    #[test]
    fn display_shows_non_default_flags() {
        assert_eq!(AxisSpec::bin("x", 10, 0.0, 10.0).to_string(), "bin(\"x\", 10, 0, 10)");
        assert_eq!(
            AxisSpec::intbin("n", 0, 3).overflow(false).to_string(),
            "intbin(\"n\", 0, 3, overflow=false)"
        );
    }

    #[test]
    fn axis_equality_ignores_spelling() {
        let defs = BTreeMap::new();
        let a = AxisSpec::bin("x+1", 4, 0.0, 1.0);
        let b = AxisSpec::bin("x + 1", 4, 0.0, 1.0);
        let role = AxisRole::Fixed { shape_index: 0, totbins: 7, slot: 0 };
        let pa = Axis::parse(&a, &defs).unwrap();
        let pb = Axis::parse(&b, &defs).unwrap();
        assert_eq!(Axis::new(a, pa.clone(), role), Axis::new(b, pb, role));
        let c = AxisSpec::bin("x+1", 5, 0.0, 1.0);
        let pc = Axis::parse(&c, &defs).unwrap();
        assert_ne!(Axis::new(c, pc, role), Axis::new(AxisSpec::bin("x+1", 4, 0.0, 1.0), pa, role));
    }

    #[test]
    fn json_round_trip_with_defaults() {
        let spec: AxisSpec =
            serde_json::from_str(r#"{"type": "bin", "expr": "x", "numbins": 4, "low": 0, "high": 2}"#)
                .unwrap();
        assert_eq!(spec, AxisSpec::bin("x", 4, 0.0, 2.0));
        let bad = serde_json::from_str::<AxisSpec>(r#"{"type": "cut", "expr": "x", "bogus": 1}"#);
        assert!(bad.is_err());
    }
}
