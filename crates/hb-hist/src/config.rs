//! Construction options for a [`Hist`](crate::Hist).

use std::collections::BTreeMap;
use std::fmt;

use hb_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::axis::AxisSpec;

/// Per-event weight: a constant or an expression over the event columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WeightSpec {
    /// Same weight for every event.
    Number(f64),
    /// Expression source (e.g. `"w_mc * w_sf"`).
    Expr(String),
}

impl From<f64> for WeightSpec {
    fn from(v: f64) -> Self {
        WeightSpec::Number(v)
    }
}

impl From<&str> for WeightSpec {
    fn from(v: &str) -> Self {
        WeightSpec::Expr(v.to_string())
    }
}

impl From<String> for WeightSpec {
    fn from(v: String) -> Self {
        WeightSpec::Expr(v)
    }
}

impl fmt::Display for WeightSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WeightSpec::Number(v) => write!(f, "{v}"),
            WeightSpec::Expr(s) => write!(f, "{s:?}"),
        }
    }
}

/// Everything needed to build a histogram: axes, optional weight, and
/// named sub-expression definitions substituted into axis expressions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistConfig {
    /// Axes in declaration order.
    pub axes: Vec<AxisSpec>,
    /// Event weight; unit weight when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<WeightSpec>,
    /// Named sub-expressions.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub defs: BTreeMap<String, String>,
}

impl HistConfig {
    /// Empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an axis.
    pub fn axis(mut self, axis: AxisSpec) -> Self {
        self.axes.push(axis);
        self
    }

    /// Set the event weight.
    pub fn weight(mut self, weight: impl Into<WeightSpec>) -> Self {
        self.weight = Some(weight.into());
        self
    }

    /// Add a named definition.
    pub fn def(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.defs.insert(name.into(), source.into());
        self
    }

    /// Parse a JSON configuration. Unknown keys are rejected.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }
}
