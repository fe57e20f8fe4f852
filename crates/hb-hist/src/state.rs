//! Serializable snapshot of a histogram.

use std::collections::BTreeMap;
use std::sync::Arc;

use hb_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::axis::AxisSpec;
use crate::config::{HistConfig, WeightSpec};
use crate::content::Content;
use crate::hist::Hist;

/// Axes in layout order, weight, definitions and content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistState {
    /// Group axes, then fixed axes, then profile axes.
    pub axes: Vec<AxisSpec>,
    /// Event weight.
    #[serde(default)]
    pub weight: Option<WeightSpec>,
    /// Named definitions; `None` when there are none.
    #[serde(default)]
    pub defs: Option<BTreeMap<String, String>>,
    /// Content tree; `None` before the first fill.
    #[serde(default)]
    pub content: Option<Content>,
}

impl Hist {
    /// Snapshot everything needed to rebuild this histogram.
    pub fn state(&self) -> HistState {
        let HistConfig { axes, weight, defs } = self.config();
        HistState {
            axes,
            weight,
            defs: (!defs.is_empty()).then_some(defs),
            content: self.content().cloned(),
        }
    }

    /// Rebuild from a snapshot, checking the content fits the axes.
    pub fn from_state(state: HistState) -> Result<Hist> {
        let HistState { axes, weight, defs, content } = state;
        let mut hist = Hist::new(HistConfig { axes, weight, defs: defs.unwrap_or_default() })?;
        if let Some(content) = content {
            content
                .validate(hist.group.len(), &hist.shape)
                .map_err(|e| Error::Config(format!("restored content does not fit {hist}: {e}")))?;
            hist.content = Some(Arc::new(content));
        }
        Ok(hist)
    }

    /// Serialize the snapshot as JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.state())?)
    }

    /// Rebuild from a JSON snapshot.
    pub fn from_state_json(json: &str) -> Result<Hist> {
        Hist::from_state(serde_json::from_str(json)?)
    }
}
