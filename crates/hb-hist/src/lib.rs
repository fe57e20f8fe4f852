//! # hb-hist
//!
//! Multi-dimensional histograms filled from columnar event data.
//!
//! A [`Hist`] is declared with a list of [`AxisSpec`]s and an optional
//! weight. Group axis categories are discovered while filling and nest the
//! [`Content`]; fixed axes give every leaf block a static shape; profile
//! axes and the weight add trailing accumulators. Histograms with the same
//! axes add, scale, and combine under new categories.
//!
//! ## Example
//!
//! ```
//! use hb_core::{Column, Symbols};
//! use hb_hist::{AxisSpec, Hist, HistConfig};
//! use ndarray::IxDyn;
//!
//! let config = HistConfig::new()
//!     .axis(AxisSpec::groupby("channel"))
//!     .axis(AxisSpec::bin("pt", 2, 0.0, 100.0))
//!     .weight("w");
//! let mut h = Hist::new(config).unwrap();
//!
//! let mut events = Symbols::new();
//! events.insert("channel".into(), Column::from(vec!["ee", "mm", "ee"]));
//! events.insert("pt".into(), Column::from(vec![10.0, 60.0, 20.0]));
//! events.insert("w".into(), Column::from(vec![1.0, 0.5, 2.0]));
//! h.fill(&events).unwrap();
//!
//! let ee = h.content_at(&["ee".into()]).unwrap().leaf().unwrap();
//! // [underflow, 0-50, 50-100, overflow, nan] x [sumw, sumw2]
//! assert_eq!(ee.shape(), &[5, 2]);
//! assert_eq!(ee[IxDyn(&[1, 0])], 3.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod axis;
pub mod config;
pub mod content;
mod fill;
mod group;
pub mod hist;
pub mod state;

pub use axis::{Axis, AxisKind, AxisRole, AxisSpec};
pub use config::{HistConfig, WeightSpec};
pub use content::Content;
pub use hist::Hist;
pub use state::HistState;
