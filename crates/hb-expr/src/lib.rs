//! # hb-expr
//!
//! Expression trees and the binning kernels they resolve to.
//!
//! An axis is described by an [`Expr`]: symbol references, literal
//! constants, and named calls into the kernel [`Library`]. Evaluating a call
//! tree against a table of event columns yields a [`Value`], which for the
//! binning kernels is a masked bin index per event or a set of category
//! keys with a per-event key index.
//!
//! ## Example
//!
//! ```
//! use hb_core::{Column, Symbols};
//! use hb_expr::{Expr, Value, calculate};
//!
//! let expr = Expr::call("bin___L", vec![
//!     Expr::parse("x * 2").unwrap(),
//!     Expr::number(4.0),
//!     Expr::number(0.0),
//!     Expr::number(8.0),
//! ]);
//! let mut symbols = Symbols::new();
//! symbols.insert("x".into(), Column::from(vec![0.5, 1.5, 9.0]));
//! let out = calculate(&expr, &symbols).unwrap();
//! assert_eq!(out, Value::Index(vec![Some(0), Some(1), None]));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod calc;
pub mod dest;
pub mod expr;
pub mod kernels;
pub mod parse;
pub mod value;

pub use calc::{apply, calculate};
pub use dest::Destinations;
pub use expr::{Expr, Literal};
pub use kernels::{FlowFlags, Kernel, Library};
pub use value::{Groups, Value};
