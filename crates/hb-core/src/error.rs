//! Error types for histbook

use thiserror::Error;

/// histbook error type
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed construction options or fill input
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operands whose ordered axis specifications differ
    #[error("Axis mismatch: {0}")]
    AxisMismatch(String),

    /// Operand of the wrong kind
    #[error("Type error: {0}")]
    Type(String),

    /// Call name absent from the kernel library
    #[error("Unimplemented operation: {0}")]
    Unresolved(String),

    /// Symbol absent from the supplied table
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    /// Expression source text could not be parsed
    #[error("Expression error: {0}")]
    Expression(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes() {
        let e = Error::Unresolved("frobnicate".into());
        assert_eq!(e.to_string(), "Unimplemented operation: frobnicate");
        let e = Error::UnknownSymbol("pt".into());
        assert!(e.to_string().contains("pt"));
    }

    #[test]
    fn json_error_converts() {
        let err: Error = serde_json::from_str::<Vec<f64>>("[1,").unwrap_err().into();
        assert!(matches!(err, Error::Json(_)));
    }
}
