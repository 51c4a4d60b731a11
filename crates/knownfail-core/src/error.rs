//! Error types for configuration and rule-table handling.
//!
//! Rule evaluation and registry normalization never fail. These errors only
//! surface when parsing caller-supplied configuration (versions, families,
//! signal overrides), loading custom rule tables, or probing an interpreter.

use thiserror::Error;

/// Errors produced by knownfail configuration and rule loading.
#[derive(Error, Debug)]
pub enum KnownFailError {
    #[error("invalid language version: {0:?}")]
    InvalidVersion(String),

    #[error("unknown interpreter family: {0:?}")]
    UnknownFamily(String),

    #[error("invalid pointer width: {0:?} (expected 32 or 64)")]
    InvalidPointerWidth(String),

    #[error("unknown signal: {0:?}")]
    UnknownSignal(String),

    #[error("invalid value for signal {signal}: {value:?}")]
    InvalidSignalValue { signal: String, value: String },

    #[error("invalid rule {label:?}: {reason}")]
    InvalidRule { label: String, reason: String },

    #[error("interpreter probe failed: {0}")]
    Probe(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for knownfail operations.
pub type Result<T> = std::result::Result<T, KnownFailError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_rule_display() {
        let err = KnownFailError::InvalidRule {
            label: "win32".to_string(),
            reason: "empty platform".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("win32"));
        assert!(msg.contains("empty platform"));
    }

    #[test]
    fn test_pointer_width_display() {
        let err = KnownFailError::InvalidPointerWidth("16".to_string());
        assert!(err.to_string().contains("16"));
    }

    #[test]
    fn test_serialization_from() {
        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: KnownFailError = json_err.into();
        assert!(err.to_string().starts_with("serialization error"));
    }
}
