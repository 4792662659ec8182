//! Unified error handling for the stridetrack library.
//!
//! The reducers themselves never fail: malformed samples are dropped and
//! reported through their return values. Errors are raised only where a
//! caller hands us something that can't be worked with, such as an invalid
//! configuration or a coordinate outside the WGS84 range.

use thiserror::Error;

/// Unified error type for stridetrack operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackError {
    /// A coordinate pair is non-finite or out of range
    #[error("invalid coordinates ({latitude}, {longitude}): {message}")]
    InvalidCoordinates {
        latitude: f64,
        longitude: f64,
        message: String,
    },
    /// A configuration value is out of its allowed range
    #[error("configuration error: {field} {message}")]
    ConfigError { field: String, message: String },
    /// A run or shoe could not be found
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },
    /// Generic internal error
    #[error("internal error: {message}")]
    Internal { message: String },
}

/// Result type alias for stridetrack operations.
pub type Result<T> = std::result::Result<T, TrackError>;

/// Extension trait for converting Option to TrackError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a not-found error.
    fn ok_or_not_found(self, kind: &'static str, id: &str) -> Result<T>;

    /// Convert Option to Result with generic internal error.
    fn ok_or_internal(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, kind: &'static str, id: &str) -> Result<T> {
        self.ok_or_else(|| TrackError::NotFound {
            kind,
            id: id.to_string(),
        })
    }

    fn ok_or_internal(self, message: &str) -> Result<T> {
        self.ok_or_else(|| TrackError::Internal {
            message: message.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrackError::ConfigError {
            field: "cooldown_ms".to_string(),
            message: "must be greater than zero".to_string(),
        };
        assert!(err.to_string().contains("cooldown_ms"));
        assert!(err.to_string().contains("greater than zero"));

        let err = TrackError::NotFound {
            kind: "shoe",
            id: "s-1".to_string(),
        };
        assert_eq!(err.to_string(), "shoe 's-1' not found");
    }

    #[test]
    fn test_option_ext() {
        let none: Option<i32> = None;
        let result = none.ok_or_not_found("run", "r-1");
        assert!(matches!(result, Err(TrackError::NotFound { kind: "run", .. })));

        let some = Some(3).ok_or_internal("unreachable");
        assert_eq!(some, Ok(3));
    }
}
