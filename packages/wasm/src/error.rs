//! Error types for the host boundary.
//!
//! Malformed graph data is never an error (it is sanitized, see
//! [`crate::graph::GraphSnapshot::sanitize`]). Only configuration and
//! payload decoding can fail.

use thiserror::Error;
use wasm_bindgen::JsValue;

/// Invalid engine configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("`{field}` must be a positive finite number, got {value}")]
    NonPositive { field: &'static str, value: f32 },

    #[error("LOD thresholds must satisfy 0 < macro ({macro_below}) < meso ({meso_below})")]
    LodThresholds { macro_below: f32, meso_below: f32 },

    #[error("scale range is empty: min {min} > max {max}")]
    ScaleRange { min: f32, max: f32 },

    #[error("group color palette must not be empty")]
    EmptyPalette,
}

/// Errors surfaced to the JavaScript host.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("could not decode {what}: {message}")]
    Payload { what: &'static str, message: String },

    #[error("could not encode {what}: {message}")]
    Encode { what: &'static str, message: String },
}

impl EngineError {
    pub fn payload(what: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Payload {
            what,
            message: err.to_string(),
        }
    }

    pub fn encode(what: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Encode {
            what,
            message: err.to_string(),
        }
    }
}

impl From<EngineError> for JsValue {
    fn from(err: EngineError) -> Self {
        js_sys::Error::new(&err.to_string()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ConfigError::NonPositive {
            field: "grid_unit",
            value: 0.0,
        };
        assert_eq!(
            err.to_string(),
            "`grid_unit` must be a positive finite number, got 0"
        );

        let wrapped: EngineError = err.into();
        assert!(wrapped.to_string().starts_with("invalid configuration:"));

        let payload = EngineError::payload("snapshot", "missing field `nodes`");
        assert_eq!(
            payload.to_string(),
            "could not decode snapshot: missing field `nodes`"
        );
    }
}
