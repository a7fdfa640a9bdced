//! Crate-wide error type.
//!
//! Variants follow the failure classes the engine distinguishes:
//!
//! - `Config`: a missing executable or data file; aborts the request
//! - `Geometry`: a degenerate zone/fault polygon; the zone is skipped
//! - `Protocol`: malformed solver output or a failed invocation
//! - `NumericDomain`: an estimator input outside its formula's domain
//!
//! Every variant maps to a process exit code for the `zrates` binary.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Where in the activity exchange a protocol error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Encode,
    Invoke,
    Parse,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Encode => "encode",
            Stage::Invoke => "invoke",
            Stage::Parse => "parse",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("zone {zone}: invalid geometry: {message}")]
    Geometry { zone: String, message: String },

    #[error("activity protocol error ({stage}){}: {message}", zone_suffix(.zone))]
    Protocol {
        stage: Stage,
        zone: Option<String>,
        message: String,
    },

    #[error("{estimator} unavailable{}: {message}", zone_suffix(.zone))]
    NumericDomain {
        estimator: &'static str,
        zone: Option<String>,
        message: String,
    },

    #[error("internal consistency error: {message}")]
    Internal { message: String },

    #[error("{message}")]
    Input { message: String },

    #[error("I/O error at '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn zone_suffix(zone: &Option<String>) -> String {
    match zone {
        Some(id) => format!(" for zone {id}"),
        None => String::new(),
    }
}

impl AppError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn geometry(zone: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Geometry {
            zone: zone.into(),
            message: message.into(),
        }
    }

    pub fn protocol(stage: Stage, message: impl Into<String>) -> Self {
        Self::Protocol {
            stage,
            zone: None,
            message: message.into(),
        }
    }

    pub fn numeric(estimator: &'static str, message: impl Into<String>) -> Self {
        Self::NumericDomain {
            estimator,
            zone: None,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach a zone identifier to errors that carry one.
    pub fn with_zone(self, id: &str) -> Self {
        match self {
            Self::Protocol { stage, message, .. } => Self::Protocol {
                stage,
                zone: Some(id.to_string()),
                message,
            },
            Self::NumericDomain {
                estimator, message, ..
            } => Self::NumericDomain {
                estimator,
                zone: Some(id.to_string()),
                message,
            },
            other => other,
        }
    }

    /// Whether this error must abort the whole batch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config { .. } | Self::Input { .. } | Self::Io { .. } => 2,
            Self::Geometry { .. } => 3,
            Self::Protocol { .. } | Self::NumericDomain { .. } | Self::Internal { .. } => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_context_is_rendered() {
        let err = AppError::numeric("fromActivity", "b equals 1.5").with_zone("0007");
        assert_eq!(
            err.to_string(),
            "fromActivity unavailable for zone 0007: b equals 1.5"
        );
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn only_configuration_errors_are_fatal() {
        assert!(AppError::config("solver missing").is_fatal());
        assert!(!AppError::protocol(Stage::Parse, "bad float").is_fatal());
        assert!(!AppError::geometry("z1", "2 vertices").is_fatal());
    }

    #[test]
    fn protocol_error_names_stage() {
        let err = AppError::protocol(Stage::Invoke, "timed out");
        assert_eq!(err.to_string(), "activity protocol error (invoke): timed out");
    }
}
