//! Error types for crossroads-admission.

use thiserror::Error;

/// A policy option name did not match any known value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {option} {value:?}")]
pub struct ParseOptionError {
    pub option: &'static str,
    pub value: String,
}

impl ParseOptionError {
    pub fn new(option: &'static str, value: impl Into<String>) -> Self {
        Self {
            option,
            value: value.into(),
        }
    }
}
