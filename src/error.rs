//! Error types for the simulation and analysis core.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BrownianError {
    #[error("Invalid parameter {name} = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, BrownianError>;
