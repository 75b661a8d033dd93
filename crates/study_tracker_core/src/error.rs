//! crates/study_tracker_core/src/error.rs
//!
//! Error type returned by the gamification façade.

use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum GamificationError {
    /// The caller passed arguments the operation cannot act on.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An error that propagated up from the data store port.
    #[error("Store error: {0}")]
    Port(#[from] PortError),
}

pub type GamificationResult<T> = Result<T, GamificationError>;
