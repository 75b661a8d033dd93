//! crates/study_tracker_core/src/gamification/retry.rs
//!
//! Optimistic-concurrency retry shared by the ledger, the level engine and the
//! streak tracker.

use std::future::Future;
use tracing::warn;

use crate::error::{GamificationError, GamificationResult};
use crate::ports::PortError;

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Runs `op` until it succeeds, fails with something other than
/// `PortError::Conflict`, or `attempts` runs are used up. Each run must redo its
/// own read-modify-write from scratch.
pub async fn retry_on_conflict<T, F, Fut>(attempts: u32, mut op: F) -> GamificationResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = GamificationResult<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Err(GamificationError::Port(PortError::Conflict(msg))) if attempt < attempts => {
                warn!("Write conflict on attempt {}/{}: {}", attempt, attempts, msg);
                attempt += 1;
            }
            other => return other,
        }
    }
}
