//! crates/study_tracker_core/src/gamification/points.rs
//!
//! The points ledger: lifetime point totals and their conversion into XP.

use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::retry::retry_on_conflict;
use crate::error::{GamificationError, GamificationResult};
use crate::ports::{Clock, GamificationStore, PortError};

/// XP granted for every tens boundary the point total crosses.
pub(crate) const XP_PER_TEN_POINTS: i64 = 20;

/// A committed change to a user's point total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PointsChange {
    pub previous: i64,
    pub total: i64,
}

impl PointsChange {
    pub(crate) fn xp_gained(&self) -> i64 {
        xp_for_points(self.previous, self.total)
    }
}

/// XP earned by moving from `previous` to `total` points. Only crossing a multiple
/// of ten counts, so 8 -> 9 earns nothing and 9 -> 10 earns a full conversion.
pub(crate) fn xp_for_points(previous: i64, total: i64) -> i64 {
    (total.div_euclid(10) - previous.div_euclid(10)).saturating_mul(XP_PER_TEN_POINTS)
}

/// The new point total, floored at zero. `None` when the sum does not fit.
pub(crate) fn apply_delta(previous: i64, delta: i64) -> Option<i64> {
    previous.checked_add(delta).map(|total| total.max(0))
}

pub(crate) struct PointsLedger {
    store: Arc<dyn GamificationStore>,
    clock: Arc<dyn Clock>,
    attempts: u32,
}

impl PointsLedger {
    pub(crate) fn new(
        store: Arc<dyn GamificationStore>,
        clock: Arc<dyn Clock>,
        attempts: u32,
    ) -> Self {
        Self {
            store,
            clock,
            attempts,
        }
    }

    pub(crate) async fn add(&self, user_id: Uuid, delta: i64) -> GamificationResult<PointsChange> {
        retry_on_conflict(self.attempts, || self.apply(user_id, delta)).await
    }

    async fn apply(&self, user_id: Uuid, delta: i64) -> GamificationResult<PointsChange> {
        let mut row = self.store.get_points(user_id).await?.ok_or_else(|| {
            PortError::NotFound(format!("Points for user {} not found", user_id))
        })?;

        let previous = row.points;
        row.points = apply_delta(previous, delta).ok_or_else(|| {
            GamificationError::InvalidInput(format!(
                "Adding {} points to {} is out of range.",
                delta, previous
            ))
        })?;
        row.last_updated_at = self.clock.now();
        self.store.update_points(&row).await?;

        debug!("Points for {}: {} -> {}", user_id, previous, row.points);
        Ok(PointsChange {
            previous,
            total: row.points,
        })
    }
}
