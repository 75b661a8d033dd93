//! crates/study_tracker_core/src/gamification/levels.rs
//!
//! The XP/level engine. XP accumulates inside the current level and rolls over
//! into as many level-ups as it pays for.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::profile::ProfileInitializer;
use super::retry::retry_on_conflict;
use crate::domain::{UserLevel, LEVEL_XP_INCREMENT};
use crate::error::{GamificationError, GamificationResult};
use crate::ports::{Clock, GamificationStore, PortError, PortResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LevelChange {
    pub level: i32,
    pub experience_points: i64,
    pub next_level_xp: i64,
    pub leveled_up: bool,
}

/// Adds `delta` XP to a level state and performs every level-up it pays for.
/// Afterwards `experience_points < next_level_xp` always holds. XP never drops
/// below zero and levels are never lost. `None` when the result does not fit.
pub(crate) fn roll_over(
    level: i32,
    experience_points: i64,
    next_level_xp: i64,
    delta: i64,
) -> Option<LevelChange> {
    if next_level_xp <= 0 {
        return None;
    }
    let xp = experience_points.checked_add(delta)?.max(0);
    let gained = levels_paid(xp, next_level_xp);
    let remainder = i128::from(xp) - cost_of_levels(next_level_xp, gained);
    let next = i128::from(next_level_xp) + i128::from(LEVEL_XP_INCREMENT) * gained;

    Some(LevelChange {
        level: level.checked_add(i32::try_from(gained).ok()?)?,
        experience_points: i64::try_from(remainder).ok()?,
        next_level_xp: i64::try_from(next).ok()?,
        leveled_up: gained > 0,
    })
}

/// XP needed for `levels` consecutive level-ups starting at a level that costs `next`.
fn cost_of_levels(next: i64, levels: i128) -> i128 {
    levels * i128::from(next) + i128::from(LEVEL_XP_INCREMENT) * levels * (levels - 1) / 2
}

/// The largest number of consecutive level-ups `xp` pays for.
fn levels_paid(xp: i64, next: i64) -> i128 {
    let step = LEVEL_XP_INCREMENT as f64;
    let b = next as f64 - step / 2.0;
    let estimate = (-b + (b * b + 2.0 * step * xp as f64).sqrt()) / step;
    let mut levels = estimate.floor().max(0.0) as i128;
    // The float estimate can be off by a little at the extremes.
    while levels > 0 && cost_of_levels(next, levels) > i128::from(xp) {
        levels -= 1;
    }
    while cost_of_levels(next, levels + 1) <= i128::from(xp) {
        levels += 1;
    }
    levels
}

pub(crate) struct LevelEngine {
    store: Arc<dyn GamificationStore>,
    clock: Arc<dyn Clock>,
    profile: Arc<ProfileInitializer>,
    attempts: u32,
}

impl LevelEngine {
    pub(crate) fn new(
        store: Arc<dyn GamificationStore>,
        clock: Arc<dyn Clock>,
        profile: Arc<ProfileInitializer>,
        attempts: u32,
    ) -> Self {
        Self {
            store,
            clock,
            profile,
            attempts,
        }
    }

    pub(crate) async fn add(&self, user_id: Uuid, delta: i64) -> GamificationResult<LevelChange> {
        retry_on_conflict(self.attempts, || self.apply(user_id, delta)).await
    }

    async fn apply(&self, user_id: Uuid, delta: i64) -> GamificationResult<LevelChange> {
        let mut row = self.fetch(user_id).await?;
        let change = roll_over(row.level, row.experience_points, row.next_level_xp, delta)
            .ok_or_else(|| {
                GamificationError::InvalidInput(format!(
                    "Adding {} XP at level {} is out of range.",
                    delta, row.level
                ))
            })?;

        row.level = change.level;
        row.experience_points = change.experience_points;
        row.next_level_xp = change.next_level_xp;
        row.updated_at = self.clock.now();
        self.store.update_level(&row).await?;

        if change.leveled_up {
            info!("User {} reached level {}", user_id, change.level);
        }
        Ok(change)
    }

    /// Reads the level row, re-running profile creation once if it is missing
    /// (the row can still be in flight from a concurrent first touch).
    async fn fetch(&self, user_id: Uuid) -> PortResult<UserLevel> {
        if let Some(row) = self.store.get_level(user_id).await? {
            return Ok(row);
        }
        warn!("No level row for {}; ensuring profile and retrying", user_id);
        self.profile.ensure_exists(user_id).await;
        self.store.get_level(user_id).await?.ok_or_else(|| {
            PortError::NotFound(format!(
                "Level data for user {} could not be initialized",
                user_id
            ))
        })
    }
}
