//! crates/study_tracker_core/src/gamification/profile.rs
//!
//! Makes sure a user owns the baseline level, points and streak rows before any
//! other service reads or writes them.

use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::domain::{UserLevel, UserPoints, UserStreak};
use crate::ports::{Clock, GamificationStore, PortError, PortResult};

pub(crate) struct ProfileInitializer {
    store: Arc<dyn GamificationStore>,
    clock: Arc<dyn Clock>,
}

impl ProfileInitializer {
    pub(crate) fn new(store: Arc<dyn GamificationStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Creates whichever of the three rows is missing and back-fills NULL optional
    /// streak columns. Never fails: each entity is attempted independently and the
    /// return value says whether all three are known to be present.
    pub(crate) async fn ensure_exists(&self, user_id: Uuid) -> bool {
        let level_ok = self.ensure_level(user_id).await;
        let points_ok = self.ensure_points(user_id).await;
        let streak_ok = self.ensure_streak(user_id).await;
        level_ok && points_ok && streak_ok
    }

    async fn ensure_level(&self, user_id: Uuid) -> bool {
        match self.store.get_level(user_id).await {
            Ok(Some(_)) => true,
            Ok(None) => {
                let row = UserLevel::initial(user_id, self.clock.now());
                report_insert("user level", user_id, self.store.insert_level(&row).await)
            }
            Err(e) => {
                error!("Error fetching user level for {}: {}", user_id, e);
                false
            }
        }
    }

    async fn ensure_points(&self, user_id: Uuid) -> bool {
        match self.store.get_points(user_id).await {
            Ok(Some(_)) => true,
            Ok(None) => {
                let row = UserPoints::initial(user_id, self.clock.now());
                report_insert("user points", user_id, self.store.insert_points(&row).await)
            }
            Err(e) => {
                error!("Error fetching user points for {}: {}", user_id, e);
                false
            }
        }
    }

    async fn ensure_streak(&self, user_id: Uuid) -> bool {
        match self.store.find_streak_gaps(user_id).await {
            Ok(None) => {
                let row = UserStreak::initial(user_id, self.clock.now());
                report_insert("user streak", user_id, self.store.insert_streak(&row).await)
            }
            Ok(Some(gaps)) if gaps.is_empty() => true,
            Ok(Some(gaps)) => {
                // A failed back-fill leaves the row usable; reads coalesce NULLs to zero.
                if let Err(e) = self.store.backfill_streak(user_id, gaps).await {
                    error!("Error back-filling streak fields for {}: {}", user_id, e);
                } else {
                    debug!("Back-filled streak fields {:?} for {}", gaps, user_id);
                }
                true
            }
            Err(e) => {
                error!("Error fetching user streak for {}: {}", user_id, e);
                false
            }
        }
    }

    /// Zeroes points, level and streak. Earned badges are kept.
    pub(crate) async fn reset_stats(&self, user_id: Uuid) -> PortResult<()> {
        self.store.reset_stats(user_id, self.clock.now()).await?;
        info!(
            "Gamification stats (points, level, XP, streaks) reset for user {}",
            user_id
        );
        Ok(())
    }
}

fn report_insert(entity: &str, user_id: Uuid, result: PortResult<()>) -> bool {
    match result {
        Ok(()) => {
            debug!("Created initial {} for {}", entity, user_id);
            true
        }
        // Someone else created the row between our read and our insert.
        Err(PortError::Conflict(_)) => true,
        Err(e) => {
            error!("Error creating initial {} for {}: {}", entity, user_id, e);
            false
        }
    }
}
