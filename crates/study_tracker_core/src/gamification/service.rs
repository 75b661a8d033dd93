//! crates/study_tracker_core/src/gamification/service.rs
//!
//! The gamification façade: the single entry point feature code calls. It wires the
//! ledger, level engine, streak tracker and badge evaluator together and runs the
//! badge check exactly once after each mutating call has committed.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use super::badges::{BadgeEvaluator, BadgeRules};
use super::levels::LevelEngine;
use super::points::{PointsChange, PointsLedger};
use super::profile::ProfileInitializer;
use super::retry::DEFAULT_RETRY_ATTEMPTS;
use super::streak::StreakTracker;
use crate::domain::{
    BadgeEvent, BadgeStatus, GamificationSummary, LevelOutcome, PointsOutcome, StreakOutcome,
    UserBadge,
};
use crate::error::{GamificationError, GamificationResult};
use crate::ports::{Clock, GamificationStore, PortError};

/// Stateless gamification service. Create one per process and share it; cloning is cheap.
#[derive(Clone)]
pub struct GamificationService {
    store: Arc<dyn GamificationStore>,
    profile: Arc<ProfileInitializer>,
    points: Arc<PointsLedger>,
    levels: Arc<LevelEngine>,
    streaks: Arc<StreakTracker>,
    badges: Arc<BadgeEvaluator>,
}

impl GamificationService {
    /// Creates a service with the default retry budget and badge rules.
    pub fn new(store: Arc<dyn GamificationStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_options(store, clock, DEFAULT_RETRY_ATTEMPTS, BadgeRules::default())
    }

    pub fn with_options(
        store: Arc<dyn GamificationStore>,
        clock: Arc<dyn Clock>,
        retry_attempts: u32,
        rules: BadgeRules,
    ) -> Self {
        let profile = Arc::new(ProfileInitializer::new(store.clone(), clock.clone()));
        Self {
            points: Arc::new(PointsLedger::new(store.clone(), clock.clone(), retry_attempts)),
            levels: Arc::new(LevelEngine::new(
                store.clone(),
                clock.clone(),
                profile.clone(),
                retry_attempts,
            )),
            streaks: Arc::new(StreakTracker::new(store.clone(), clock.clone(), retry_attempts)),
            badges: Arc::new(BadgeEvaluator::new(store.clone(), clock, rules)),
            profile,
            store,
        }
    }

    //=====================================================================================
    // Profile
    //=====================================================================================

    /// Guarantees the level, points and streak rows exist. Returns whether all three
    /// are confirmed; failures are logged, never raised.
    pub async fn ensure_user_profile_exists(&self, user_id: Uuid) -> bool {
        if user_id.is_nil() {
            error!("ensure_user_profile_exists called with a nil user id");
            return false;
        }
        self.profile.ensure_exists(user_id).await
    }

    /// Zeroes points, level and streak atomically. Earned badges stay.
    pub async fn reset_user_gamification_stats(&self, user_id: Uuid) -> GamificationResult<()> {
        require_user(user_id)?;
        self.profile.reset_stats(user_id).await.map_err(|e| {
            error!("Error resetting gamification stats for {}: {}", user_id, e);
            GamificationError::from(e)
        })
    }

    //=====================================================================================
    // Points, XP and streaks
    //=====================================================================================

    /// Adds `delta` points, converts crossed tens into XP and checks badges.
    pub async fn add_points(
        &self,
        user_id: Uuid,
        delta: i64,
        reason: &str,
    ) -> GamificationResult<PointsOutcome> {
        require_user(user_id)?;
        if delta == 0 {
            return Err(GamificationError::InvalidInput(
                "Invalid parameters for adding points.".to_string(),
            ));
        }
        self.profile.ensure_exists(user_id).await;

        let change = self.points.add(user_id, delta).await.map_err(|e| {
            error!("Error updating points for {}: {}", user_id, e);
            GamificationError::from(e)
        })?;
        let xp_gained = self.convert_points(user_id, change, delta, reason).await;

        let awarded_badges = self
            .award_badges(
                user_id,
                &BadgeEvent::PointsAdded {
                    delta,
                    reason: reason.to_string(),
                },
            )
            .await;

        Ok(PointsOutcome {
            points: change.total,
            xp_gained,
            awarded_badges,
        })
    }

    /// Adds `delta` XP, rolling over into level-ups, and checks badges.
    pub async fn add_xp(
        &self,
        user_id: Uuid,
        delta: i64,
        reason: &str,
    ) -> GamificationResult<LevelOutcome> {
        require_user(user_id)?;
        if delta == 0 {
            return Err(GamificationError::InvalidInput(
                "Invalid parameters for adding XP.".to_string(),
            ));
        }
        self.profile.ensure_exists(user_id).await;

        let change = self.levels.add(user_id, delta).await.map_err(|e| {
            error!("Error updating XP and level for {}: {}", user_id, e);
            GamificationError::from(e)
        })?;

        let awarded_badges = self
            .award_badges(
                user_id,
                &BadgeEvent::XpAdded {
                    delta,
                    level: change.level,
                    reason: reason.to_string(),
                },
            )
            .await;

        Ok(LevelOutcome {
            level: change.level,
            xp: change.experience_points,
            next_level_xp: change.next_level_xp,
            leveled_up: change.leveled_up,
            awarded_badges,
        })
    }

    /// Records a study day (or the lack of one) and pays milestone bonuses.
    pub async fn update_streak(
        &self,
        user_id: Uuid,
        studied_today: bool,
        study_duration_minutes: u32,
    ) -> GamificationResult<StreakOutcome> {
        require_user(user_id)?;
        self.profile.ensure_exists(user_id).await;

        let change = self
            .streaks
            .update(user_id, studied_today, study_duration_minutes)
            .await
            .map_err(|e| {
                error!("Error updating streak for {}: {}", user_id, e);
                GamificationError::from(e)
            })?;

        let mut bonus_points = 0;
        if change.bonus_points > 0 {
            let reason = format!("Streak de {} dias", change.streak.current_streak);
            match self.points.add(user_id, change.bonus_points).await {
                Ok(points) => {
                    bonus_points = change.bonus_points;
                    self.convert_points(user_id, points, change.bonus_points, &reason)
                        .await;
                }
                Err(e) => error!("Error paying streak bonus to {}: {}", user_id, e),
            }
        }

        let awarded_badges = self
            .award_badges(
                user_id,
                &BadgeEvent::StreakUpdated {
                    current_streak: change.streak.current_streak,
                },
            )
            .await;

        Ok(StreakOutcome {
            current_streak: change.streak.current_streak,
            longest_streak: change.streak.longest_streak,
            longest_study_hours_streak: change.streak.longest_study_hours_streak,
            bonus_points,
            awarded_badges,
        })
    }

    //=====================================================================================
    // Badges and events
    //=====================================================================================

    /// Best-effort badge check. Returns only the badges this call wrote, so a badge
    /// a concurrent check landed first is not reported twice. Any failure is logged
    /// and yields an empty list.
    pub async fn check_and_award_badges(&self, user_id: Uuid, event: BadgeEvent) -> Vec<UserBadge> {
        if user_id.is_nil() {
            return Vec::new();
        }
        self.profile.ensure_exists(user_id).await;
        self.award_badges(user_id, &event).await
    }

    /// Logs an arbitrary feature event and lets it trigger a badge check.
    pub async fn record_generic_event(
        &self,
        user_id: Uuid,
        event_name: &str,
        value: serde_json::Value,
        reason: &str,
    ) -> Vec<UserBadge> {
        info!(
            "Event recorded for user {}: {}, value: {}, reason: {}",
            user_id, event_name, value, reason
        );
        self.check_and_award_badges(
            user_id,
            BadgeEvent::Generic {
                name: event_name.to_string(),
                value,
                reason: reason.to_string(),
            },
        )
        .await
    }

    //=====================================================================================
    // Reads
    //=====================================================================================

    /// Current level, points, streak and the badge catalog with earned dates.
    pub async fn summary(&self, user_id: Uuid) -> GamificationResult<GamificationSummary> {
        require_user(user_id)?;
        self.profile.ensure_exists(user_id).await;

        let level = self
            .store
            .get_level(user_id)
            .await?
            .ok_or_else(|| missing("level", user_id))?;
        let points = self
            .store
            .get_points(user_id)
            .await?
            .ok_or_else(|| missing("points", user_id))?;
        let streak = self
            .store
            .get_streak(user_id)
            .await?
            .ok_or_else(|| missing("streak", user_id))?;

        let earned: HashMap<Uuid, _> = self
            .store
            .list_user_badges(user_id)
            .await?
            .into_iter()
            .map(|b| (b.badge_id, b.earned_at))
            .collect();
        let badges = self
            .store
            .list_badges()
            .await?
            .into_iter()
            .map(|badge| BadgeStatus {
                earned_at: earned.get(&badge.id).copied(),
                badge,
            })
            .collect();

        Ok(GamificationSummary {
            level,
            points,
            streak,
            badges,
        })
    }

    //=====================================================================================
    // Internals
    //=====================================================================================

    /// Forwards the XP earned by a committed points change. The points stay
    /// committed even if the XP write fails.
    async fn convert_points(
        &self,
        user_id: Uuid,
        change: PointsChange,
        delta: i64,
        reason: &str,
    ) -> i64 {
        let xp = change.xp_gained();
        if xp <= 0 {
            return 0;
        }
        match self.levels.add(user_id, xp).await {
            Ok(level) => {
                info!(
                    "User {} gained {} XP from {} points for {} (level {})",
                    user_id, xp, delta, reason, level.level
                );
                xp
            }
            Err(e) => {
                error!("Error converting {} points into XP for {}: {}", delta, user_id, e);
                0
            }
        }
    }

    async fn award_badges(&self, user_id: Uuid, event: &BadgeEvent) -> Vec<UserBadge> {
        match self.badges.evaluate(user_id, event).await {
            Ok(awarded) => awarded,
            Err(e) => {
                error!(
                    "Badge evaluation for {} after {} failed: {}",
                    user_id,
                    event.name(),
                    e
                );
                Vec::new()
            }
        }
    }
}

fn require_user(user_id: Uuid) -> GamificationResult<()> {
    if user_id.is_nil() {
        return Err(GamificationError::InvalidInput(
            "User ID not provided.".to_string(),
        ));
    }
    Ok(())
}

fn missing(entity: &str, user_id: Uuid) -> PortError {
    PortError::NotFound(format!("No {} row for user {}", entity, user_id))
}
