//! crates/study_tracker_core/src/gamification/streak.rs
//!
//! Consecutive-day study streaks, hours studied within the running streak, and
//! the one-off milestone bonuses.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::retry::retry_on_conflict;
use crate::domain::UserStreak;
use crate::error::GamificationResult;
use crate::ports::{Clock, GamificationStore};

/// `(streak length, bonus points)`, in ascending order of length.
pub(crate) const STREAK_MILESTONES: [(i32, i64); 2] = [(5, 5), (7, 7)];

/// Applies a study day to the streak and returns the milestone bonus it earned.
pub(crate) fn record_study(streak: &mut UserStreak, today: NaiveDate, study_minutes: u32) -> i64 {
    let hours = f64::from(study_minutes) / 60.0;
    let yesterday = today.pred_opt();

    match streak.last_activity_date {
        Some(last) if last == today => {
            streak.current_total_study_hours_in_streak += hours;
        }
        Some(last) if Some(last) == yesterday => {
            streak.current_streak += 1;
            streak.current_total_study_hours_in_streak += hours;
            streak.last_activity_date = Some(today);
        }
        _ => {
            streak.current_streak = 1;
            streak.current_total_study_hours_in_streak = hours;
            streak.last_activity_date = Some(today);
        }
    }

    streak.longest_streak = streak.longest_streak.max(streak.current_streak);
    if streak.current_total_study_hours_in_streak > streak.longest_study_hours_streak {
        streak.longest_study_hours_streak = streak.current_total_study_hours_in_streak;
    }

    milestone_bonus(streak)
}

fn milestone_bonus(streak: &mut UserStreak) -> i64 {
    let reached = STREAK_MILESTONES
        .iter()
        .find(|(day, _)| streak.current_streak == *day && streak.last_streak_bonus_day < *day);
    if let Some(&(day, points)) = reached {
        streak.last_streak_bonus_day = day;
        return points;
    }
    // Below the first milestone the streak is young enough to earn them all again.
    if streak.current_streak < STREAK_MILESTONES[0].0 {
        streak.last_streak_bonus_day = 0;
    }
    0
}

/// Breaks the streak when the last activity is older than yesterday.
/// Returns whether anything changed.
pub(crate) fn expire_if_stale(streak: &mut UserStreak, today: NaiveDate) -> bool {
    let Some(last) = streak.last_activity_date else {
        return false;
    };
    if last == today || Some(last) == today.pred_opt() {
        return false;
    }
    streak.current_streak = 0;
    streak.last_streak_bonus_day = 0;
    streak.current_total_study_hours_in_streak = 0.0;
    true
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StreakChange {
    pub streak: UserStreak,
    pub bonus_points: i64,
}

pub(crate) struct StreakTracker {
    store: Arc<dyn GamificationStore>,
    clock: Arc<dyn Clock>,
    attempts: u32,
}

impl StreakTracker {
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

    pub(crate) async fn update(
        &self,
        user_id: Uuid,
        studied_today: bool,
        study_minutes: u32,
    ) -> GamificationResult<StreakChange> {
        retry_on_conflict(self.attempts, || {
            self.apply(user_id, studied_today, study_minutes)
        })
        .await
    }

    async fn apply(
        &self,
        user_id: Uuid,
        studied_today: bool,
        study_minutes: u32,
    ) -> GamificationResult<StreakChange> {
        let now = self.clock.now();
        let today = self.clock.today();
        let existing = self.store.get_streak(user_id).await?;
        let mut streak = existing
            .clone()
            .unwrap_or_else(|| UserStreak::initial(user_id, now));

        let mut bonus_points = 0;
        let changed = if studied_today {
            bonus_points = record_study(&mut streak, today, study_minutes);
            true
        } else {
            expire_if_stale(&mut streak, today)
        };

        if changed {
            streak.updated_at = now;
            match existing {
                Some(_) => self.store.update_streak(&streak).await?,
                None => self.store.insert_streak(&streak).await?,
            }
            debug!(
                "Streak for {} is now {} (longest {})",
                user_id, streak.current_streak, streak.longest_streak
            );
        }
        if bonus_points > 0 {
            info!(
                "User {} reached a {}-day streak; {} bonus points due",
                user_id, streak.current_streak, bonus_points
            );
        }

        Ok(StreakChange { streak, bonus_points })
    }
}
