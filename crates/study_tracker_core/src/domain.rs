//! crates/study_tracker_core/src/domain.rs
//!
//! Defines the pure, core data structures for the gamification subsystem.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// XP needed to finish level 0. Every later level costs `LEVEL_XP_INCREMENT` more.
pub const INITIAL_NEXT_LEVEL_XP: i64 = 100;
pub const LEVEL_XP_INCREMENT: i64 = 100;

/// Level progress of a user. `experience_points` is the progress inside the current level.
#[derive(Debug, Clone, PartialEq)]
pub struct UserLevel {
    pub user_id: Uuid,
    pub level: i32,
    pub experience_points: i64,
    pub next_level_xp: i64,
    /// Optimistic-concurrency counter, bumped by the store on every write.
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl UserLevel {
    pub fn initial(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            level: 0,
            experience_points: 0,
            next_level_xp: INITIAL_NEXT_LEVEL_XP,
            version: 0,
            updated_at: now,
        }
    }
}

/// Lifetime point total of a user.
#[derive(Debug, Clone, PartialEq)]
pub struct UserPoints {
    pub user_id: Uuid,
    pub points: i64,
    pub version: i64,
    pub last_updated_at: DateTime<Utc>,
}

impl UserPoints {
    pub fn initial(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            points: 0,
            version: 0,
            last_updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserStreak {
    pub user_id: Uuid,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_activity_date: Option<NaiveDate>,
    /// Streak length at which the last milestone bonus was paid.
    pub last_streak_bonus_day: i32,
    pub current_total_study_hours_in_streak: f64,
    pub longest_study_hours_streak: f64,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl UserStreak {
    pub fn initial(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            current_streak: 0,
            longest_streak: 0,
            last_activity_date: None,
            last_streak_bonus_day: 0,
            current_total_study_hours_in_streak: 0.0,
            longest_study_hours_streak: 0.0,
            version: 0,
            updated_at: now,
        }
    }
}

/// Optional streak columns that older rows may still hold as NULL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreakBackfill {
    pub last_streak_bonus_day: bool,
    pub longest_study_hours_streak: bool,
    pub current_total_study_hours_in_streak: bool,
}

impl StreakBackfill {
    pub fn is_empty(&self) -> bool {
        !(self.last_streak_bonus_day
            || self.longest_study_hours_streak
            || self.current_total_study_hours_in_streak)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BadgeCategory {
    Evolucao,
    Progresso,
    Constancia,
    Desempenho,
    Social,
    Secreta,
}

impl BadgeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeCategory::Evolucao => "Evolução",
            BadgeCategory::Progresso => "Progresso",
            BadgeCategory::Constancia => "Constância",
            BadgeCategory::Desempenho => "Desempenho",
            BadgeCategory::Social => "Social",
            BadgeCategory::Secreta => "Secreta",
        }
    }
}

impl fmt::Display for BadgeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown badge category: {0}")]
pub struct UnknownBadgeCategory(pub String);

impl FromStr for BadgeCategory {
    type Err = UnknownBadgeCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Evolução" => Ok(BadgeCategory::Evolucao),
            "Progresso" => Ok(BadgeCategory::Progresso),
            "Constância" => Ok(BadgeCategory::Constancia),
            "Desempenho" => Ok(BadgeCategory::Desempenho),
            "Social" => Ok(BadgeCategory::Social),
            "Secreta" => Ok(BadgeCategory::Secreta),
            other => Err(UnknownBadgeCategory(other.to_string())),
        }
    }
}

/// A badge definition from the global catalog. Read-only to this crate.
#[derive(Debug, Clone, PartialEq)]
pub struct Badge {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: BadgeCategory,
    pub is_negative: bool,
    pub is_secret: bool,
    pub xp_required: Option<i64>,
    pub streak_required: Option<i32>,
    pub flashcards_reviewed_required: Option<i64>,
    pub checklists_completed_required: Option<i64>,
}

/// A badge earned by a user. Never deleted once created.
#[derive(Debug, Clone, PartialEq)]
pub struct UserBadge {
    pub user_id: Uuid,
    pub badge_id: Uuid,
    pub earned_at: DateTime<Utc>,
}

/// Aggregate progress figures computed by the store for badge evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BadgeProgress {
    /// Lifetime XP, not the progress inside the current level.
    pub total_xp: i64,
    pub current_streak: i32,
    pub flashcards_reviewed: i64,
    pub checklists_completed: i64,
    pub first_task_done: bool,
}

/// What triggered a badge check. Only used for logging.
#[derive(Debug, Clone, PartialEq)]
pub enum BadgeEvent {
    PointsAdded { delta: i64, reason: String },
    XpAdded { delta: i64, level: i32, reason: String },
    StreakUpdated { current_streak: i32 },
    Generic {
        name: String,
        value: serde_json::Value,
        reason: String,
    },
    Manual,
}

impl BadgeEvent {
    pub fn name(&self) -> &str {
        match self {
            BadgeEvent::PointsAdded { .. } => "points_added",
            BadgeEvent::XpAdded { .. } => "xp_added",
            BadgeEvent::StreakUpdated { .. } => "streak_updated",
            BadgeEvent::Generic { name, .. } => name,
            BadgeEvent::Manual => "manual",
        }
    }
}

/// Result of `add_points`.
#[derive(Debug, Clone, PartialEq)]
pub struct PointsOutcome {
    pub points: i64,
    pub xp_gained: i64,
    pub awarded_badges: Vec<UserBadge>,
}

/// Result of `add_xp`.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelOutcome {
    pub level: i32,
    pub xp: i64,
    pub next_level_xp: i64,
    pub leveled_up: bool,
    pub awarded_badges: Vec<UserBadge>,
}

/// Result of `update_streak`.
#[derive(Debug, Clone, PartialEq)]
pub struct StreakOutcome {
    pub current_streak: i32,
    pub longest_streak: i32,
    pub longest_study_hours_streak: f64,
    /// Milestone bonus points paid by this call, if any.
    pub bonus_points: i64,
    pub awarded_badges: Vec<UserBadge>,
}

/// A catalog badge together with the moment the user earned it, if they did.
#[derive(Debug, Clone, PartialEq)]
pub struct BadgeStatus {
    pub badge: Badge,
    pub earned_at: Option<DateTime<Utc>>,
}

/// Everything a dashboard needs to render a user's progression.
#[derive(Debug, Clone, PartialEq)]
pub struct GamificationSummary {
    pub level: UserLevel,
    pub points: UserPoints,
    pub streak: UserStreak,
    pub badges: Vec<BadgeStatus>,
}
