//! crates/study_tracker_core/src/ports.rs
//!
//! Defines the service contracts (traits) the gamification core depends on.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete data store and of the wall clock.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::{
    Badge, BadgeProgress, StreakBackfill, UserBadge, UserLevel, UserPoints, UserStreak,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The row changed since it was read, or already exists on insert.
    #[error("Write conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Persistence used by the gamification services.
///
/// `update_*` methods are conditional writes: they succeed only when the stored
/// `version` still equals the version carried by the record, and bump it. A stale
/// record yields `PortError::Conflict`. `insert_*` methods yield `Conflict` when the
/// row already exists.
#[async_trait]
pub trait GamificationStore: Send + Sync {
    // --- Levels ---
    async fn get_level(&self, user_id: Uuid) -> PortResult<Option<UserLevel>>;
    async fn insert_level(&self, level: &UserLevel) -> PortResult<()>;
    async fn update_level(&self, level: &UserLevel) -> PortResult<()>;

    // --- Points ---
    async fn get_points(&self, user_id: Uuid) -> PortResult<Option<UserPoints>>;
    async fn insert_points(&self, points: &UserPoints) -> PortResult<()>;
    async fn update_points(&self, points: &UserPoints) -> PortResult<()>;

    // --- Streaks ---
    async fn get_streak(&self, user_id: Uuid) -> PortResult<Option<UserStreak>>;
    async fn insert_streak(&self, streak: &UserStreak) -> PortResult<()>;
    async fn update_streak(&self, streak: &UserStreak) -> PortResult<()>;

    /// Reports which optional streak columns are still NULL, or `None` when the user
    /// has no streak row at all.
    async fn find_streak_gaps(&self, user_id: Uuid) -> PortResult<Option<StreakBackfill>>;

    /// Sets the flagged streak columns to zero.
    async fn backfill_streak(&self, user_id: Uuid, gaps: StreakBackfill) -> PortResult<()>;

    /// Zeroes points, level and streak for the user in a single transaction.
    async fn reset_stats(&self, user_id: Uuid, now: DateTime<Utc>) -> PortResult<()>;

    // --- Badges ---
    async fn get_badge_progress(&self, user_id: Uuid) -> PortResult<BadgeProgress>;
    async fn list_badges(&self) -> PortResult<Vec<Badge>>;
    async fn list_user_badges(&self, user_id: Uuid) -> PortResult<Vec<UserBadge>>;

    /// Inserts the given earned badges, skipping pairs that already exist.
    /// Returns the rows actually written.
    async fn insert_user_badges(&self, badges: &[UserBadge]) -> PortResult<Vec<UserBadge>>;
}

/// Source of the current time. "Today" is the UTC calendar date.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
