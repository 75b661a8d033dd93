//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `GamificationStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use study_tracker_core::domain::{
    Badge, BadgeProgress, StreakBackfill, UserBadge, UserLevel, UserPoints, UserStreak,
};
use study_tracker_core::ports::{GamificationStore, PortError, PortResult};
use tracing::debug;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `GamificationStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Maps a conditional write that touched no rows to a conflict.
fn expect_one_row(rows: u64, what: &str, user_id: Uuid) -> PortResult<()> {
    if rows == 0 {
        return Err(PortError::Conflict(format!(
            "{} for user {} changed concurrently",
            what, user_id
        )));
    }
    Ok(())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct LevelRecord {
    user_id: Uuid,
    level: i32,
    experience_points: i64,
    next_level_xp: i64,
    version: i64,
    updated_at: DateTime<Utc>,
}
impl LevelRecord {
    fn to_domain(self) -> UserLevel {
        UserLevel {
            user_id: self.user_id,
            level: self.level,
            experience_points: self.experience_points,
            next_level_xp: self.next_level_xp,
            version: self.version,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct PointsRecord {
    user_id: Uuid,
    points: i64,
    version: i64,
    last_updated_at: DateTime<Utc>,
}
impl PointsRecord {
    fn to_domain(self) -> UserPoints {
        UserPoints {
            user_id: self.user_id,
            points: self.points,
            version: self.version,
            last_updated_at: self.last_updated_at,
        }
    }
}

#[derive(FromRow)]
struct StreakRecord {
    user_id: Uuid,
    current_streak: i32,
    longest_streak: i32,
    last_activity_date: Option<NaiveDate>,
    last_streak_bonus_day: Option<i32>,
    current_total_study_hours_in_streak: Option<f64>,
    longest_study_hours_streak: Option<f64>,
    version: i64,
    updated_at: DateTime<Utc>,
}
impl StreakRecord {
    fn to_domain(self) -> UserStreak {
        UserStreak {
            user_id: self.user_id,
            current_streak: self.current_streak,
            longest_streak: self.longest_streak,
            last_activity_date: self.last_activity_date,
            last_streak_bonus_day: self.last_streak_bonus_day.unwrap_or(0),
            current_total_study_hours_in_streak: self
                .current_total_study_hours_in_streak
                .unwrap_or(0.0),
            longest_study_hours_streak: self.longest_study_hours_streak.unwrap_or(0.0),
            version: self.version,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct StreakGapRecord {
    bonus_day_missing: bool,
    longest_hours_missing: bool,
    current_hours_missing: bool,
}

#[derive(FromRow)]
struct BadgeRecord {
    id: Uuid,
    name: String,
    description: String,
    category: String,
    is_negative: bool,
    is_secret: bool,
    xp_required: Option<i64>,
    streak_required: Option<i32>,
    flashcards_reviewed_required: Option<i64>,
    checklists_completed_required: Option<i64>,
}
impl BadgeRecord {
    fn to_domain(self) -> PortResult<Badge> {
        let category = self
            .category
            .parse()
            .map_err(|e: study_tracker_core::domain::UnknownBadgeCategory| {
                PortError::Unexpected(format!("Badge {}: {}", self.id, e))
            })?;
        Ok(Badge {
            id: self.id,
            name: self.name,
            description: self.description,
            category,
            is_negative: self.is_negative,
            is_secret: self.is_secret,
            xp_required: self.xp_required,
            streak_required: self.streak_required,
            flashcards_reviewed_required: self.flashcards_reviewed_required,
            checklists_completed_required: self.checklists_completed_required,
        })
    }
}

#[derive(FromRow)]
struct UserBadgeRecord {
    user_id: Uuid,
    badge_id: Uuid,
    earned_at: DateTime<Utc>,
}
impl UserBadgeRecord {
    fn to_domain(self) -> UserBadge {
        UserBadge {
            user_id: self.user_id,
            badge_id: self.badge_id,
            earned_at: self.earned_at,
        }
    }
}

#[derive(FromRow)]
struct ProgressRecord {
    total_xp: i64,
    current_streak_val: i32,
    flashcards_reviewed_val: i64,
    checklists_completed_val: i64,
    first_task_done: bool,
}
impl ProgressRecord {
    fn to_domain(self) -> BadgeProgress {
        BadgeProgress {
            total_xp: self.total_xp,
            current_streak: self.current_streak_val,
            flashcards_reviewed: self.flashcards_reviewed_val,
            checklists_completed: self.checklists_completed_val,
            first_task_done: self.first_task_done,
        }
    }
}

//=========================================================================================
// `GamificationStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl GamificationStore for DbAdapter {
    // --- Levels ---

    async fn get_level(&self, user_id: Uuid) -> PortResult<Option<UserLevel>> {
        let record = sqlx::query_as::<_, LevelRecord>(
            "SELECT user_id, level, experience_points, next_level_xp, version, updated_at FROM user_levels WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(LevelRecord::to_domain))
    }

    async fn insert_level(&self, level: &UserLevel) -> PortResult<()> {
        let result = sqlx::query(
            "INSERT INTO user_levels (user_id, level, experience_points, next_level_xp, version, updated_at) VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(level.user_id)
        .bind(level.level)
        .bind(level.experience_points)
        .bind(level.next_level_xp)
        .bind(level.version)
        .bind(level.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        expect_one_row(result.rows_affected(), "Level", level.user_id)
    }

    async fn update_level(&self, level: &UserLevel) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE user_levels SET level = $1, experience_points = $2, next_level_xp = $3, updated_at = $4, version = version + 1 WHERE user_id = $5 AND version = $6",
        )
        .bind(level.level)
        .bind(level.experience_points)
        .bind(level.next_level_xp)
        .bind(level.updated_at)
        .bind(level.user_id)
        .bind(level.version)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        expect_one_row(result.rows_affected(), "Level", level.user_id)
    }

    // --- Points ---

    async fn get_points(&self, user_id: Uuid) -> PortResult<Option<UserPoints>> {
        let record = sqlx::query_as::<_, PointsRecord>(
            "SELECT user_id, points, version, last_updated_at FROM user_points WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(PointsRecord::to_domain))
    }

    async fn insert_points(&self, points: &UserPoints) -> PortResult<()> {
        let result = sqlx::query(
            "INSERT INTO user_points (user_id, points, version, last_updated_at) VALUES ($1, $2, $3, $4) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(points.user_id)
        .bind(points.points)
        .bind(points.version)
        .bind(points.last_updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        expect_one_row(result.rows_affected(), "Points", points.user_id)
    }

    async fn update_points(&self, points: &UserPoints) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE user_points SET points = $1, last_updated_at = $2, version = version + 1 WHERE user_id = $3 AND version = $4",
        )
        .bind(points.points)
        .bind(points.last_updated_at)
        .bind(points.user_id)
        .bind(points.version)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        expect_one_row(result.rows_affected(), "Points", points.user_id)
    }

    // --- Streaks ---

    async fn get_streak(&self, user_id: Uuid) -> PortResult<Option<UserStreak>> {
        let record = sqlx::query_as::<_, StreakRecord>(
            "SELECT user_id, current_streak, longest_streak, last_activity_date, last_streak_bonus_day, current_total_study_hours_in_streak, longest_study_hours_streak, version, updated_at FROM user_streaks WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(StreakRecord::to_domain))
    }

    async fn insert_streak(&self, streak: &UserStreak) -> PortResult<()> {
        let result = sqlx::query(
            "INSERT INTO user_streaks (user_id, current_streak, longest_streak, last_activity_date, last_streak_bonus_day, current_total_study_hours_in_streak, longest_study_hours_streak, version, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(streak.user_id)
        .bind(streak.current_streak)
        .bind(streak.longest_streak)
        .bind(streak.last_activity_date)
        .bind(streak.last_streak_bonus_day)
        .bind(streak.current_total_study_hours_in_streak)
        .bind(streak.longest_study_hours_streak)
        .bind(streak.version)
        .bind(streak.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        expect_one_row(result.rows_affected(), "Streak", streak.user_id)
    }

    async fn update_streak(&self, streak: &UserStreak) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE user_streaks SET current_streak = $1, longest_streak = $2, last_activity_date = $3, last_streak_bonus_day = $4, current_total_study_hours_in_streak = $5, longest_study_hours_streak = $6, updated_at = $7, version = version + 1 WHERE user_id = $8 AND version = $9",
        )
        .bind(streak.current_streak)
        .bind(streak.longest_streak)
        .bind(streak.last_activity_date)
        .bind(streak.last_streak_bonus_day)
        .bind(streak.current_total_study_hours_in_streak)
        .bind(streak.longest_study_hours_streak)
        .bind(streak.updated_at)
        .bind(streak.user_id)
        .bind(streak.version)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        expect_one_row(result.rows_affected(), "Streak", streak.user_id)
    }

    async fn find_streak_gaps(&self, user_id: Uuid) -> PortResult<Option<StreakBackfill>> {
        let record = sqlx::query_as::<_, StreakGapRecord>(
            "SELECT last_streak_bonus_day IS NULL AS bonus_day_missing, longest_study_hours_streak IS NULL AS longest_hours_missing, current_total_study_hours_in_streak IS NULL AS current_hours_missing FROM user_streaks WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.map(|r| StreakBackfill {
            last_streak_bonus_day: r.bonus_day_missing,
            longest_study_hours_streak: r.longest_hours_missing,
            current_total_study_hours_in_streak: r.current_hours_missing,
        }))
    }

    async fn backfill_streak(&self, user_id: Uuid, gaps: StreakBackfill) -> PortResult<()> {
        debug!("Back-filling streak columns {:?} for {}", gaps, user_id);
        // COALESCE only touches the columns that are still NULL.
        sqlx::query(
            "UPDATE user_streaks SET last_streak_bonus_day = COALESCE(last_streak_bonus_day, 0), longest_study_hours_streak = COALESCE(longest_study_hours_streak, 0), current_total_study_hours_in_streak = COALESCE(current_total_study_hours_in_streak, 0), version = version + 1 WHERE user_id = $1",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn reset_stats(&self, user_id: Uuid, now: DateTime<Utc>) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        sqlx::query(
            "UPDATE user_points SET points = 0, last_updated_at = $1, version = version + 1 WHERE user_id = $2",
        )
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        sqlx::query(
            "UPDATE user_levels SET level = 0, experience_points = 0, next_level_xp = 100, updated_at = $1, version = version + 1 WHERE user_id = $2",
        )
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        sqlx::query(
            "UPDATE user_streaks SET current_streak = 0, longest_streak = 0, last_activity_date = NULL, last_streak_bonus_day = 0, longest_study_hours_streak = 0, current_total_study_hours_in_streak = 0, updated_at = $1, version = version + 1 WHERE user_id = $2",
        )
        .bind(now)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    // --- Badges ---

    async fn get_badge_progress(&self, user_id: Uuid) -> PortResult<BadgeProgress> {
        let record = sqlx::query_as::<_, ProgressRecord>(
            "SELECT total_xp, current_streak_val, flashcards_reviewed_val, checklists_completed_val, first_task_done FROM get_user_progress_for_badges($1)",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Badge progress for user {} not found", user_id))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn list_badges(&self) -> PortResult<Vec<Badge>> {
        let records = sqlx::query_as::<_, BadgeRecord>(
            "SELECT id, name, description, category, is_negative, is_secret, xp_required, streak_required, flashcards_reviewed_required, checklists_completed_required FROM badges ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn list_user_badges(&self, user_id: Uuid) -> PortResult<Vec<UserBadge>> {
        let records = sqlx::query_as::<_, UserBadgeRecord>(
            "SELECT user_id, badge_id, earned_at FROM user_badges WHERE user_id = $1 ORDER BY earned_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let badges = records.into_iter().map(|r| r.to_domain()).collect();
        Ok(badges)
    }

    async fn insert_user_badges(&self, badges: &[UserBadge]) -> PortResult<Vec<UserBadge>> {
        if badges.is_empty() {
            return Ok(Vec::new());
        }
        let user_ids: Vec<Uuid> = badges.iter().map(|b| b.user_id).collect();
        let badge_ids: Vec<Uuid> = badges.iter().map(|b| b.badge_id).collect();
        let earned: Vec<DateTime<Utc>> = badges.iter().map(|b| b.earned_at).collect();

        let records = sqlx::query_as::<_, UserBadgeRecord>(
            "INSERT INTO user_badges (user_id, badge_id, earned_at) SELECT * FROM UNNEST($1::uuid[], $2::uuid[], $3::timestamptz[]) ON CONFLICT (user_id, badge_id) DO NOTHING RETURNING user_id, badge_id, earned_at",
        )
        .bind(user_ids)
        .bind(badge_ids)
        .bind(earned)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}
