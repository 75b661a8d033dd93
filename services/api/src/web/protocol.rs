//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between feature clients and the API server.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use study_tracker_core::rewards::RewardOutcome;
use study_tracker_core::{
    BadgeStatus, FlashcardReview, GamificationSummary, LevelOutcome, PointsOutcome, ReviewMode,
    StreakOutcome, UserBadge,
};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Requests
//=========================================================================================

#[derive(Deserialize, Debug, ToSchema)]
pub struct AddPointsRequest {
    pub delta: i64,
    #[serde(default)]
    pub reason: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct AddXpRequest {
    pub delta: i64,
    #[serde(default)]
    pub reason: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct UpdateStreakRequest {
    #[serde(default = "default_true")]
    pub studied_today: bool,
    #[serde(default)]
    pub study_duration_minutes: u32,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct RecordEventRequest {
    pub event: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub value: serde_json::Value,
    #[serde(default)]
    pub reason: String,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StudyMode {
    All,
    Incorrect,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct FlashcardReviewRequest {
    pub remembered: bool,
    pub mode: StudyMode,
    pub cards_reviewed: u32,
    pub cards_total: u32,
    #[serde(default)]
    pub incorrect_remaining: u32,
}

impl From<FlashcardReviewRequest> for FlashcardReview {
    fn from(req: FlashcardReviewRequest) -> Self {
        FlashcardReview {
            remembered: req.remembered,
            mode: match req.mode {
                StudyMode::All => ReviewMode::All,
                StudyMode::Incorrect => ReviewMode::Incorrect,
            },
            cards_reviewed: req.cards_reviewed,
            cards_total: req.cards_total,
            incorrect_remaining: req.incorrect_remaining,
        }
    }
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct StudyDayRequest {
    pub studied: bool,
    #[serde(default)]
    pub duration_minutes: u32,
}

fn default_true() -> bool {
    true
}

//=========================================================================================
// Responses
//=========================================================================================

#[derive(Serialize, Debug, ToSchema)]
pub struct ProfileResponse {
    pub complete: bool,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct EarnedBadgeResponse {
    pub badge_id: Uuid,
    pub earned_at: DateTime<Utc>,
}

impl From<UserBadge> for EarnedBadgeResponse {
    fn from(b: UserBadge) -> Self {
        Self {
            badge_id: b.badge_id,
            earned_at: b.earned_at,
        }
    }
}

fn earned(badges: Vec<UserBadge>) -> Vec<EarnedBadgeResponse> {
    badges.into_iter().map(Into::into).collect()
}

#[derive(Serialize, Debug, ToSchema)]
pub struct PointsResponse {
    pub points: i64,
    pub xp_gained: i64,
    pub awarded_badges: Vec<EarnedBadgeResponse>,
}

impl From<PointsOutcome> for PointsResponse {
    fn from(o: PointsOutcome) -> Self {
        Self {
            points: o.points,
            xp_gained: o.xp_gained,
            awarded_badges: earned(o.awarded_badges),
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct LevelResponse {
    pub level: i32,
    pub xp: i64,
    pub next_level_xp: i64,
    pub leveled_up: bool,
    pub awarded_badges: Vec<EarnedBadgeResponse>,
}

impl From<LevelOutcome> for LevelResponse {
    fn from(o: LevelOutcome) -> Self {
        Self {
            level: o.level,
            xp: o.xp,
            next_level_xp: o.next_level_xp,
            leveled_up: o.leveled_up,
            awarded_badges: earned(o.awarded_badges),
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct StreakResponse {
    pub current_streak: i32,
    pub longest_streak: i32,
    pub longest_study_hours_streak: f64,
    pub bonus_points: i64,
    pub awarded_badges: Vec<EarnedBadgeResponse>,
}

impl From<StreakOutcome> for StreakResponse {
    fn from(o: StreakOutcome) -> Self {
        Self {
            current_streak: o.current_streak,
            longest_streak: o.longest_streak,
            longest_study_hours_streak: o.longest_study_hours_streak,
            bonus_points: o.bonus_points,
            awarded_badges: earned(o.awarded_badges),
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct BadgeCheckResponse {
    pub awarded_badges: Vec<EarnedBadgeResponse>,
}

impl From<Vec<UserBadge>> for BadgeCheckResponse {
    fn from(badges: Vec<UserBadge>) -> Self {
        Self {
            awarded_badges: earned(badges),
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ResetResponse {
    pub success: bool,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct RewardResponse {
    pub points: Vec<PointsResponse>,
    pub xp: Vec<LevelResponse>,
    pub streak: Option<StreakResponse>,
    pub stats_reset: bool,
}

impl From<RewardOutcome> for RewardResponse {
    fn from(o: RewardOutcome) -> Self {
        Self {
            points: o.points.into_iter().map(Into::into).collect(),
            xp: o.xp.into_iter().map(Into::into).collect(),
            streak: o.streak.map(Into::into),
            stats_reset: o.stats_reset,
        }
    }
}

//=========================================================================================
// Summary
//=========================================================================================

#[derive(Serialize, Debug, ToSchema)]
pub struct LevelView {
    pub level: i32,
    pub experience_points: i64,
    pub next_level_xp: i64,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct StreakView {
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_activity_date: Option<NaiveDate>,
    pub current_total_study_hours_in_streak: f64,
    pub longest_study_hours_streak: f64,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct BadgeView {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    pub is_negative: bool,
    pub is_secret: bool,
    pub earned_at: Option<DateTime<Utc>>,
}

impl From<BadgeStatus> for BadgeView {
    fn from(s: BadgeStatus) -> Self {
        Self {
            id: s.badge.id,
            name: s.badge.name,
            description: s.badge.description,
            category: s.badge.category.to_string(),
            is_negative: s.badge.is_negative,
            is_secret: s.badge.is_secret,
            earned_at: s.earned_at,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct SummaryResponse {
    pub level: LevelView,
    pub points: i64,
    pub streak: StreakView,
    pub badges: Vec<BadgeView>,
}

impl From<GamificationSummary> for SummaryResponse {
    fn from(s: GamificationSummary) -> Self {
        Self {
            level: LevelView {
                level: s.level.level,
                experience_points: s.level.experience_points,
                next_level_xp: s.level.next_level_xp,
            },
            points: s.points.points,
            streak: StreakView {
                current_streak: s.streak.current_streak,
                longest_streak: s.streak.longest_streak,
                last_activity_date: s.streak.last_activity_date,
                current_total_study_hours_in_streak: s
                    .streak
                    .current_total_study_hours_in_streak,
                longest_study_hours_streak: s.streak.longest_study_hours_streak,
            },
            badges: s.badges.into_iter().map(Into::into).collect(),
        }
    }
}
