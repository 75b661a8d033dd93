pub mod domain;
pub mod error;
pub mod gamification;
pub mod ports;
pub mod rewards;

pub use domain::{
    Badge, BadgeCategory, BadgeEvent, BadgeProgress, BadgeStatus, GamificationSummary,
    LevelOutcome, PointsOutcome, StreakBackfill, StreakOutcome, UserBadge, UserLevel, UserPoints,
    UserStreak,
};
pub use error::{GamificationError, GamificationResult};
pub use gamification::{BadgeRules, GamificationService, DEFAULT_RETRY_ATTEMPTS};
pub use ports::{Clock, GamificationStore, PortError, PortResult, SystemClock};
pub use rewards::{FlashcardReview, ReviewMode, RewardOutcome, StudyRewards};
