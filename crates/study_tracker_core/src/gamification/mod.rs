//! crates/study_tracker_core/src/gamification/mod.rs
//!
//! Points, XP/levels, streaks and badges. Feature code only sees
//! [`GamificationService`]; the services below it are crate-private.

mod badges;
mod levels;
mod points;
mod profile;
mod retry;
mod service;
mod streak;

pub use badges::BadgeRules;
pub use retry::{retry_on_conflict, DEFAULT_RETRY_ATTEMPTS};
pub use service::GamificationService;
