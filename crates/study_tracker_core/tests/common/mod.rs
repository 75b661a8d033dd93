//! In-memory store and controllable clock shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use study_tracker_core::{
    Badge, BadgeCategory, BadgeProgress, Clock, GamificationService, GamificationStore, PortError,
    PortResult, StreakBackfill, UserBadge, UserLevel, UserPoints, UserStreak,
};
use uuid::Uuid;

//=========================================================================================
// Clock
//=========================================================================================

pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance_days(&self, days: i64) {
        let mut now = self.now.lock().unwrap();
        *now = *now + Duration::days(days);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 14, 30, 0).unwrap()
}

pub fn today() -> NaiveDate {
    test_now().date_naive()
}

pub fn days_ago(days: i64) -> NaiveDate {
    today() - Duration::days(days)
}

//=========================================================================================
// Store
//=========================================================================================

#[derive(Default)]
struct State {
    levels: HashMap<Uuid, UserLevel>,
    points: HashMap<Uuid, UserPoints>,
    streaks: HashMap<Uuid, UserStreak>,
    streak_gaps: HashMap<Uuid, StreakBackfill>,
    activity: HashMap<Uuid, (i64, i64, bool)>,
    badges: Vec<Badge>,
    user_badges: Vec<UserBadge>,
    raced_badges: Vec<UserBadge>,
    failing: HashSet<&'static str>,
    conflicts: HashMap<&'static str, u32>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes every call to `op` fail with an unexpected error.
    pub fn fail_on(&self, op: &'static str) {
        self.state.lock().unwrap().failing.insert(op);
    }

    /// Makes the next `times` calls to `op` fail as if another writer got there first.
    pub fn conflict_on(&self, op: &'static str, times: u32) {
        self.state.lock().unwrap().conflicts.insert(op, times);
    }

    /// Lands `badge` for the user just before the next badge insert, as a
    /// concurrent evaluation would.
    pub fn race_badge_award(&self, badge: UserBadge) {
        self.state.lock().unwrap().raced_badges.push(badge);
    }

    pub fn add_badge(&self, badge: Badge) {
        self.state.lock().unwrap().badges.push(badge);
    }

    pub fn set_activity(
        &self,
        user_id: Uuid,
        flashcards: i64,
        checklists: i64,
        first_task_done: bool,
    ) {
        self.state
            .lock()
            .unwrap()
            .activity
            .insert(user_id, (flashcards, checklists, first_task_done));
    }

    pub fn put_level(&self, level: UserLevel) {
        self.state.lock().unwrap().levels.insert(level.user_id, level);
    }

    pub fn put_points(&self, points: UserPoints) {
        self.state.lock().unwrap().points.insert(points.user_id, points);
    }

    pub fn put_streak(&self, streak: UserStreak) {
        self.state.lock().unwrap().streaks.insert(streak.user_id, streak);
    }

    /// Simulates a streak row created before the optional columns existed.
    pub fn put_legacy_streak(&self, streak: UserStreak, gaps: StreakBackfill) {
        let mut state = self.state.lock().unwrap();
        state.streak_gaps.insert(streak.user_id, gaps);
        state.streaks.insert(streak.user_id, streak);
    }

    pub fn streak_gaps(&self, user_id: Uuid) -> Option<StreakBackfill> {
        self.state.lock().unwrap().streak_gaps.get(&user_id).copied()
    }

    pub fn level(&self, user_id: Uuid) -> Option<UserLevel> {
        self.state.lock().unwrap().levels.get(&user_id).cloned()
    }

    pub fn points(&self, user_id: Uuid) -> Option<UserPoints> {
        self.state.lock().unwrap().points.get(&user_id).cloned()
    }

    pub fn streak(&self, user_id: Uuid) -> Option<UserStreak> {
        self.state.lock().unwrap().streaks.get(&user_id).cloned()
    }

    pub fn user_badges(&self, user_id: Uuid) -> Vec<UserBadge> {
        self.state
            .lock()
            .unwrap()
            .user_badges
            .iter()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect()
    }

    fn check(&self, op: &'static str) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing.contains(op) {
            return Err(PortError::Unexpected(format!("{} failed", op)));
        }
        if let Some(left) = state.conflicts.get_mut(op) {
            if *left > 0 {
                *left -= 1;
                return Err(PortError::Conflict(format!("{} raced", op)));
            }
        }
        Ok(())
    }
}

fn versioned_update<T: Clone>(
    rows: &mut HashMap<Uuid, T>,
    user_id: Uuid,
    record: &T,
    version: impl Fn(&T) -> i64,
    bump: impl Fn(&mut T),
) -> PortResult<()> {
    let stored = rows
        .get(&user_id)
        .ok_or_else(|| PortError::NotFound(user_id.to_string()))?;
    if version(stored) != version(record) {
        return Err(PortError::Conflict(format!("stale row for {}", user_id)));
    }
    let mut next = record.clone();
    bump(&mut next);
    rows.insert(user_id, next);
    Ok(())
}

fn insert_new<T: Clone>(rows: &mut HashMap<Uuid, T>, user_id: Uuid, record: &T) -> PortResult<()> {
    if rows.contains_key(&user_id) {
        return Err(PortError::Conflict(format!("row exists for {}", user_id)));
    }
    rows.insert(user_id, record.clone());
    Ok(())
}

#[async_trait]
impl GamificationStore for InMemoryStore {
    async fn get_level(&self, user_id: Uuid) -> PortResult<Option<UserLevel>> {
        self.check("get_level")?;
        Ok(self.level(user_id))
    }

    async fn insert_level(&self, level: &UserLevel) -> PortResult<()> {
        self.check("insert_level")?;
        insert_new(&mut self.state.lock().unwrap().levels, level.user_id, level)
    }

    async fn update_level(&self, level: &UserLevel) -> PortResult<()> {
        self.check("update_level")?;
        versioned_update(
            &mut self.state.lock().unwrap().levels,
            level.user_id,
            level,
            |r| r.version,
            |r| r.version += 1,
        )
    }

    async fn get_points(&self, user_id: Uuid) -> PortResult<Option<UserPoints>> {
        self.check("get_points")?;
        Ok(self.points(user_id))
    }

    async fn insert_points(&self, points: &UserPoints) -> PortResult<()> {
        self.check("insert_points")?;
        insert_new(&mut self.state.lock().unwrap().points, points.user_id, points)
    }

    async fn update_points(&self, points: &UserPoints) -> PortResult<()> {
        self.check("update_points")?;
        versioned_update(
            &mut self.state.lock().unwrap().points,
            points.user_id,
            points,
            |r| r.version,
            |r| r.version += 1,
        )
    }

    async fn get_streak(&self, user_id: Uuid) -> PortResult<Option<UserStreak>> {
        self.check("get_streak")?;
        Ok(self.streak(user_id))
    }

    async fn insert_streak(&self, streak: &UserStreak) -> PortResult<()> {
        self.check("insert_streak")?;
        insert_new(&mut self.state.lock().unwrap().streaks, streak.user_id, streak)
    }

    async fn update_streak(&self, streak: &UserStreak) -> PortResult<()> {
        self.check("update_streak")?;
        versioned_update(
            &mut self.state.lock().unwrap().streaks,
            streak.user_id,
            streak,
            |r| r.version,
            |r| r.version += 1,
        )
    }

    async fn find_streak_gaps(&self, user_id: Uuid) -> PortResult<Option<StreakBackfill>> {
        self.check("find_streak_gaps")?;
        let state = self.state.lock().unwrap();
        if !state.streaks.contains_key(&user_id) {
            return Ok(None);
        }
        Ok(Some(state.streak_gaps.get(&user_id).copied().unwrap_or_default()))
    }

    async fn backfill_streak(&self, user_id: Uuid, gaps: StreakBackfill) -> PortResult<()> {
        self.check("backfill_streak")?;
        let mut state = self.state.lock().unwrap();
        if let Some(stored) = state.streak_gaps.get_mut(&user_id) {
            if gaps.last_streak_bonus_day {
                stored.last_streak_bonus_day = false;
            }
            if gaps.longest_study_hours_streak {
                stored.longest_study_hours_streak = false;
            }
            if gaps.current_total_study_hours_in_streak {
                stored.current_total_study_hours_in_streak = false;
            }
        }
        Ok(())
    }

    async fn reset_stats(&self, user_id: Uuid, now: DateTime<Utc>) -> PortResult<()> {
        self.check("reset_stats")?;
        let mut state = self.state.lock().unwrap();
        if let Some(row) = state.points.get_mut(&user_id) {
            row.points = 0;
            row.last_updated_at = now;
            row.version += 1;
        }
        if let Some(row) = state.levels.get_mut(&user_id) {
            let version = row.version + 1;
            *row = UserLevel::initial(user_id, now);
            row.version = version;
        }
        if let Some(row) = state.streaks.get_mut(&user_id) {
            let version = row.version + 1;
            *row = UserStreak::initial(user_id, now);
            row.version = version;
        }
        Ok(())
    }

    async fn get_badge_progress(&self, user_id: Uuid) -> PortResult<BadgeProgress> {
        self.check("get_badge_progress")?;
        let state = self.state.lock().unwrap();
        let total_xp = state.levels.get(&user_id).map_or(0, |l| {
            let level = i128::from(l.level);
            let total = 100 * level * (level + 1) / 2 + i128::from(l.experience_points);
            i64::try_from(total).unwrap_or(i64::MAX)
        });
        let current_streak = state.streaks.get(&user_id).map_or(0, |s| s.current_streak);
        let (flashcards_reviewed, checklists_completed, first_task_done) =
            state.activity.get(&user_id).copied().unwrap_or_default();
        Ok(BadgeProgress {
            total_xp,
            current_streak,
            flashcards_reviewed,
            checklists_completed,
            first_task_done,
        })
    }

    async fn list_badges(&self) -> PortResult<Vec<Badge>> {
        self.check("list_badges")?;
        Ok(self.state.lock().unwrap().badges.clone())
    }

    async fn list_user_badges(&self, user_id: Uuid) -> PortResult<Vec<UserBadge>> {
        self.check("list_user_badges")?;
        Ok(self.user_badges(user_id))
    }

    async fn insert_user_badges(&self, badges: &[UserBadge]) -> PortResult<Vec<UserBadge>> {
        self.check("insert_user_badges")?;
        let mut state = self.state.lock().unwrap();
        let raced = std::mem::take(&mut state.raced_badges);
        state.user_badges.extend(raced);
        let mut written = Vec::new();
        for badge in badges {
            let exists = state
                .user_badges
                .iter()
                .any(|b| b.user_id == badge.user_id && b.badge_id == badge.badge_id);
            if !exists {
                state.user_badges.push(badge.clone());
                written.push(badge.clone());
            }
        }
        Ok(written)
    }
}

//=========================================================================================
// Fixtures
//=========================================================================================

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<FixedClock>,
    pub service: GamificationService,
    pub user: Uuid,
}

pub fn harness() -> Harness {
    let store = InMemoryStore::new();
    let clock = Arc::new(FixedClock::at(test_now()));
    let service = GamificationService::new(store.clone(), clock.clone());
    Harness {
        store,
        clock,
        service,
        user: Uuid::new_v4(),
    }
}

pub fn badge(name: &str) -> Badge {
    Badge {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: format!("{} badge", name),
        category: BadgeCategory::Progresso,
        is_negative: false,
        is_secret: false,
        xp_required: None,
        streak_required: None,
        flashcards_reviewed_required: None,
        checklists_completed_required: None,
    }
}

pub fn level_row(user_id: Uuid, level: i32, xp: i64, next: i64) -> UserLevel {
    UserLevel {
        level,
        experience_points: xp,
        next_level_xp: next,
        ..UserLevel::initial(user_id, test_now())
    }
}

pub fn points_row(user_id: Uuid, points: i64) -> UserPoints {
    UserPoints {
        points,
        ..UserPoints::initial(user_id, test_now())
    }
}

pub fn streak_row(
    user_id: Uuid,
    current: i32,
    last: Option<NaiveDate>,
    bonus_day: i32,
) -> UserStreak {
    UserStreak {
        current_streak: current,
        longest_streak: current,
        last_activity_date: last,
        last_streak_bonus_day: bonus_day,
        ..UserStreak::initial(user_id, test_now())
    }
}
