//! crates/study_tracker_core/src/gamification/badges.rs
//!
//! Decides which catalog badges a user now qualifies for and records them.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{Badge, BadgeEvent, BadgeProgress, UserBadge};
use crate::ports::{Clock, GamificationStore, PortResult};

type Predicate = Arc<dyn Fn(&BadgeProgress) -> bool + Send + Sync>;

/// Extra conditions attached to specific badges by name, on top of the numeric
/// thresholds stored in the catalog.
#[derive(Clone)]
pub struct BadgeRules {
    special: HashMap<String, Predicate>,
}

impl BadgeRules {
    /// Rules with no named conditions; only catalog thresholds apply.
    pub fn empty() -> Self {
        Self {
            special: HashMap::new(),
        }
    }

    /// Adds (or replaces) the condition for the badge called `name`.
    pub fn with_rule<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&BadgeProgress) -> bool + Send + Sync + 'static,
    {
        self.special.insert(name.into(), Arc::new(predicate));
        self
    }

    /// A badge qualifies when every threshold it sets is met and its named rule,
    /// if any, passes.
    pub fn qualifies(&self, badge: &Badge, progress: &BadgeProgress) -> bool {
        let thresholds_met = badge.xp_required.map_or(true, |req| progress.total_xp >= req)
            && badge
                .streak_required
                .map_or(true, |req| progress.current_streak >= req)
            && badge
                .flashcards_reviewed_required
                .map_or(true, |req| progress.flashcards_reviewed >= req)
            && badge
                .checklists_completed_required
                .map_or(true, |req| progress.checklists_completed >= req);

        thresholds_met
            && self
                .special
                .get(&badge.name)
                .map_or(true, |rule| rule(progress))
    }
}

impl Default for BadgeRules {
    fn default() -> Self {
        Self::empty()
            .with_rule("Primeiro Passo", |p| p.first_task_done)
            .with_rule("Subindo a Montanha", |p| p.total_xp >= 1000)
    }
}

pub(crate) struct BadgeEvaluator {
    store: Arc<dyn GamificationStore>,
    clock: Arc<dyn Clock>,
    rules: BadgeRules,
}

impl BadgeEvaluator {
    pub(crate) fn new(
        store: Arc<dyn GamificationStore>,
        clock: Arc<dyn Clock>,
        rules: BadgeRules,
    ) -> Self {
        Self {
            store,
            clock,
            rules,
        }
    }

    /// Awards every unearned badge the user now qualifies for and returns the ones
    /// this call wrote. Any failed read aborts before anything is written.
    pub(crate) async fn evaluate(
        &self,
        user_id: Uuid,
        event: &BadgeEvent,
    ) -> PortResult<Vec<UserBadge>> {
        let progress = self.store.get_badge_progress(user_id).await?;
        let catalog = self.store.list_badges().await?;
        let earned: HashSet<Uuid> = self
            .store
            .list_user_badges(user_id)
            .await?
            .into_iter()
            .map(|b| b.badge_id)
            .collect();

        let now = self.clock.now();
        let awarded: Vec<UserBadge> = catalog
            .iter()
            .filter(|badge| !earned.contains(&badge.id))
            .filter(|badge| self.rules.qualifies(badge, &progress))
            .map(|badge| UserBadge {
                user_id,
                badge_id: badge.id,
                earned_at: now,
            })
            .collect();

        if awarded.is_empty() {
            debug!("No new badges for {} after {}", user_id, event.name());
            return Ok(awarded);
        }

        let written = self.store.insert_user_badges(&awarded).await?;
        if written.len() < awarded.len() {
            debug!(
                "{} of {} badges for {} were already awarded concurrently",
                awarded.len() - written.len(),
                awarded.len(),
                user_id
            );
        }
        if !written.is_empty() {
            let ids: Vec<String> = written.iter().map(|b| b.badge_id.to_string()).collect();
            info!(
                "Awarded {} new badges to user {} after {}: {}",
                written.len(),
                user_id,
                event.name(),
                ids.join(", ")
            );
        }
        Ok(written)
    }
}
