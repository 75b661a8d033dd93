//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use std::sync::Arc;
use study_tracker_core::{GamificationService, GamificationStore, StudyRewards, SystemClock};

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub gamification: GamificationService,
    pub rewards: StudyRewards,
}

impl AppState {
    /// Wires the gamification façade and the reward rules over the given store.
    pub fn new(config: &Config, store: Arc<dyn GamificationStore>) -> Self {
        let gamification = GamificationService::with_options(
            store,
            Arc::new(SystemClock),
            config.conflict_retry_attempts,
            Default::default(),
        );
        let rewards = StudyRewards::new(gamification.clone());
        Self {
            gamification,
            rewards,
        }
    }
}
