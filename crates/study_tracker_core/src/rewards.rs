//! crates/study_tracker_core/src/rewards.rs
//!
//! Translates study-tracker feature events (checklists, flashcards, study history,
//! weekly sessions) into gamification calls.

use tracing::debug;
use uuid::Uuid;

use crate::domain::{LevelOutcome, PointsOutcome, StreakOutcome};
use crate::error::GamificationResult;
use crate::gamification::GamificationService;

/// Which cards a flashcard study round draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewMode {
    All,
    Incorrect,
}

/// A single flashcard answer, with the deck statistics after recording it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashcardReview {
    pub remembered: bool,
    pub mode: ReviewMode,
    /// Reviews in this deck including this one.
    pub cards_reviewed: u32,
    pub cards_total: u32,
    /// Cards still marked incorrect in this round, excluding the one just answered.
    pub incorrect_remaining: u32,
}

/// Everything a feature event changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RewardOutcome {
    pub points: Vec<PointsOutcome>,
    pub xp: Vec<LevelOutcome>,
    pub streak: Option<StreakOutcome>,
    pub stats_reset: bool,
}

const CHECKLIST_ITEM_POINTS: i64 = 1;
const CHECKLIST_PHASE_POINTS: i64 = 5;
const STUDY_SESSION_POINTS: i64 = 2;
const FLASHCARD_CORRECT_POINTS: i64 = 1;
const FLASHCARD_BATCH_SIZE: u32 = 10;
const FLASHCARD_BATCH_XP: i64 = 5;
const DECK_COMPLETED_XP: i64 = 20;
const INCORRECT_CLEARED_XP: i64 = 10;
const STUDY_DAY_POINTS: i64 = 1;

/// `(minimum hours, points)`, highest tier first. Only the first matching tier pays.
const STUDY_HOUR_BONUSES: [(u32, i64); 3] = [(5, 6), (3, 4), (1, 2)];

/// Reward rules on top of [`GamificationService`].
#[derive(Clone)]
pub struct StudyRewards {
    gamification: GamificationService,
}

impl StudyRewards {
    pub fn new(gamification: GamificationService) -> Self {
        Self { gamification }
    }

    pub async fn checklist_item_completed(
        &self,
        user_id: Uuid,
    ) -> GamificationResult<RewardOutcome> {
        self.points_only(user_id, CHECKLIST_ITEM_POINTS, "Item de checklist concluído")
            .await
    }

    pub async fn checklist_phase_completed(
        &self,
        user_id: Uuid,
    ) -> GamificationResult<RewardOutcome> {
        self.points_only(user_id, CHECKLIST_PHASE_POINTS, "Fase de checklist concluída")
            .await
    }

    pub async fn study_session_completed(
        &self,
        user_id: Uuid,
    ) -> GamificationResult<RewardOutcome> {
        self.points_only(user_id, STUDY_SESSION_POINTS, "Sessão de estudo semanal concluída")
            .await
    }

    pub async fn flashcard_answered(
        &self,
        user_id: Uuid,
        review: FlashcardReview,
    ) -> GamificationResult<RewardOutcome> {
        let mut outcome = RewardOutcome::default();
        if review.remembered {
            outcome.points.push(
                self.gamification
                    .add_points(user_id, FLASHCARD_CORRECT_POINTS, "Flashcard acertado")
                    .await?,
            );
        }
        if review.cards_reviewed > 0 && review.cards_reviewed % FLASHCARD_BATCH_SIZE == 0 {
            outcome.xp.push(
                self.gamification
                    .add_xp(user_id, FLASHCARD_BATCH_XP, "Revisão de 10 flashcards")
                    .await?,
            );
        }

        let deck_finished = review.mode == ReviewMode::All
            && review.cards_total > 0
            && review.cards_reviewed == review.cards_total;
        let incorrect_cleared = review.mode == ReviewMode::Incorrect
            && review.remembered
            && review.incorrect_remaining == 0;

        if deck_finished {
            outcome.xp.push(
                self.gamification
                    .add_xp(user_id, DECK_COMPLETED_XP, "Conclusão de baralho de flashcards")
                    .await?,
            );
        } else if incorrect_cleared {
            outcome.xp.push(
                self.gamification
                    .add_xp(
                        user_id,
                        INCORRECT_CLEARED_XP,
                        "Revisão de todos os flashcards errados",
                    )
                    .await?,
            );
        }
        Ok(outcome)
    }

    /// A study-history entry was saved for a day.
    pub async fn study_day_logged(
        &self,
        user_id: Uuid,
        studied: bool,
        duration_minutes: u32,
    ) -> GamificationResult<RewardOutcome> {
        let mut outcome = RewardOutcome::default();
        if !studied {
            outcome.streak = Some(self.gamification.update_streak(user_id, false, 0).await?);
            return Ok(outcome);
        }

        outcome.points.push(
            self.gamification
                .add_points(user_id, STUDY_DAY_POINTS, "Dia de estudo registrado")
                .await?,
        );
        outcome.streak = Some(
            self.gamification
                .update_streak(user_id, true, duration_minutes)
                .await?,
        );

        let hours = duration_minutes / 60;
        let tier = STUDY_HOUR_BONUSES.iter().find(|(min, _)| hours >= *min);
        if let Some(&(min_hours, points)) = tier {
            let reason = format!("Estudo por {}+ horas", min_hours);
            outcome
                .points
                .push(self.gamification.add_points(user_id, points, &reason).await?);
        }
        Ok(outcome)
    }

    /// A study-history entry was deleted: progression starts over, badges stay.
    pub async fn history_entry_deleted(&self, user_id: Uuid) -> GamificationResult<RewardOutcome> {
        self.gamification.reset_user_gamification_stats(user_id).await?;
        let streak = self.gamification.update_streak(user_id, false, 0).await?;
        Ok(RewardOutcome {
            streak: Some(streak),
            stats_reset: true,
            ..Default::default()
        })
    }

    async fn points_only(
        &self,
        user_id: Uuid,
        points: i64,
        reason: &str,
    ) -> GamificationResult<RewardOutcome> {
        debug!("Rewarding {} with {} points: {}", user_id, points, reason);
        let outcome = self.gamification.add_points(user_id, points, reason).await?;
        Ok(RewardOutcome {
            points: vec![outcome],
            ..Default::default()
        })
    }
}
