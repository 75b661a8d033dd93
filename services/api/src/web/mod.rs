pub mod middleware;
pub mod protocol;
pub mod rest;
pub mod state;

// Re-export the handlers to make them easily accessible
// to the binary that will build the web server router.
pub use middleware::require_user;
pub use rest::{
    add_points_handler, add_xp_handler, check_badges_handler, checklist_item_handler,
    checklist_phase_handler, ensure_profile_handler, flashcard_review_handler,
    history_entry_deleted_handler, record_event_handler, reset_stats_handler, router,
    study_day_handler, study_session_handler, summary_handler, update_streak_handler,
};
