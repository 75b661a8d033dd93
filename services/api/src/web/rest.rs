//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{
    middleware::require_user,
    protocol::{
        AddPointsRequest, AddXpRequest, BadgeCheckResponse, BadgeView, EarnedBadgeResponse,
        FlashcardReviewRequest, LevelResponse, LevelView, PointsResponse, ProfileResponse,
        RecordEventRequest, ResetResponse, RewardResponse, StreakResponse, StreakView,
        StudyDayRequest, StudyMode, SummaryResponse, UpdateStreakRequest,
    },
    state::AppState,
};
use axum::{
    extract::State,
    http::StatusCode,
    middleware as axum_middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use study_tracker_core::{BadgeEvent, GamificationError, PortError};
use tracing::error;
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        ensure_profile_handler,
        add_points_handler,
        add_xp_handler,
        update_streak_handler,
        check_badges_handler,
        record_event_handler,
        reset_stats_handler,
        summary_handler,
        checklist_item_handler,
        checklist_phase_handler,
        study_session_handler,
        flashcard_review_handler,
        study_day_handler,
        history_entry_deleted_handler,
    ),
    components(
        schemas(
            AddPointsRequest, AddXpRequest, UpdateStreakRequest, RecordEventRequest,
            FlashcardReviewRequest, StudyMode, StudyDayRequest, ProfileResponse,
            EarnedBadgeResponse, PointsResponse, LevelResponse, StreakResponse,
            BadgeCheckResponse, ResetResponse, RewardResponse, LevelView, StreakView,
            BadgeView, SummaryResponse
        )
    ),
    tags(
        (name = "Study Tracker API", description = "Points, XP, streaks and badges for study activity.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Router
//=========================================================================================

/// Builds every route that acts on behalf of a user.
pub fn router(app_state: Arc<AppState>) -> Router {
    let gamification = Router::new()
        .route("/gamification/profile", post(ensure_profile_handler))
        .route("/gamification/points", post(add_points_handler))
        .route("/gamification/xp", post(add_xp_handler))
        .route("/gamification/streak", post(update_streak_handler))
        .route("/gamification/badges/check", post(check_badges_handler))
        .route("/gamification/events", post(record_event_handler))
        .route("/gamification/reset", post(reset_stats_handler))
        .route("/gamification/summary", get(summary_handler));

    let feature_events = Router::new()
        .route("/events/checklist-item", post(checklist_item_handler))
        .route("/events/checklist-phase", post(checklist_phase_handler))
        .route("/events/study-session", post(study_session_handler))
        .route("/events/flashcard-review", post(flashcard_review_handler))
        .route("/events/study-day", post(study_day_handler))
        .route(
            "/events/history-entry-deleted",
            post(history_entry_deleted_handler),
        );

    Router::new()
        .merge(gamification)
        .merge(feature_events)
        .layer(axum_middleware::from_fn(require_user))
        .with_state(app_state)
}

//=========================================================================================
// Error Mapping
//=========================================================================================

/// Converts a core error into the status and message returned to the client.
pub fn http_error(e: GamificationError) -> (StatusCode, String) {
    match e {
        GamificationError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
        GamificationError::Port(PortError::NotFound(msg)) => (StatusCode::NOT_FOUND, msg),
        GamificationError::Port(PortError::Conflict(_)) => (
            StatusCode::CONFLICT,
            "The record was modified concurrently; please retry".to_string(),
        ),
        GamificationError::Port(PortError::Unexpected(msg)) => {
            error!("Unexpected store error: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

type HandlerResult<T> = Result<Json<T>, (StatusCode, String)>;

//=========================================================================================
// Gamification Handlers
//=========================================================================================

/// Ensure the caller's level, points and streak rows exist.
#[utoipa::path(
    post,
    path = "/gamification/profile",
    responses(
        (status = 200, description = "Whether the profile is complete", body = ProfileResponse)
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn ensure_profile_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> impl IntoResponse {
    let complete = app_state
        .gamification
        .ensure_user_profile_exists(user_id)
        .await;
    Json(ProfileResponse { complete })
}

/// Add points; crossed multiples of ten are converted into XP.
#[utoipa::path(
    post,
    path = "/gamification/points",
    request_body = AddPointsRequest,
    responses(
        (status = 200, description = "New point total", body = PointsResponse),
        (status = 400, description = "Zero or out-of-range delta"),
        (status = 409, description = "Concurrent modification"),
        (status = 500, description = "Internal server error")
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn add_points_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<AddPointsRequest>,
) -> HandlerResult<PointsResponse> {
    let outcome = app_state
        .gamification
        .add_points(user_id, req.delta, &req.reason)
        .await
        .map_err(http_error)?;
    Ok(Json(outcome.into()))
}

/// Add XP, rolling over into level-ups.
#[utoipa::path(
    post,
    path = "/gamification/xp",
    request_body = AddXpRequest,
    responses(
        (status = 200, description = "Resulting level state", body = LevelResponse),
        (status = 400, description = "Zero or out-of-range delta"),
        (status = 409, description = "Concurrent modification"),
        (status = 500, description = "Internal server error")
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn add_xp_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<AddXpRequest>,
) -> HandlerResult<LevelResponse> {
    let outcome = app_state
        .gamification
        .add_xp(user_id, req.delta, &req.reason)
        .await
        .map_err(http_error)?;
    Ok(Json(outcome.into()))
}

/// Record whether the user studied today.
#[utoipa::path(
    post,
    path = "/gamification/streak",
    request_body = UpdateStreakRequest,
    responses(
        (status = 200, description = "Resulting streak", body = StreakResponse),
        (status = 409, description = "Concurrent modification"),
        (status = 500, description = "Internal server error")
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn update_streak_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<UpdateStreakRequest>,
) -> HandlerResult<StreakResponse> {
    let outcome = app_state
        .gamification
        .update_streak(user_id, req.studied_today, req.study_duration_minutes)
        .await
        .map_err(http_error)?;
    Ok(Json(outcome.into()))
}

/// Award any badges the caller now qualifies for.
#[utoipa::path(
    post,
    path = "/gamification/badges/check",
    responses((status = 200, description = "Newly awarded badges", body = BadgeCheckResponse)),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn check_badges_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> impl IntoResponse {
    let awarded = app_state
        .gamification
        .check_and_award_badges(user_id, BadgeEvent::Manual)
        .await;
    Json(BadgeCheckResponse::from(awarded))
}

/// Record an arbitrary feature event; it may unlock badges.
#[utoipa::path(
    post,
    path = "/gamification/events",
    request_body = RecordEventRequest,
    responses((status = 200, description = "Newly awarded badges", body = BadgeCheckResponse)),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn record_event_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<RecordEventRequest>,
) -> impl IntoResponse {
    let awarded = app_state
        .gamification
        .record_generic_event(user_id, &req.event, req.value, &req.reason)
        .await;
    Json(BadgeCheckResponse::from(awarded))
}

/// Zero points, level and streak. Earned badges are kept.
#[utoipa::path(
    post,
    path = "/gamification/reset",
    responses(
        (status = 200, description = "Stats reset", body = ResetResponse),
        (status = 500, description = "Internal server error")
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn reset_stats_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> HandlerResult<ResetResponse> {
    app_state
        .gamification
        .reset_user_gamification_stats(user_id)
        .await
        .map_err(http_error)?;
    Ok(Json(ResetResponse { success: true }))
}

/// Level, points, streak and badge catalog for the caller.
#[utoipa::path(
    get,
    path = "/gamification/summary",
    responses(
        (status = 200, description = "Progress summary", body = SummaryResponse),
        (status = 500, description = "Internal server error")
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn summary_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> HandlerResult<SummaryResponse> {
    let summary = app_state
        .gamification
        .summary(user_id)
        .await
        .map_err(http_error)?;
    Ok(Json(summary.into()))
}

//=========================================================================================
// Feature Event Handlers
//=========================================================================================

/// A checklist item was checked.
#[utoipa::path(
    post,
    path = "/events/checklist-item",
    responses((status = 200, description = "Rewards granted", body = RewardResponse)),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn checklist_item_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> HandlerResult<RewardResponse> {
    let outcome = app_state
        .rewards
        .checklist_item_completed(user_id)
        .await
        .map_err(http_error)?;
    Ok(Json(outcome.into()))
}

/// A checklist phase was marked complete.
#[utoipa::path(
    post,
    path = "/events/checklist-phase",
    responses((status = 200, description = "Rewards granted", body = RewardResponse)),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn checklist_phase_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> HandlerResult<RewardResponse> {
    let outcome = app_state
        .rewards
        .checklist_phase_completed(user_id)
        .await
        .map_err(http_error)?;
    Ok(Json(outcome.into()))
}

/// A planned weekly study session was completed.
#[utoipa::path(
    post,
    path = "/events/study-session",
    responses((status = 200, description = "Rewards granted", body = RewardResponse)),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn study_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> HandlerResult<RewardResponse> {
    let outcome = app_state
        .rewards
        .study_session_completed(user_id)
        .await
        .map_err(http_error)?;
    Ok(Json(outcome.into()))
}

/// A flashcard was answered.
#[utoipa::path(
    post,
    path = "/events/flashcard-review",
    request_body = FlashcardReviewRequest,
    responses((status = 200, description = "Rewards granted", body = RewardResponse)),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn flashcard_review_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<FlashcardReviewRequest>,
) -> HandlerResult<RewardResponse> {
    let outcome = app_state
        .rewards
        .flashcard_answered(user_id, req.into())
        .await
        .map_err(http_error)?;
    Ok(Json(outcome.into()))
}

/// A study-history entry was saved.
#[utoipa::path(
    post,
    path = "/events/study-day",
    request_body = StudyDayRequest,
    responses((status = 200, description = "Rewards granted", body = RewardResponse)),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn study_day_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<StudyDayRequest>,
) -> HandlerResult<RewardResponse> {
    let outcome = app_state
        .rewards
        .study_day_logged(user_id, req.studied, req.duration_minutes)
        .await
        .map_err(http_error)?;
    Ok(Json(outcome.into()))
}

/// A study-history entry was deleted; progression is reset.
#[utoipa::path(
    post,
    path = "/events/history-entry-deleted",
    responses((status = 200, description = "Stats reset", body = RewardResponse)),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn history_entry_deleted_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> HandlerResult<RewardResponse> {
    let outcome = app_state
        .rewards
        .history_entry_deleted(user_id)
        .await
        .map_err(http_error)?;
    Ok(Json(outcome.into()))
}
