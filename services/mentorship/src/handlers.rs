use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use mentorlink_auth::Claims;
use mentorlink_common::ApiResponse;

use crate::booking::BookingService;
use crate::earnings::EarningsService;
use crate::messaging::MessageService;
use crate::middleware::{error_response, validation_failure};
use crate::models::{
    ActiveSessionResponse, BookSessionRequest, BookSessionResponse, ConversationResponse,
    ConversationSummary, CreateConversationRequest, CreateReviewRequest, EarningsOverviewResponse,
    MentorReviewsResponse, MessageResponse, PayoutResponse, ReviewResponse, SendMessageRequest,
    SessionResponse, SessionStatusResponse, SessionSummary, UpdateSessionStatusRequest,
    WithdrawRequest,
};
use crate::reviews::ReviewService;
use crate::sessions::SessionService;
use crate::AppState;

type HandlerError = (StatusCode, Json<ApiResponse<()>>);
type HandlerResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), HandlerError>;

pub async fn health_check() -> (StatusCode, Json<ApiResponse<serde_json::Value>>) {
    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "status": "healthy",
            "service": "mentorship"
        }))),
    )
}

// ---- Sessions ----

pub async fn book_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<BookSessionRequest>,
) -> HandlerResult<BookSessionResponse> {
    req.validate().map_err(validation_failure)?;
    let mentee_id = claims.user_id().map_err(error_response)?;

    let response = BookingService::new(&state)
        .book(mentee_id, req)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> HandlerResult<Vec<SessionSummary>> {
    let caller = claims.user_id().map_err(error_response)?;

    let sessions = SessionService::new(&state)
        .list_sessions(caller)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::OK, Json(ApiResponse::success(sessions))))
}

pub async fn update_session_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<UpdateSessionStatusRequest>,
) -> HandlerResult<SessionResponse> {
    let caller = claims.user_id().map_err(error_response)?;

    let session = SessionService::new(&state)
        .update_status(session_id, caller, &req.status)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::OK, Json(ApiResponse::success(session))))
}

pub async fn active_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(conversation_id): Path<Uuid>,
) -> HandlerResult<ActiveSessionResponse> {
    let caller = claims.user_id().map_err(error_response)?;

    let session = SessionService::new(&state)
        .active_for_conversation(conversation_id, caller)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::OK, Json(ApiResponse::success(session))))
}

pub async fn session_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> HandlerResult<SessionStatusResponse> {
    let caller = claims.user_id().map_err(error_response)?;

    let status = SessionService::new(&state)
        .check_status(session_id, caller)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::OK, Json(ApiResponse::success(status))))
}

// ---- Messaging ----

pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> HandlerResult<Vec<ConversationSummary>> {
    let caller = claims.user_id().map_err(error_response)?;

    let conversations = MessageService::new(&state)
        .list_conversations(caller)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::OK, Json(ApiResponse::success(conversations))))
}

pub async fn show_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(conversation_id): Path<Uuid>,
) -> HandlerResult<Vec<MessageResponse>> {
    let caller = claims.user_id().map_err(error_response)?;

    let messages = MessageService::new(&state)
        .show(conversation_id, caller)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::OK, Json(ApiResponse::success(messages))))
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(conversation_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> HandlerResult<MessageResponse> {
    req.validate().map_err(validation_failure)?;
    let caller = claims.user_id().map_err(error_response)?;

    let message = MessageService::new(&state)
        .store(conversation_id, caller, req)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(message))))
}

pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateConversationRequest>,
) -> HandlerResult<ConversationResponse> {
    let caller = claims.user_id().map_err(error_response)?;

    let conversation = MessageService::new(&state)
        .create_conversation(caller, req.participant_id)
        .await
        .map_err(error_response)?;

    let status = if conversation.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(ApiResponse::success(conversation))))
}

// ---- Reviews ----

pub async fn create_review(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateReviewRequest>,
) -> HandlerResult<ReviewResponse> {
    req.validate().map_err(validation_failure)?;
    let caller = claims.user_id().map_err(error_response)?;

    let review = ReviewService::new(&state)
        .store(caller, req)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(review))))
}

pub async fn my_mentor_reviews(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> HandlerResult<MentorReviewsResponse> {
    let mentor_id = claims.user_id().map_err(error_response)?;

    let reviews = ReviewService::new(&state)
        .mentor_reviews(mentor_id)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::OK, Json(ApiResponse::success(reviews))))
}

pub async fn public_mentor_reviews(
    State(state): State<AppState>,
    Path(mentor_id): Path<Uuid>,
) -> HandlerResult<MentorReviewsResponse> {
    let reviews = ReviewService::new(&state)
        .mentor_reviews(mentor_id)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::OK, Json(ApiResponse::success(reviews))))
}

// ---- Earnings ----

pub async fn earnings_overview(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> HandlerResult<EarningsOverviewResponse> {
    let mentor_id = claims.user_id().map_err(error_response)?;

    let overview = EarningsService::new(&state)
        .overview(mentor_id)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::OK, Json(ApiResponse::success(overview))))
}

pub async fn withdraw(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<WithdrawRequest>,
) -> HandlerResult<PayoutResponse> {
    let mentor_id = claims.user_id().map_err(error_response)?;

    let payout = EarningsService::new(&state)
        .withdraw(mentor_id, req.amount)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(payout))))
}
