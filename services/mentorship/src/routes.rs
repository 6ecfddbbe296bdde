use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::handlers;
use crate::middleware::auth_middleware;
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/reviews/mentor/:mentor_id",
            get(handlers::public_mentor_reviews),
        );

    let protected = Router::new()
        .route(
            "/sessions",
            post(handlers::book_session).get(handlers::list_sessions),
        )
        .route("/sessions/:id", put(handlers::update_session_status))
        .route("/sessions/:id/active", get(handlers::active_session))
        .route("/sessions/:id/status", get(handlers::session_status))
        .route("/messages/conversations", get(handlers::list_conversations))
        .route(
            "/messages/:conversation_id",
            get(handlers::show_messages).post(handlers::send_message),
        )
        .route("/conversations", post(handlers::create_conversation))
        .route("/reviews", post(handlers::create_review))
        .route("/reviews/mentor", get(handlers::my_mentor_reviews))
        .route("/earnings/mentor", get(handlers::earnings_overview))
        .route("/earnings/withdraw", post(handlers::withdraw))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .with_state(state)
}
