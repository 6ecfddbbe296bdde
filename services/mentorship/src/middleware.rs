use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};

use mentorlink_common::{ApiResponse, AppError};

use crate::AppState;

// Authentication middleware: validates the bearer token and stashes the
// claims in request extensions for the handlers.
pub async fn auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ApiResponse<()>>)> {
    let auth_header = headers
        .get("Authorization")
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "));

    let token = match auth_header {
        Some(token) => token,
        None => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::error(
                    "Missing or invalid authorization header".to_string(),
                )),
            ));
        }
    };

    let claims = match state.jwt_service.validate_token(token) {
        Ok(claims) => claims,
        Err(_) => {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(ApiResponse::error("Invalid or expired token".to_string())),
            ));
        }
    };

    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

/// Maps a domain error onto the wire shape used by every handler.
pub fn error_response(err: AppError) -> (StatusCode, Json<ApiResponse<()>>) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("request failed: {:?}", err);
        return (
            status,
            Json(ApiResponse::error("Internal server error".to_string())),
        );
    }

    let body = match err.details() {
        Some(details) => ApiResponse::error_with_details(err.to_string(), details),
        None => ApiResponse::error(err.to_string()),
    };

    (status, Json(body))
}

/// Per-field map for DTO validation failures.
pub fn validation_failure(
    errors: validator::ValidationErrors,
) -> (StatusCode, Json<ApiResponse<()>>) {
    let details = serde_json::to_value(&errors).unwrap_or(serde_json::Value::Null);
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ApiResponse::error_with_details(
            "Validation error".to_string(),
            details,
        )),
    )
}
