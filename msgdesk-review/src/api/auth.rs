//! Bearer-token authentication and the register/login endpoints
//!
//! Protected routes require `Authorization: Bearer <token>` where the token
//! was issued by `POST /api/auth/login`. When auth is disabled in
//! configuration every request passes through unchecked.

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use msgdesk_common::api::{parse_bearer, AuthError, Credentials, TokenResponse};
use serde_json::json;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Username resolved from the bearer token, stored in request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

/// Authentication middleware for protected routes
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.auth_enabled {
        return Ok(next.run(request).await);
    }

    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingToken)?;
    let token = parse_bearer(header_value)?;

    let username = state.tokens.validate(token).map_err(|e| {
        warn!(error = %e, "Rejected bearer token");
        e
    })?;

    request.extensions_mut().insert(AuthenticatedUser(username));
    Ok(next.run(request).await)
}

fn credentials(body: Result<Json<Credentials>, JsonRejection>) -> ApiResult<Credentials> {
    body.map(|Json(c)| c)
        .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e.body_text())))
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let creds = credentials(body)?;
    let (username, password) = creds.complete().ok_or(AuthError::MissingFields)?;

    state.users.register(username, password)?;
    info!(username, "Registered user");

    Ok((
        StatusCode::CREATED,
        Json(json!({"success": true, "message": "User registered successfully"})),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<Credentials>, JsonRejection>,
) -> ApiResult<Json<TokenResponse>> {
    let creds = credentials(body)?;
    let (username, password) = creds.complete().ok_or(AuthError::MissingFields)?;

    state.users.verify(username, password).map_err(|e| {
        warn!(username, "Failed login");
        e
    })?;

    let token = state.tokens.issue(username);
    info!(username, "Issued access token");
    Ok(Json(TokenResponse::bearer(token)))
}
