use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::{info, instrument};

use crate::{
    auth::dto::{
        ForgotPasswordRequest, LoginRequest, MessageResponse, RegisterRequest,
        ResetPasswordRequest, TokenResponse,
    },
    errors::AuthError,
    resets::services::ResetOutcome,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), AuthError> {
    let payload = payload.validate()?;
    let token = state
        .sessions
        .register(&payload.email, &payload.password)
        .await?;
    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AuthError> {
    let payload = payload.validate()?;
    let token = state.sessions.login(&payload.email, &payload.password).await?;
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    let payload = payload.validate()?;
    state.resets.request_reset(&payload.email).await?;
    Ok(Json(MessageResponse {
        message: "Email sent",
    }))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AuthError> {
    let payload = payload.validate()?;
    match state
        .resets
        .consume_reset(&payload.token, &payload.password)
        .await?
    {
        ResetOutcome::Updated => Ok((
            StatusCode::CREATED,
            Json(MessageResponse {
                message: "Password updated",
            }),
        )),
        ResetOutcome::Expired => {
            info!("reset attempted with outdated token");
            Ok((
                StatusCode::BAD_REQUEST,
                Json(MessageResponse {
                    message: "Token is outdated",
                }),
            ))
        }
    }
}
