use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    accounts::{
        dto::{PublicUser, UpdateEmailRequest, UsersResponse},
        repo_types::User,
    },
    auth::{
        dto::{check_email, normalize_email},
        extractors::CurrentUser,
        policy::ensure_can_access,
    },
    errors::AuthError,
    state::AppState,
};

pub fn users_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id", get(get_user).put(update_user).delete(delete_user))
}

async fn load_target(state: &AppState, subject: &User, id: Uuid) -> Result<User, AuthError> {
    let target = state
        .credentials
        .find_by_id(id)
        .await?
        .ok_or(AuthError::AccountNotFound)?;
    ensure_can_access(subject, &target)?;
    Ok(target)
}

#[instrument(skip(state, _subject))]
pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(_subject): CurrentUser,
) -> Result<Json<UsersResponse>, AuthError> {
    let users = state.credentials.list().await?;
    Ok(Json(UsersResponse {
        users: users.into_iter().map(|u| u.email).collect(),
    }))
}

#[instrument(skip(state, subject), fields(subject_id = %subject.id))]
pub async fn get_user(
    State(state): State<AppState>,
    CurrentUser(subject): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicUser>, AuthError> {
    let target = load_target(&state, &subject, id).await?;
    Ok(Json(target.into()))
}

#[instrument(skip(state, subject, payload), fields(subject_id = %subject.id))]
pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(subject): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateEmailRequest>,
) -> Result<Json<PublicUser>, AuthError> {
    let target = load_target(&state, &subject, id).await?;

    let current = normalize_email(&payload.email);
    let new_email = normalize_email(&payload.new_email);
    check_email("email", &current)?;
    check_email("new_email", &new_email)?;

    let updated = state
        .sessions
        .update_own_email(&target, &current, &new_email)
        .await?;
    Ok(Json(updated.into()))
}

#[instrument(skip(state, subject), fields(subject_id = %subject.id))]
pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(subject): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PublicUser>, AuthError> {
    let target = load_target(&state, &subject, id).await?;
    let closed = state.accounts.deactivate(&target).await?;
    Ok(Json(closed.into()))
}
