use crate::state::AppState;
use axum::Router;

pub mod credentials;
mod dto;
pub mod handlers;
pub mod lifecycle;
pub mod repo;
pub mod repo_types;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::users_routes())
}
