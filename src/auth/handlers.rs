use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use super::extractors::AuthUser;
use super::repo_types::UserSummary;
use crate::error::{AppError, AppResult, Entity};
use crate::state::AppState;

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(me))
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<UserSummary>> {
    let user = state
        .store
        .find_user(user_id)
        .await?
        .ok_or(AppError::NotFound(Entity::User))?;
    Ok(Json(user))
}
