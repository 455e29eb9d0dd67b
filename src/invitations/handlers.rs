use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{CleanupResponse, CreateInvitationRequest, RespondRequest, RespondResponse};
use super::repo_types::{GroupInvitation, GroupInvitationView, MyInvitationView};
use super::services;
use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::extract::{AppJson, AppPath};
use crate::groups::dto::SuccessResponse;
use crate::state::AppState;

pub fn invitation_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/groups/:id/invitations",
            post(create_invitation).get(group_invitations),
        )
        .route("/invitations", get(my_invitations))
        .route("/invitations/:id/respond", post(respond_to_invitation))
        .route("/invitations/:id/cancel", post(cancel_invitation))
        .route("/invitations/cleanup", post(cleanup_expired_invitations))
}

#[instrument(skip(state, body))]
pub async fn create_invitation(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<CreateInvitationRequest>,
) -> AppResult<(StatusCode, Json<GroupInvitation>)> {
    let invitation = services::create_invitation(&state, user_id, id, body).await?;
    Ok((StatusCode::CREATED, Json(invitation)))
}

#[instrument(skip(state))]
pub async fn group_invitations(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<Vec<GroupInvitationView>>> {
    Ok(Json(services::group_invitations(&state, user_id, id).await?))
}

#[instrument(skip(state))]
pub async fn my_invitations(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Vec<MyInvitationView>>> {
    Ok(Json(services::my_invitations(&state, user_id).await?))
}

#[instrument(skip(state))]
pub async fn respond_to_invitation(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<RespondRequest>,
) -> AppResult<Json<RespondResponse>> {
    Ok(Json(
        services::respond_to_invitation(&state, user_id, id, body.action).await?,
    ))
}

#[instrument(skip(state))]
pub async fn cancel_invitation(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<SuccessResponse>> {
    services::cancel_invitation(&state, user_id, id).await?;
    Ok(Json(SuccessResponse::OK))
}

#[instrument(skip(state))]
pub async fn cleanup_expired_invitations(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
) -> AppResult<Json<CleanupResponse>> {
    let expired_count = services::cleanup_expired_invitations(&state).await?;
    Ok(Json(CleanupResponse {
        success: true,
        expired_count,
    }))
}
