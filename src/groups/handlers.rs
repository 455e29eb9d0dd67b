use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{
    AddMemberRequest, CreateGroupRequest, GroupDetails, SearchUsersQuery, SuccessResponse,
    UpdateGroupRequest, UpdateMemberRoleRequest,
};
use super::repo_types::{Group, GroupMember, MyGroup};
use super::services;
use crate::auth::{repo_types::UserSummary, AuthUser};
use crate::error::AppResult;
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::state::AppState;

pub fn group_routes() -> Router<AppState> {
    Router::new()
        .route("/groups", post(create_group).get(my_groups))
        .route(
            "/groups/:id",
            get(get_group).patch(update_group).delete(delete_group),
        )
        .route("/groups/:id/user-search", get(search_users))
}

pub fn member_routes() -> Router<AppState> {
    Router::new()
        .route("/groups/:id/members", post(add_member))
        .route(
            "/groups/:id/members/:user_id",
            axum::routing::patch(update_member_role).delete(remove_member),
        )
        .route("/groups/:id/leave", post(leave_group))
}

#[instrument(skip(state, body))]
pub async fn create_group(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(body): AppJson<CreateGroupRequest>,
) -> AppResult<(StatusCode, Json<Group>)> {
    let group = services::create_group(&state, user_id, body).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

#[instrument(skip(state))]
pub async fn my_groups(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Vec<MyGroup>>> {
    Ok(Json(services::my_groups(&state, user_id).await?))
}

#[instrument(skip(state))]
pub async fn get_group(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<GroupDetails>> {
    Ok(Json(services::get_group(&state, user_id, id).await?))
}

#[instrument(skip(state, body))]
pub async fn update_group(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<UpdateGroupRequest>,
) -> AppResult<Json<Group>> {
    Ok(Json(services::update_group(&state, user_id, id, body).await?))
}

#[instrument(skip(state))]
pub async fn delete_group(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<SuccessResponse>> {
    services::delete_group(&state, user_id, id).await?;
    Ok(Json(SuccessResponse::OK))
}

#[instrument(skip(state))]
pub async fn add_member(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<AddMemberRequest>,
) -> AppResult<(StatusCode, Json<GroupMember>)> {
    let member = services::add_member(&state, user_id, id, body).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

#[instrument(skip(state))]
pub async fn update_member_role(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath((id, target)): AppPath<(Uuid, Uuid)>,
    AppJson(body): AppJson<UpdateMemberRoleRequest>,
) -> AppResult<Json<GroupMember>> {
    Ok(Json(
        services::update_member_role(&state, user_id, id, target, body.role).await?,
    ))
}

#[instrument(skip(state))]
pub async fn remove_member(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath((id, target)): AppPath<(Uuid, Uuid)>,
) -> AppResult<Json<SuccessResponse>> {
    services::remove_member(&state, user_id, id, target).await?;
    Ok(Json(SuccessResponse::OK))
}

#[instrument(skip(state))]
pub async fn leave_group(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<SuccessResponse>> {
    services::leave_group(&state, user_id, id).await?;
    Ok(Json(SuccessResponse::OK))
}

#[instrument(skip(state))]
pub async fn search_users(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppQuery(q): AppQuery<SearchUsersQuery>,
) -> AppResult<Json<Vec<UserSummary>>> {
    Ok(Json(services::search_users(&state, user_id, id, q).await?))
}
