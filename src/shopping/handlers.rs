use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{AddItemRequest, ShoppingListDetails, ShoppingListNameRequest};
use super::repo_types::{ShoppingList, ShoppingListItem};
use super::services;
use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::extract::{AppJson, AppPath};
use crate::groups::dto::SuccessResponse;
use crate::state::AppState;

pub fn shopping_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/meal-plans/:id/shopping-lists",
            post(create_shopping_list).get(shopping_lists_by_plan),
        )
        .route(
            "/meal-plans/:id/shopping-lists/generate",
            post(generate_shopping_list),
        )
        .route("/shopping-lists/:id", get(get_shopping_list))
        .route("/shopping-lists/:id/items", post(add_shopping_list_item))
        .route(
            "/shopping-list-items/:id/toggle",
            post(toggle_shopping_list_item),
        )
        .route("/shopping-list-items/:id", delete(delete_shopping_list_item))
}

#[instrument(skip(state))]
pub async fn create_shopping_list(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<ShoppingListNameRequest>,
) -> AppResult<(StatusCode, Json<ShoppingList>)> {
    let list = services::create_shopping_list(&state, user_id, id, body).await?;
    Ok((StatusCode::CREATED, Json(list)))
}

#[instrument(skip(state))]
pub async fn shopping_lists_by_plan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<Vec<ShoppingList>>> {
    Ok(Json(services::shopping_lists_by_plan(&state, user_id, id).await?))
}

#[instrument(skip(state))]
pub async fn generate_shopping_list(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<ShoppingListNameRequest>,
) -> AppResult<(StatusCode, Json<ShoppingListDetails>)> {
    let generated = services::generate_shopping_list(&state, user_id, id, body).await?;
    Ok((StatusCode::CREATED, Json(generated)))
}

#[instrument(skip(state))]
pub async fn get_shopping_list(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ShoppingListDetails>> {
    Ok(Json(services::get_shopping_list(&state, user_id, id).await?))
}

#[instrument(skip(state))]
pub async fn add_shopping_list_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<AddItemRequest>,
) -> AppResult<(StatusCode, Json<ShoppingListItem>)> {
    let item = services::add_shopping_list_item(&state, user_id, id, body).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

#[instrument(skip(state))]
pub async fn toggle_shopping_list_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<ShoppingListItem>> {
    Ok(Json(
        services::toggle_shopping_list_item(&state, user_id, id).await?,
    ))
}

#[instrument(skip(state))]
pub async fn delete_shopping_list_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<SuccessResponse>> {
    services::delete_shopping_list_item(&state, user_id, id).await?;
    Ok(Json(SuccessResponse::OK))
}
