use axum::{
    extract::State,
    http::StatusCode,
    routing::{patch, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{CreateIngredientRequest, ListIngredientsQuery, UpdateIngredientRequest};
use super::repo_types::Ingredient;
use super::services;
use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::state::AppState;

pub fn ingredient_routes() -> Router<AppState> {
    Router::new()
        .route("/ingredients", post(create_ingredient).get(list_ingredients))
        .route("/ingredients/:id", patch(update_ingredient))
}

#[instrument(skip(state, body))]
pub async fn create_ingredient(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(body): AppJson<CreateIngredientRequest>,
) -> AppResult<(StatusCode, Json<Ingredient>)> {
    let ingredient = services::create_ingredient(&state, user_id, body).await?;
    Ok((StatusCode::CREATED, Json(ingredient)))
}

#[instrument(skip(state))]
pub async fn list_ingredients(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    AppQuery(q): AppQuery<ListIngredientsQuery>,
) -> AppResult<Json<Vec<Ingredient>>> {
    Ok(Json(services::list_ingredients(&state, q).await?))
}

#[instrument(skip(state, body))]
pub async fn update_ingredient(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<UpdateIngredientRequest>,
) -> AppResult<Json<Ingredient>> {
    Ok(Json(services::update_ingredient(&state, user_id, id, body).await?))
}
