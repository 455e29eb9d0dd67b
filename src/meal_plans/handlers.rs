use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{
    AddMealIngredientRequest, CreateMealPlanRequest, CreateMealRequest, MealDetails, MealFields,
    MealPlanDetails, UpdateMealPlanRequest,
};
use super::repo_types::{Meal, MealIngredient, MealPlan, MealPlanView};
use super::services;
use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::extract::{AppJson, AppPath};
use crate::groups::dto::SuccessResponse;
use crate::state::AppState;

pub fn meal_plan_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/groups/:id/meal-plans",
            post(create_meal_plan).get(meal_plans_by_group),
        )
        .route(
            "/meal-plans/:id",
            get(get_meal_plan)
                .patch(update_meal_plan)
                .delete(delete_meal_plan),
        )
}

pub fn meal_routes() -> Router<AppState> {
    Router::new()
        .route("/meal-plans/:id/meals", post(create_meal))
        .route(
            "/meals/:id",
            get(get_meal).patch(update_meal).delete(delete_meal),
        )
        .route("/meals/:id/ingredients", post(add_meal_ingredient))
        .route(
            "/meals/:id/ingredients/:ingredient_id",
            delete(remove_meal_ingredient),
        )
}

#[instrument(skip(state, body))]
pub async fn create_meal_plan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<CreateMealPlanRequest>,
) -> AppResult<(StatusCode, Json<MealPlan>)> {
    let plan = services::create_meal_plan(&state, user_id, id, body).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

#[instrument(skip(state))]
pub async fn meal_plans_by_group(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<Vec<MealPlanView>>> {
    Ok(Json(services::meal_plans_by_group(&state, user_id, id).await?))
}

#[instrument(skip(state))]
pub async fn get_meal_plan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<MealPlanDetails>> {
    Ok(Json(services::get_meal_plan(&state, user_id, id).await?))
}

#[instrument(skip(state, body))]
pub async fn update_meal_plan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<UpdateMealPlanRequest>,
) -> AppResult<Json<MealPlan>> {
    Ok(Json(services::update_meal_plan(&state, user_id, id, body).await?))
}

#[instrument(skip(state))]
pub async fn delete_meal_plan(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<SuccessResponse>> {
    services::delete_meal_plan(&state, user_id, id).await?;
    Ok(Json(SuccessResponse::OK))
}

#[instrument(skip(state, body))]
pub async fn create_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<CreateMealRequest>,
) -> AppResult<(StatusCode, Json<Meal>)> {
    let meal = services::create_meal(&state, user_id, id, body).await?;
    Ok((StatusCode::CREATED, Json(meal)))
}

#[instrument(skip(state))]
pub async fn get_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<MealDetails>> {
    Ok(Json(services::get_meal(&state, user_id, id).await?))
}

#[instrument(skip(state, body))]
pub async fn update_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<MealFields>,
) -> AppResult<Json<Meal>> {
    Ok(Json(services::update_meal(&state, user_id, id, body).await?))
}

#[instrument(skip(state))]
pub async fn delete_meal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<SuccessResponse>> {
    services::delete_meal(&state, user_id, id).await?;
    Ok(Json(SuccessResponse::OK))
}

#[instrument(skip(state))]
pub async fn add_meal_ingredient(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<AddMealIngredientRequest>,
) -> AppResult<(StatusCode, Json<MealIngredient>)> {
    let line = services::add_meal_ingredient(&state, user_id, id, body).await?;
    Ok((StatusCode::CREATED, Json(line)))
}

#[instrument(skip(state))]
pub async fn remove_meal_ingredient(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppPath((id, ingredient_id)): AppPath<(Uuid, Uuid)>,
) -> AppResult<Json<SuccessResponse>> {
    services::remove_meal_ingredient(&state, user_id, id, ingredient_id).await?;
    Ok(Json(SuccessResponse::OK))
}
