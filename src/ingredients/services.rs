use tracing::info;
use uuid::Uuid;

use super::dto::{CreateIngredientRequest, ListIngredientsQuery, UpdateIngredientRequest};
use super::repo_types::Ingredient;
use crate::error::{AppError, AppResult, Entity, Forbidden};
use crate::state::AppState;

pub async fn create_ingredient(
    state: &AppState,
    user_id: Uuid,
    input: CreateIngredientRequest,
) -> AppResult<Ingredient> {
    input.validate()?;
    let now = state.clock.now();
    let ingredient = Ingredient {
        id: Uuid::new_v4(),
        name: input.name,
        description: input.description,
        category: input.category,
        unit: input.unit,
        calories_per_unit: input.calories_per_unit,
        protein_per_unit: input.protein_per_unit,
        carbs_per_unit: input.carbs_per_unit,
        fat_per_unit: input.fat_per_unit,
        created_by: user_id,
        created_at: now,
        updated_at: now,
    };
    state.store.insert_ingredient(&ingredient).await?;
    info!(ingredient_id = %ingredient.id, "ingredient created");
    Ok(ingredient)
}

pub async fn list_ingredients(
    state: &AppState,
    query: ListIngredientsQuery,
) -> AppResult<Vec<Ingredient>> {
    query.validate()?;
    Ok(state.store.list_ingredients(&query.into_filter()).await?)
}

/// Only the user who created an ingredient may change it.
pub async fn update_ingredient(
    state: &AppState,
    user_id: Uuid,
    ingredient_id: Uuid,
    input: UpdateIngredientRequest,
) -> AppResult<Ingredient> {
    input.validate()?;
    let existing = state
        .store
        .find_ingredient(ingredient_id)
        .await?
        .ok_or(AppError::NotFound(Entity::Ingredient))?;
    if existing.created_by != user_id {
        return Err(Forbidden::NotOwner.into());
    }
    state
        .store
        .update_ingredient(ingredient_id, &input.into_patch(), state.clock.now())
        .await?
        .ok_or(AppError::NotFound(Entity::Ingredient))
}
