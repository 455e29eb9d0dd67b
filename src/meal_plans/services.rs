use tracing::info;
use uuid::Uuid;

use super::authz::check_meal_plan_permission;
use super::dto::{
    AddMealIngredientRequest, CreateMealPlanRequest, CreateMealRequest, MealDetails, MealFields,
    MealPlanDetails, UpdateMealPlanRequest,
};
use super::repo_types::{Meal, MealIngredient, MealPlan, MealPlanView};
use crate::error::{AppError, AppResult, Conflict, Entity};
use crate::groups::authz::check_group_permission;
use crate::roles::Role;
use crate::state::AppState;

pub async fn create_meal_plan(
    state: &AppState,
    user_id: Uuid,
    group_id: Uuid,
    input: CreateMealPlanRequest,
) -> AppResult<MealPlan> {
    input.validate()?;
    check_group_permission(state, user_id, group_id, Role::Member).await?;
    let now = state.clock.now();
    let plan = MealPlan {
        id: Uuid::new_v4(),
        name: input.name,
        description: input.description,
        group_id,
        created_by: user_id,
        start_date: input.start_date,
        end_date: input.end_date,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    state.store.insert_meal_plan(&plan).await?;
    info!(meal_plan_id = %plan.id, %group_id, "meal plan created");
    Ok(plan)
}

pub async fn meal_plans_by_group(
    state: &AppState,
    user_id: Uuid,
    group_id: Uuid,
) -> AppResult<Vec<MealPlanView>> {
    check_group_permission(state, user_id, group_id, Role::Member).await?;
    Ok(state.store.list_meal_plans(group_id).await?)
}

pub async fn get_meal_plan(
    state: &AppState,
    user_id: Uuid,
    meal_plan_id: Uuid,
) -> AppResult<MealPlanDetails> {
    check_meal_plan_permission(state, user_id, meal_plan_id, Role::Member).await?;
    let plan = state
        .store
        .find_meal_plan_view(meal_plan_id)
        .await?
        .ok_or(AppError::NotFound(Entity::MealPlan))?;
    let meals = state.store.list_meals(meal_plan_id).await?;
    Ok(MealPlanDetails { plan, meals })
}

pub async fn update_meal_plan(
    state: &AppState,
    user_id: Uuid,
    meal_plan_id: Uuid,
    input: UpdateMealPlanRequest,
) -> AppResult<MealPlan> {
    let (current, _) =
        check_meal_plan_permission(state, user_id, meal_plan_id, Role::Moderator).await?;
    input.validate((current.start_date, current.end_date))?;
    state
        .store
        .update_meal_plan(meal_plan_id, &input.into_patch(), state.clock.now())
        .await?
        .ok_or(AppError::NotFound(Entity::MealPlan))
}

pub async fn delete_meal_plan(
    state: &AppState,
    user_id: Uuid,
    meal_plan_id: Uuid,
) -> AppResult<()> {
    check_meal_plan_permission(state, user_id, meal_plan_id, Role::Admin).await?;
    if !state.store.delete_meal_plan(meal_plan_id).await? {
        return Err(AppError::NotFound(Entity::MealPlan));
    }
    info!(%meal_plan_id, %user_id, "meal plan deleted");
    Ok(())
}

pub async fn create_meal(
    state: &AppState,
    user_id: Uuid,
    meal_plan_id: Uuid,
    input: CreateMealRequest,
) -> AppResult<Meal> {
    input.validate()?;
    check_meal_plan_permission(state, user_id, meal_plan_id, Role::Member).await?;
    let now = state.clock.now();
    let MealFields {
        description,
        instructions,
        prep_time,
        cook_time,
        servings,
        meal_type,
        day_of_week,
        planned_date,
        ..
    } = input.fields;
    let meal = Meal {
        id: Uuid::new_v4(),
        meal_plan_id,
        name: input.name,
        description,
        instructions,
        prep_time,
        cook_time,
        servings,
        meal_type,
        day_of_week,
        planned_date,
        created_by: user_id,
        created_at: now,
        updated_at: now,
    };
    state.store.insert_meal(&meal).await?;
    Ok(meal)
}

/// Look up a meal and check the caller's role on the plan it is stored under.
async fn meal_with_permission(
    state: &AppState,
    user_id: Uuid,
    meal_id: Uuid,
    required: Role,
) -> AppResult<Meal> {
    let meal = state
        .store
        .find_meal(meal_id)
        .await?
        .ok_or(AppError::NotFound(Entity::Meal))?;
    check_meal_plan_permission(state, user_id, meal.meal_plan_id, required).await?;
    Ok(meal)
}

pub async fn get_meal(state: &AppState, user_id: Uuid, meal_id: Uuid) -> AppResult<MealDetails> {
    let meal = meal_with_permission(state, user_id, meal_id, Role::Member).await?;
    let ingredients = state.store.list_meal_ingredients(meal_id).await?;
    Ok(MealDetails { meal, ingredients })
}

pub async fn update_meal(
    state: &AppState,
    user_id: Uuid,
    meal_id: Uuid,
    input: MealFields,
) -> AppResult<Meal> {
    input.validate()?;
    meal_with_permission(state, user_id, meal_id, Role::Moderator).await?;
    state
        .store
        .update_meal(meal_id, &input.into_patch(), state.clock.now())
        .await?
        .ok_or(AppError::NotFound(Entity::Meal))
}

pub async fn delete_meal(state: &AppState, user_id: Uuid, meal_id: Uuid) -> AppResult<()> {
    meal_with_permission(state, user_id, meal_id, Role::Moderator).await?;
    if !state.store.delete_meal(meal_id).await? {
        return Err(AppError::NotFound(Entity::Meal));
    }
    Ok(())
}

pub async fn add_meal_ingredient(
    state: &AppState,
    user_id: Uuid,
    meal_id: Uuid,
    input: AddMealIngredientRequest,
) -> AppResult<MealIngredient> {
    input.validate()?;
    meal_with_permission(state, user_id, meal_id, Role::Member).await?;
    if state.store.find_ingredient(input.ingredient_id).await?.is_none() {
        return Err(AppError::NotFound(Entity::Ingredient));
    }
    if state
        .store
        .find_meal_ingredient(meal_id, input.ingredient_id)
        .await?
        .is_some()
    {
        return Err(Conflict::DuplicateIngredient.into());
    }
    let line = MealIngredient {
        id: Uuid::new_v4(),
        meal_id,
        ingredient_id: input.ingredient_id,
        quantity: input.quantity,
        unit: input.unit,
        notes: input.notes,
        created_at: state.clock.now(),
    };
    state
        .store
        .insert_meal_ingredient(&line)
        .await
        .map_err(|e| e.or_conflict(Conflict::DuplicateIngredient))?;
    Ok(line)
}

pub async fn remove_meal_ingredient(
    state: &AppState,
    user_id: Uuid,
    meal_id: Uuid,
    ingredient_id: Uuid,
) -> AppResult<()> {
    meal_with_permission(state, user_id, meal_id, Role::Member).await?;
    if !state
        .store
        .delete_meal_ingredient(meal_id, ingredient_id)
        .await?
    {
        return Err(AppError::NotFound(Entity::Ingredient));
    }
    Ok(())
}
