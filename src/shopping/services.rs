use tracing::info;
use uuid::Uuid;

use super::aggregate::aggregate_ingredients;
use super::dto::{AddItemRequest, ShoppingListDetails, ShoppingListNameRequest};
use super::repo_types::{ShoppingList, ShoppingListItem};
use crate::error::{AppError, AppResult, Entity};
use crate::meal_plans::authz::check_meal_plan_permission;
use crate::roles::Role;
use crate::state::AppState;

fn new_list(state: &AppState, user_id: Uuid, meal_plan_id: Uuid, name: String) -> ShoppingList {
    let now = state.clock.now();
    ShoppingList {
        id: Uuid::new_v4(),
        meal_plan_id,
        name,
        created_by: user_id,
        is_completed: false,
        created_at: now,
        updated_at: now,
    }
}

pub async fn create_shopping_list(
    state: &AppState,
    user_id: Uuid,
    meal_plan_id: Uuid,
    input: ShoppingListNameRequest,
) -> AppResult<ShoppingList> {
    input.validate()?;
    check_meal_plan_permission(state, user_id, meal_plan_id, Role::Member).await?;
    let list = new_list(state, user_id, meal_plan_id, input.name);
    state.store.insert_shopping_list(&list, &[]).await?;
    Ok(list)
}

pub async fn shopping_lists_by_plan(
    state: &AppState,
    user_id: Uuid,
    meal_plan_id: Uuid,
) -> AppResult<Vec<ShoppingList>> {
    check_meal_plan_permission(state, user_id, meal_plan_id, Role::Member).await?;
    Ok(state.store.list_shopping_lists(meal_plan_id).await?)
}

async fn list_with_permission(
    state: &AppState,
    user_id: Uuid,
    list_id: Uuid,
) -> AppResult<ShoppingList> {
    let list = state
        .store
        .find_shopping_list(list_id)
        .await?
        .ok_or(AppError::NotFound(Entity::ShoppingList))?;
    check_meal_plan_permission(state, user_id, list.meal_plan_id, Role::Member).await?;
    Ok(list)
}

pub async fn get_shopping_list(
    state: &AppState,
    user_id: Uuid,
    list_id: Uuid,
) -> AppResult<ShoppingListDetails> {
    let list = list_with_permission(state, user_id, list_id).await?;
    let items = state.store.list_shopping_list_items(list_id).await?;
    Ok(ShoppingListDetails { list, items })
}

pub async fn add_shopping_list_item(
    state: &AppState,
    user_id: Uuid,
    list_id: Uuid,
    input: AddItemRequest,
) -> AppResult<ShoppingListItem> {
    input.validate()?;
    list_with_permission(state, user_id, list_id).await?;
    let now = state.clock.now();
    let item = ShoppingListItem {
        id: Uuid::new_v4(),
        shopping_list_id: list_id,
        ingredient_id: input.ingredient_id,
        name: input.name,
        quantity: input.quantity,
        unit: input.unit,
        is_completed: false,
        notes: input.notes,
        added_by: user_id,
        created_at: now,
        updated_at: now,
    };
    state.store.insert_shopping_list_item(&item).await?;
    Ok(item)
}

async fn item_with_permission(state: &AppState, user_id: Uuid, item_id: Uuid) -> AppResult<()> {
    let (_, meal_plan_id) = state
        .store
        .find_shopping_list_item(item_id)
        .await?
        .ok_or(AppError::NotFound(Entity::ShoppingListItem))?;
    check_meal_plan_permission(state, user_id, meal_plan_id, Role::Member).await?;
    Ok(())
}

pub async fn toggle_shopping_list_item(
    state: &AppState,
    user_id: Uuid,
    item_id: Uuid,
) -> AppResult<ShoppingListItem> {
    item_with_permission(state, user_id, item_id).await?;
    state
        .store
        .toggle_shopping_list_item(item_id, state.clock.now())
        .await?
        .ok_or(AppError::NotFound(Entity::ShoppingListItem))
}

pub async fn delete_shopping_list_item(
    state: &AppState,
    user_id: Uuid,
    item_id: Uuid,
) -> AppResult<()> {
    item_with_permission(state, user_id, item_id).await?;
    if !state.store.delete_shopping_list_item(item_id).await? {
        return Err(AppError::NotFound(Entity::ShoppingListItem));
    }
    Ok(())
}

/// Build a list holding every ingredient of every meal in the plan, summed per ingredient.
pub async fn generate_shopping_list(
    state: &AppState,
    user_id: Uuid,
    meal_plan_id: Uuid,
    input: ShoppingListNameRequest,
) -> AppResult<ShoppingListDetails> {
    input.validate()?;
    check_meal_plan_permission(state, user_id, meal_plan_id, Role::Member).await?;

    let rows = state.store.plan_ingredient_rows(meal_plan_id).await?;
    let list = new_list(state, user_id, meal_plan_id, input.name);
    // Items are listed by creation time, so each one is stamped a microsecond
    // after the previous to keep aggregation order.
    let items: Vec<ShoppingListItem> = aggregate_ingredients(&rows)
        .into_iter()
        .enumerate()
        .map(|(i, a)| {
            let stamped = list.created_at + time::Duration::microseconds(i as i64);
            ShoppingListItem {
                id: Uuid::new_v4(),
                shopping_list_id: list.id,
                ingredient_id: Some(a.ingredient_id),
                name: a.name,
                quantity: a.quantity,
                unit: a.unit,
                is_completed: false,
                notes: None,
                added_by: user_id,
                created_at: stamped,
                updated_at: stamped,
            }
        })
        .collect();
    state.store.insert_shopping_list(&list, &items).await?;
    info!(
        shopping_list_id = %list.id,
        %meal_plan_id,
        items = items.len(),
        "shopping list generated"
    );
    Ok(ShoppingListDetails { list, items })
}
