//! Fixtures for service and router tests.
use std::sync::Arc;

use time::macros::datetime;
use uuid::Uuid;

use crate::auth::repo_types::UserSummary;
use crate::clock::{Clock, ManualClock};
use crate::error::AppError;
use crate::groups::repo_types::GroupMember;
use crate::roles::Role;
use crate::state::{test_config, AppState};
use crate::store::MemoryStore;

/// Ids of every row hanging off one meal plan.
pub struct PlanContents {
    pub plan: Uuid,
    pub meal: Uuid,
    pub ingredient: Uuid,
    pub generated_list: Uuid,
    pub generated_item: Uuid,
    pub manual_list: Uuid,
    pub manual_item: Uuid,
}

pub struct Fixture {
    pub state: AppState,
    pub clock: Arc<ManualClock>,
}

impl Fixture {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(datetime!(2024-03-01 09:00 UTC)));
        let state = AppState::from_parts(
            Arc::new(MemoryStore::new()),
            Arc::new(test_config()),
            clock.clone(),
        );
        Self { state, clock }
    }

    /// Insert a user named `name` and return its id.
    pub async fn user(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state
            .store
            .insert_user(&UserSummary {
                id,
                name: name.into(),
                email: format!("{id}@example.com"),
                username: None,
                image: None,
            })
            .await
            .expect("insert user");
        id
    }

    /// Create a group through the service so `admin` ends up its sole admin.
    pub async fn group(&self, admin: Uuid) -> Uuid {
        let input = crate::groups::dto::CreateGroupRequest {
            name: "Flatmates".into(),
            description: None,
        };
        crate::groups::services::create_group(&self.state, admin, input)
            .await
            .expect("create group")
            .id
    }

    /// Put `user_id` straight into the group with `role`.
    pub async fn join(&self, group_id: Uuid, user_id: Uuid, role: Role) {
        let now = self.clock.now();
        self.state
            .store
            .insert_member(&GroupMember {
                id: Uuid::new_v4(),
                group_id,
                user_id,
                role,
                joined_at: now,
                updated_at: now,
            })
            .await
            .expect("insert member");
    }

    pub async fn role_of(&self, group_id: Uuid, user_id: Uuid) -> Option<Role> {
        self.state
            .store
            .find_member(group_id, user_id)
            .await
            .expect("find member")
            .map(|m| m.role)
    }

    pub async fn admin_count(&self, group_id: Uuid) -> usize {
        self.state
            .store
            .list_members(group_id)
            .await
            .expect("list members")
            .iter()
            .filter(|m| m.role == Role::Admin)
            .count()
    }
}

impl Fixture {
    /// A plan in `group` with one meal, one ingredient line, a generated list and a
    /// hand-made list with one item.
    pub async fn filled_plan(&self, admin: Uuid, group: Uuid) -> PlanContents {
        use crate::ingredients::dto::CreateIngredientRequest;
        use crate::meal_plans::dto::{
            AddMealIngredientRequest, CreateMealPlanRequest, CreateMealRequest, MealFields,
        };
        use crate::shopping::dto::{AddItemRequest, ShoppingListNameRequest};
        use crate::{ingredients, meal_plans, shopping};

        let state = &self.state;
        let plan = meal_plans::services::create_meal_plan(
            state,
            admin,
            group,
            CreateMealPlanRequest {
                name: "Week".into(),
                description: None,
                start_date: None,
                end_date: None,
            },
        )
        .await
        .expect("create plan")
        .id;
        let meal = meal_plans::services::create_meal(
            state,
            admin,
            plan,
            CreateMealRequest {
                name: "Pilaf".into(),
                fields: MealFields::default(),
            },
        )
        .await
        .expect("create meal")
        .id;
        let ingredient = ingredients::services::create_ingredient(
            state,
            admin,
            CreateIngredientRequest {
                name: format!("Rice {plan}"),
                unit: Some("cup".into()),
                ..CreateIngredientRequest::default()
            },
        )
        .await
        .expect("create ingredient")
        .id;
        meal_plans::services::add_meal_ingredient(
            state,
            admin,
            meal,
            AddMealIngredientRequest {
                ingredient_id: ingredient,
                quantity: 2.0,
                unit: Some("cup".into()),
                notes: None,
            },
        )
        .await
        .expect("add line");
        let generated = shopping::services::generate_shopping_list(
            state,
            admin,
            plan,
            ShoppingListNameRequest {
                name: "Generated".into(),
            },
        )
        .await
        .expect("generate list");
        let manual_list = shopping::services::create_shopping_list(
            state,
            admin,
            plan,
            ShoppingListNameRequest {
                name: "Extras".into(),
            },
        )
        .await
        .expect("create list")
        .id;
        let manual_item = shopping::services::add_shopping_list_item(
            state,
            admin,
            manual_list,
            AddItemRequest {
                name: "Milk".into(),
                quantity: 1.0,
                unit: Some("l".into()),
                notes: None,
                ingredient_id: None,
            },
        )
        .await
        .expect("add item")
        .id;

        PlanContents {
            plan,
            meal,
            ingredient,
            generated_list: generated.list.id,
            generated_item: generated.items[0].id,
            manual_list,
            manual_item,
        }
    }

    /// Names of the rows from `contents` still in the store.
    pub async fn surviving(&self, contents: &PlanContents) -> Vec<&'static str> {
        let store = &self.state.store;
        let mut left = Vec::new();
        if store.find_meal_plan_view(contents.plan).await.expect("find plan").is_some() {
            left.push("meal plan");
        }
        if store.find_meal(contents.meal).await.expect("find meal").is_some() {
            left.push("meal");
        }
        if store
            .find_meal_ingredient(contents.meal, contents.ingredient)
            .await
            .expect("find line")
            .is_some()
        {
            left.push("meal ingredient");
        }
        for (list, item, list_label, item_label) in [
            (
                contents.generated_list,
                contents.generated_item,
                "generated list",
                "generated item",
            ),
            (
                contents.manual_list,
                contents.manual_item,
                "manual list",
                "manual item",
            ),
        ] {
            if store.find_shopping_list(list).await.expect("find list").is_some() {
                left.push(list_label);
            }
            let has_items = !store
                .list_shopping_list_items(list)
                .await
                .expect("list items")
                .is_empty();
            if has_items || store.find_shopping_list_item(item).await.expect("find item").is_some() {
                left.push(item_label);
            }
        }
        left
    }
}

/// Status code of an error, for terse assertions.
pub fn status(err: &AppError) -> u16 {
    err.status_code().as_u16()
}
