//! Persistence behind the services.
//!
//! Every operation that writes more than one row is a single method here so that each
//! backend can run it as one unit of work: Postgres inside a transaction, the memory
//! store under one write lock.
use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::UserSummary;
use crate::groups::repo_types::{Group, GroupMember, GroupPatch, MemberChange, MemberView, MyGroup};
use crate::ingredients::repo_types::{Ingredient, IngredientFilter, IngredientPatch};
use crate::invitations::repo_types::{
    GroupInvitation, GroupInvitationView, InvitationStatus, MyInvitationView,
};
use crate::meal_plans::repo_types::{
    Meal, MealIngredient, MealIngredientView, MealPatch, MealPlan, MealPlanPatch, MealPlanView,
    PlanIngredientRow,
};
use crate::roles::Role;
use crate::shopping::repo_types::{ShoppingList, ShoppingListItem};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn insert_user(&self, user: &UserSummary) -> StoreResult<()>;

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<UserSummary>>;

    /// Users whose name contains `query`, skipping members of `exclude_group`.
    async fn search_users(
        &self,
        query: &str,
        exclude_group: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<UserSummary>>;
}

#[async_trait]
pub trait GroupRepo: Send + Sync {
    /// Insert the group and its creator's admin membership together.
    async fn create_group(&self, group: &Group, admin: &GroupMember) -> StoreResult<()>;

    async fn find_group(&self, id: Uuid) -> StoreResult<Option<Group>>;

    /// Groups `user_id` belongs to, newest group first.
    async fn list_groups_for_user(&self, user_id: Uuid) -> StoreResult<Vec<MyGroup>>;

    async fn update_group(
        &self,
        id: Uuid,
        patch: &GroupPatch,
        now: OffsetDateTime,
    ) -> StoreResult<Option<Group>>;

    /// Delete the group and everything that hangs off it.
    async fn delete_group(&self, id: Uuid) -> StoreResult<bool>;

    async fn find_member(&self, group_id: Uuid, user_id: Uuid) -> StoreResult<Option<GroupMember>>;

    /// Members ordered by join date.
    async fn list_members(&self, group_id: Uuid) -> StoreResult<Vec<MemberView>>;

    async fn insert_member(&self, member: &GroupMember) -> StoreResult<()>;

    /// Change a member's role unless the member is the group's only admin.
    async fn update_member_role(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        role: Role,
        now: OffsetDateTime,
    ) -> StoreResult<MemberChange<GroupMember>>;

    /// Delete a membership unless the member is the group's only admin.
    async fn remove_member(&self, group_id: Uuid, user_id: Uuid) -> StoreResult<MemberChange<()>>;
}

#[async_trait]
pub trait InvitationRepo: Send + Sync {
    async fn insert_invitation(&self, invitation: &GroupInvitation) -> StoreResult<()>;

    async fn find_invitation(&self, id: Uuid) -> StoreResult<Option<GroupInvitation>>;

    async fn find_pending_invitation(
        &self,
        group_id: Uuid,
        invited_user_id: Uuid,
    ) -> StoreResult<Option<GroupInvitation>>;

    /// Pending invitations of a group, newest first.
    async fn list_group_invitations(&self, group_id: Uuid) -> StoreResult<Vec<GroupInvitationView>>;

    /// Pending invitations addressed to a user, newest first.
    async fn list_user_invitations(&self, user_id: Uuid) -> StoreResult<Vec<MyInvitationView>>;

    /// Move an invitation from `from` to `to`. Returns false when it was not in `from`.
    async fn transition_invitation(
        &self,
        id: Uuid,
        from: InvitationStatus,
        to: InvitationStatus,
        now: OffsetDateTime,
    ) -> StoreResult<bool>;

    /// Mark a pending invitation accepted and insert the membership it grants.
    /// Returns false, writing nothing, when the invitation is no longer pending.
    async fn accept_invitation(
        &self,
        invitation_id: Uuid,
        member: &GroupMember,
        now: OffsetDateTime,
    ) -> StoreResult<bool>;

    /// Expire every pending invitation whose deadline is before `now`.
    async fn expire_invitations(&self, now: OffsetDateTime) -> StoreResult<u64>;
}

#[async_trait]
pub trait MealPlanRepo: Send + Sync {
    async fn insert_meal_plan(&self, plan: &MealPlan) -> StoreResult<()>;

    /// The plan together with `user_id`'s membership in the plan's group.
    async fn find_meal_plan_access(
        &self,
        plan_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<(MealPlan, GroupMember)>>;

    async fn find_meal_plan_view(&self, id: Uuid) -> StoreResult<Option<MealPlanView>>;

    async fn list_meal_plans(&self, group_id: Uuid) -> StoreResult<Vec<MealPlanView>>;

    async fn update_meal_plan(
        &self,
        id: Uuid,
        patch: &MealPlanPatch,
        now: OffsetDateTime,
    ) -> StoreResult<Option<MealPlan>>;

    async fn delete_meal_plan(&self, id: Uuid) -> StoreResult<bool>;

    async fn insert_meal(&self, meal: &Meal) -> StoreResult<()>;

    async fn find_meal(&self, id: Uuid) -> StoreResult<Option<Meal>>;

    /// Meals of a plan ordered by day of week, then planned date.
    async fn list_meals(&self, plan_id: Uuid) -> StoreResult<Vec<Meal>>;

    async fn update_meal(
        &self,
        id: Uuid,
        patch: &MealPatch,
        now: OffsetDateTime,
    ) -> StoreResult<Option<Meal>>;

    async fn delete_meal(&self, id: Uuid) -> StoreResult<bool>;

    async fn insert_meal_ingredient(&self, line: &MealIngredient) -> StoreResult<()>;

    async fn find_meal_ingredient(
        &self,
        meal_id: Uuid,
        ingredient_id: Uuid,
    ) -> StoreResult<Option<MealIngredient>>;

    async fn list_meal_ingredients(&self, meal_id: Uuid) -> StoreResult<Vec<MealIngredientView>>;

    async fn delete_meal_ingredient(&self, meal_id: Uuid, ingredient_id: Uuid) -> StoreResult<bool>;

    /// Every ingredient line of every meal in the plan.
    async fn plan_ingredient_rows(&self, plan_id: Uuid) -> StoreResult<Vec<PlanIngredientRow>>;
}

#[async_trait]
pub trait IngredientRepo: Send + Sync {
    async fn insert_ingredient(&self, ingredient: &Ingredient) -> StoreResult<()>;

    async fn find_ingredient(&self, id: Uuid) -> StoreResult<Option<Ingredient>>;

    /// Ingredients matching the filter, ordered by name.
    async fn list_ingredients(&self, filter: &IngredientFilter) -> StoreResult<Vec<Ingredient>>;

    async fn update_ingredient(
        &self,
        id: Uuid,
        patch: &IngredientPatch,
        now: OffsetDateTime,
    ) -> StoreResult<Option<Ingredient>>;
}

#[async_trait]
pub trait ShoppingRepo: Send + Sync {
    /// Insert a list and its items together.
    async fn insert_shopping_list(
        &self,
        list: &ShoppingList,
        items: &[ShoppingListItem],
    ) -> StoreResult<()>;

    async fn find_shopping_list(&self, id: Uuid) -> StoreResult<Option<ShoppingList>>;

    /// Lists of a plan, newest first.
    async fn list_shopping_lists(&self, plan_id: Uuid) -> StoreResult<Vec<ShoppingList>>;

    /// Items of a list in insertion order.
    async fn list_shopping_list_items(&self, list_id: Uuid) -> StoreResult<Vec<ShoppingListItem>>;

    async fn insert_shopping_list_item(&self, item: &ShoppingListItem) -> StoreResult<()>;

    /// The item and the meal plan its list belongs to.
    async fn find_shopping_list_item(
        &self,
        id: Uuid,
    ) -> StoreResult<Option<(ShoppingListItem, Uuid)>>;

    /// Flip `is_completed` in place.
    async fn toggle_shopping_list_item(
        &self,
        id: Uuid,
        now: OffsetDateTime,
    ) -> StoreResult<Option<ShoppingListItem>>;

    async fn delete_shopping_list_item(&self, id: Uuid) -> StoreResult<bool>;
}

/// Everything the services need from persistence.
pub trait Store:
    UserRepo + GroupRepo + InvitationRepo + MealPlanRepo + IngredientRepo + ShoppingRepo
{
}

impl<T> Store for T where
    T: UserRepo + GroupRepo + InvitationRepo + MealPlanRepo + IngredientRepo + ShoppingRepo
{
}
