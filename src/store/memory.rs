//! In-memory store used by tests and by deployments without a database.
//!
//! Every table is a `Vec` in insertion order behind one `RwLock`, so each trait method
//! runs atomically with respect to the others.
use std::cmp::{Ordering, Reverse};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    GroupRepo, IngredientRepo, InvitationRepo, MealPlanRepo, ShoppingRepo, StoreError,
    StoreResult, UserRepo,
};
use crate::auth::repo_types::UserSummary;
use crate::groups::repo_types::{Group, GroupMember, GroupPatch, MemberChange, MemberView, MyGroup};
use crate::ingredients::repo_types::{Ingredient, IngredientFilter, IngredientPatch};
use crate::invitations::repo_types::{
    GroupInvitation, GroupInvitationView, GroupSummary, InvitationStatus, MyInvitationView,
};
use crate::meal_plans::repo_types::{
    Meal, MealIngredient, MealIngredientView, MealPatch, MealPlan, MealPlanPatch, MealPlanView,
    PlanIngredientRow,
};
use crate::roles::Role;
use crate::shopping::repo_types::{ShoppingList, ShoppingListItem};

#[derive(Debug, Default)]
pub struct InnerMemoryStore {
    users: Vec<UserSummary>,
    groups: Vec<Group>,
    members: Vec<GroupMember>,
    invitations: Vec<GroupInvitation>,
    meal_plans: Vec<MealPlan>,
    meals: Vec<Meal>,
    ingredients: Vec<Ingredient>,
    meal_ingredients: Vec<MealIngredient>,
    shopping_lists: Vec<ShoppingList>,
    shopping_list_items: Vec<ShoppingListItem>,
}

impl InnerMemoryStore {
    fn user(&self, id: Uuid) -> Option<&UserSummary> {
        self.users.iter().find(|u| u.id == id)
    }

    fn member(&self, group_id: Uuid, user_id: Uuid) -> Option<&GroupMember> {
        self.members
            .iter()
            .find(|m| m.group_id == group_id && m.user_id == user_id)
    }

    fn admin_count(&self, group_id: Uuid) -> usize {
        self.members
            .iter()
            .filter(|m| m.group_id == group_id && m.role == Role::Admin)
            .count()
    }

    /// True when `user_id` is the last admin of `group_id`.
    fn is_last_admin(&self, group_id: Uuid, user_id: Uuid) -> bool {
        matches!(self.member(group_id, user_id), Some(m) if m.role == Role::Admin)
            && self.admin_count(group_id) <= 1
    }

    fn push_member(&mut self, member: &GroupMember) -> StoreResult<()> {
        if self.member(member.group_id, member.user_id).is_some() {
            return Err(StoreError::UniqueViolation(
                "group_members_group_user_key".into(),
            ));
        }
        self.members.push(member.clone());
        Ok(())
    }

    fn plan_view(&self, plan: &MealPlan) -> Option<MealPlanView> {
        Some(MealPlanView {
            meal_plan: plan.clone(),
            creator: self.user(plan.created_by)?.clone(),
        })
    }

    fn remove_list_items(&mut self, list_ids: &[Uuid]) {
        self.shopping_list_items
            .retain(|i| !list_ids.contains(&i.shopping_list_id));
    }

    fn remove_meals(&mut self, meal_ids: &[Uuid]) {
        self.meal_ingredients
            .retain(|mi| !meal_ids.contains(&mi.meal_id));
        self.meals.retain(|m| !meal_ids.contains(&m.id));
    }

    fn remove_plans(&mut self, plan_ids: &[Uuid]) {
        let meal_ids: Vec<Uuid> = self
            .meals
            .iter()
            .filter(|m| plan_ids.contains(&m.meal_plan_id))
            .map(|m| m.id)
            .collect();
        self.remove_meals(&meal_ids);

        let list_ids: Vec<Uuid> = self
            .shopping_lists
            .iter()
            .filter(|l| plan_ids.contains(&l.meal_plan_id))
            .map(|l| l.id)
            .collect();
        self.remove_list_items(&list_ids);
        self.shopping_lists
            .retain(|l| !plan_ids.contains(&l.meal_plan_id));

        self.meal_plans.retain(|p| !plan_ids.contains(&p.id));
    }
}

/// Absent values sort after present ones.
fn nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<InnerMemoryStore>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_store(&self) -> RwLockReadGuard<'_, InnerMemoryStore> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write_store(&self) -> RwLockWriteGuard<'_, InnerMemoryStore> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn insert_user(&self, user: &UserSummary) -> StoreResult<()> {
        let mut store = self.write_store();
        if store.users.iter().any(|u| u.id == user.id || u.email == user.email) {
            return Err(StoreError::UniqueViolation("users_email_key".into()));
        }
        store.users.push(user.clone());
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<UserSummary>> {
        Ok(self.read_store().user(id).cloned())
    }

    async fn search_users(
        &self,
        query: &str,
        exclude_group: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<UserSummary>> {
        let store = self.read_store();
        let mut found: Vec<UserSummary> = store
            .users
            .iter()
            .filter(|u| u.name.contains(query))
            .filter(|u| store.member(exclude_group, u.id).is_none())
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(found)
    }
}

#[async_trait]
impl GroupRepo for MemoryStore {
    async fn create_group(&self, group: &Group, admin: &GroupMember) -> StoreResult<()> {
        let mut store = self.write_store();
        if store.groups.iter().any(|g| g.id == group.id) {
            return Err(StoreError::UniqueViolation("groups_pkey".into()));
        }
        store.groups.push(group.clone());
        store.push_member(admin)
    }

    async fn find_group(&self, id: Uuid) -> StoreResult<Option<Group>> {
        Ok(self.read_store().groups.iter().find(|g| g.id == id).cloned())
    }

    async fn list_groups_for_user(&self, user_id: Uuid) -> StoreResult<Vec<MyGroup>> {
        let store = self.read_store();
        let mut groups: Vec<MyGroup> = store
            .groups
            .iter()
            .rev()
            .filter_map(|g| {
                let member = store.member(g.id, user_id)?;
                Some(MyGroup {
                    group: g.clone(),
                    member_role: member.role,
                    joined_at: member.joined_at,
                })
            })
            .collect();
        groups.sort_by_key(|g| Reverse(g.group.created_at));
        Ok(groups)
    }

    async fn update_group(
        &self,
        id: Uuid,
        patch: &GroupPatch,
        now: OffsetDateTime,
    ) -> StoreResult<Option<Group>> {
        let mut store = self.write_store();
        let Some(group) = store.groups.iter_mut().find(|g| g.id == id) else {
            return Ok(None);
        };
        if let Some(name) = &patch.name {
            group.name = name.clone();
        }
        if let Some(description) = &patch.description {
            group.description = Some(description.clone());
        }
        group.updated_at = now;
        Ok(Some(group.clone()))
    }

    async fn delete_group(&self, id: Uuid) -> StoreResult<bool> {
        let mut store = self.write_store();
        let before = store.groups.len();
        store.groups.retain(|g| g.id != id);
        if store.groups.len() == before {
            return Ok(false);
        }
        let plan_ids: Vec<Uuid> = store
            .meal_plans
            .iter()
            .filter(|p| p.group_id == id)
            .map(|p| p.id)
            .collect();
        store.remove_plans(&plan_ids);
        store.members.retain(|m| m.group_id != id);
        store.invitations.retain(|i| i.group_id != id);
        Ok(true)
    }

    async fn find_member(&self, group_id: Uuid, user_id: Uuid) -> StoreResult<Option<GroupMember>> {
        Ok(self.read_store().member(group_id, user_id).cloned())
    }

    async fn list_members(&self, group_id: Uuid) -> StoreResult<Vec<MemberView>> {
        let store = self.read_store();
        let mut members: Vec<MemberView> = store
            .members
            .iter()
            .filter(|m| m.group_id == group_id)
            .filter_map(|m| {
                Some(MemberView {
                    id: m.id,
                    role: m.role,
                    joined_at: m.joined_at,
                    user: store.user(m.user_id)?.clone(),
                })
            })
            .collect();
        members.sort_by_key(|m| m.joined_at);
        Ok(members)
    }

    async fn insert_member(&self, member: &GroupMember) -> StoreResult<()> {
        self.write_store().push_member(member)
    }

    async fn update_member_role(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        role: Role,
        now: OffsetDateTime,
    ) -> StoreResult<MemberChange<GroupMember>> {
        let mut store = self.write_store();
        if store.member(group_id, user_id).is_none() {
            return Ok(MemberChange::NotMember);
        }
        if store.is_last_admin(group_id, user_id) {
            return Ok(MemberChange::LastAdmin);
        }
        let Some(member) = store
            .members
            .iter_mut()
            .find(|m| m.group_id == group_id && m.user_id == user_id)
        else {
            return Ok(MemberChange::NotMember);
        };
        member.role = role;
        member.updated_at = now;
        Ok(MemberChange::Applied(member.clone()))
    }

    async fn remove_member(&self, group_id: Uuid, user_id: Uuid) -> StoreResult<MemberChange<()>> {
        let mut store = self.write_store();
        if store.member(group_id, user_id).is_none() {
            return Ok(MemberChange::NotMember);
        }
        if store.is_last_admin(group_id, user_id) {
            return Ok(MemberChange::LastAdmin);
        }
        store
            .members
            .retain(|m| !(m.group_id == group_id && m.user_id == user_id));
        Ok(MemberChange::Applied(()))
    }
}

#[async_trait]
impl InvitationRepo for MemoryStore {
    async fn insert_invitation(&self, invitation: &GroupInvitation) -> StoreResult<()> {
        let mut store = self.write_store();
        let duplicate = invitation.status == InvitationStatus::Pending
            && store.invitations.iter().any(|i| {
                i.group_id == invitation.group_id
                    && i.invited_user_id == invitation.invited_user_id
                    && i.status == InvitationStatus::Pending
            });
        if duplicate {
            return Err(StoreError::UniqueViolation(
                "group_invitations_one_pending_key".into(),
            ));
        }
        store.invitations.push(invitation.clone());
        Ok(())
    }

    async fn find_invitation(&self, id: Uuid) -> StoreResult<Option<GroupInvitation>> {
        Ok(self
            .read_store()
            .invitations
            .iter()
            .find(|i| i.id == id)
            .cloned())
    }

    async fn find_pending_invitation(
        &self,
        group_id: Uuid,
        invited_user_id: Uuid,
    ) -> StoreResult<Option<GroupInvitation>> {
        Ok(self
            .read_store()
            .invitations
            .iter()
            .find(|i| {
                i.group_id == group_id
                    && i.invited_user_id == invited_user_id
                    && i.status == InvitationStatus::Pending
            })
            .cloned())
    }

    async fn list_group_invitations(
        &self,
        group_id: Uuid,
    ) -> StoreResult<Vec<GroupInvitationView>> {
        let store = self.read_store();
        let mut views: Vec<GroupInvitationView> = store
            .invitations
            .iter()
            .rev()
            .filter(|i| i.group_id == group_id && i.status == InvitationStatus::Pending)
            .map(|i| GroupInvitationView {
                id: i.id,
                role: i.role,
                status: i.status,
                message: i.message.clone(),
                expires_at: i.expires_at,
                created_at: i.created_at,
                invited_user: store.user(i.invited_user_id).cloned(),
                invited_by_user: store.user(i.invited_by_user_id).cloned(),
            })
            .collect();
        views.sort_by_key(|v| Reverse(v.created_at));
        Ok(views)
    }

    async fn list_user_invitations(&self, user_id: Uuid) -> StoreResult<Vec<MyInvitationView>> {
        let store = self.read_store();
        let mut views: Vec<MyInvitationView> = store
            .invitations
            .iter()
            .rev()
            .filter(|i| i.invited_user_id == user_id && i.status == InvitationStatus::Pending)
            .filter_map(|i| {
                let group = store.groups.iter().find(|g| g.id == i.group_id)?;
                Some(MyInvitationView {
                    id: i.id,
                    role: i.role,
                    status: i.status,
                    message: i.message.clone(),
                    expires_at: i.expires_at,
                    created_at: i.created_at,
                    group: GroupSummary {
                        id: group.id,
                        name: group.name.clone(),
                        description: group.description.clone(),
                    },
                    invited_by_user: store.user(i.invited_by_user_id)?.clone(),
                })
            })
            .collect();
        views.sort_by_key(|v| Reverse(v.created_at));
        Ok(views)
    }

    async fn transition_invitation(
        &self,
        id: Uuid,
        from: InvitationStatus,
        to: InvitationStatus,
        now: OffsetDateTime,
    ) -> StoreResult<bool> {
        let mut store = self.write_store();
        match store
            .invitations
            .iter_mut()
            .find(|i| i.id == id && i.status == from)
        {
            Some(invitation) => {
                invitation.status = to;
                invitation.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn accept_invitation(
        &self,
        invitation_id: Uuid,
        member: &GroupMember,
        now: OffsetDateTime,
    ) -> StoreResult<bool> {
        let mut store = self.write_store();
        let Some(pos) = store
            .invitations
            .iter()
            .position(|i| i.id == invitation_id && i.status == InvitationStatus::Pending)
        else {
            return Ok(false);
        };
        // Membership first: a unique violation must leave the invitation pending.
        store.push_member(member)?;
        let invitation = &mut store.invitations[pos];
        invitation.status = InvitationStatus::Accepted;
        invitation.updated_at = now;
        Ok(true)
    }

    async fn expire_invitations(&self, now: OffsetDateTime) -> StoreResult<u64> {
        let mut store = self.write_store();
        let mut expired = 0;
        for invitation in store
            .invitations
            .iter_mut()
            .filter(|i| i.status == InvitationStatus::Pending && i.expires_at < now)
        {
            invitation.status = InvitationStatus::Expired;
            invitation.updated_at = now;
            expired += 1;
        }
        Ok(expired)
    }
}

#[async_trait]
impl MealPlanRepo for MemoryStore {
    async fn insert_meal_plan(&self, plan: &MealPlan) -> StoreResult<()> {
        self.write_store().meal_plans.push(plan.clone());
        Ok(())
    }

    async fn find_meal_plan_access(
        &self,
        plan_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<(MealPlan, GroupMember)>> {
        let store = self.read_store();
        let Some(plan) = store.meal_plans.iter().find(|p| p.id == plan_id) else {
            return Ok(None);
        };
        Ok(store
            .member(plan.group_id, user_id)
            .map(|m| (plan.clone(), m.clone())))
    }

    async fn find_meal_plan_view(&self, id: Uuid) -> StoreResult<Option<MealPlanView>> {
        let store = self.read_store();
        Ok(store
            .meal_plans
            .iter()
            .find(|p| p.id == id)
            .and_then(|p| store.plan_view(p)))
    }

    async fn list_meal_plans(&self, group_id: Uuid) -> StoreResult<Vec<MealPlanView>> {
        let store = self.read_store();
        let mut plans: Vec<MealPlanView> = store
            .meal_plans
            .iter()
            .rev()
            .filter(|p| p.group_id == group_id)
            .filter_map(|p| store.plan_view(p))
            .collect();
        plans.sort_by_key(|p| Reverse(p.meal_plan.created_at));
        Ok(plans)
    }

    async fn update_meal_plan(
        &self,
        id: Uuid,
        patch: &MealPlanPatch,
        now: OffsetDateTime,
    ) -> StoreResult<Option<MealPlan>> {
        let mut store = self.write_store();
        let Some(plan) = store.meal_plans.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if let Some(name) = &patch.name {
            plan.name = name.clone();
        }
        if let Some(description) = &patch.description {
            plan.description = Some(description.clone());
        }
        if patch.start_date.is_some() {
            plan.start_date = patch.start_date;
        }
        if patch.end_date.is_some() {
            plan.end_date = patch.end_date;
        }
        if let Some(active) = patch.is_active {
            plan.is_active = active;
        }
        plan.updated_at = now;
        Ok(Some(plan.clone()))
    }

    async fn delete_meal_plan(&self, id: Uuid) -> StoreResult<bool> {
        let mut store = self.write_store();
        if !store.meal_plans.iter().any(|p| p.id == id) {
            return Ok(false);
        }
        store.remove_plans(&[id]);
        Ok(true)
    }

    async fn insert_meal(&self, meal: &Meal) -> StoreResult<()> {
        self.write_store().meals.push(meal.clone());
        Ok(())
    }

    async fn find_meal(&self, id: Uuid) -> StoreResult<Option<Meal>> {
        Ok(self.read_store().meals.iter().find(|m| m.id == id).cloned())
    }

    async fn list_meals(&self, plan_id: Uuid) -> StoreResult<Vec<Meal>> {
        let mut meals: Vec<Meal> = self
            .read_store()
            .meals
            .iter()
            .filter(|m| m.meal_plan_id == plan_id)
            .cloned()
            .collect();
        meals.sort_by(|a, b| {
            nulls_last(&a.day_of_week, &b.day_of_week)
                .then_with(|| nulls_last(&a.planned_date, &b.planned_date))
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(meals)
    }

    async fn update_meal(
        &self,
        id: Uuid,
        patch: &MealPatch,
        now: OffsetDateTime,
    ) -> StoreResult<Option<Meal>> {
        let mut store = self.write_store();
        let Some(meal) = store.meals.iter_mut().find(|m| m.id == id) else {
            return Ok(None);
        };
        if let Some(name) = &patch.name {
            meal.name = name.clone();
        }
        if let Some(description) = &patch.description {
            meal.description = Some(description.clone());
        }
        if let Some(instructions) = &patch.instructions {
            meal.instructions = Some(instructions.clone());
        }
        meal.prep_time = patch.prep_time.or(meal.prep_time);
        meal.cook_time = patch.cook_time.or(meal.cook_time);
        meal.servings = patch.servings.or(meal.servings);
        meal.meal_type = patch.meal_type.or(meal.meal_type);
        meal.day_of_week = patch.day_of_week.or(meal.day_of_week);
        meal.planned_date = patch.planned_date.or(meal.planned_date);
        meal.updated_at = now;
        Ok(Some(meal.clone()))
    }

    async fn delete_meal(&self, id: Uuid) -> StoreResult<bool> {
        let mut store = self.write_store();
        if !store.meals.iter().any(|m| m.id == id) {
            return Ok(false);
        }
        store.remove_meals(&[id]);
        Ok(true)
    }

    async fn insert_meal_ingredient(&self, line: &MealIngredient) -> StoreResult<()> {
        let mut store = self.write_store();
        if store
            .meal_ingredients
            .iter()
            .any(|mi| mi.meal_id == line.meal_id && mi.ingredient_id == line.ingredient_id)
        {
            return Err(StoreError::UniqueViolation(
                "meal_ingredients_meal_ingredient_key".into(),
            ));
        }
        store.meal_ingredients.push(line.clone());
        Ok(())
    }

    async fn find_meal_ingredient(
        &self,
        meal_id: Uuid,
        ingredient_id: Uuid,
    ) -> StoreResult<Option<MealIngredient>> {
        Ok(self
            .read_store()
            .meal_ingredients
            .iter()
            .find(|mi| mi.meal_id == meal_id && mi.ingredient_id == ingredient_id)
            .cloned())
    }

    async fn list_meal_ingredients(&self, meal_id: Uuid) -> StoreResult<Vec<MealIngredientView>> {
        let store = self.read_store();
        Ok(store
            .meal_ingredients
            .iter()
            .filter(|mi| mi.meal_id == meal_id)
            .filter_map(|mi| {
                let ingredient = store.ingredients.iter().find(|i| i.id == mi.ingredient_id)?;
                Some(MealIngredientView {
                    meal_ingredient: mi.clone(),
                    ingredient: ingredient.clone(),
                })
            })
            .collect())
    }

    async fn delete_meal_ingredient(
        &self,
        meal_id: Uuid,
        ingredient_id: Uuid,
    ) -> StoreResult<bool> {
        let mut store = self.write_store();
        let before = store.meal_ingredients.len();
        store
            .meal_ingredients
            .retain(|mi| !(mi.meal_id == meal_id && mi.ingredient_id == ingredient_id));
        Ok(store.meal_ingredients.len() < before)
    }

    async fn plan_ingredient_rows(&self, plan_id: Uuid) -> StoreResult<Vec<PlanIngredientRow>> {
        let store = self.read_store();
        let mut meals: Vec<&Meal> = store
            .meals
            .iter()
            .filter(|m| m.meal_plan_id == plan_id)
            .collect();
        meals.sort_by_key(|m| (m.created_at, m.id));
        let mut rows = Vec::new();
        for meal in meals {
            let mut lines: Vec<&MealIngredient> = store
                .meal_ingredients
                .iter()
                .filter(|mi| mi.meal_id == meal.id)
                .collect();
            lines.sort_by_key(|mi| (mi.created_at, mi.id));
            for line in lines {
                let Some(ingredient) = store.ingredients.iter().find(|i| i.id == line.ingredient_id)
                else {
                    continue;
                };
                rows.push(PlanIngredientRow {
                    ingredient_id: line.ingredient_id,
                    ingredient_name: ingredient.name.clone(),
                    quantity: line.quantity,
                    unit: line.unit.clone(),
                });
            }
        }
        Ok(rows)
    }
}

#[async_trait]
impl IngredientRepo for MemoryStore {
    async fn insert_ingredient(&self, ingredient: &Ingredient) -> StoreResult<()> {
        self.write_store().ingredients.push(ingredient.clone());
        Ok(())
    }

    async fn find_ingredient(&self, id: Uuid) -> StoreResult<Option<Ingredient>> {
        Ok(self
            .read_store()
            .ingredients
            .iter()
            .find(|i| i.id == id)
            .cloned())
    }

    async fn list_ingredients(&self, filter: &IngredientFilter) -> StoreResult<Vec<Ingredient>> {
        let mut found: Vec<Ingredient> = self
            .read_store()
            .ingredients
            .iter()
            .filter(|i| filter.search.as_deref().map_or(true, |q| i.name.contains(q)))
            .filter(|i| {
                filter
                    .category
                    .as_deref()
                    .map_or(true, |c| i.category.as_deref() == Some(c))
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found.truncate(usize::try_from(filter.limit).unwrap_or(0));
        Ok(found)
    }

    async fn update_ingredient(
        &self,
        id: Uuid,
        patch: &IngredientPatch,
        now: OffsetDateTime,
    ) -> StoreResult<Option<Ingredient>> {
        let mut store = self.write_store();
        let Some(ingredient) = store.ingredients.iter_mut().find(|i| i.id == id) else {
            return Ok(None);
        };
        if let Some(name) = &patch.name {
            ingredient.name = name.clone();
        }
        if let Some(description) = &patch.description {
            ingredient.description = Some(description.clone());
        }
        if let Some(category) = &patch.category {
            ingredient.category = Some(category.clone());
        }
        if let Some(unit) = &patch.unit {
            ingredient.unit = Some(unit.clone());
        }
        ingredient.calories_per_unit = patch.calories_per_unit.or(ingredient.calories_per_unit);
        ingredient.protein_per_unit = patch.protein_per_unit.or(ingredient.protein_per_unit);
        ingredient.carbs_per_unit = patch.carbs_per_unit.or(ingredient.carbs_per_unit);
        ingredient.fat_per_unit = patch.fat_per_unit.or(ingredient.fat_per_unit);
        ingredient.updated_at = now;
        Ok(Some(ingredient.clone()))
    }
}

#[async_trait]
impl ShoppingRepo for MemoryStore {
    async fn insert_shopping_list(
        &self,
        list: &ShoppingList,
        items: &[ShoppingListItem],
    ) -> StoreResult<()> {
        let mut store = self.write_store();
        store.shopping_lists.push(list.clone());
        store.shopping_list_items.extend_from_slice(items);
        Ok(())
    }

    async fn find_shopping_list(&self, id: Uuid) -> StoreResult<Option<ShoppingList>> {
        Ok(self
            .read_store()
            .shopping_lists
            .iter()
            .find(|l| l.id == id)
            .cloned())
    }

    async fn list_shopping_lists(&self, plan_id: Uuid) -> StoreResult<Vec<ShoppingList>> {
        let mut lists: Vec<ShoppingList> = self
            .read_store()
            .shopping_lists
            .iter()
            .rev()
            .filter(|l| l.meal_plan_id == plan_id)
            .cloned()
            .collect();
        lists.sort_by_key(|l| Reverse(l.created_at));
        Ok(lists)
    }

    async fn list_shopping_list_items(&self, list_id: Uuid) -> StoreResult<Vec<ShoppingListItem>> {
        let mut items: Vec<ShoppingListItem> = self
            .read_store()
            .shopping_list_items
            .iter()
            .filter(|i| i.shopping_list_id == list_id)
            .cloned()
            .collect();
        items.sort_by_key(|i| (i.created_at, i.id));
        Ok(items)
    }

    async fn insert_shopping_list_item(&self, item: &ShoppingListItem) -> StoreResult<()> {
        self.write_store().shopping_list_items.push(item.clone());
        Ok(())
    }

    async fn find_shopping_list_item(
        &self,
        id: Uuid,
    ) -> StoreResult<Option<(ShoppingListItem, Uuid)>> {
        let store = self.read_store();
        let Some(item) = store.shopping_list_items.iter().find(|i| i.id == id) else {
            return Ok(None);
        };
        Ok(store
            .shopping_lists
            .iter()
            .find(|l| l.id == item.shopping_list_id)
            .map(|l| (item.clone(), l.meal_plan_id)))
    }

    async fn toggle_shopping_list_item(
        &self,
        id: Uuid,
        now: OffsetDateTime,
    ) -> StoreResult<Option<ShoppingListItem>> {
        let mut store = self.write_store();
        Ok(store
            .shopping_list_items
            .iter_mut()
            .find(|i| i.id == id)
            .map(|item| {
                item.is_completed = !item.is_completed;
                item.updated_at = now;
                item.clone()
            }))
    }

    async fn delete_shopping_list_item(&self, id: Uuid) -> StoreResult<bool> {
        let mut store = self.write_store();
        let before = store.shopping_list_items.len();
        store.shopping_list_items.retain(|i| i.id != id);
        Ok(store.shopping_list_items.len() < before)
    }
}
