use tracing::info;
use uuid::Uuid;

use super::authz::check_group_permission;
use super::dto::{
    AddMemberRequest, CreateGroupRequest, GroupDetails, SearchUsersQuery, UpdateGroupRequest,
};
use super::repo_types::{Group, GroupMember, MemberChange, MyGroup};
use crate::auth::repo_types::UserSummary;
use crate::error::{AppError, AppResult, Conflict, Entity, Forbidden};
use crate::roles::Role;
use crate::state::AppState;

pub async fn create_group(
    state: &AppState,
    user_id: Uuid,
    input: CreateGroupRequest,
) -> AppResult<Group> {
    input.validate()?;
    let now = state.clock.now();
    let group = Group {
        id: Uuid::new_v4(),
        name: input.name,
        description: input.description,
        created_by: user_id,
        created_at: now,
        updated_at: now,
    };
    let admin = GroupMember {
        id: Uuid::new_v4(),
        group_id: group.id,
        user_id,
        role: Role::Admin,
        joined_at: now,
        updated_at: now,
    };
    state.store.create_group(&group, &admin).await?;
    info!(group_id = %group.id, %user_id, "group created");
    Ok(group)
}

pub async fn my_groups(state: &AppState, user_id: Uuid) -> AppResult<Vec<MyGroup>> {
    Ok(state.store.list_groups_for_user(user_id).await?)
}

pub async fn get_group(state: &AppState, user_id: Uuid, group_id: Uuid) -> AppResult<GroupDetails> {
    check_group_permission(state, user_id, group_id, Role::Member).await?;
    let group = state
        .store
        .find_group(group_id)
        .await?
        .ok_or(AppError::NotFound(Entity::Group))?;
    let members = state.store.list_members(group_id).await?;
    Ok(GroupDetails { group, members })
}

pub async fn update_group(
    state: &AppState,
    user_id: Uuid,
    group_id: Uuid,
    input: UpdateGroupRequest,
) -> AppResult<Group> {
    input.validate()?;
    check_group_permission(state, user_id, group_id, Role::Admin).await?;
    state
        .store
        .update_group(group_id, &input.into_patch(), state.clock.now())
        .await?
        .ok_or(AppError::NotFound(Entity::Group))
}

pub async fn delete_group(state: &AppState, user_id: Uuid, group_id: Uuid) -> AppResult<()> {
    check_group_permission(state, user_id, group_id, Role::Admin).await?;
    if !state.store.delete_group(group_id).await? {
        return Err(AppError::NotFound(Entity::Group));
    }
    info!(%group_id, %user_id, "group deleted");
    Ok(())
}

pub async fn add_member(
    state: &AppState,
    user_id: Uuid,
    group_id: Uuid,
    input: AddMemberRequest,
) -> AppResult<GroupMember> {
    let caller = check_group_permission(state, user_id, group_id, Role::Moderator).await?;
    if !caller.role.satisfies(input.role) {
        return Err(Forbidden::InsufficientRole(input.role).into());
    }
    if state.store.find_member(group_id, input.user_id).await?.is_some() {
        return Err(Conflict::AlreadyMember.into());
    }
    if state.store.find_user(input.user_id).await?.is_none() {
        return Err(AppError::NotFound(Entity::User));
    }

    let now = state.clock.now();
    let member = GroupMember {
        id: Uuid::new_v4(),
        group_id,
        user_id: input.user_id,
        role: input.role,
        joined_at: now,
        updated_at: now,
    };
    state
        .store
        .insert_member(&member)
        .await
        .map_err(|e| e.or_conflict(Conflict::AlreadyMember))?;
    info!(%group_id, member = %member.user_id, role = %member.role, "member added");
    Ok(member)
}

pub async fn update_member_role(
    state: &AppState,
    user_id: Uuid,
    group_id: Uuid,
    target_user_id: Uuid,
    role: Role,
) -> AppResult<GroupMember> {
    check_group_permission(state, user_id, group_id, Role::Admin).await?;
    match state
        .store
        .update_member_role(group_id, target_user_id, role, state.clock.now())
        .await?
    {
        MemberChange::Applied(member) => {
            info!(%group_id, member = %target_user_id, %role, "member role updated");
            Ok(member)
        }
        MemberChange::NotMember => Err(AppError::NotFound(Entity::Member)),
        MemberChange::LastAdmin => Err(Forbidden::LastAdmin.into()),
    }
}

/// Anyone may remove themselves; removing someone else takes a moderator.
pub async fn remove_member(
    state: &AppState,
    user_id: Uuid,
    group_id: Uuid,
    target_user_id: Uuid,
) -> AppResult<()> {
    let required = if target_user_id == user_id {
        Role::Member
    } else {
        Role::Moderator
    };
    check_group_permission(state, user_id, group_id, required).await?;
    apply_removal(state, group_id, target_user_id).await
}

pub async fn leave_group(state: &AppState, user_id: Uuid, group_id: Uuid) -> AppResult<()> {
    check_group_permission(state, user_id, group_id, Role::Member).await?;
    apply_removal(state, group_id, user_id).await
}

async fn apply_removal(state: &AppState, group_id: Uuid, target_user_id: Uuid) -> AppResult<()> {
    match state.store.remove_member(group_id, target_user_id).await? {
        MemberChange::Applied(()) => {
            info!(%group_id, member = %target_user_id, "member removed");
            Ok(())
        }
        MemberChange::NotMember => Err(AppError::NotFound(Entity::Member)),
        MemberChange::LastAdmin => Err(Forbidden::LastAdmin.into()),
    }
}

/// Users outside the group whose name contains the query.
pub async fn search_users(
    state: &AppState,
    user_id: Uuid,
    group_id: Uuid,
    query: SearchUsersQuery,
) -> AppResult<Vec<UserSummary>> {
    query.validate()?;
    check_group_permission(state, user_id, group_id, Role::Member).await?;
    Ok(state
        .store
        .search_users(&query.query, group_id, query.limit)
        .await?)
}
