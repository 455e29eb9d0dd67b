use tracing::debug;
use uuid::Uuid;

use super::repo_types::GroupMember;
use crate::error::{AppResult, Forbidden};
use crate::roles::Role;
use crate::state::AppState;

/// Membership of `user_id` in `group_id`, provided its role is at least `required`.
pub async fn check_group_permission(
    state: &AppState,
    user_id: Uuid,
    group_id: Uuid,
    required: Role,
) -> AppResult<GroupMember> {
    let Some(member) = state.store.find_member(group_id, user_id).await? else {
        debug!(%user_id, %group_id, "not a member");
        return Err(Forbidden::NotAMember.into());
    };
    if !member.role.satisfies(required) {
        debug!(%user_id, %group_id, role = %member.role, %required, "role too low");
        return Err(Forbidden::InsufficientRole(required).into());
    }
    Ok(member)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::testing::Fixture;

    #[tokio::test]
    async fn members_pass_at_or_below_their_rank() {
        let fx = Fixture::new();
        let admin = fx.user("Ana").await;
        let moderator = fx.user("Mo").await;
        let group = fx.group(admin).await;
        fx.join(group, moderator, Role::Moderator).await;

        let m = check_group_permission(&fx.state, moderator, group, Role::Member)
            .await
            .unwrap();
        assert_eq!(m.role, Role::Moderator);
        assert!(check_group_permission(&fx.state, moderator, group, Role::Moderator)
            .await
            .is_ok());
        assert!(check_group_permission(&fx.state, admin, group, Role::Admin)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn outsiders_and_low_ranks_are_rejected() {
        let fx = Fixture::new();
        let admin = fx.user("Ana").await;
        let member = fx.user("Ben").await;
        let outsider = fx.user("Cy").await;
        let group = fx.group(admin).await;
        fx.join(group, member, Role::Member).await;

        let err = check_group_permission(&fx.state, outsider, group, Role::Member)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(Forbidden::NotAMember)));

        let err = check_group_permission(&fx.state, member, group, Role::Moderator)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Forbidden(Forbidden::InsufficientRole(Role::Moderator))
        ));
        assert_eq!(err.to_string(), "You need moderator permissions or higher");
    }
}
