use tracing::debug;
use uuid::Uuid;

use super::repo_types::MealPlan;
use crate::error::{AppResult, Forbidden};
use crate::groups::repo_types::GroupMember;
use crate::roles::Role;
use crate::state::AppState;

/// The plan and the caller's membership in its group.
///
/// A plan that does not exist is reported the same way as one the caller cannot see.
pub async fn check_meal_plan_permission(
    state: &AppState,
    user_id: Uuid,
    meal_plan_id: Uuid,
    required: Role,
) -> AppResult<(MealPlan, GroupMember)> {
    let Some((plan, member)) = state
        .store
        .find_meal_plan_access(meal_plan_id, user_id)
        .await?
    else {
        debug!(%user_id, %meal_plan_id, "no access to meal plan");
        return Err(Forbidden::NoAccess.into());
    };
    if !member.role.satisfies(required) {
        return Err(Forbidden::InsufficientRole(required).into());
    }
    Ok((plan, member))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::meal_plans::dto::CreateMealPlanRequest;
    use crate::meal_plans::services::create_meal_plan;
    use crate::testing::Fixture;

    #[tokio::test]
    async fn resolves_plan_through_group_membership() {
        let fx = Fixture::new();
        let ana = fx.user("Ana").await;
        let ben = fx.user("Ben").await;
        let eve = fx.user("Eve").await;
        let group = fx.group(ana).await;
        fx.join(group, ben, Role::Member).await;
        let plan = create_meal_plan(
            &fx.state,
            ana,
            group,
            CreateMealPlanRequest {
                name: "Week 1".into(),
                description: None,
                start_date: None,
                end_date: None,
            },
        )
        .await
        .unwrap();

        let (found, member) = check_meal_plan_permission(&fx.state, ben, plan.id, Role::Member)
            .await
            .unwrap();
        assert_eq!(found.id, plan.id);
        assert_eq!(member.user_id, ben);

        let err = check_meal_plan_permission(&fx.state, ben, plan.id, Role::Admin)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Forbidden(Forbidden::InsufficientRole(Role::Admin))
        ));

        let err = check_meal_plan_permission(&fx.state, eve, plan.id, Role::Member)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(Forbidden::NoAccess)));

        let err = check_meal_plan_permission(&fx.state, ana, Uuid::new_v4(), Role::Member)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(Forbidden::NoAccess)));
    }
}
