//! Invitation lifecycle: `pending` moves once, to `accepted`, `declined` or `expired`.
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::dto::{CreateInvitationRequest, InvitationAction, RespondOutcome, RespondResponse};
use super::repo_types::{GroupInvitation, GroupInvitationView, InvitationStatus, MyInvitationView};
use crate::error::{AppError, AppResult, BadRequest, Conflict, Entity, Forbidden};
use crate::groups::authz::check_group_permission;
use crate::groups::repo_types::GroupMember;
use crate::roles::Role;
use crate::state::AppState;

pub async fn create_invitation(
    state: &AppState,
    user_id: Uuid,
    group_id: Uuid,
    input: CreateInvitationRequest,
) -> AppResult<GroupInvitation> {
    input.validate()?;
    let caller = check_group_permission(state, user_id, group_id, Role::Moderator).await?;
    if !caller.role.satisfies(input.role) {
        return Err(Forbidden::InsufficientRole(input.role).into());
    }
    if state
        .store
        .find_member(group_id, input.invited_user_id)
        .await?
        .is_some()
    {
        return Err(Conflict::AlreadyMember.into());
    }
    if state
        .store
        .find_pending_invitation(group_id, input.invited_user_id)
        .await?
        .is_some()
    {
        return Err(Conflict::DuplicatePendingInvitation.into());
    }
    if state.store.find_user(input.invited_user_id).await?.is_none() {
        return Err(AppError::NotFound(Entity::User));
    }

    let now = state.clock.now();
    let invitation = GroupInvitation {
        id: Uuid::new_v4(),
        group_id,
        invited_user_id: input.invited_user_id,
        invited_by_user_id: user_id,
        role: input.role,
        status: InvitationStatus::Pending,
        message: input.message,
        expires_at: now + time::Duration::days(input.expires_in_days),
        created_at: now,
        updated_at: now,
    };
    state
        .store
        .insert_invitation(&invitation)
        .await
        .map_err(|e| e.or_conflict(Conflict::DuplicatePendingInvitation))?;
    info!(
        invitation_id = %invitation.id,
        %group_id,
        invited = %invitation.invited_user_id,
        "invitation created"
    );
    Ok(invitation)
}

pub async fn group_invitations(
    state: &AppState,
    user_id: Uuid,
    group_id: Uuid,
) -> AppResult<Vec<GroupInvitationView>> {
    check_group_permission(state, user_id, group_id, Role::Moderator).await?;
    Ok(state.store.list_group_invitations(group_id).await?)
}

pub async fn my_invitations(state: &AppState, user_id: Uuid) -> AppResult<Vec<MyInvitationView>> {
    Ok(state.store.list_user_invitations(user_id).await?)
}

/// Accept or decline an invitation addressed to the caller.
///
/// An invitation found past its deadline is marked expired before the call fails.
pub async fn respond_to_invitation(
    state: &AppState,
    user_id: Uuid,
    invitation_id: Uuid,
    action: InvitationAction,
) -> AppResult<RespondResponse> {
    let invitation = state
        .store
        .find_invitation(invitation_id)
        .await?
        .filter(|i| i.invited_user_id == user_id && i.status == InvitationStatus::Pending)
        .ok_or(AppError::NotFound(Entity::Invitation))?;

    let now = state.clock.now();
    if invitation.expires_at < now {
        state
            .store
            .transition_invitation(
                invitation_id,
                InvitationStatus::Pending,
                InvitationStatus::Expired,
                now,
            )
            .await?;
        debug!(%invitation_id, "invitation expired on response");
        return Err(BadRequest::InvitationExpired.into());
    }

    let outcome = match action {
        InvitationAction::Accept => {
            if state
                .store
                .find_member(invitation.group_id, user_id)
                .await?
                .is_some()
            {
                return Err(Conflict::AlreadyMember.into());
            }
            let member = GroupMember {
                id: Uuid::new_v4(),
                group_id: invitation.group_id,
                user_id,
                role: invitation.role,
                joined_at: now,
                updated_at: now,
            };
            let accepted = state
                .store
                .accept_invitation(invitation_id, &member, now)
                .await
                .map_err(|e| e.or_conflict(Conflict::AlreadyMember))?;
            if !accepted {
                return Err(AppError::NotFound(Entity::Invitation));
            }
            RespondOutcome::Accepted
        }
        InvitationAction::Decline => {
            let declined = state
                .store
                .transition_invitation(
                    invitation_id,
                    InvitationStatus::Pending,
                    InvitationStatus::Declined,
                    now,
                )
                .await?;
            if !declined {
                return Err(AppError::NotFound(Entity::Invitation));
            }
            RespondOutcome::Declined
        }
    };
    info!(%invitation_id, %user_id, action = ?outcome, "invitation answered");
    Ok(RespondResponse {
        success: true,
        action: outcome,
    })
}

/// Withdraw a pending invitation. Cancelled invitations end up `declined`.
pub async fn cancel_invitation(
    state: &AppState,
    user_id: Uuid,
    invitation_id: Uuid,
) -> AppResult<()> {
    let invitation = state
        .store
        .find_invitation(invitation_id)
        .await?
        .ok_or(AppError::NotFound(Entity::Invitation))?;
    check_group_permission(state, user_id, invitation.group_id, Role::Moderator).await?;
    if invitation.status.is_terminal() {
        return Err(BadRequest::NotPending.into());
    }
    let cancelled = state
        .store
        .transition_invitation(
            invitation_id,
            InvitationStatus::Pending,
            InvitationStatus::Declined,
            state.clock.now(),
        )
        .await?;
    if !cancelled {
        return Err(BadRequest::NotPending.into());
    }
    info!(%invitation_id, %user_id, "invitation cancelled");
    Ok(())
}

/// Expire every pending invitation past its deadline. Returns how many changed.
pub async fn cleanup_expired_invitations(state: &AppState) -> AppResult<u64> {
    let expired = state.store.expire_invitations(state.clock.now()).await?;
    if expired > 0 {
        info!(expired, "expired invitations cleaned up");
    }
    Ok(expired)
}

/// Run the cleanup every `every` until the runtime shuts down.
pub fn spawn_cleanup_task(state: AppState, every: Duration) -> JoinHandle<()> {
    tokio::task::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Err(e) = cleanup_expired_invitations(&state).await {
                error!(error = %e, "invitation cleanup failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::testing::{status, Fixture};

    fn invite(user: Uuid) -> CreateInvitationRequest {
        CreateInvitationRequest {
            invited_user_id: user,
            role: Role::Member,
            message: Some("join us".into()),
            expires_in_days: 7,
        }
    }

    #[tokio::test]
    async fn accept_adds_member_with_invited_role() {
        let fx = Fixture::new();
        let ana = fx.user("Ana").await;
        let ben = fx.user("Ben").await;
        let group = fx.group(ana).await;

        let mut input = invite(ben);
        input.role = Role::Moderator;
        let inv = create_invitation(&fx.state, ana, group, input).await.unwrap();
        assert_eq!(inv.status, InvitationStatus::Pending);
        assert_eq!(inv.expires_at, fx.clock.now() + time::Duration::days(7));

        let mine = my_invitations(&fx.state, ben).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].group.id, group);
        assert_eq!(mine[0].invited_by_user.id, ana);

        let res = respond_to_invitation(&fx.state, ben, inv.id, InvitationAction::Accept)
            .await
            .unwrap();
        assert_eq!(res.action, RespondOutcome::Accepted);
        assert_eq!(fx.role_of(group, ben).await, Some(Role::Moderator));
        assert!(my_invitations(&fx.state, ben).await.unwrap().is_empty());

        let stored = fx.state.store.find_invitation(inv.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InvitationStatus::Accepted);
    }

    #[tokio::test]
    async fn terminal_invitations_cannot_be_answered_again() {
        let fx = Fixture::new();
        let ana = fx.user("Ana").await;
        let ben = fx.user("Ben").await;
        let group = fx.group(ana).await;
        let inv = create_invitation(&fx.state, ana, group, invite(ben)).await.unwrap();

        let res = respond_to_invitation(&fx.state, ben, inv.id, InvitationAction::Decline)
            .await
            .unwrap();
        assert_eq!(res.action, RespondOutcome::Declined);
        assert_eq!(fx.role_of(group, ben).await, None);

        let err = respond_to_invitation(&fx.state, ben, inv.id, InvitationAction::Accept)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(Entity::Invitation)));
    }

    #[tokio::test]
    async fn only_the_invited_user_may_respond() {
        let fx = Fixture::new();
        let ana = fx.user("Ana").await;
        let ben = fx.user("Ben").await;
        let eve = fx.user("Eve").await;
        let group = fx.group(ana).await;
        let inv = create_invitation(&fx.state, ana, group, invite(ben)).await.unwrap();

        let err = respond_to_invitation(&fx.state, eve, inv.id, InvitationAction::Accept)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(Entity::Invitation)));
        assert_eq!(fx.role_of(group, eve).await, None);
    }

    #[tokio::test]
    async fn response_after_expiry_marks_invitation_expired() {
        let fx = Fixture::new();
        let ana = fx.user("Ana").await;
        let ben = fx.user("Ben").await;
        let group = fx.group(ana).await;
        let inv = create_invitation(&fx.state, ana, group, invite(ben)).await.unwrap();

        fx.clock.advance(time::Duration::days(8));
        let err = respond_to_invitation(&fx.state, ben, inv.id, InvitationAction::Accept)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(BadRequest::InvitationExpired)));
        assert_eq!(status(&err), 400);

        let stored = fx.state.store.find_invitation(inv.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InvitationStatus::Expired);
        assert_eq!(fx.role_of(group, ben).await, None);

        let err = respond_to_invitation(&fx.state, ben, inv.id, InvitationAction::Decline)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(Entity::Invitation)));
    }

    #[tokio::test]
    async fn one_pending_invitation_per_user_and_group() {
        let fx = Fixture::new();
        let ana = fx.user("Ana").await;
        let ben = fx.user("Ben").await;
        let group = fx.group(ana).await;

        let first = create_invitation(&fx.state, ana, group, invite(ben)).await.unwrap();
        let err = create_invitation(&fx.state, ana, group, invite(ben))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(Conflict::DuplicatePendingInvitation)));

        cancel_invitation(&fx.state, ana, first.id).await.unwrap();
        create_invitation(&fx.state, ana, group, invite(ben)).await.unwrap();
        assert_eq!(group_invitations(&fx.state, ana, group).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_checks_membership_then_duplicates_then_user() {
        let fx = Fixture::new();
        let ana = fx.user("Ana").await;
        let ben = fx.user("Ben").await;
        let mo = fx.user("Mo").await;
        let group = fx.group(ana).await;
        fx.join(group, ben, Role::Member).await;
        fx.join(group, mo, Role::Moderator).await;

        let err = create_invitation(&fx.state, ana, group, invite(ben))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(Conflict::AlreadyMember)));

        let err = create_invitation(&fx.state, ana, group, invite(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(Entity::User)));

        let err = create_invitation(&fx.state, ben, group, invite(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Forbidden(Forbidden::InsufficientRole(Role::Moderator))
        ));

        let cy = fx.user("Cy").await;
        let mut as_admin = invite(cy);
        as_admin.role = Role::Admin;
        let err = create_invitation(&fx.state, mo, group, as_admin)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Forbidden(Forbidden::InsufficientRole(Role::Admin))
        ));
    }

    #[tokio::test]
    async fn create_validates_expiry_window() {
        let fx = Fixture::new();
        let ana = fx.user("Ana").await;
        let ben = fx.user("Ben").await;
        let group = fx.group(ana).await;
        for days in [0, 31] {
            let mut input = invite(ben);
            input.expires_in_days = days;
            let err = create_invitation(&fx.state, ana, group, input).await.unwrap_err();
            assert!(matches!(err, AppError::BadRequest(BadRequest::Validation(_))));
        }
    }

    #[tokio::test]
    async fn accepting_when_already_member_keeps_invitation_pending() {
        let fx = Fixture::new();
        let ana = fx.user("Ana").await;
        let ben = fx.user("Ben").await;
        let group = fx.group(ana).await;
        let inv = create_invitation(&fx.state, ana, group, invite(ben)).await.unwrap();
        fx.join(group, ben, Role::Member).await;

        let err = respond_to_invitation(&fx.state, ben, inv.id, InvitationAction::Accept)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(Conflict::AlreadyMember)));
        let stored = fx.state.store.find_invitation(inv.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InvitationStatus::Pending);
    }

    #[tokio::test]
    async fn cancel_only_pending() {
        let fx = Fixture::new();
        let ana = fx.user("Ana").await;
        let ben = fx.user("Ben").await;
        let group = fx.group(ana).await;
        let inv = create_invitation(&fx.state, ana, group, invite(ben)).await.unwrap();

        let err = cancel_invitation(&fx.state, ben, inv.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(Forbidden::NotAMember)));

        cancel_invitation(&fx.state, ana, inv.id).await.unwrap();
        let stored = fx.state.store.find_invitation(inv.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InvitationStatus::Declined);

        let err = cancel_invitation(&fx.state, ana, inv.id).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(BadRequest::NotPending)));
        let err = cancel_invitation(&fx.state, ana, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(Entity::Invitation)));
    }

    #[tokio::test]
    async fn cleanup_expires_only_overdue_pending() {
        let fx = Fixture::new();
        let ana = fx.user("Ana").await;
        let ben = fx.user("Ben").await;
        let cy = fx.user("Cy").await;
        let group = fx.group(ana).await;

        let mut short = invite(ben);
        short.expires_in_days = 1;
        let short = create_invitation(&fx.state, ana, group, short).await.unwrap();
        let long = create_invitation(&fx.state, ana, group, invite(cy)).await.unwrap();

        assert_eq!(cleanup_expired_invitations(&fx.state).await.unwrap(), 0);
        fx.clock.advance(time::Duration::days(2));
        assert_eq!(cleanup_expired_invitations(&fx.state).await.unwrap(), 1);
        assert_eq!(cleanup_expired_invitations(&fx.state).await.unwrap(), 0);

        let short = fx.state.store.find_invitation(short.id).await.unwrap().unwrap();
        let long = fx.state.store.find_invitation(long.id).await.unwrap().unwrap();
        assert_eq!(short.status, InvitationStatus::Expired);
        assert_eq!(long.status, InvitationStatus::Pending);

        let pending = group_invitations(&fx.state, ana, group).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].invited_user.as_ref().map(|u| u.id), Some(cy));
    }

    #[tokio::test]
    async fn cleanup_task_runs_on_interval() {
        let fx = Fixture::new();
        let ana = fx.user("Ana").await;
        let ben = fx.user("Ben").await;
        let group = fx.group(ana).await;
        let mut input = invite(ben);
        input.expires_in_days = 1;
        let inv = create_invitation(&fx.state, ana, group, input).await.unwrap();
        fx.clock.advance(time::Duration::days(2));

        let handle = spawn_cleanup_task(fx.state.clone(), Duration::from_secs(60));
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        let stored = fx.state.store.find_invitation(inv.id).await.unwrap().unwrap();
        assert_eq!(stored.status, InvitationStatus::Expired);
    }
}
