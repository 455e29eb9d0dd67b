use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, FromRow, PgConnection, PgPool};
use time::OffsetDateTime;
use tracing::debug;
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

/// Postgres-backed store.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { pool })
    }

    /// Run pending migrations from `./migrations`.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("run migrations")?;
        Ok(())
    }
}

fn map_err(e: sqlx::Error) -> StoreError {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            return StoreError::UniqueViolation(db.constraint().unwrap_or("unique").to_string());
        }
    }
    StoreError::Database(e)
}

/// `%query%` with LIKE wildcards in the query taken literally.
fn contains_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn user_summary(
    id: Option<Uuid>,
    name: Option<String>,
    email: Option<String>,
    username: Option<String>,
    image: Option<String>,
) -> Option<UserSummary> {
    Some(UserSummary {
        id: id?,
        name: name?,
        email: email?,
        username,
        image,
    })
}

/// Lock the group row so admin-count checks on it serialize.
async fn lock_group(conn: &mut PgConnection, group_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT id FROM groups WHERE id = $1 FOR UPDATE")
        .bind(group_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(())
}

async fn count_admins(conn: &mut PgConnection, group_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM group_members WHERE group_id = $1 AND role = 'admin'",
    )
    .bind(group_id)
    .fetch_one(&mut *conn)
    .await
}

async fn member_for_update(
    conn: &mut PgConnection,
    group_id: Uuid,
    user_id: Uuid,
) -> Result<Option<GroupMember>, sqlx::Error> {
    sqlx::query_as::<_, GroupMember>(
        r#"
        SELECT id, group_id, user_id, role, joined_at, updated_at
          FROM group_members
         WHERE group_id = $1 AND user_id = $2
         FOR UPDATE
        "#,
    )
    .bind(group_id)
    .bind(user_id)
    .fetch_optional(&mut *conn)
    .await
}

async fn insert_member_on(conn: &mut PgConnection, member: &GroupMember) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO group_members (id, group_id, user_id, role, joined_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(member.id)
    .bind(member.group_id)
    .bind(member.user_id)
    .bind(member.role)
    .bind(member.joined_at)
    .bind(member.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(map_err)?;
    Ok(())
}

#[async_trait]
impl UserRepo for PgStore {
    async fn insert_user(&self, user: &UserSummary) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, username, image)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.image)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<UserSummary>> {
        let user = sqlx::query_as::<_, UserSummary>(
            "SELECT id, name, email, username, image FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn search_users(
        &self,
        query: &str,
        exclude_group: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<UserSummary>> {
        let rows = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT u.id, u.name, u.email, u.username, u.image
              FROM users u
             WHERE u.name LIKE $1
               AND NOT EXISTS (
                   SELECT 1 FROM group_members m
                    WHERE m.group_id = $2 AND m.user_id = u.id
               )
             ORDER BY u.name
             LIMIT $3
            "#,
        )
        .bind(contains_pattern(query))
        .bind(exclude_group)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[derive(FromRow)]
struct MemberRow {
    member_id: Uuid,
    role: Role,
    joined_at: OffsetDateTime,
    #[sqlx(flatten)]
    user: UserSummary,
}

#[async_trait]
impl GroupRepo for PgStore {
    async fn create_group(&self, group: &Group, admin: &GroupMember) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO groups (id, name, description, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(group.id)
        .bind(&group.name)
        .bind(&group.description)
        .bind(group.created_by)
        .bind(group.created_at)
        .bind(group.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_err)?;
        insert_member_on(&mut tx, admin).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn find_group(&self, id: Uuid) -> StoreResult<Option<Group>> {
        let group = sqlx::query_as::<_, Group>(
            r#"
            SELECT id, name, description, created_by, created_at, updated_at
              FROM groups
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(group)
    }

    async fn list_groups_for_user(&self, user_id: Uuid) -> StoreResult<Vec<MyGroup>> {
        let rows = sqlx::query_as::<_, MyGroup>(
            r#"
            SELECT g.id, g.name, g.description, g.created_by, g.created_at, g.updated_at,
                   m.role AS member_role, m.joined_at
              FROM group_members m
              JOIN groups g ON g.id = m.group_id
             WHERE m.user_id = $1
             ORDER BY g.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn update_group(
        &self,
        id: Uuid,
        patch: &GroupPatch,
        now: OffsetDateTime,
    ) -> StoreResult<Option<Group>> {
        let group = sqlx::query_as::<_, Group>(
            r#"
            UPDATE groups
               SET name = COALESCE($2, name),
                   description = COALESCE($3, description),
                   updated_at = $4
             WHERE id = $1
            RETURNING id, name, description, created_by, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.description)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(group)
    }

    async fn delete_group(&self, id: Uuid) -> StoreResult<bool> {
        // Children go with ON DELETE CASCADE.
        let res = sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn find_member(&self, group_id: Uuid, user_id: Uuid) -> StoreResult<Option<GroupMember>> {
        let member = sqlx::query_as::<_, GroupMember>(
            r#"
            SELECT id, group_id, user_id, role, joined_at, updated_at
              FROM group_members
             WHERE group_id = $1 AND user_id = $2
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(member)
    }

    async fn list_members(&self, group_id: Uuid) -> StoreResult<Vec<MemberView>> {
        let rows = sqlx::query_as::<_, MemberRow>(
            r#"
            SELECT m.id AS member_id, m.role, m.joined_at,
                   u.id, u.name, u.email, u.username, u.image
              FROM group_members m
              JOIN users u ON u.id = m.user_id
             WHERE m.group_id = $1
             ORDER BY m.joined_at
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| MemberView {
                id: r.member_id,
                role: r.role,
                joined_at: r.joined_at,
                user: r.user,
            })
            .collect())
    }

    async fn insert_member(&self, member: &GroupMember) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_member_on(&mut conn, member).await
    }

    async fn update_member_role(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        role: Role,
        now: OffsetDateTime,
    ) -> StoreResult<MemberChange<GroupMember>> {
        let mut tx = self.pool.begin().await?;
        lock_group(&mut tx, group_id).await?;

        let Some(target) = member_for_update(&mut tx, group_id, user_id).await? else {
            return Ok(MemberChange::NotMember);
        };
        if target.role == Role::Admin && count_admins(&mut tx, group_id).await? <= 1 {
            debug!(%group_id, %user_id, "role change refused for last admin");
            return Ok(MemberChange::LastAdmin);
        }

        let updated = sqlx::query_as::<_, GroupMember>(
            r#"
            UPDATE group_members
               SET role = $3, updated_at = $4
             WHERE group_id = $1 AND user_id = $2
            RETURNING id, group_id, user_id, role, joined_at, updated_at
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .bind(role)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(MemberChange::Applied(updated))
    }

    async fn remove_member(&self, group_id: Uuid, user_id: Uuid) -> StoreResult<MemberChange<()>> {
        let mut tx = self.pool.begin().await?;
        lock_group(&mut tx, group_id).await?;

        let Some(target) = member_for_update(&mut tx, group_id, user_id).await? else {
            return Ok(MemberChange::NotMember);
        };
        if target.role == Role::Admin && count_admins(&mut tx, group_id).await? <= 1 {
            debug!(%group_id, %user_id, "removal refused for last admin");
            return Ok(MemberChange::LastAdmin);
        }

        sqlx::query("DELETE FROM group_members WHERE group_id = $1 AND user_id = $2")
            .bind(group_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(MemberChange::Applied(()))
    }
}

#[derive(FromRow)]
struct GroupInvitationRow {
    id: Uuid,
    role: Role,
    status: InvitationStatus,
    message: Option<String>,
    expires_at: OffsetDateTime,
    created_at: OffsetDateTime,
    invited_id: Option<Uuid>,
    invited_name: Option<String>,
    invited_email: Option<String>,
    invited_username: Option<String>,
    invited_image: Option<String>,
    inviter_id: Option<Uuid>,
    inviter_name: Option<String>,
    inviter_email: Option<String>,
    inviter_username: Option<String>,
    inviter_image: Option<String>,
}

#[derive(FromRow)]
struct MyInvitationRow {
    id: Uuid,
    role: Role,
    status: InvitationStatus,
    message: Option<String>,
    expires_at: OffsetDateTime,
    created_at: OffsetDateTime,
    group_id: Uuid,
    group_name: String,
    group_description: Option<String>,
    inviter_id: Uuid,
    inviter_name: String,
    inviter_email: String,
    inviter_username: Option<String>,
    inviter_image: Option<String>,
}

#[async_trait]
impl InvitationRepo for PgStore {
    async fn insert_invitation(&self, invitation: &GroupInvitation) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO group_invitations (
                id, group_id, invited_user_id, invited_by_user_id, role, status,
                message, expires_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(invitation.id)
        .bind(invitation.group_id)
        .bind(invitation.invited_user_id)
        .bind(invitation.invited_by_user_id)
        .bind(invitation.role)
        .bind(invitation.status)
        .bind(&invitation.message)
        .bind(invitation.expires_at)
        .bind(invitation.created_at)
        .bind(invitation.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn find_invitation(&self, id: Uuid) -> StoreResult<Option<GroupInvitation>> {
        let invitation = sqlx::query_as::<_, GroupInvitation>(
            r#"
            SELECT id, group_id, invited_user_id, invited_by_user_id, role, status,
                   message, expires_at, created_at, updated_at
              FROM group_invitations
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(invitation)
    }

    async fn find_pending_invitation(
        &self,
        group_id: Uuid,
        invited_user_id: Uuid,
    ) -> StoreResult<Option<GroupInvitation>> {
        let invitation = sqlx::query_as::<_, GroupInvitation>(
            r#"
            SELECT id, group_id, invited_user_id, invited_by_user_id, role, status,
                   message, expires_at, created_at, updated_at
              FROM group_invitations
             WHERE group_id = $1 AND invited_user_id = $2 AND status = 'pending'
            "#,
        )
        .bind(group_id)
        .bind(invited_user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(invitation)
    }

    async fn list_group_invitations(
        &self,
        group_id: Uuid,
    ) -> StoreResult<Vec<GroupInvitationView>> {
        let rows = sqlx::query_as::<_, GroupInvitationRow>(
            r#"
            SELECT i.id, i.role, i.status, i.message, i.expires_at, i.created_at,
                   iu.id AS invited_id, iu.name AS invited_name, iu.email AS invited_email,
                   iu.username AS invited_username, iu.image AS invited_image,
                   ib.id AS inviter_id, ib.name AS inviter_name, ib.email AS inviter_email,
                   ib.username AS inviter_username, ib.image AS inviter_image
              FROM group_invitations i
              LEFT JOIN users iu ON iu.id = i.invited_user_id
              LEFT JOIN users ib ON ib.id = i.invited_by_user_id
             WHERE i.group_id = $1 AND i.status = 'pending'
             ORDER BY i.created_at DESC
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| GroupInvitationView {
                id: r.id,
                role: r.role,
                status: r.status,
                message: r.message,
                expires_at: r.expires_at,
                created_at: r.created_at,
                invited_user: user_summary(
                    r.invited_id,
                    r.invited_name,
                    r.invited_email,
                    r.invited_username,
                    r.invited_image,
                ),
                invited_by_user: user_summary(
                    r.inviter_id,
                    r.inviter_name,
                    r.inviter_email,
                    r.inviter_username,
                    r.inviter_image,
                ),
            })
            .collect())
    }

    async fn list_user_invitations(&self, user_id: Uuid) -> StoreResult<Vec<MyInvitationView>> {
        let rows = sqlx::query_as::<_, MyInvitationRow>(
            r#"
            SELECT i.id, i.role, i.status, i.message, i.expires_at, i.created_at,
                   g.id AS group_id, g.name AS group_name, g.description AS group_description,
                   u.id AS inviter_id, u.name AS inviter_name, u.email AS inviter_email,
                   u.username AS inviter_username, u.image AS inviter_image
              FROM group_invitations i
              JOIN groups g ON g.id = i.group_id
              JOIN users u ON u.id = i.invited_by_user_id
             WHERE i.invited_user_id = $1 AND i.status = 'pending'
             ORDER BY i.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| MyInvitationView {
                id: r.id,
                role: r.role,
                status: r.status,
                message: r.message,
                expires_at: r.expires_at,
                created_at: r.created_at,
                group: GroupSummary {
                    id: r.group_id,
                    name: r.group_name,
                    description: r.group_description,
                },
                invited_by_user: UserSummary {
                    id: r.inviter_id,
                    name: r.inviter_name,
                    email: r.inviter_email,
                    username: r.inviter_username,
                    image: r.inviter_image,
                },
            })
            .collect())
    }

    async fn transition_invitation(
        &self,
        id: Uuid,
        from: InvitationStatus,
        to: InvitationStatus,
        now: OffsetDateTime,
    ) -> StoreResult<bool> {
        let res = sqlx::query(
            r#"
            UPDATE group_invitations
               SET status = $3, updated_at = $4
             WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn accept_invitation(
        &self,
        invitation_id: Uuid,
        member: &GroupMember,
        now: OffsetDateTime,
    ) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        let flipped = sqlx::query(
            r#"
            UPDATE group_invitations
               SET status = 'accepted', updated_at = $2
             WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(invitation_id)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if flipped == 0 {
            return Ok(false);
        }
        insert_member_on(&mut tx, member).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn expire_invitations(&self, now: OffsetDateTime) -> StoreResult<u64> {
        let res = sqlx::query(
            r#"
            UPDATE group_invitations
               SET status = 'expired', updated_at = $1
             WHERE status = 'pending' AND expires_at < $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }
}

#[derive(FromRow)]
struct MealPlanRow {
    #[sqlx(flatten)]
    meal_plan: MealPlan,
    creator_id: Uuid,
    creator_name: String,
    creator_email: String,
    creator_username: Option<String>,
    creator_image: Option<String>,
}

impl From<MealPlanRow> for MealPlanView {
    fn from(r: MealPlanRow) -> Self {
        Self {
            meal_plan: r.meal_plan,
            creator: UserSummary {
                id: r.creator_id,
                name: r.creator_name,
                email: r.creator_email,
                username: r.creator_username,
                image: r.creator_image,
            },
        }
    }
}

#[derive(FromRow)]
struct PlanAccessRow {
    #[sqlx(flatten)]
    meal_plan: MealPlan,
    member_id: Uuid,
    member_group_id: Uuid,
    member_user_id: Uuid,
    member_role: Role,
    member_joined_at: OffsetDateTime,
    member_updated_at: OffsetDateTime,
}

#[derive(FromRow)]
struct MealIngredientRow {
    line_id: Uuid,
    meal_id: Uuid,
    ingredient_id: Uuid,
    quantity: f64,
    line_unit: Option<String>,
    notes: Option<String>,
    line_created_at: OffsetDateTime,
    #[sqlx(flatten)]
    ingredient: Ingredient,
}

#[async_trait]
impl MealPlanRepo for PgStore {
    async fn insert_meal_plan(&self, plan: &MealPlan) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO meal_plans (
                id, name, description, group_id, created_by, start_date, end_date,
                is_active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(plan.id)
        .bind(&plan.name)
        .bind(&plan.description)
        .bind(plan.group_id)
        .bind(plan.created_by)
        .bind(plan.start_date)
        .bind(plan.end_date)
        .bind(plan.is_active)
        .bind(plan.created_at)
        .bind(plan.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn find_meal_plan_access(
        &self,
        plan_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<(MealPlan, GroupMember)>> {
        let row = sqlx::query_as::<_, PlanAccessRow>(
            r#"
            SELECT p.id, p.name, p.description, p.group_id, p.created_by, p.start_date,
                   p.end_date, p.is_active, p.created_at, p.updated_at,
                   m.id AS member_id, m.group_id AS member_group_id, m.user_id AS member_user_id,
                   m.role AS member_role, m.joined_at AS member_joined_at,
                   m.updated_at AS member_updated_at
              FROM meal_plans p
              JOIN group_members m ON m.group_id = p.group_id
             WHERE p.id = $1 AND m.user_id = $2
            "#,
        )
        .bind(plan_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| {
            (
                r.meal_plan,
                GroupMember {
                    id: r.member_id,
                    group_id: r.member_group_id,
                    user_id: r.member_user_id,
                    role: r.member_role,
                    joined_at: r.member_joined_at,
                    updated_at: r.member_updated_at,
                },
            )
        }))
    }

    async fn find_meal_plan_view(&self, id: Uuid) -> StoreResult<Option<MealPlanView>> {
        let row = sqlx::query_as::<_, MealPlanRow>(
            r#"
            SELECT p.id, p.name, p.description, p.group_id, p.created_by, p.start_date,
                   p.end_date, p.is_active, p.created_at, p.updated_at,
                   u.id AS creator_id, u.name AS creator_name, u.email AS creator_email,
                   u.username AS creator_username, u.image AS creator_image
              FROM meal_plans p
              JOIN users u ON u.id = p.created_by
             WHERE p.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(MealPlanView::from))
    }

    async fn list_meal_plans(&self, group_id: Uuid) -> StoreResult<Vec<MealPlanView>> {
        let rows = sqlx::query_as::<_, MealPlanRow>(
            r#"
            SELECT p.id, p.name, p.description, p.group_id, p.created_by, p.start_date,
                   p.end_date, p.is_active, p.created_at, p.updated_at,
                   u.id AS creator_id, u.name AS creator_name, u.email AS creator_email,
                   u.username AS creator_username, u.image AS creator_image
              FROM meal_plans p
              JOIN users u ON u.id = p.created_by
             WHERE p.group_id = $1
             ORDER BY p.created_at DESC
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(MealPlanView::from).collect())
    }

    async fn update_meal_plan(
        &self,
        id: Uuid,
        patch: &MealPlanPatch,
        now: OffsetDateTime,
    ) -> StoreResult<Option<MealPlan>> {
        let plan = sqlx::query_as::<_, MealPlan>(
            r#"
            UPDATE meal_plans
               SET name = COALESCE($2, name),
                   description = COALESCE($3, description),
                   start_date = COALESCE($4, start_date),
                   end_date = COALESCE($5, end_date),
                   is_active = COALESCE($6, is_active),
                   updated_at = $7
             WHERE id = $1
            RETURNING id, name, description, group_id, created_by, start_date, end_date,
                      is_active, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.description)
        .bind(patch.start_date)
        .bind(patch.end_date)
        .bind(patch.is_active)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(plan)
    }

    async fn delete_meal_plan(&self, id: Uuid) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM meal_plans WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn insert_meal(&self, meal: &Meal) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO meals (
                id, meal_plan_id, name, description, instructions, prep_time, cook_time,
                servings, meal_type, day_of_week, planned_date, created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(meal.id)
        .bind(meal.meal_plan_id)
        .bind(&meal.name)
        .bind(&meal.description)
        .bind(&meal.instructions)
        .bind(meal.prep_time)
        .bind(meal.cook_time)
        .bind(meal.servings)
        .bind(meal.meal_type)
        .bind(meal.day_of_week)
        .bind(meal.planned_date)
        .bind(meal.created_by)
        .bind(meal.created_at)
        .bind(meal.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn find_meal(&self, id: Uuid) -> StoreResult<Option<Meal>> {
        let meal = sqlx::query_as::<_, Meal>(
            r#"
            SELECT id, meal_plan_id, name, description, instructions, prep_time, cook_time,
                   servings, meal_type, day_of_week, planned_date, created_by, created_at,
                   updated_at
              FROM meals
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(meal)
    }

    async fn list_meals(&self, plan_id: Uuid) -> StoreResult<Vec<Meal>> {
        let rows = sqlx::query_as::<_, Meal>(
            r#"
            SELECT id, meal_plan_id, name, description, instructions, prep_time, cook_time,
                   servings, meal_type, day_of_week, planned_date, created_by, created_at,
                   updated_at
              FROM meals
             WHERE meal_plan_id = $1
             ORDER BY day_of_week ASC NULLS LAST, planned_date ASC NULLS LAST, created_at ASC
            "#,
        )
        .bind(plan_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn update_meal(
        &self,
        id: Uuid,
        patch: &MealPatch,
        now: OffsetDateTime,
    ) -> StoreResult<Option<Meal>> {
        let meal = sqlx::query_as::<_, Meal>(
            r#"
            UPDATE meals
               SET name = COALESCE($2, name),
                   description = COALESCE($3, description),
                   instructions = COALESCE($4, instructions),
                   prep_time = COALESCE($5, prep_time),
                   cook_time = COALESCE($6, cook_time),
                   servings = COALESCE($7, servings),
                   meal_type = COALESCE($8, meal_type),
                   day_of_week = COALESCE($9, day_of_week),
                   planned_date = COALESCE($10, planned_date),
                   updated_at = $11
             WHERE id = $1
            RETURNING id, meal_plan_id, name, description, instructions, prep_time, cook_time,
                      servings, meal_type, day_of_week, planned_date, created_by, created_at,
                      updated_at
            "#,
        )
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.description)
        .bind(&patch.instructions)
        .bind(patch.prep_time)
        .bind(patch.cook_time)
        .bind(patch.servings)
        .bind(patch.meal_type)
        .bind(patch.day_of_week)
        .bind(patch.planned_date)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(meal)
    }

    async fn delete_meal(&self, id: Uuid) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM meals WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn insert_meal_ingredient(&self, line: &MealIngredient) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO meal_ingredients
                (id, meal_id, ingredient_id, quantity, unit, notes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(line.id)
        .bind(line.meal_id)
        .bind(line.ingredient_id)
        .bind(line.quantity)
        .bind(&line.unit)
        .bind(&line.notes)
        .bind(line.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn find_meal_ingredient(
        &self,
        meal_id: Uuid,
        ingredient_id: Uuid,
    ) -> StoreResult<Option<MealIngredient>> {
        let line = sqlx::query_as::<_, MealIngredient>(
            r#"
            SELECT id, meal_id, ingredient_id, quantity, unit, notes, created_at
              FROM meal_ingredients
             WHERE meal_id = $1 AND ingredient_id = $2
            "#,
        )
        .bind(meal_id)
        .bind(ingredient_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(line)
    }

    async fn list_meal_ingredients(&self, meal_id: Uuid) -> StoreResult<Vec<MealIngredientView>> {
        let rows = sqlx::query_as::<_, MealIngredientRow>(
            r#"
            SELECT mi.id AS line_id, mi.meal_id, mi.ingredient_id, mi.quantity,
                   mi.unit AS line_unit, mi.notes, mi.created_at AS line_created_at,
                   i.id, i.name, i.description, i.category, i.unit, i.calories_per_unit,
                   i.protein_per_unit, i.carbs_per_unit, i.fat_per_unit, i.created_by,
                   i.created_at, i.updated_at
              FROM meal_ingredients mi
              JOIN ingredients i ON i.id = mi.ingredient_id
             WHERE mi.meal_id = $1
             ORDER BY mi.created_at
            "#,
        )
        .bind(meal_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| MealIngredientView {
                meal_ingredient: MealIngredient {
                    id: r.line_id,
                    meal_id: r.meal_id,
                    ingredient_id: r.ingredient_id,
                    quantity: r.quantity,
                    unit: r.line_unit,
                    notes: r.notes,
                    created_at: r.line_created_at,
                },
                ingredient: r.ingredient,
            })
            .collect())
    }

    async fn delete_meal_ingredient(
        &self,
        meal_id: Uuid,
        ingredient_id: Uuid,
    ) -> StoreResult<bool> {
        let res = sqlx::query(
            "DELETE FROM meal_ingredients WHERE meal_id = $1 AND ingredient_id = $2",
        )
        .bind(meal_id)
        .bind(ingredient_id)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn plan_ingredient_rows(&self, plan_id: Uuid) -> StoreResult<Vec<PlanIngredientRow>> {
        let rows = sqlx::query_as::<_, PlanIngredientRow>(
            r#"
            SELECT mi.ingredient_id, i.name AS ingredient_name, mi.quantity, mi.unit
              FROM meal_ingredients mi
              JOIN ingredients i ON i.id = mi.ingredient_id
              JOIN meals m ON m.id = mi.meal_id
             WHERE m.meal_plan_id = $1
             ORDER BY m.created_at, m.id, mi.created_at, mi.id
            "#,
        )
        .bind(plan_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl IngredientRepo for PgStore {
    async fn insert_ingredient(&self, ingredient: &Ingredient) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ingredients (
                id, name, description, category, unit, calories_per_unit, protein_per_unit,
                carbs_per_unit, fat_per_unit, created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(ingredient.id)
        .bind(&ingredient.name)
        .bind(&ingredient.description)
        .bind(&ingredient.category)
        .bind(&ingredient.unit)
        .bind(ingredient.calories_per_unit)
        .bind(ingredient.protein_per_unit)
        .bind(ingredient.carbs_per_unit)
        .bind(ingredient.fat_per_unit)
        .bind(ingredient.created_by)
        .bind(ingredient.created_at)
        .bind(ingredient.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn find_ingredient(&self, id: Uuid) -> StoreResult<Option<Ingredient>> {
        let ingredient = sqlx::query_as::<_, Ingredient>(
            r#"
            SELECT id, name, description, category, unit, calories_per_unit, protein_per_unit,
                   carbs_per_unit, fat_per_unit, created_by, created_at, updated_at
              FROM ingredients
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ingredient)
    }

    async fn list_ingredients(&self, filter: &IngredientFilter) -> StoreResult<Vec<Ingredient>> {
        let rows = sqlx::query_as::<_, Ingredient>(
            r#"
            SELECT id, name, description, category, unit, calories_per_unit, protein_per_unit,
                   carbs_per_unit, fat_per_unit, created_by, created_at, updated_at
              FROM ingredients
             WHERE ($1::text IS NULL OR name LIKE $1)
               AND ($2::text IS NULL OR category = $2)
             ORDER BY name
             LIMIT $3
            "#,
        )
        .bind(filter.search.as_deref().map(contains_pattern))
        .bind(&filter.category)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn update_ingredient(
        &self,
        id: Uuid,
        patch: &IngredientPatch,
        now: OffsetDateTime,
    ) -> StoreResult<Option<Ingredient>> {
        let ingredient = sqlx::query_as::<_, Ingredient>(
            r#"
            UPDATE ingredients
               SET name = COALESCE($2, name),
                   description = COALESCE($3, description),
                   category = COALESCE($4, category),
                   unit = COALESCE($5, unit),
                   calories_per_unit = COALESCE($6, calories_per_unit),
                   protein_per_unit = COALESCE($7, protein_per_unit),
                   carbs_per_unit = COALESCE($8, carbs_per_unit),
                   fat_per_unit = COALESCE($9, fat_per_unit),
                   updated_at = $10
             WHERE id = $1
            RETURNING id, name, description, category, unit, calories_per_unit, protein_per_unit,
                      carbs_per_unit, fat_per_unit, created_by, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&patch.name)
        .bind(&patch.description)
        .bind(&patch.category)
        .bind(&patch.unit)
        .bind(patch.calories_per_unit)
        .bind(patch.protein_per_unit)
        .bind(patch.carbs_per_unit)
        .bind(patch.fat_per_unit)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ingredient)
    }
}

#[derive(FromRow)]
struct ItemWithPlanRow {
    #[sqlx(flatten)]
    item: ShoppingListItem,
    meal_plan_id: Uuid,
}

async fn insert_item_on(conn: &mut PgConnection, item: &ShoppingListItem) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO shopping_list_items (
            id, shopping_list_id, ingredient_id, name, quantity, unit, is_completed, notes,
            added_by, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(item.id)
    .bind(item.shopping_list_id)
    .bind(item.ingredient_id)
    .bind(&item.name)
    .bind(item.quantity)
    .bind(&item.unit)
    .bind(item.is_completed)
    .bind(&item.notes)
    .bind(item.added_by)
    .bind(item.created_at)
    .bind(item.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(map_err)?;
    Ok(())
}

#[async_trait]
impl ShoppingRepo for PgStore {
    async fn insert_shopping_list(
        &self,
        list: &ShoppingList,
        items: &[ShoppingListItem],
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO shopping_lists
                (id, meal_plan_id, name, created_by, is_completed, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(list.id)
        .bind(list.meal_plan_id)
        .bind(&list.name)
        .bind(list.created_by)
        .bind(list.is_completed)
        .bind(list.created_at)
        .bind(list.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_err)?;
        for item in items {
            insert_item_on(&mut tx, item).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn find_shopping_list(&self, id: Uuid) -> StoreResult<Option<ShoppingList>> {
        let list = sqlx::query_as::<_, ShoppingList>(
            r#"
            SELECT id, meal_plan_id, name, created_by, is_completed, created_at, updated_at
              FROM shopping_lists
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(list)
    }

    async fn list_shopping_lists(&self, plan_id: Uuid) -> StoreResult<Vec<ShoppingList>> {
        let rows = sqlx::query_as::<_, ShoppingList>(
            r#"
            SELECT id, meal_plan_id, name, created_by, is_completed, created_at, updated_at
              FROM shopping_lists
             WHERE meal_plan_id = $1
             ORDER BY created_at DESC
            "#,
        )
        .bind(plan_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn list_shopping_list_items(&self, list_id: Uuid) -> StoreResult<Vec<ShoppingListItem>> {
        let rows = sqlx::query_as::<_, ShoppingListItem>(
            r#"
            SELECT id, shopping_list_id, ingredient_id, name, quantity, unit, is_completed,
                   notes, added_by, created_at, updated_at
              FROM shopping_list_items
             WHERE shopping_list_id = $1
             ORDER BY created_at, id
            "#,
        )
        .bind(list_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn insert_shopping_list_item(&self, item: &ShoppingListItem) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_item_on(&mut conn, item).await
    }

    async fn find_shopping_list_item(
        &self,
        id: Uuid,
    ) -> StoreResult<Option<(ShoppingListItem, Uuid)>> {
        let row = sqlx::query_as::<_, ItemWithPlanRow>(
            r#"
            SELECT i.id, i.shopping_list_id, i.ingredient_id, i.name, i.quantity, i.unit,
                   i.is_completed, i.notes, i.added_by, i.created_at, i.updated_at,
                   l.meal_plan_id
              FROM shopping_list_items i
              JOIN shopping_lists l ON l.id = i.shopping_list_id
             WHERE i.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| (r.item, r.meal_plan_id)))
    }

    async fn toggle_shopping_list_item(
        &self,
        id: Uuid,
        now: OffsetDateTime,
    ) -> StoreResult<Option<ShoppingListItem>> {
        let item = sqlx::query_as::<_, ShoppingListItem>(
            r#"
            UPDATE shopping_list_items
               SET is_completed = NOT is_completed, updated_at = $2
             WHERE id = $1
            RETURNING id, shopping_list_id, ingredient_id, name, quantity, unit, is_completed,
                      notes, added_by, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    async fn delete_shopping_list_item(&self, id: Uuid) -> StoreResult<bool> {
        let res = sqlx::query("DELETE FROM shopping_list_items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
