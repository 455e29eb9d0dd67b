use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::roles::Role;
use crate::store::StoreError;

/// Kinds of rows an operation can fail to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    Group,
    Member,
    Invitation,
    MealPlan,
    Meal,
    Ingredient,
    ShoppingList,
    ShoppingListItem,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Entity::User => "User",
            Entity::Group => "Group",
            Entity::Member => "Member",
            Entity::Invitation => "Invitation",
            Entity::MealPlan => "Meal plan",
            Entity::Meal => "Meal",
            Entity::Ingredient => "Ingredient",
            Entity::ShoppingList => "Shopping list",
            Entity::ShoppingListItem => "Shopping list item",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Forbidden {
    #[error("You are not a member of this group")]
    NotAMember,
    #[error("You need {0} permissions or higher")]
    InsufficientRole(Role),
    #[error("A group must keep at least one admin")]
    LastAdmin,
    #[error("You don't have access to this meal plan")]
    NoAccess,
    #[error("You can only modify your own ingredients")]
    NotOwner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Conflict {
    #[error("User is already a member of this group")]
    AlreadyMember,
    #[error("User already has a pending invitation to this group")]
    DuplicatePendingInvitation,
    #[error("Ingredient already added to this meal")]
    DuplicateIngredient,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BadRequest {
    #[error("Invitation has expired")]
    InvitationExpired,
    #[error("Can only cancel pending invitations")]
    NotPending,
    #[error("{0}")]
    Validation(String),
}

/// Error returned by every service operation.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(Entity),
    #[error(transparent)]
    Forbidden(#[from] Forbidden),
    #[error(transparent)]
    Conflict(#[from] Conflict),
    #[error(transparent)]
    BadRequest(#[from] BadRequest),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::BadRequest(BadRequest::Validation(message.into()))
    }

    pub const fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::Forbidden(_) => "forbidden",
            AppError::Conflict(_) => "conflict",
            AppError::BadRequest(_) => "bad_request",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Internal(anyhow::Error::new(e))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::validation(rejection.body_text())
    }
}

impl StoreError {
    /// Turns a unique-constraint failure into the given conflict, anything else into an
    /// internal error.
    pub fn or_conflict(self, conflict: Conflict) -> AppError {
        match self {
            StoreError::UniqueViolation(_) => AppError::Conflict(conflict),
            other => other.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Internal details stay in the log.
        let message = match &self {
            AppError::Internal(e) => {
                error!(error = %e, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": self.kind(), "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            AppError::NotFound(Entity::Group).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(Forbidden::LastAdmin).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::from(Conflict::AlreadyMember).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::from(BadRequest::InvitationExpired).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn messages_are_human_readable() {
        assert_eq!(AppError::NotFound(Entity::MealPlan).to_string(), "Meal plan not found");
        assert_eq!(
            AppError::from(Forbidden::InsufficientRole(Role::Moderator)).to_string(),
            "You need moderator permissions or higher"
        );
    }

    #[test]
    fn unique_violation_maps_to_requested_conflict() {
        let err = StoreError::UniqueViolation("group_members_group_user_key".into())
            .or_conflict(Conflict::AlreadyMember);
        assert!(matches!(err, AppError::Conflict(Conflict::AlreadyMember)));
    }

    #[tokio::test]
    async fn internal_errors_do_not_leak_details() {
        use http_body_util::BodyExt;

        let response = AppError::from(anyhow::anyhow!("password=hunter2")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("hunter2"));
        assert!(text.contains("internal"));
    }
}
