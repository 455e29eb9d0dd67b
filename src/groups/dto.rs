use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::{Group, GroupPatch, MemberView};
use crate::error::AppResult;
use crate::roles::Role;
use crate::validation;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    pub name: String,
    pub description: Option<String>,
}

impl CreateGroupRequest {
    pub fn validate(&self) -> AppResult<()> {
        validation::text("name", &self.name, 1, 100)?;
        validation::optional_text("description", self.description.as_deref(), 500)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGroupRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl UpdateGroupRequest {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(name) = &self.name {
            validation::text("name", name, 1, 100)?;
        }
        validation::optional_text("description", self.description.as_deref(), 500)
    }

    pub fn into_patch(self) -> GroupPatch {
        GroupPatch {
            name: self.name,
            description: self.description,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMemberRoleRequest {
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct SearchUsersQuery {
    pub query: String,
    #[serde(default = "default_search_limit")]
    pub limit: i64,
}

fn default_search_limit() -> i64 {
    10
}

impl SearchUsersQuery {
    pub fn validate(&self) -> AppResult<()> {
        validation::text("query", &self.query, 1, usize::MAX)?;
        validation::int_range("limit", self.limit, 1, 50)
    }
}

/// A group with its members.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDetails {
    #[serde(flatten)]
    pub group: Group,
    pub members: Vec<MemberView>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub const OK: Self = Self { success: true };
}
