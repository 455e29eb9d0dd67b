use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppResult;
use crate::roles::Role;
use crate::validation;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvitationRequest {
    pub invited_user_id: Uuid,
    #[serde(default)]
    pub role: Role,
    pub message: Option<String>,
    #[serde(default = "default_expires_in_days")]
    pub expires_in_days: i64,
}

fn default_expires_in_days() -> i64 {
    7
}

impl CreateInvitationRequest {
    pub fn validate(&self) -> AppResult<()> {
        validation::optional_text("message", self.message.as_deref(), 500)?;
        validation::int_range("expiresInDays", self.expires_in_days, 1, 30)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationAction {
    Accept,
    Decline,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub action: InvitationAction,
}

/// Past-tense outcome of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RespondOutcome {
    Accepted,
    Declined,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct RespondResponse {
    pub success: bool,
    pub action: RespondOutcome,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    pub success: bool,
    pub expired_count: u64,
}
