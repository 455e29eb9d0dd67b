use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Public projection of a user row. Users are provisioned by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub username: Option<String>,
    pub image: Option<String>,
}
