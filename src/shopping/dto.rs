use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::repo_types::{ShoppingList, ShoppingListItem};
use crate::error::AppResult;
use crate::validation;

/// Body of both plain creation and generation of a list.
#[derive(Debug, Deserialize)]
pub struct ShoppingListNameRequest {
    pub name: String,
}

impl ShoppingListNameRequest {
    pub fn validate(&self) -> AppResult<()> {
        validation::text("name", &self.name, 1, 100)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub name: String,
    pub quantity: f64,
    pub unit: Option<String>,
    pub notes: Option<String>,
    pub ingredient_id: Option<Uuid>,
}

impl AddItemRequest {
    pub fn validate(&self) -> AppResult<()> {
        validation::text("name", &self.name, 1, 100)?;
        validation::min_number("quantity", Some(self.quantity), 0.1)?;
        validation::optional_text("unit", self.unit.as_deref(), 20)?;
        validation::optional_text("notes", self.notes.as_deref(), 200)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingListDetails {
    #[serde(flatten)]
    pub list: ShoppingList,
    pub items: Vec<ShoppingListItem>,
}
