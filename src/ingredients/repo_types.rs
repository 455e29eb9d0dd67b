use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Ingredient record. Ingredients are global; only the creator may change one.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub calories_per_unit: Option<f64>,
    pub protein_per_unit: Option<f64>,
    pub carbs_per_unit: Option<f64>,
    pub fat_per_unit: Option<f64>,
    pub created_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct IngredientPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub calories_per_unit: Option<f64>,
    pub protein_per_unit: Option<f64>,
    pub carbs_per_unit: Option<f64>,
    pub fat_per_unit: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct IngredientFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub limit: i64,
}
