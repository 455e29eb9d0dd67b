use serde::Deserialize;

use super::repo_types::{IngredientFilter, IngredientPatch};
use crate::error::AppResult;
use crate::validation;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIngredientRequest {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub calories_per_unit: Option<f64>,
    pub protein_per_unit: Option<f64>,
    pub carbs_per_unit: Option<f64>,
    pub fat_per_unit: Option<f64>,
}

impl CreateIngredientRequest {
    pub fn validate(&self) -> AppResult<()> {
        validation::text("name", &self.name, 1, 100)?;
        validate_details(
            self.description.as_deref(),
            self.category.as_deref(),
            self.unit.as_deref(),
            [
                ("caloriesPerUnit", self.calories_per_unit),
                ("proteinPerUnit", self.protein_per_unit),
                ("carbsPerUnit", self.carbs_per_unit),
                ("fatPerUnit", self.fat_per_unit),
            ],
        )
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateIngredientRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub calories_per_unit: Option<f64>,
    pub protein_per_unit: Option<f64>,
    pub carbs_per_unit: Option<f64>,
    pub fat_per_unit: Option<f64>,
}

impl UpdateIngredientRequest {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(name) = &self.name {
            validation::text("name", name, 1, 100)?;
        }
        validate_details(
            self.description.as_deref(),
            self.category.as_deref(),
            self.unit.as_deref(),
            [
                ("caloriesPerUnit", self.calories_per_unit),
                ("proteinPerUnit", self.protein_per_unit),
                ("carbsPerUnit", self.carbs_per_unit),
                ("fatPerUnit", self.fat_per_unit),
            ],
        )
    }

    pub fn into_patch(self) -> IngredientPatch {
        IngredientPatch {
            name: self.name,
            description: self.description,
            category: self.category,
            unit: self.unit,
            calories_per_unit: self.calories_per_unit,
            protein_per_unit: self.protein_per_unit,
            carbs_per_unit: self.carbs_per_unit,
            fat_per_unit: self.fat_per_unit,
        }
    }
}

fn validate_details(
    description: Option<&str>,
    category: Option<&str>,
    unit: Option<&str>,
    macros: [(&str, Option<f64>); 4],
) -> AppResult<()> {
    validation::optional_text("description", description, 500)?;
    validation::optional_text("category", category, 50)?;
    validation::optional_text("unit", unit, 20)?;
    for (field, value) in macros {
        validation::min_number(field, value, 0.0)?;
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct ListIngredientsQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

impl ListIngredientsQuery {
    pub fn validate(&self) -> AppResult<()> {
        validation::int_range("limit", self.limit, 1, 100)
    }

    pub fn into_filter(self) -> IngredientFilter {
        IngredientFilter {
            search: self.search.filter(|s| !s.is_empty()),
            category: self.category.filter(|c| !c.is_empty()),
            limit: self.limit,
        }
    }
}
