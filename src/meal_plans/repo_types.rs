use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::UserSummary;
use crate::ingredients::repo_types::Ingredient;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MealPlan {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub group_id: Uuid,
    pub created_by: Uuid,
    #[serde(with = "time::serde::rfc3339::option")]
    pub start_date: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct MealPlanPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<OffsetDateTime>,
    pub end_date: Option<OffsetDateTime>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanView {
    #[serde(flatten)]
    pub meal_plan: MealPlan,
    pub creator: UserSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "meal_type", rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    pub id: Uuid,
    pub meal_plan_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub prep_time: Option<i32>,
    pub cook_time: Option<i32>,
    pub servings: Option<i32>,
    pub meal_type: Option<MealType>,
    pub day_of_week: Option<i16>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub planned_date: Option<OffsetDateTime>,
    pub created_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct MealPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub prep_time: Option<i32>,
    pub cook_time: Option<i32>,
    pub servings: Option<i32>,
    pub meal_type: Option<MealType>,
    pub day_of_week: Option<i16>,
    pub planned_date: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MealIngredient {
    pub id: Uuid,
    pub meal_id: Uuid,
    pub ingredient_id: Uuid,
    pub quantity: f64,
    pub unit: Option<String>,
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealIngredientView {
    #[serde(flatten)]
    pub meal_ingredient: MealIngredient,
    pub ingredient: Ingredient,
}

/// One meal-ingredient line of a plan, joined with the ingredient's name.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PlanIngredientRow {
    pub ingredient_id: Uuid,
    pub ingredient_name: String,
    pub quantity: f64,
    pub unit: Option<String>,
}
