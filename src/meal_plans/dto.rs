use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{
    Meal, MealIngredientView, MealPatch, MealPlanPatch, MealPlanView, MealType,
};
use crate::error::{AppError, AppResult};
use crate::validation;

fn check_date_order(
    start: Option<OffsetDateTime>,
    end: Option<OffsetDateTime>,
) -> AppResult<()> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(AppError::validation(
            "endDate must not be before startDate",
        )),
        _ => Ok(()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMealPlanRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
}

impl CreateMealPlanRequest {
    pub fn validate(&self) -> AppResult<()> {
        validation::text("name", &self.name, 1, 100)?;
        validation::optional_text("description", self.description.as_deref(), 500)?;
        check_date_order(self.start_date, self.end_date)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMealPlanRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub start_date: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub end_date: Option<OffsetDateTime>,
    pub is_active: Option<bool>,
}

impl UpdateMealPlanRequest {
    /// `current` is the stored `(start, end)` the patch lands on.
    pub fn validate(
        &self,
        current: (Option<OffsetDateTime>, Option<OffsetDateTime>),
    ) -> AppResult<()> {
        if let Some(name) = &self.name {
            validation::text("name", name, 1, 100)?;
        }
        validation::optional_text("description", self.description.as_deref(), 500)?;
        check_date_order(
            self.start_date.or(current.0),
            self.end_date.or(current.1),
        )
    }

    pub fn into_patch(self) -> MealPlanPatch {
        MealPlanPatch {
            name: self.name,
            description: self.description,
            start_date: self.start_date,
            end_date: self.end_date,
            is_active: self.is_active,
        }
    }
}

/// A meal plan with its creator and meals.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPlanDetails {
    #[serde(flatten)]
    pub plan: MealPlanView,
    pub meals: Vec<Meal>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealFields {
    pub name: Option<String>,
    pub description: Option<String>,
    pub instructions: Option<String>,
    pub prep_time: Option<i32>,
    pub cook_time: Option<i32>,
    pub servings: Option<i32>,
    pub meal_type: Option<MealType>,
    pub day_of_week: Option<i16>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub planned_date: Option<OffsetDateTime>,
}

impl MealFields {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(name) = &self.name {
            validation::text("name", name, 1, 100)?;
        }
        validation::optional_text("description", self.description.as_deref(), 500)?;
        validation::optional_text("instructions", self.instructions.as_deref(), 2000)?;
        validation::min_int("prepTime", self.prep_time, 0)?;
        validation::min_int("cookTime", self.cook_time, 0)?;
        validation::min_int("servings", self.servings, 1)?;
        if let Some(day) = self.day_of_week {
            validation::int_range("dayOfWeek", day, 0, 6)?;
        }
        Ok(())
    }

    pub fn into_patch(self) -> MealPatch {
        MealPatch {
            name: self.name,
            description: self.description,
            instructions: self.instructions,
            prep_time: self.prep_time,
            cook_time: self.cook_time,
            servings: self.servings,
            meal_type: self.meal_type,
            day_of_week: self.day_of_week,
            planned_date: self.planned_date,
        }
    }
}

/// Body of a meal creation: `name` is required, the rest as in an update.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMealRequest {
    pub name: String,
    #[serde(flatten)]
    pub fields: MealFields,
}

impl CreateMealRequest {
    pub fn validate(&self) -> AppResult<()> {
        validation::text("name", &self.name, 1, 100)?;
        self.fields.validate()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealDetails {
    #[serde(flatten)]
    pub meal: Meal,
    pub ingredients: Vec<MealIngredientView>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMealIngredientRequest {
    pub ingredient_id: Uuid,
    pub quantity: f64,
    pub unit: Option<String>,
    pub notes: Option<String>,
}

impl AddMealIngredientRequest {
    pub fn validate(&self) -> AppResult<()> {
        validation::min_number("quantity", Some(self.quantity), 0.1)?;
        validation::optional_text("unit", self.unit.as_deref(), 20)?;
        validation::optional_text("notes", self.notes.as_deref(), 200)
    }
}
