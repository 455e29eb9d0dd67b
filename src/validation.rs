//! Field checks shared by the request types.
use crate::error::{AppError, AppResult};

/// Length in characters must lie in `min..=max`.
pub fn text(field: &str, value: &str, min: usize, max: usize) -> AppResult<()> {
    let len = value.chars().count();
    if len < min {
        return Err(if min == 1 {
            AppError::validation(format!("{field} is required"))
        } else {
            AppError::validation(format!("{field} must be at least {min} characters"))
        });
    }
    if len > max {
        return Err(AppError::validation(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

pub fn optional_text(field: &str, value: Option<&str>, max: usize) -> AppResult<()> {
    match value {
        Some(v) => text(field, v, 0, max),
        None => Ok(()),
    }
}

pub fn min_int<T>(field: &str, value: Option<T>, min: T) -> AppResult<()>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    match value {
        Some(v) if v < min => Err(AppError::validation(format!(
            "{field} must be at least {min}"
        ))),
        _ => Ok(()),
    }
}

pub fn int_range<T>(field: &str, value: T, min: T, max: T) -> AppResult<()>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if value < min || value > max {
        return Err(AppError::validation(format!(
            "{field} must be between {min} and {max}"
        )));
    }
    Ok(())
}

/// Rejects NaN as well as values below `min`.
pub fn min_number(field: &str, value: Option<f64>, min: f64) -> AppResult<()> {
    match value {
        Some(v) if v.is_nan() || v < min => Err(AppError::validation(format!(
            "{field} must be at least {min}"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BadRequest;

    fn message(r: AppResult<()>) -> String {
        match r {
            Err(AppError::BadRequest(BadRequest::Validation(m))) => m,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn text_counts_characters_not_bytes() {
        assert!(text("name", "ü".repeat(100).as_str(), 1, 100).is_ok());
        assert_eq!(message(text("name", "", 1, 100)), "name is required");
        assert_eq!(
            message(text("name", &"x".repeat(101), 1, 100)),
            "name must be at most 100 characters"
        );
    }

    #[test]
    fn numeric_bounds() {
        assert!(min_int("servings", Some(1), 1).is_ok());
        assert!(min_int::<i32>("servings", None, 1).is_ok());
        assert_eq!(message(min_int("servings", Some(0), 1)), "servings must be at least 1");
        assert!(int_range("limit", 50, 1, 50).is_ok());
        assert!(int_range("limit", 51, 1, 50).is_err());
        assert!(min_number("quantity", Some(0.1), 0.1).is_ok());
        assert!(min_number("quantity", Some(0.05), 0.1).is_err());
        assert!(min_number("quantity", Some(f64::NAN), 0.1).is_err());
    }
}
