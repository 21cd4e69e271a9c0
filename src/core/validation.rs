use thiserror::Error;
use validator::Validate;

use crate::models::{PreferredSex, Sex, UserCriteria};

pub const MIN_AGE: u8 = 18;
pub const MAX_AGE: u8 = 100;
const MIN_CITY_LEN: usize = 2;
const MAX_CITY_LEN: usize = 100;

/// Rejected user input; surfaced to the user as a re-prompt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("age must be a whole number")]
    AgeNotNumber,

    #[error("age must be between {min} and {max}")]
    AgeOutOfRange { min: u8, max: u8 },

    #[error("city name must be {min} to {max} characters long")]
    CityLength { min: usize, max: usize },

    #[error("city name may only contain letters, spaces, hyphens and dots")]
    CityCharacters,

    #[error("unrecognised sex: {0}")]
    Sex(String),

    #[error("unrecognised preference: {0}")]
    PreferredSex(String),

    #[error("invalid criteria: {0}")]
    Criteria(String),
}

/// Parse and range-check an age typed by the user
pub fn parse_age(input: &str) -> Result<u8, ValidationError> {
    let value: i64 = input
        .trim()
        .parse()
        .map_err(|_| ValidationError::AgeNotNumber)?;
    validate_age(value)
}

pub fn validate_age(value: i64) -> Result<u8, ValidationError> {
    if !(MIN_AGE as i64..=MAX_AGE as i64).contains(&value) {
        return Err(ValidationError::AgeOutOfRange {
            min: MIN_AGE,
            max: MAX_AGE,
        });
    }
    Ok(value as u8)
}

/// Normalise a city name: trimmed, inner whitespace collapsed
pub fn validate_city(input: &str) -> Result<String, ValidationError> {
    let city = input.split_whitespace().collect::<Vec<_>>().join(" ");

    let len = city.chars().count();
    if !(MIN_CITY_LEN..=MAX_CITY_LEN).contains(&len) {
        return Err(ValidationError::CityLength {
            min: MIN_CITY_LEN,
            max: MAX_CITY_LEN,
        });
    }

    if !city
        .chars()
        .all(|c| c.is_alphabetic() || c == ' ' || c == '-' || c == '.')
    {
        return Err(ValidationError::CityCharacters);
    }

    Ok(city)
}

pub fn parse_sex(input: &str) -> Result<Sex, ValidationError> {
    match input.trim().to_lowercase().as_str() {
        "1" | "f" | "female" | "woman" | "ж" | "женский" | "женщина" => Ok(Sex::Female),
        "2" | "m" | "male" | "man" | "м" | "мужской" | "мужчина" => Ok(Sex::Male),
        other => Err(ValidationError::Sex(other.to_string())),
    }
}

pub fn parse_preferred_sex(input: &str) -> Result<PreferredSex, ValidationError> {
    match input.trim().to_lowercase().as_str() {
        "0" | "any" | "all" | "любой" | "любые" | "все" => Ok(PreferredSex::Any),
        "1" | "f" | "female" | "women" | "ж" | "женский" | "девушки" => {
            Ok(PreferredSex::Female)
        }
        "2" | "m" | "male" | "men" | "м" | "мужской" | "парни" => Ok(PreferredSex::Male),
        other => Err(ValidationError::PreferredSex(other.to_string())),
    }
}

/// Check a complete criteria set before it is handed to the discovery engine
pub fn validate_criteria(criteria: &UserCriteria) -> Result<(), ValidationError> {
    criteria
        .validate()
        .map_err(|e| ValidationError::Criteria(e.to_string()))?;
    if criteria.sex == Sex::Unknown {
        return Err(ValidationError::Criteria("sex is not set".to_string()));
    }
    validate_city(&criteria.city)?;
    Ok(())
}
