use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::domain::NewUser;

pub const MAX_TAGS: usize = 6;
pub const MAX_TAG_NAME_CHARS: usize = 25;
pub const MAX_PRESETS: usize = 4;
pub const MAX_PRESET_MINUTES: u32 = 180;
pub const PROFILE_FIELDS: [&str; 4] = ["email", "password", "firstName", "lastName"];

static LOGIN_EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("login email pattern"));
static REGISTRATION_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^[^\s@]+@[^\s@]+\.(com|net|org|edu|gov|au|mil|co\.uk|org\.uk|ac\.uk|net\.uk|edu\.au|gov\.au|net\.au|org\.au)$",
    )
    .expect("registration email pattern")
});
static USERNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9]+$").expect("username pattern"));
static PERSON_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z]+$").expect("name pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("please enter a valid email and password")]
    InvalidLogin,
    #[error("invalid {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
    #[error("tag name must not be empty")]
    EmptyTagName,
    #[error("tag name must not exceed {} characters", MAX_TAG_NAME_CHARS)]
    TagNameTooLong,
    #[error("tag limit of {} reached, delete one first", MAX_TAGS)]
    TooManyTags,
    #[error("session length must be between 1 and {} minutes", MAX_PRESET_MINUTES - 1)]
    PresetOutOfRange,
    #[error("preset limit of {} reached, delete one first", MAX_PRESETS)]
    TooManyPresets,
    #[error("session length must be at least one minute")]
    EmptySession,
    #[error("unknown profile field `{0}`, expected one of email, password, firstName, lastName")]
    UnknownProfileField(String),
}

pub fn validate_login(email: &str, password: &str) -> Result<(), ValidationError> {
    if LOGIN_EMAIL.is_match(email) && !password.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::InvalidLogin)
    }
}

pub fn validate_registration(user: &NewUser) -> Result<(), ValidationError> {
    if !REGISTRATION_EMAIL.is_match(&user.email) {
        return Err(ValidationError::InvalidField {
            field: "email",
            reason: "must be an address with a supported domain",
        });
    }
    if !USERNAME.is_match(&user.username) {
        return Err(ValidationError::InvalidField {
            field: "username",
            reason: "only letters and digits are allowed",
        });
    }
    if user.password.is_empty() {
        return Err(ValidationError::InvalidField {
            field: "password",
            reason: "must not be empty",
        });
    }
    if !PERSON_NAME.is_match(&user.first_name) {
        return Err(ValidationError::InvalidField {
            field: "first name",
            reason: "only letters are allowed",
        });
    }
    if !PERSON_NAME.is_match(&user.last_name) {
        return Err(ValidationError::InvalidField {
            field: "last name",
            reason: "only letters are allowed",
        });
    }
    Ok(())
}

pub fn validate_tag_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyTagName);
    }
    if name.chars().count() > MAX_TAG_NAME_CHARS {
        return Err(ValidationError::TagNameTooLong);
    }
    Ok(())
}

/// `existing` is the number of tags the account already has.
pub fn validate_tag_count(existing: usize) -> Result<(), ValidationError> {
    if existing >= MAX_TAGS {
        return Err(ValidationError::TooManyTags);
    }
    Ok(())
}

pub fn validate_preset_minutes(minutes: u32) -> Result<(), ValidationError> {
    if minutes == 0 || minutes >= MAX_PRESET_MINUTES {
        return Err(ValidationError::PresetOutOfRange);
    }
    Ok(())
}

pub fn validate_preset_count(existing: usize) -> Result<(), ValidationError> {
    if existing >= MAX_PRESETS {
        return Err(ValidationError::TooManyPresets);
    }
    Ok(())
}

pub fn validate_session_minutes(minutes: u32) -> Result<(), ValidationError> {
    if minutes == 0 {
        return Err(ValidationError::EmptySession);
    }
    Ok(())
}

pub fn validate_profile_field(field: &str) -> Result<(), ValidationError> {
    if PROFILE_FIELDS.contains(&field) {
        Ok(())
    } else {
        Err(ValidationError::UnknownProfileField(field.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::NewUser;

    use super::*;

    fn user() -> NewUser {
        NewUser {
            username: "sam42".to_string(),
            email: "sam@uni.edu.au".to_string(),
            password: "hunter2".to_string(),
            first_name: "Sam".to_string(),
            last_name: "Lee".to_string(),
        }
    }

    #[test]
    fn login_requires_email_shape_and_password() {
        assert!(validate_login("sam@example.io", "x").is_ok());
        assert_eq!(validate_login("sam.example.io", "x"), Err(ValidationError::InvalidLogin));
        assert_eq!(validate_login("sam@example.io", ""), Err(ValidationError::InvalidLogin));
    }

    #[test]
    fn registration_checks_every_field() {
        assert!(validate_registration(&user()).is_ok());

        let mut bad_domain = user();
        bad_domain.email = "sam@example.io".to_string();
        assert!(validate_registration(&bad_domain).is_err());

        let mut upper_domain = user();
        upper_domain.email = "SAM@EXAMPLE.COM".to_string();
        assert!(validate_registration(&upper_domain).is_ok());

        let mut bad_username = user();
        bad_username.username = "sam_42".to_string();
        assert!(validate_registration(&bad_username).is_err());

        let mut bad_name = user();
        bad_name.last_name = "Lee-Smith".to_string();
        assert!(validate_registration(&bad_name).is_err());
    }

    #[test]
    fn tag_rules() {
        assert!(validate_tag_name("Maths").is_ok());
        assert!(validate_tag_name(&"a".repeat(25)).is_ok());
        assert_eq!(validate_tag_name(&"a".repeat(26)), Err(ValidationError::TagNameTooLong));
        assert_eq!(validate_tag_name("  "), Err(ValidationError::EmptyTagName));
        assert!(validate_tag_count(5).is_ok());
        assert_eq!(validate_tag_count(6), Err(ValidationError::TooManyTags));
    }

    #[test]
    fn preset_rules() {
        assert!(validate_preset_minutes(179).is_ok());
        assert_eq!(validate_preset_minutes(180), Err(ValidationError::PresetOutOfRange));
        assert_eq!(validate_preset_minutes(0), Err(ValidationError::PresetOutOfRange));
        assert!(validate_preset_count(3).is_ok());
        assert_eq!(validate_preset_count(4), Err(ValidationError::TooManyPresets));
    }

    #[test]
    fn profile_fields_are_whitelisted() {
        assert!(validate_profile_field("firstName").is_ok());
        assert!(validate_profile_field("username").is_err());
    }
}
