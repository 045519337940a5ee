use crate::api::errors::ApiError;

pub(crate) const MIN_PASSWORD_LEN: usize = 8;
pub(crate) const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=32;

pub(crate) fn validate_username(username: &str) -> Result<(), ApiError> {
    let valid = USERNAME_LEN.contains(&username.len())
        && username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ApiError::BadRequest(
            "Username must be 3-32 characters of letters, digits or underscore".to_string(),
        ))
    }
}

pub(crate) fn validate_password_len(password: &str) -> Result<(), ApiError> {
    if password.chars().count() >= MIN_PASSWORD_LEN {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )))
    }
}

pub(crate) fn validate_importance(importance: i32) -> Result<i32, ApiError> {
    crate::services::review_scheduler::validate_importance(importance)
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_rules() {
        assert!(validate_username("ab").is_err());
        assert!(validate_username("abc").is_ok());
        assert!(validate_username("study_buddy_42").is_ok());
        assert!(validate_username("no spaces").is_err());
        assert!(validate_username("dash-name").is_err());
        assert!(validate_username(&"x".repeat(33)).is_err());
    }

    #[test]
    fn password_length() {
        assert!(validate_password_len("short").is_err());
        assert!(validate_password_len("long enough").is_ok());
    }

    #[test]
    fn importance_range() {
        assert!(validate_importance(0).is_err());
        assert_eq!(validate_importance(5).ok(), Some(5));
    }
}
