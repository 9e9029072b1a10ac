use bcrypt::{hash, verify, DEFAULT_COST};

use crate::error::AppError;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Collects every problem with a new password so they can be reported together.
pub fn validate_new_password(password: &str, confirm_password: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if password != confirm_password {
        errors.push("Passwords must match".to_string());
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        ));
    }
    errors
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash(password, DEFAULT_COST).map_err(|e| AppError::internal(format!("Hash error: {e}")))
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    verify(password, password_hash)
        .map_err(|e| AppError::internal(format!("Password verify error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_and_short_passwords_report_both_errors() {
        let errors = validate_new_password("short", "shorter");
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn valid_password_passes() {
        assert!(validate_new_password("margherita", "margherita").is_empty());
    }

    #[test]
    fn hash_verifies_only_the_original_password() {
        let hashed = bcrypt::hash("calabresa", 4).unwrap();
        assert!(verify_password("calabresa", &hashed).unwrap());
        assert!(!verify_password("portuguesa", &hashed).unwrap());
    }
}
