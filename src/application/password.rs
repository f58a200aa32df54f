use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use super::AppError;

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Hash a password with Argon2id and a random salt. Returns a PHC string.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::PasswordHash(e.to_string()))
}

/// Verify a password against a stored PHC hash.
/// A missing, empty or unparsable hash never verifies.
pub fn verify_password(password: &str, hash: Option<&str>) -> bool {
    let Some(hash) = hash.filter(|h| !h.is_empty()) else {
        return false;
    };
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("segredo123").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("segredo123", Some(&hash)));
        assert!(!verify_password("segredo124", Some(&hash)));
    }

    #[test]
    fn test_same_password_gets_different_salts() {
        let a = hash_password("segredo123").unwrap();
        let b = hash_password("segredo123").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_missing_or_garbage_hash_never_verifies() {
        assert!(!verify_password("anything", None));
        assert!(!verify_password("", Some("")));
        assert!(!verify_password("segredo123", Some("segredo123")));
    }

    #[test]
    fn test_validate_password_length() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
    }
}
