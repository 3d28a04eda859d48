//! Input policy shared by registration and password change.

use crate::domain::NewUser;
use crate::errors::ServiceError;

pub fn validate_registration(input: &NewUser) -> Result<(), ServiceError> {
    require("username", &input.username)?;
    require("email", &input.email)?;
    if !is_valid_email(&input.email) {
        return Err(ServiceError::validation("email", "invalid email format"));
    }
    require("first_name", &input.first_name)?;
    require("last_name", &input.last_name)?;
    validate_password(&input.password)
}

/// Policy: at least 8 characters with one uppercase letter, one lowercase
/// letter, one digit, and one symbol.
pub fn validate_password(password: &str) -> Result<(), ServiceError> {
    if password.trim().is_empty() {
        return Err(ServiceError::validation("password", "password is required"));
    }
    if password.chars().count() < 8 {
        return Err(ServiceError::validation("password", "must be at least 8 characters long"));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return Err(ServiceError::validation("password", "must contain an uppercase letter"));
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return Err(ServiceError::validation("password", "must contain a lowercase letter"));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(ServiceError::validation("password", "must contain a digit"));
    }
    if !password.chars().any(|c| !c.is_alphanumeric()) {
        return Err(ServiceError::validation("password", "must contain a symbol"));
    }
    Ok(())
}

/// Light-weight structural check: one `@` with a non-empty local part and a
/// dotted, non-empty domain, no whitespace anywhere.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let mut parts = email.splitn(2, '@');
    let (local, domain) = match (parts.next(), parts.next()) {
        (Some(l), Some(d)) => (l, d),
        _ => return false,
    };
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }
    let mut labels = domain.split('.');
    domain.contains('.') && labels.all(|l| !l.is_empty())
}

fn require(field: &'static str, value: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::validation(field, format!("{field} is required")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_conforming_password() {
        assert!(validate_password("Abcdef1!").is_ok());
    }

    #[test]
    fn rejects_each_missing_character_class() {
        for bad in ["Ab1!", "abcdef1!", "ABCDEF1!", "Abcdefg!", "Abcdefg1"] {
            assert!(validate_password(bad).is_err(), "expected rejection: {bad}");
        }
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("alice@x.com"));
        assert!(is_valid_email("a.b+c@sub.domain.org"));
        for bad in ["", "alice", "@x.com", "alice@", "alice@x", "a b@x.com", "a@b@c.com", "a@x..com"] {
            assert!(!is_valid_email(bad), "expected rejection: {bad}");
        }
    }

    #[test]
    fn registration_names_the_offending_field() {
        let mut input = NewUser {
            username: "alice".into(),
            email: "alice@x.com".into(),
            password: "Abcdef1!".into(),
            first_name: "Alice".into(),
            last_name: "Doe".into(),
        };
        assert!(validate_registration(&input).is_ok());

        input.email = "not-an-email".into();
        match validate_registration(&input) {
            Err(ServiceError::Validation { field, .. }) => assert_eq!(field, "email"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
