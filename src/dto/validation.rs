//! Validation helpers for DTOs.

use validator::{ValidateEmail, ValidationError};

use crate::services::invite_code::CODE_LENGTH;

/// Validates that an invite code is exactly six ASCII letters or digits.
///
/// Lowercase input is accepted; codes are upper-cased before lookup.
///
/// # Examples
///
/// ```ignore
/// validate_invite_code("AB12CD") // Ok
/// validate_invite_code("ab12cd") // Ok
/// validate_invite_code("AB12C")  // Err - too short
/// ```
pub fn validate_invite_code(code: &str) -> Result<(), ValidationError> {
    let code = code.trim();
    if code.chars().count() != CODE_LENGTH {
        let mut err = ValidationError::new("invite_code_length");
        err.message = Some(
            format!(
                "Invite code must be exactly {CODE_LENGTH} characters (got {})",
                code.chars().count()
            )
            .into(),
        );
        return Err(err);
    }

    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        let mut err = ValidationError::new("invite_code_format");
        err.message = Some("Invite code must contain only letters and digits".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a username: 3 to 24 characters of letters, digits, `_`, `-` or `.`.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let username = username.trim();
    let len = username.chars().count();
    if !(3..=24).contains(&len) {
        let mut err = ValidationError::new("username_length");
        err.message = Some(format!("Username must be 3 to 24 characters (got {len})").into());
        return Err(err);
    }

    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        let mut err = ValidationError::new("username_format");
        err.message =
            Some("Username may only contain letters, digits, '_', '-' and '.'".into());
        return Err(err);
    }

    Ok(())
}

/// Validates a batch of invitation recipients.
pub fn validate_email_list(emails: &[String], max: usize) -> Result<(), ValidationError> {
    if emails.is_empty() || emails.len() > max {
        let mut err = ValidationError::new("emails_count");
        err.message = Some(format!("Provide between 1 and {max} email addresses").into());
        return Err(err);
    }

    if let Some(invalid) = emails.iter().find(|email| !email.trim().validate_email()) {
        let mut err = ValidationError::new("email_format");
        err.message = Some(format!("`{invalid}` is not a valid email address").into());
        return Err(err);
    }

    Ok(())
}
