use validator::{validate_email, ValidationError};

/// Validates every entry of a list of email addresses, used for fields such
/// as `reply_to_addresses` where `#[validate(email)]` cannot be applied
/// directly to a `Vec<String>`.
pub fn email_vec(values: &Vec<String>) -> Result<(), ValidationError> {
    for value in values {
        if !validate_email(value) {
            return Err(ValidationError::new("email_vec"));
        }
    }

    Ok(())
}

/// Validates a single RFC-5322 address, used for `Option<String>` fields
/// where `#[validate(email)]` does not apply.
pub fn rfc_5322_email(value: &str) -> Result<(), ValidationError> {
    if validate_email(value) {
        Ok(())
    } else {
        Err(ValidationError::new("rfc_5322_email"))
    }
}
