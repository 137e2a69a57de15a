use rust_decimal::Decimal;
use validator::{ValidationError, ValidationErrors};

use crate::models::user::ChangePasswordRequest;

/// Validates that an amount is positive (greater than 0)
pub fn validate_positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount <= Decimal::ZERO {
        let mut error = ValidationError::new("invalid_amount");
        error.message = Some("Amount must be greater than 0".into());
        return Err(error);
    }
    Ok(())
}

/// Validates a `#rrggbb` display color
pub fn validate_hex_color(color: &str) -> Result<(), ValidationError> {
    let valid = color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit());

    if !valid {
        let mut error = ValidationError::new("invalid_color");
        error.message = Some(format!("'{}' is not a #rrggbb color", color).into());
        return Err(error);
    }
    Ok(())
}

pub fn validate_password_confirmation(
    request: &ChangePasswordRequest,
) -> Result<(), ValidationError> {
    if request.new_password != request.confirm_password {
        let mut error = ValidationError::new("password_mismatch");
        error.message = Some("Passwords do not match".into());
        return Err(error);
    }
    Ok(())
}

/// Flattens validator errors into "field: message; field: message"
pub fn describe_errors(errors: &ValidationErrors) -> String {
    let mut parts = errors
        .field_errors()
        .iter()
        .map(|(field, errors)| {
            let messages: Vec<String> = errors
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            format!("{}: {}", field, messages.join(", "))
        })
        .collect::<Vec<_>>();
    parts.sort();
    parts.join("; ")
}
