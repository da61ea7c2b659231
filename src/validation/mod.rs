use bigdecimal::BigDecimal;
use std::fmt;

pub const CURRENCY_MAX_LEN: usize = 8;
pub const NOTE_MAX_LEN: usize = 500;
pub const MESSAGE_MAX_LEN: usize = 500;
pub const COMMENT_MAX_LEN: usize = 1000;
pub const AMOUNT_INPUT_MAX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

/// Parses a monetary amount from its wire form. Money crosses the HTTP and
/// storage boundary as decimal strings; this is the single place it becomes
/// numeric.
pub fn parse_money(field: &'static str, value: &str) -> Result<BigDecimal, ValidationError> {
    validate_required(field, value)?;
    validate_max_len(field, value, AMOUNT_INPUT_MAX_LEN)?;

    value
        .trim()
        .parse::<BigDecimal>()
        .map_err(|_| ValidationError::new(field, "must be a decimal number"))
}

/// Like `parse_money`, but rejects zero and negative values.
pub fn parse_positive_money(
    field: &'static str,
    value: &str,
) -> Result<BigDecimal, ValidationError> {
    let amount = parse_money(field, value)?;
    if amount <= BigDecimal::from(0) {
        return Err(ValidationError::new(field, "must be greater than zero"));
    }

    Ok(amount)
}

/// Like `parse_money`, but additionally allows zero (shipping can be free).
pub fn parse_non_negative_money(
    field: &'static str,
    value: &str,
) -> Result<BigDecimal, ValidationError> {
    let amount = parse_money(field, value)?;
    if amount < BigDecimal::from(0) {
        return Err(ValidationError::new(field, "must not be negative"));
    }

    Ok(amount)
}
