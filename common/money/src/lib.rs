use bigdecimal::{BigDecimal, Signed, ToPrimitive, Zero};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount must not be negative: {0}")]
    Negative(String),
    #[error("amount out of range: {0}")]
    OutOfRange(String),
}

/// Normalize a monetary value to 2 decimal places, rounding half away from zero.
pub fn normalize_scale(value: &BigDecimal) -> BigDecimal {
    value.round(2).with_scale(2)
}

/// Convert a major-unit amount (rupees) to integer minor units (paise), rounding to the nearest unit.
pub fn to_minor_units(value: &BigDecimal) -> Result<i64, MoneyError> {
    if value.is_negative() {
        return Err(MoneyError::Negative(value.to_string()));
    }
    let scaled = (value * BigDecimal::from(100)).round(0);
    scaled.to_i64().ok_or_else(|| MoneyError::OutOfRange(value.to_string()))
}

/// Convert integer minor units back into a 2-decimal major-unit amount.
pub fn from_minor_units(minor: i64) -> BigDecimal {
    (BigDecimal::from(minor) / BigDecimal::from(100)).with_scale(2)
}

/// `amount - paid`, floored at zero.
pub fn remaining(amount: &BigDecimal, paid: &BigDecimal) -> BigDecimal {
    let diff = normalize_scale(&(amount - paid));
    if diff.is_negative() { BigDecimal::zero().with_scale(2) } else { diff }
}

/// Render an amount as `CUR 1,234.50`.
pub fn format_amount(currency: &str, amount: &BigDecimal) -> String {
    let rendered = normalize_scale(amount).to_string();
    let (sign, digits) = match rendered.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", rendered.as_str()),
    };
    let (whole, frac) = digits.split_once('.').unwrap_or((digits, "00"));
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{currency} {sign}{grouped}.{frac}")
}
