//! Field checks applied before anything is written to the database.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::error::{AppError, Result};
use crate::models::{PaymentKind, PaymentType};

fn invalid(msg: impl Into<String>) -> AppError {
    AppError::Validation(msg.into())
}

pub fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(format!("{field} is required")));
    }
    Ok(())
}

pub fn positive_amount(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(format!("{field} must be a positive amount")));
    }
    Ok(())
}

pub fn non_negative_amount(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(format!("{field} cannot be negative")));
    }
    Ok(())
}

pub fn emi_day(day: u32) -> Result<()> {
    if !(1..=31).contains(&day) {
        return Err(invalid("EMI day must be between 1 and 31"));
    }
    Ok(())
}

pub fn email(value: &str) -> Result<()> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    let valid = EMAIL
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(value.trim()));
    if !valid {
        return Err(invalid(format!("'{value}' is not a valid email address")));
    }
    Ok(())
}

pub fn currency(code: &str) -> Result<String> {
    let code = code.trim().to_uppercase();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(invalid(format!("'{code}' is not a 3-letter currency code")));
    }
    Ok(code)
}

pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| invalid(format!("{field} must be a date in YYYY-MM-DD form, got '{value}'")))
}

/// Ending payments need an end date on or after the start; recurring ones
/// must not carry one.
pub fn payment_schedule(kind: PaymentKind, start: NaiveDate, end: Option<NaiveDate>) -> Result<()> {
    match (kind, end) {
        (PaymentKind::Ending, None) => Err(invalid("End date is required for ending payments")),
        (PaymentKind::Ending, Some(end)) if end < start => {
            Err(invalid("End date cannot be before the start date"))
        }
        (PaymentKind::Recurring, Some(_)) => {
            Err(invalid("Recurring payments cannot have an end date"))
        }
        _ => Ok(()),
    }
}

/// Returns the installment count to store for `payment_type`.
pub fn installments(payment_type: PaymentType, total: u32, paid: u32) -> Result<u32> {
    let total = match payment_type {
        PaymentType::FullPayment => 1,
        PaymentType::Emi if total == 0 => {
            return Err(invalid("An EMI needs at least one installment"));
        }
        _ => total,
    };
    if total > 0 && paid > total {
        return Err(invalid(format!(
            "Paid installments ({paid}) cannot exceed total installments ({total})"
        )));
    }
    Ok(total)
}

/// Installment count for a new EMI when none was given: subscriptions run
/// open-ended and full payments are a single installment.
pub fn installments_or_default(payment_type: PaymentType, given: Option<u32>) -> Result<u32> {
    match (given, payment_type) {
        (Some(total), _) => Ok(total),
        (None, PaymentType::Emi) => Err(invalid(
            "--installments is required for EMIs (use --payment-type subscription for open-ended plans)",
        )),
        (None, PaymentType::Subscription) => Ok(0),
        (None, PaymentType::FullPayment) => Ok(1),
    }
}
