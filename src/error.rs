use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use std::fmt;

use crate::core::kelly::{BetLimits, Outcome};
use crate::models::ErrorResponse;

/// Application error types
#[derive(Debug)]
pub enum AppError {
    /// Invalid request data
    ValidationError(String),
    /// Internal server error
    InternalError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let (error_code, message) = match self {
            AppError::ValidationError(msg) => ("validation_error", msg.clone()),
            AppError::InternalError(msg) => ("internal_error", msg.clone()),
        };

        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: error_code.to_string(),
            message,
        })
    }
}

/// Validation functions
pub fn validate_probability(name: &str, prob: f64) -> Result<(), AppError> {
    if !(0.0..=1.0).contains(&prob) {
        return Err(AppError::ValidationError(format!(
            "{} must be between 0 and 1, got {}",
            name, prob
        )));
    }
    Ok(())
}

pub fn validate_balance(balance: f64) -> Result<(), AppError> {
    if !balance.is_finite() || balance < 0.0 {
        return Err(AppError::ValidationError(format!(
            "Balance must be a non-negative number, got {}",
            balance
        )));
    }
    Ok(())
}

pub fn validate_outcome(outcome: &str) -> Result<Outcome, AppError> {
    outcome
        .parse()
        .map_err(|_| AppError::ValidationError(format!("Outcome must be YES or NO, got {:?}", outcome)))
}

pub fn validate_limits(limits: &BetLimits) -> Result<(), AppError> {
    let amounts_valid = limits.min_bet_amount.is_finite()
        && limits.max_bet_amount.is_finite()
        && limits.min_bet_amount >= 0.0
        && limits.min_bet_amount <= limits.max_bet_amount;

    if !amounts_valid {
        return Err(AppError::ValidationError(format!(
            "Bet limits must satisfy 0 <= min_bet_amount <= max_bet_amount, got {} and {}",
            limits.min_bet_amount, limits.max_bet_amount
        )));
    }
    Ok(())
}
