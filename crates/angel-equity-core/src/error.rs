use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum EquityError {
    #[error("Invalid SAFE terms: {field} — {reason}")]
    InvalidTerms { field: String, reason: String },

    #[error("Ineligible round: round amount {round_amount} is below the qualified financing threshold {threshold}")]
    IneligibleRound {
        round_amount: Decimal,
        threshold: Decimal,
    },

    #[error("Invalid follow-on opportunity: {field} — {reason}")]
    InvalidOpportunity { field: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl EquityError {
    pub(crate) fn invalid_terms(field: &str, reason: impl Into<String>) -> Self {
        EquityError::InvalidTerms {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_opportunity(field: &str, reason: impl Into<String>) -> Self {
        EquityError::InvalidOpportunity {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for EquityError {
    fn from(e: serde_json::Error) -> Self {
        EquityError::Serialization(e.to_string())
    }
}
