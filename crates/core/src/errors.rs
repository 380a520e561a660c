use thiserror::Error;

use crate::date::DateError;
use crate::flows::FlowTransitionError;

/// User-correctable validation failures raised during flow transitions.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Date(#[from] DateError),
    #[error(transparent)]
    FlowTransition(#[from] FlowTransitionError),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("chat platform failure: {0}")]
    ChatApi(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// A message safe to echo back to the requesting user. Validation errors
    /// name what to fix; infrastructure errors degrade to "try again".
    pub fn user_message(&self) -> String {
        match self {
            Self::Domain(DomainError::Date(DateError::InvalidFormat { input })) => {
                format!("`{input}` is not a date I understand — use `YYYY-MM-DD`.")
            }
            Self::Domain(DomainError::Date(DateError::RangeInvariant { start, end })) => {
                format!("The start date {start} falls after the end date {end} — pick again.")
            }
            Self::Domain(DomainError::FlowTransition(_)) => {
                "That control is no longer active. Send `on call` to start over.".to_owned()
            }
            Self::Persistence(_) | Self::ChatApi(_) => {
                "Something went wrong on our side — please try again shortly.".to_owned()
            }
            Self::Configuration(_) => "The scheduler is misconfigured.".to_owned(),
        }
    }
}
