//! Error Types for Surcharge Configuration

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SurchargeError>;

#[derive(Error, Debug)]
pub enum SurchargeError {
    #[error("Non-numeric value for {key}: {value:?}")]
    NonNumeric { key: String, value: String },

    #[error("Invalid setting {key}: {reason}")]
    Invalid { key: String, reason: String },

    #[error("Unknown fee formula: {0}")]
    UnknownFormula(String),

    #[error("Option store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SurchargeError {
    /// Message safe to show to a store administrator
    pub fn user_message(&self) -> String {
        match self {
            Self::NonNumeric { key, .. } => format!("The value for '{key}' must be a number."),
            Self::Invalid { reason, .. } => reason.clone(),
            Self::UnknownFormula(name) => format!("'{name}' is not a supported fee formula."),
            _ => "The surcharge settings could not be processed.".into(),
        }
    }
}
