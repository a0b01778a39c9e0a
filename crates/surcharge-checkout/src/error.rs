//! Checkout Error Types

use thiserror::Error;

use surcharge_core::SurchargeError;

/// Result type alias
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Checkout-related errors
#[derive(Error, Debug)]
pub enum CheckoutError {
    /// Anti-forgery token missing or invalid
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Session missing or expired
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Background request named an action nobody handles
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Cart amounts rejected
    #[error("Invalid cart: {0}")]
    InvalidCart(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Surcharge settings error
    #[error(transparent)]
    Surcharge(#[from] SurchargeError),
}

impl CheckoutError {
    /// Stable code for API responses
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "INVALID_NONCE",
            Self::SessionNotFound(_) => "SESSION_NOT_FOUND",
            Self::UnknownAction(_) => "UNKNOWN_ACTION",
            Self::InvalidCart(_) => "INVALID_CART",
            Self::Surcharge(_) => "INVALID_SETTINGS",
            Self::Config(_) | Self::Storage(_) => "CHECKOUT_ERROR",
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Unauthorized(_) => "Your checkout session has expired. Please reload the page.".into(),
            Self::SessionNotFound(_) => "Your checkout session could not be found. Please reload the page.".into(),
            Self::UnknownAction(action) => format!("'{action}' is not a supported request."),
            Self::InvalidCart(msg) => msg.clone(),
            Self::Surcharge(e) => e.user_message(),
            _ => "An error occurred processing your request.".into(),
        }
    }
}

#[cfg(feature = "axum-handlers")]
mod response {
    use axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    };

    use super::CheckoutError;

    impl CheckoutError {
        pub const fn status(&self) -> StatusCode {
            match self {
                Self::Unauthorized(_) => StatusCode::FORBIDDEN,
                Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
                Self::UnknownAction(_) | Self::InvalidCart(_) => StatusCode::BAD_REQUEST,
                Self::Surcharge(_) => StatusCode::UNPROCESSABLE_ENTITY,
                Self::Config(_) | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        }
    }

    /// Failure envelope: `{"success": false, "data": {"code", "message"}}`
    impl IntoResponse for CheckoutError {
        fn into_response(self) -> Response {
            let status = self.status();
            if status.is_server_error() {
                tracing::error!(error = %self, "Checkout request failed");
            } else {
                tracing::warn!(error = %self, "Checkout request rejected");
            }

            let body = serde_json::json!({
                "success": false,
                "data": {
                    "code": self.code(),
                    "message": self.user_message(),
                },
            });
            (status, Json(body)).into_response()
        }
    }
}
