//! Payment-Method Change Notifier
//!
//! Wire types of the background update request and the client-side state
//! machine that drives it.
//!
//! ```text
//!            select(method)                     acknowledge(method)
//!   Idle ─────────────────▶ AwaitingRecalculation ─────────────────▶ Idle
//!                             │   ▲                                 (refresh
//!                      fail() │   │ retry while attempts remain      totals)
//!                             ▼   │
//!                           Failed ◀─ attempts exhausted
//! ```

use serde::{Deserialize, Serialize};

/// `action` field value dispatched to the surcharge update handler
pub const UPDATE_SURCHARGE_ACTION: &str = "update_surcharge";

/// Anti-forgery token scope for the update request
pub const UPDATE_SURCHARGE_NONCE_ACTION: &str = "update-surcharge";

/// Name of the checkout form field carrying the payment method
pub const PAYMENT_METHOD_FIELD: &str = "payment_method";

/// Event the checkout UI listens for to re-fetch totals
pub const UPDATE_CHECKOUT_EVENT: &str = "update_checkout";

/// Default number of attempts before the client gives up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Form-encoded background request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSurchargeRequest {
    pub action: String,

    #[serde(default)]
    pub payment_method: String,

    #[serde(default)]
    pub nonce: Option<String>,
}

impl UpdateSurchargeRequest {
    pub fn new(payment_method: impl Into<String>, nonce: impl Into<String>) -> Self {
        Self {
            action: UPDATE_SURCHARGE_ACTION.into(),
            payment_method: payment_method.into(),
            nonce: Some(nonce.into()),
        }
    }
}

/// Client state
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotifierState {
    Idle,
    AwaitingRecalculation { payment_method: String, attempt: u32 },
    Failed { payment_method: String, reason: String },
}

/// What the client should do next
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NotifierAction {
    /// Post this request to the background endpoint
    Send(UpdateSurchargeRequest),

    /// Dispatch the checkout refresh event
    RefreshCheckout,

    /// Surface a visible error to the shopper
    ShowError(String),

    /// Nothing to do (stale or unexpected response)
    Ignore,
}

/// Drives one checkout page's payment-method updates
#[derive(Clone, Debug)]
pub struct ChangeNotifier {
    state: NotifierState,
    nonce: String,
    max_attempts: u32,
}

impl ChangeNotifier {
    pub fn new(nonce: impl Into<String>) -> Self {
        Self {
            state: NotifierState::Idle,
            nonce: nonce.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn state(&self) -> &NotifierState {
        &self.state
    }

    /// The shopper picked a payment method. A newer selection supersedes any
    /// request still in flight.
    pub fn select(&mut self, payment_method: impl Into<String>) -> NotifierAction {
        let payment_method = payment_method.into();
        self.state = NotifierState::AwaitingRecalculation {
            payment_method: payment_method.clone(),
            attempt: 1,
        };
        NotifierAction::Send(UpdateSurchargeRequest::new(payment_method, self.nonce.clone()))
    }

    /// The server acknowledged the update for `payment_method`
    pub fn acknowledge(&mut self, payment_method: &str) -> NotifierAction {
        match &self.state {
            NotifierState::AwaitingRecalculation { payment_method: awaited, .. }
                if awaited == payment_method =>
            {
                self.state = NotifierState::Idle;
                NotifierAction::RefreshCheckout
            }
            _ => NotifierAction::Ignore,
        }
    }

    /// The request for `payment_method` failed (network error or non-success status)
    pub fn fail(&mut self, payment_method: &str, reason: impl Into<String>) -> NotifierAction {
        let NotifierState::AwaitingRecalculation { payment_method: awaited, attempt } = &self.state
        else {
            return NotifierAction::Ignore;
        };
        if awaited != payment_method {
            return NotifierAction::Ignore;
        }

        let reason = reason.into();
        if *attempt < self.max_attempts {
            tracing::debug!(attempt, reason = %reason, "Retrying payment method update");
            let next = attempt + 1;
            let awaited = awaited.clone();
            self.state = NotifierState::AwaitingRecalculation {
                payment_method: awaited.clone(),
                attempt: next,
            };
            return NotifierAction::Send(UpdateSurchargeRequest::new(awaited, self.nonce.clone()));
        }

        self.state = NotifierState::Failed {
            payment_method: awaited.clone(),
            reason: reason.clone(),
        };
        NotifierAction::ShowError(format!("Could not update the payment surcharge: {reason}"))
    }
}
