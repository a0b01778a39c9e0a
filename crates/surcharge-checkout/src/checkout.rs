//! Checkout Service
//!
//! Server side of the payment-method change flow:
//!
//! ```text
//! ┌──────────────┐  action, payment_method, nonce  ┌─────────────────────┐
//! │ Checkout     │────────────────────────────────▶│ CheckoutService     │
//! │ page         │                                 │ 1. verify nonce     │
//! │              │◀────────────────────────────────│ 2. store method     │
//! └──────────────┘      {"success": true, totals}  │ 3. calculate_fees   │
//!                                                  └─────────────────────┘
//! ```

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use surcharge_core::notifier::{UPDATE_SURCHARGE_ACTION, UPDATE_SURCHARGE_NONCE_ACTION};
use surcharge_core::{GatewayRegistry, PaymentGateway, UpdateSurchargeRequest, sanitize_text};

use crate::cart::{CartTotals, FeePipeline, RequestKind};
use crate::error::{CheckoutError, Result};
use crate::nonce::NonceIssuer;
use crate::session::{SessionId, SessionStore, ShopperSession};

/// Everything the checkout page needs to wire up background updates
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutBootstrap {
    pub session_id: SessionId,

    /// Token for the update request
    pub nonce: String,

    /// Payment methods offered to the shopper
    pub gateways: Vec<PaymentGateway>,

    pub chosen_payment_method: Option<String>,

    pub totals: CartTotals,
}

/// Handles checkout requests against a session store
pub struct CheckoutService<S: SessionStore> {
    sessions: Arc<S>,
    nonces: Arc<NonceIssuer>,
    pipeline: Arc<FeePipeline>,
    registry: Arc<GatewayRegistry>,
}

impl<S: SessionStore> CheckoutService<S> {
    pub fn new(
        sessions: Arc<S>,
        nonces: Arc<NonceIssuer>,
        pipeline: Arc<FeePipeline>,
        registry: Arc<GatewayRegistry>,
    ) -> Self {
        Self {
            sessions,
            nonces,
            pipeline,
            registry,
        }
    }

    /// Run `f` on the live session under the store's write lock
    fn with_session<R>(
        &self,
        session_id: Option<&SessionId>,
        f: impl FnOnce(&mut ShopperSession) -> Result<R>,
    ) -> Result<R> {
        let id = session_id.ok_or_else(|| CheckoutError::SessionNotFound("no session".into()))?;
        self.sessions
            .update(id, f)?
            .ok_or_else(|| CheckoutError::SessionNotFound(id.to_string()))
    }

    /// Reset an unusable payment method to the first enabled gateway, then
    /// run a storefront fee pass
    fn prepare(&self, session: &mut ShopperSession) -> Result<CartTotals> {
        let chosen_is_valid = session
            .chosen_payment_method
            .as_deref()
            .and_then(|m| self.registry.get(m))
            .is_some_and(|g| g.enabled);
        if !chosen_is_valid {
            session.chosen_payment_method = self.registry.enabled().next().map(|g| g.id.clone());
        }

        session.recalculate(&self.pipeline, RequestKind::Storefront)
    }

    /// Load (or start) the shopper's session for the checkout page. Unknown
    /// or expired ids get a fresh session with a new id.
    ///
    /// Picks the first enabled gateway when nothing usable is chosen, runs a
    /// fee pass and issues a fresh token.
    pub fn bootstrap(&self, session_id: Option<&SessionId>) -> Result<CheckoutBootstrap> {
        let purged = self.sessions.purge_expired()?;
        if purged > 0 {
            tracing::debug!(purged, "Purged expired sessions");
        }

        let existing = match session_id {
            Some(id) => self.sessions.update(id, |session| {
                let totals = self.prepare(session)?;
                Ok((session.id.clone(), session.chosen_payment_method.clone(), totals))
            })?,
            None => None,
        };

        let (id, chosen_payment_method, totals) = match existing {
            Some(prepared) => prepared,
            None => {
                let mut session = ShopperSession::new();
                let totals = self.prepare(&mut session)?;
                self.sessions.save(&session)?;
                (session.id, session.chosen_payment_method, totals)
            }
        };

        let nonce = self.nonces.create(UPDATE_SURCHARGE_NONCE_ACTION, &id)?;

        tracing::info!(
            session_id = %id,
            payment_method = ?chosen_payment_method,
            "Checkout session ready"
        );

        Ok(CheckoutBootstrap {
            session_id: id,
            nonce,
            gateways: self.registry.enabled().cloned().collect(),
            chosen_payment_method,
            totals,
        })
    }

    /// Dispatch a background request by its `action` field
    pub fn handle_action(&self, session_id: Option<&SessionId>, request: &UpdateSurchargeRequest) -> Result<CartTotals> {
        match request.action.as_str() {
            UPDATE_SURCHARGE_ACTION => self.update_surcharge(session_id, request),
            other => Err(CheckoutError::UnknownAction(other.to_string())),
        }
    }

    /// Store the newly selected payment method and recompute the cart fees.
    ///
    /// The token is checked before anything is read or written.
    pub fn update_surcharge(&self, session_id: Option<&SessionId>, request: &UpdateSurchargeRequest) -> Result<CartTotals> {
        let (Some(id), Some(nonce)) = (session_id, request.nonce.as_deref()) else {
            return Err(CheckoutError::Unauthorized("missing session or nonce".into()));
        };
        if !self.nonces.verify(UPDATE_SURCHARGE_NONCE_ACTION, id, nonce) {
            return Err(CheckoutError::Unauthorized("nonce verification failed".into()));
        }

        let payment_method = sanitize_text(&request.payment_method);
        let totals = self.with_session(Some(id), |session| {
            session.choose_payment_method(payment_method.clone());
            session.recalculate(&self.pipeline, RequestKind::Background)
        })?;

        tracing::info!(
            session_id = %id,
            payment_method = %payment_method,
            fee_total = %totals.fee_total,
            "Payment method updated"
        );

        Ok(totals)
    }

    /// Replace the cart amounts the fee pass works on
    pub fn update_cart(&self, session_id: Option<&SessionId>, contents_total: Decimal, shipping_total: Decimal) -> Result<CartTotals> {
        self.with_session(session_id, |session| {
            session.cart.set_amounts(contents_total, shipping_total)?;
            session.recalculate(&self.pipeline, RequestKind::Storefront)
        })
    }

    /// Current totals after a fresh fee pass
    pub fn totals(&self, session_id: Option<&SessionId>) -> Result<CartTotals> {
        self.with_session(session_id, |session| {
            session.recalculate(&self.pipeline, RequestKind::Storefront)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::SurchargeHook;
    use crate::session::MemorySessionStore;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use surcharge_core::{MemoryOptionStore, OptionStore};

    fn service() -> CheckoutService<MemorySessionStore> {
        service_with(Arc::new(MemorySessionStore::default()))
    }

    fn service_with(sessions: Arc<MemorySessionStore>) -> CheckoutService<MemorySessionStore> {
        let registry: Arc<GatewayRegistry> = Arc::new(
            [
                PaymentGateway::new("cod", "Cash on delivery").disabled(),
                PaymentGateway::new("stripe", "Credit card"),
                PaymentGateway::new("bacs", "Bank transfer"),
            ]
            .into_iter()
            .collect(),
        );

        let options = MemoryOptionStore::new();
        options.set("surcharge_stripe_fixed_fee", "0.30".into()).unwrap();
        options.set("surcharge_stripe_percentage_fee", "2.9".into()).unwrap();
        options.set("surcharge_bacs_percentage_fee", "oops".into()).unwrap();
        let options: Arc<dyn OptionStore> = Arc::new(options);

        let mut pipeline = FeePipeline::new();
        pipeline.register(SurchargeHook::new(registry.clone(), options));

        CheckoutService::new(
            sessions,
            Arc::new(NonceIssuer::new(b"secret".to_vec(), Duration::hours(24)).unwrap()),
            Arc::new(pipeline),
            registry,
        )
    }

    #[test]
    fn test_bootstrap_defaults_to_first_enabled_gateway() {
        let service = service();
        let boot = service.bootstrap(None).unwrap();

        assert_eq!(boot.chosen_payment_method.as_deref(), Some("stripe"));
        assert_eq!(boot.gateways.len(), 2);
        assert!(!boot.nonce.is_empty());
        assert!(boot.totals.fees.is_empty());
    }

    #[test]
    fn test_update_surcharge_flow() {
        let service = service();
        let boot = service.bootstrap(None).unwrap();
        let id = boot.session_id.clone();

        let totals = service.update_cart(Some(&id), dec!(90), dec!(10)).unwrap();
        assert_eq!(totals.fee_total, dec!(3.20));

        let request = UpdateSurchargeRequest::new("bacs", boot.nonce.clone());
        let totals = service.handle_action(Some(&id), &request).unwrap();
        // non-numeric bacs settings: no surcharge, total unchanged
        assert!(totals.fees.is_empty());
        assert_eq!(totals.total, dec!(100));

        let request = UpdateSurchargeRequest::new("stripe", boot.nonce);
        let totals = service.handle_action(Some(&id), &request).unwrap();
        assert_eq!(totals.total, dec!(103.20));
    }

    #[test]
    fn test_invalid_nonce_does_not_mutate() {
        let service = service();
        let boot = service.bootstrap(None).unwrap();
        let id = boot.session_id.clone();

        let request = UpdateSurchargeRequest::new("bacs", "00112233445566778899");
        let err = service.update_surcharge(Some(&id), &request).unwrap_err();
        assert!(matches!(err, CheckoutError::Unauthorized(_)));

        let missing = UpdateSurchargeRequest {
            nonce: None,
            ..UpdateSurchargeRequest::new("bacs", "")
        };
        assert!(matches!(
            service.update_surcharge(Some(&id), &missing),
            Err(CheckoutError::Unauthorized(_))
        ));

        let again = service.bootstrap(Some(&id)).unwrap();
        assert_eq!(again.chosen_payment_method.as_deref(), Some("stripe"));
    }

    #[test]
    fn test_nonce_from_other_session_rejected() {
        let service = service();
        let first = service.bootstrap(None).unwrap();
        let second = service.bootstrap(None).unwrap();

        let request = UpdateSurchargeRequest::new("bacs", first.nonce);
        assert!(service.update_surcharge(Some(&second.session_id), &request).is_err());
    }

    #[test]
    fn test_unknown_action() {
        let service = service();
        let request = UpdateSurchargeRequest {
            action: "something_else".into(),
            ..UpdateSurchargeRequest::new("bacs", "x")
        };
        assert!(matches!(
            service.handle_action(None, &request),
            Err(CheckoutError::UnknownAction(_))
        ));
    }

    #[test]
    fn test_unknown_method_is_not_an_error() {
        let service = service();
        let boot = service.bootstrap(None).unwrap();
        service.update_cart(Some(&boot.session_id), dec!(10), dec!(0)).unwrap();

        let request = UpdateSurchargeRequest::new("<b>bitcoin</b>", boot.nonce);
        let totals = service.update_surcharge(Some(&boot.session_id), &request).unwrap();
        assert!(totals.fees.is_empty());
        assert_eq!(totals.total, dec!(10));
    }

    #[test]
    fn test_negative_cart_rejected() {
        let service = service();
        let boot = service.bootstrap(None).unwrap();
        assert!(matches!(
            service.update_cart(Some(&boot.session_id), dec!(-1), dec!(0)),
            Err(CheckoutError::InvalidCart(_))
        ));
    }

    #[test]
    fn test_bootstrap_unknown_session_gets_new_id() {
        let service = service();
        let forged = SessionId::from_string("attacker-chosen");

        let boot = service.bootstrap(Some(&forged)).unwrap();
        assert_ne!(boot.session_id, forged);

        let again = service.bootstrap(Some(&boot.session_id)).unwrap();
        assert_eq!(again.session_id, boot.session_id);
    }

    #[test]
    fn test_bootstrap_expired_session_gets_new_id() {
        let sessions = Arc::new(MemorySessionStore::new(Duration::minutes(30)));
        let service = service_with(sessions.clone());

        let mut stale = ShopperSession::new();
        stale.updated_at = chrono::Utc::now() - Duration::hours(1);
        sessions.save(&stale).unwrap();

        let boot = service.bootstrap(Some(&stale.id)).unwrap();
        assert_ne!(boot.session_id, stale.id);
        assert!(sessions.load(&stale.id).unwrap().is_none());
    }

    #[test]
    fn test_bootstrap_resets_disabled_method() {
        let service = service();
        let boot = service.bootstrap(None).unwrap();
        let id = boot.session_id.clone();

        let request = UpdateSurchargeRequest::new("cod", boot.nonce);
        service.update_surcharge(Some(&id), &request).unwrap();

        let again = service.bootstrap(Some(&id)).unwrap();
        assert_eq!(again.session_id, id);
        assert_eq!(again.chosen_payment_method.as_deref(), Some("stripe"));
    }

    #[test]
    fn test_huge_cart_amounts() {
        let service = service();
        let boot = service.bootstrap(None).unwrap();
        let id = boot.session_id.clone();

        assert!(matches!(
            service.update_cart(Some(&id), Decimal::MAX, dec!(1)),
            Err(CheckoutError::InvalidCart(_))
        ));

        // representable, but any stripe fee would overflow the total
        let totals = service.update_cart(Some(&id), Decimal::MAX, Decimal::ZERO).unwrap();
        assert!(totals.fees.is_empty());
        assert_eq!(totals.total, Decimal::MAX);

        let request = UpdateSurchargeRequest::new("bacs", boot.nonce.clone());
        service.update_surcharge(Some(&id), &request).unwrap();
        let request = UpdateSurchargeRequest::new("stripe", boot.nonce);
        let totals = service.update_surcharge(Some(&id), &request).unwrap();
        assert_eq!(totals.total, Decimal::MAX);

        assert!(service.bootstrap(Some(&id)).is_ok());
    }

    #[test]
    fn test_concurrent_cart_and_method_updates() {
        let service = service();
        let boot = service.bootstrap(None).unwrap();
        let id = boot.session_id.clone();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for i in 1..=200 {
                    service.update_cart(Some(&id), Decimal::from(i), dec!(0)).unwrap();
                }
            });
            scope.spawn(|| {
                for i in 0..200 {
                    let method = if i % 2 == 0 { "bacs" } else { "stripe" };
                    let request = UpdateSurchargeRequest::new(method, boot.nonce.clone());
                    service.update_surcharge(Some(&id), &request).unwrap();
                }
            });
        });

        let totals = service.totals(Some(&id)).unwrap();
        assert_eq!(totals.contents_total, dec!(200));
    }
}
