//! # surcharge-checkout
//!
//! Checkout-side integration of payment surcharges: shopper sessions, the
//! cart fee pipeline and the background request that switches payment method.
//!
//! ## Flow
//!
//! ```text
//! GET  checkout ──▶ bootstrap()        session + nonce + totals
//! change method ──▶ update_surcharge() verify nonce, store method, fee pass
//!                                      └─▶ FeePipeline
//!                                            └─▶ SurchargeHook (priority 20)
//!                                                  └─▶ compute_surcharge()
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use surcharge_checkout::{CheckoutService, FeePipeline, MemorySessionStore, NonceIssuer, SurchargeHook};
//!
//! let mut pipeline = FeePipeline::new();
//! pipeline.register(SurchargeHook::new(registry.clone(), options));
//!
//! let service = CheckoutService::new(sessions, nonces, Arc::new(pipeline), registry);
//! let boot = service.bootstrap(None)?;
//! let totals = service.handle_action(Some(&boot.session_id), &request)?;
//! ```

mod cart;
mod checkout;
mod error;
mod nonce;
mod session;

pub use cart::{Cart, CartTotals, FeeContext, FeeHook, FeeLine, FeePipeline, RequestKind, SurchargeHook, round_money};
pub use checkout::{CheckoutBootstrap, CheckoutService};
pub use error::{CheckoutError, Result};
pub use nonce::NonceIssuer;
pub use session::{MemorySessionStore, SessionId, SessionStore, ShopperSession};
