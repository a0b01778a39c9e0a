//! # surcharge-core
//!
//! Payment-method surcharges for a storefront cart.
//!
//! A store administrator configures, per payment gateway, a fixed fee, a
//! percentage fee and optional minimum/maximum bounds. On every cart fee pass
//! the configuration for the shopper's chosen gateway is turned into a single
//! fee line.
//!
//! ```text
//! ┌──────────────┐   options    ┌────────────────┐   fee    ┌──────────────┐
//! │ Admin        │─────────────▶│ OptionStore    │─────────▶│ Calculator   │
//! │ settings     │  (sanitized) │ surcharge_*    │  config  │ additive /   │
//! │ schema       │              │                │          │ gross-up     │
//! └──────────────┘              └────────────────┘          └──────────────┘
//! ```
//!
//! ## Example: card payment, $100 cart
//!
//! ```rust
//! use rust_decimal_macros::dec;
//! use surcharge_core::{compute_surcharge, SurchargeConfig};
//!
//! let config = SurchargeConfig {
//!     fixed_fee: dec!(1),
//!     percentage_fee: dec!(2.9),
//!     ..SurchargeConfig::default()
//! };
//!
//! assert_eq!(compute_surcharge(dec!(100), &config), dec!(3.9));
//! ```

pub mod calculator;
pub mod error;
pub mod gateway;
pub mod model;
pub mod notifier;
pub mod settings;
pub mod store;

pub use calculator::{AdditiveCalculator, FeeCalculator, GrossUpCalculator, compute_surcharge};
pub use error::{Result, SurchargeError};
pub use gateway::{GatewayRegistry, PaymentGateway};
pub use model::{DEFAULT_FEE_NAME, FeeFormula, SurchargeConfig, option_key};
pub use notifier::{ChangeNotifier, NotifierAction, NotifierState, UpdateSurchargeRequest};
pub use settings::{FieldKind, SettingsField, sanitize_option, sanitize_text, save_settings, settings_schema};
pub use store::{MemoryOptionStore, OptionStore, StoreFile};
