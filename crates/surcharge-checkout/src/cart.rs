//! Cart & Fee Pipeline
//!
//! The cart keeps its fee lines only for the current calculation pass:
//! every pass clears them and lets each registered [`FeeHook`] add its own.

use std::sync::Arc;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use surcharge_core::{GatewayRegistry, OptionStore, SurchargeConfig, compute_surcharge};

use crate::error::{CheckoutError, Result};

/// Round a money amount to cents
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// A cart-level fee or credit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeLine {
    pub name: String,
    pub amount: Decimal,
    pub taxable: bool,
    pub tax_class: String,
}

/// Shopping cart totals as seen by the fee pipeline
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    /// Line items after discounts
    pub contents_total: Decimal,

    pub shipping_total: Decimal,

    #[serde(default)]
    fees: Vec<FeeLine>,
}

impl Cart {
    pub fn new(contents_total: Decimal, shipping_total: Decimal) -> Self {
        Self {
            contents_total,
            shipping_total,
            fees: Vec::new(),
        }
    }

    /// Replace the cart amounts. Both must be non-negative and their sum
    /// representable.
    pub fn set_amounts(&mut self, contents_total: Decimal, shipping_total: Decimal) -> Result<()> {
        if contents_total < Decimal::ZERO || shipping_total < Decimal::ZERO {
            return Err(CheckoutError::InvalidCart("Cart amounts cannot be negative.".into()));
        }
        if contents_total.checked_add(shipping_total).is_none() {
            return Err(CheckoutError::InvalidCart("Cart amounts are too large.".into()));
        }
        self.contents_total = contents_total;
        self.shipping_total = shipping_total;
        Ok(())
    }

    /// Amount surcharges are computed on; `None` on overflow
    pub fn fee_base(&self) -> Option<Decimal> {
        self.contents_total.checked_add(self.shipping_total)
    }

    /// Add a fee line. A second fee with the same name is ignored, as is a
    /// fee that would push the total out of range.
    pub fn add_fee(&mut self, name: impl Into<String>, amount: Decimal, taxable: bool, tax_class: impl Into<String>) {
        let name = name.into();
        if self.fees.iter().any(|f| f.name == name) {
            tracing::debug!(fee = %name, "Fee already added in this pass");
            return;
        }

        let amount = round_money(amount);
        if self.total().and_then(|t| t.checked_add(amount)).is_none() {
            tracing::warn!(fee = %name, amount = %amount, "Fee would overflow the cart total, dropping it");
            return;
        }

        self.fees.push(FeeLine {
            name,
            amount,
            taxable,
            tax_class: tax_class.into(),
        });
    }

    pub fn fees(&self) -> &[FeeLine] {
        &self.fees
    }

    pub fn clear_fees(&mut self) {
        self.fees.clear();
    }

    pub fn fee_total(&self) -> Option<Decimal> {
        self.fees
            .iter()
            .try_fold(Decimal::ZERO, |sum, f| sum.checked_add(f.amount))
    }

    pub fn total(&self) -> Option<Decimal> {
        self.fee_base()?.checked_add(self.fee_total()?)
    }

    pub fn totals(&self) -> Result<CartTotals> {
        let (Some(fee_total), Some(total)) = (self.fee_total(), self.total()) else {
            return Err(CheckoutError::InvalidCart("Cart total is out of range.".into()));
        };
        Ok(CartTotals {
            contents_total: self.contents_total,
            shipping_total: self.shipping_total,
            fees: self.fees.clone(),
            fee_total,
            total,
        })
    }
}

/// Snapshot returned to the checkout UI
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotals {
    pub contents_total: Decimal,
    pub shipping_total: Decimal,
    pub fees: Vec<FeeLine>,
    pub fee_total: Decimal,
    pub total: Decimal,
}

/// Where a calculation pass was triggered from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    /// Shopper page load
    Storefront,
    /// Background request from the checkout page
    Background,
    /// Admin screens; shopper fees do not apply
    Admin,
}

/// Per-pass context, built from the shopper session
#[derive(Clone, Copy, Debug)]
pub struct FeeContext<'a> {
    pub chosen_payment_method: Option<&'a str>,
    pub request: RequestKind,
}

impl<'a> FeeContext<'a> {
    pub const fn new(chosen_payment_method: Option<&'a str>, request: RequestKind) -> Self {
        Self {
            chosen_payment_method,
            request,
        }
    }
}

/// Contributes fee lines during a calculation pass
pub trait FeeHook: Send + Sync {
    fn name(&self) -> &str;

    /// Lower runs first
    fn priority(&self) -> i32 {
        10
    }

    fn apply(&self, cart: &mut Cart, ctx: &FeeContext<'_>);
}

/// Ordered set of fee hooks
#[derive(Default, Clone)]
pub struct FeePipeline {
    hooks: Vec<Arc<dyn FeeHook>>,
}

impl FeePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: impl FeeHook + 'static) {
        self.hooks.push(Arc::new(hook));
        self.hooks.sort_by_key(|h| h.priority());
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Recompute all fees on `cart`
    pub fn calculate_fees(&self, cart: &mut Cart, ctx: &FeeContext<'_>) {
        cart.clear_fees();
        for hook in &self.hooks {
            tracing::trace!(hook = hook.name(), priority = hook.priority(), "Applying fee hook");
            hook.apply(cart, ctx);
        }
        tracing::debug!(
            payment_method = ?ctx.chosen_payment_method,
            fees = cart.fees().len(),
            fee_total = ?cart.fee_total(),
            "Calculated cart fees"
        );
    }
}

/// Adds the chosen payment method's surcharge as a non-taxable fee
pub struct SurchargeHook {
    registry: Arc<GatewayRegistry>,
    options: Arc<dyn OptionStore>,
}

impl SurchargeHook {
    pub fn new(registry: Arc<GatewayRegistry>, options: Arc<dyn OptionStore>) -> Self {
        Self { registry, options }
    }
}

impl FeeHook for SurchargeHook {
    fn name(&self) -> &str {
        "payment_surcharge"
    }

    fn priority(&self) -> i32 {
        20
    }

    fn apply(&self, cart: &mut Cart, ctx: &FeeContext<'_>) {
        if ctx.request == RequestKind::Admin {
            return;
        }

        let Some(method) = ctx.chosen_payment_method.filter(|m| !m.is_empty()) else {
            return;
        };

        if !self.registry.contains(method) {
            tracing::debug!(payment_method = %method, "No such payment gateway, no surcharge");
            return;
        }

        let config = match SurchargeConfig::from_options(self.options.as_ref(), method) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(payment_method = %method, error = %e, "Surcharge settings unusable, skipping");
                return;
            }
        };

        if config.is_zero() {
            tracing::debug!(payment_method = %method, "No surcharge configured");
            return;
        }

        let Some(base) = cart.fee_base() else {
            tracing::warn!(payment_method = %method, "Cart amounts out of range, no surcharge");
            return;
        };

        tracing::debug!(
            payment_method = %method,
            fixed_fee = %config.fixed_fee,
            percentage_fee = %config.percentage_fee,
            min_fee = ?config.min_fee,
            max_fee = ?config.max_fee,
            formula = %config.formula,
            "Retrieved surcharge settings"
        );

        let fee = round_money(compute_surcharge(base, &config));
        if fee > Decimal::ZERO {
            cart.add_fee(config.fee_display_name, fee, false, "");
        }
    }
}
