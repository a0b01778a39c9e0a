//! Surcharge Calculator
//!
//! Turns a cart total and a gateway's [`SurchargeConfig`] into a fee amount.
//!
//! ```text
//! raw (additive) = total * rate + fixed
//! raw (gross-up) = (total + fixed) / (1 - rate) - total
//! fee            = max(min_fee, min(raw, max_fee)), never below zero
//! ```

use rust_decimal::Decimal;

use crate::model::{FeeFormula, SurchargeConfig};

/// Strategy for the unclamped part of the fee
pub trait FeeCalculator: Send + Sync {
    /// Raw fee before bounds are applied. `None` when the arithmetic overflows.
    fn raw_fee(&self, cart_total: Decimal, config: &SurchargeConfig) -> Option<Decimal>;
}

/// Straight percentage of the cart total plus the fixed amount
#[derive(Debug, Default, Clone, Copy)]
pub struct AdditiveCalculator;

impl FeeCalculator for AdditiveCalculator {
    fn raw_fee(&self, cart_total: Decimal, config: &SurchargeConfig) -> Option<Decimal> {
        cart_total
            .checked_mul(config.percentage_rate())?
            .checked_add(config.fixed_fee)
    }
}

/// Solves for the total whose percentage cost equals the fee it carries
#[derive(Debug, Default, Clone, Copy)]
pub struct GrossUpCalculator;

impl FeeCalculator for GrossUpCalculator {
    fn raw_fee(&self, cart_total: Decimal, config: &SurchargeConfig) -> Option<Decimal> {
        // rate < 1, so the denominator is strictly positive
        let denominator = Decimal::ONE - config.percentage_rate();
        let total_with_fee = cart_total
            .checked_add(config.fixed_fee)?
            .checked_div(denominator)?;
        total_with_fee.checked_sub(cart_total)
    }
}

impl FeeFormula {
    pub fn calculator(self) -> &'static dyn FeeCalculator {
        match self {
            Self::Additive => &AdditiveCalculator,
            Self::GrossUp => &GrossUpCalculator,
        }
    }
}

/// Fee for `cart_total` (contents plus shipping) under `config`.
///
/// Negative totals count as zero. Absent bounds do not clamp. The result is
/// never negative and is not rounded.
pub fn compute_surcharge(cart_total: Decimal, config: &SurchargeConfig) -> Decimal {
    let cart_total = cart_total.max(Decimal::ZERO);

    let Some(raw) = config.formula.calculator().raw_fee(cart_total, config) else {
        tracing::warn!(
            cart_total = %cart_total,
            formula = %config.formula,
            "Surcharge arithmetic overflowed, no fee applied"
        );
        return Decimal::ZERO;
    };

    clamp_fee(raw, config.min_fee, config.max_fee).max(Decimal::ZERO)
}

/// `max(min, min(raw, max))`. The floor wins when the bounds cross.
pub fn clamp_fee(raw: Decimal, min_fee: Option<Decimal>, max_fee: Option<Decimal>) -> Decimal {
    let mut fee = raw;
    if let Some(max) = max_fee {
        fee = fee.min(max);
    }
    if let Some(min) = min_fee {
        fee = fee.max(min);
    }
    fee
}
