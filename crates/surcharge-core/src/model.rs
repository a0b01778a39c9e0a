//! Domain Models
//!
//! Per-gateway surcharge configuration and its stored representation.
//! Uses `rust_decimal` for all monetary values - never use f64 for money!

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SurchargeError};
use crate::store::OptionStore;

/// Fee line label used when the administrator leaves the display name blank
pub const DEFAULT_FEE_NAME: &str = "Payment Method Surcharge";

/// Field suffixes of the per-gateway options
pub mod fields {
    pub const FEE_NAME: &str = "fee_name";
    pub const FIXED_FEE: &str = "fixed_fee";
    pub const PERCENTAGE_FEE: &str = "percentage_fee";
    pub const MIN_FEE: &str = "min_fee";
    pub const MAX_FEE: &str = "max_fee";
    pub const FORMULA: &str = "formula";

    /// Fields stored as decimal numbers
    pub const NUMERIC: [&str; 4] = [FIXED_FEE, PERCENTAGE_FEE, MIN_FEE, MAX_FEE];
}

/// Key under which a gateway's field is stored, e.g. `surcharge_stripe_fixed_fee`
pub fn option_key(gateway_id: &str, field: &str) -> String {
    format!("surcharge_{gateway_id}_{field}")
}

/// How the percentage part of a surcharge is applied
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeFormula {
    /// `total * rate + fixed` - the canonical formula
    #[default]
    Additive,

    /// Grows the total so the percentage is charged on the fee as well:
    /// `(total + fixed) / (1 - rate) - total`
    GrossUp,
}

impl FeeFormula {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Additive => "additive",
            Self::GrossUp => "gross_up",
        }
    }
}

impl fmt::Display for FeeFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeeFormula {
    type Err = SurchargeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "additive" => Ok(Self::Additive),
            "gross_up" | "grossup" => Ok(Self::GrossUp),
            other => Err(SurchargeError::UnknownFormula(other.to_string())),
        }
    }
}

/// Surcharge settings for one payment gateway
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurchargeConfig {
    /// Label of the fee line shown to the shopper
    pub fee_display_name: String,

    /// Flat amount added to every order
    pub fixed_fee: Decimal,

    /// Percentage of the cart total (2.9 means 2.9%)
    pub percentage_fee: Decimal,

    /// Lower bound of the fee
    pub min_fee: Option<Decimal>,

    /// Upper bound of the fee
    pub max_fee: Option<Decimal>,

    pub formula: FeeFormula,
}

impl Default for SurchargeConfig {
    fn default() -> Self {
        Self {
            fee_display_name: DEFAULT_FEE_NAME.into(),
            fixed_fee: Decimal::ZERO,
            percentage_fee: Decimal::ZERO,
            min_fee: None,
            max_fee: None,
            formula: FeeFormula::Additive,
        }
    }
}

impl SurchargeConfig {
    /// Read a gateway's configuration from the option store.
    ///
    /// Missing or blank options fall back to their defaults. Any numeric
    /// option that does not parse is an error, callers are expected to
    /// skip the surcharge in that case.
    pub fn from_options(store: &dyn OptionStore, gateway_id: &str) -> Result<Self> {
        let mut values = Vec::with_capacity(6);
        for field in [
            fields::FEE_NAME,
            fields::FIXED_FEE,
            fields::PERCENTAGE_FEE,
            fields::MIN_FEE,
            fields::MAX_FEE,
            fields::FORMULA,
        ] {
            let key = option_key(gateway_id, field);
            values.push((key.clone(), store.get(&key)?));
        }

        Self::from_lookup(gateway_id, |key| {
            values
                .iter()
                .find(|(k, _)| k == key)
                .and_then(|(_, v)| v.clone())
        })
    }

    /// Build a configuration from any key lookup using the stored key layout
    pub fn from_lookup<F>(gateway_id: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |field: &str| {
            let key = option_key(gateway_id, field);
            let value = lookup(&key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
            (key, value)
        };

        let decimal = |field: &str| -> Result<Option<Decimal>> {
            match get(field) {
                (_, None) => Ok(None),
                (key, Some(raw)) => parse_decimal(&raw)
                    .map(Some)
                    .ok_or(SurchargeError::NonNumeric { key, value: raw }),
            }
        };

        let formula = match get(fields::FORMULA) {
            (_, None) => FeeFormula::default(),
            (_, Some(raw)) => raw.parse()?,
        };

        Ok(Self {
            fee_display_name: get(fields::FEE_NAME)
                .1
                .unwrap_or_else(|| DEFAULT_FEE_NAME.into()),
            fixed_fee: decimal(fields::FIXED_FEE)?.unwrap_or_default(),
            percentage_fee: decimal(fields::PERCENTAGE_FEE)?.unwrap_or_default(),
            min_fee: decimal(fields::MIN_FEE)?,
            max_fee: decimal(fields::MAX_FEE)?,
            formula,
        })
    }

    /// Check the administrator-facing invariants
    pub fn validate(&self, gateway_id: &str) -> Result<()> {
        let invalid = |field: &str, reason: String| SurchargeError::Invalid {
            key: option_key(gateway_id, field),
            reason,
        };

        if self.fixed_fee < Decimal::ZERO {
            return Err(invalid(fields::FIXED_FEE, "Fixed fee cannot be negative.".into()));
        }

        if self.percentage_fee < Decimal::ZERO || self.percentage_fee >= Decimal::ONE_HUNDRED {
            return Err(invalid(
                fields::PERCENTAGE_FEE,
                "Percentage fee must be at least 0 and below 100.".into(),
            ));
        }

        for (field, bound) in [(fields::MIN_FEE, self.min_fee), (fields::MAX_FEE, self.max_fee)] {
            if bound.is_some_and(|b| b < Decimal::ZERO) {
                return Err(invalid(field, "Fee bounds cannot be negative.".into()));
            }
        }

        if let (Some(min), Some(max)) = (self.min_fee, self.max_fee) {
            if min > max {
                return Err(invalid(
                    fields::MIN_FEE,
                    format!("Minimum fee {min} is greater than maximum fee {max}."),
                ));
            }
        }

        Ok(())
    }

    /// Percentage as a rate in [0, 1). Out-of-range percentages count as zero.
    pub fn percentage_rate(&self) -> Decimal {
        if self.percentage_fee < Decimal::ZERO || self.percentage_fee >= Decimal::ONE_HUNDRED {
            tracing::warn!(
                percentage_fee = %self.percentage_fee,
                "Percentage fee outside [0, 100), ignoring it"
            );
            return Decimal::ZERO;
        }
        self.percentage_fee / Decimal::ONE_HUNDRED
    }

    /// True when no part of the configuration can produce a fee
    pub fn is_zero(&self) -> bool {
        self.fixed_fee.is_zero()
            && self.percentage_fee.is_zero()
            && self.min_fee.is_none_or(|m| m.is_zero())
    }
}

/// Parse a stored decimal. Accepts plain and scientific notation.
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}
