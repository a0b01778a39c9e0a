//! Payment Gateways
//!
//! The set of payment methods a shopper can choose from at checkout.

use serde::{Deserialize, Serialize};

/// A payment method offered by the store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentGateway {
    /// Identifier posted by the checkout form (e.g. "stripe", "bacs")
    pub id: String,

    /// Title shown to shoppers and administrators
    pub title: String,

    /// Disabled gateways keep their settings but are not offered
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

const fn enabled_default() -> bool {
    true
}

impl PaymentGateway {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Ordered gateway registry
#[derive(Clone, Debug, Default)]
pub struct GatewayRegistry {
    gateways: Vec<PaymentGateway>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a gateway, replacing any existing one with the same id
    pub fn register(&mut self, gateway: PaymentGateway) {
        if let Some(existing) = self.gateways.iter_mut().find(|g| g.id == gateway.id) {
            *existing = gateway;
        } else {
            self.gateways.push(gateway);
        }
    }

    pub fn get(&self, id: &str) -> Option<&PaymentGateway> {
        self.gateways.iter().find(|g| g.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Enabled gateways in registration order
    pub fn enabled(&self) -> impl Iterator<Item = &PaymentGateway> {
        self.gateways.iter().filter(|g| g.enabled)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PaymentGateway> {
        self.gateways.iter()
    }

    pub fn len(&self) -> usize {
        self.gateways.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gateways.is_empty()
    }
}

impl FromIterator<PaymentGateway> for GatewayRegistry {
    fn from_iter<I: IntoIterator<Item = PaymentGateway>>(iter: I) -> Self {
        let mut registry = Self::new();
        for gateway in iter {
            registry.register(gateway);
        }
        registry
    }
}
