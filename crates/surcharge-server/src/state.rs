//! Application State

use std::sync::Arc;

use anyhow::Context;

use surcharge_checkout::{CheckoutService, FeePipeline, MemorySessionStore, NonceIssuer, SurchargeHook};
use surcharge_core::{GatewayRegistry, MemoryOptionStore, OptionStore, StoreFile};

use crate::config::ServerConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Sessions, fee pipeline and background update handling
    pub checkout: Arc<CheckoutService<MemorySessionStore>>,

    /// Payment gateways offered at checkout
    pub registry: Arc<GatewayRegistry>,

    /// Surcharge settings
    pub options: Arc<dyn OptionStore>,

    /// Required `x-admin-token` for admin routes (None = open)
    pub admin_token: Option<Arc<str>>,
}

impl AppState {
    /// Wire the services from configuration
    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let seed = match &config.store_file {
            Some(path) => StoreFile::load(path)
                .with_context(|| format!("loading store file {}", path.display()))?,
            None => StoreFile::default(),
        };

        let nonces = match &config.nonce_secret {
            Some(secret) => NonceIssuer::new(secret.as_bytes().to_vec(), config.nonce_lifetime)?,
            None => NonceIssuer::random(config.nonce_lifetime)?,
        };

        Ok(Self::new(
            seed.registry(),
            seed.into_store(),
            nonces,
            MemorySessionStore::new(config.session_ttl),
            config.admin_token.clone(),
        ))
    }

    pub fn new(
        registry: GatewayRegistry,
        options: MemoryOptionStore,
        nonces: NonceIssuer,
        sessions: MemorySessionStore,
        admin_token: Option<String>,
    ) -> Self {
        let registry = Arc::new(registry);
        let options: Arc<dyn OptionStore> = Arc::new(options);

        let mut pipeline = FeePipeline::new();
        pipeline.register(SurchargeHook::new(registry.clone(), options.clone()));

        let checkout = CheckoutService::new(
            Arc::new(sessions),
            Arc::new(nonces),
            Arc::new(pipeline),
            registry.clone(),
        );

        Self {
            checkout: Arc::new(checkout),
            registry,
            options,
            admin_token: admin_token.map(Arc::from),
        }
    }
}
