//! Server Configuration
//!
//! Read from the environment (a `.env` file is loaded first if present).

use std::path::PathBuf;

use anyhow::Context;
use chrono::Duration;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// `BIND_ADDR`, default `0.0.0.0:3000`
    pub bind_addr: String,

    /// `SURCHARGE_NONCE_SECRET`; a random per-process secret when unset
    pub nonce_secret: Option<String>,

    /// `NONCE_LIFETIME_HOURS`, default 24
    pub nonce_lifetime: Duration,

    /// `SESSION_TTL_MINUTES`, default 2880 (48h)
    pub session_ttl: Duration,

    /// `SURCHARGE_STORE_FILE`: JSON with gateways and options
    pub store_file: Option<PathBuf>,

    /// `ADMIN_TOKEN`; admin routes are open when unset
    pub admin_token: Option<String>,

    /// `STATIC_DIR`, default `static`
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".into(),
            nonce_secret: None,
            nonce_lifetime: Duration::hours(24),
            session_ttl: Duration::hours(48),
            store_file: None,
            admin_token: None,
            static_dir: "static".into(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let number = |name: &str| -> anyhow::Result<Option<i64>> {
            var(name)
                .map(|v| v.trim().parse::<i64>().with_context(|| format!("{name} must be a whole number, got {v:?}")))
                .transpose()
        };

        let defaults = Self::default();

        let nonce_lifetime = match number("NONCE_LIFETIME_HOURS")? {
            Some(hours) => Duration::try_hours(hours).context("NONCE_LIFETIME_HOURS is out of range")?,
            None => defaults.nonce_lifetime,
        };
        anyhow::ensure!(nonce_lifetime > Duration::zero(), "NONCE_LIFETIME_HOURS must be positive");

        let session_ttl = match number("SESSION_TTL_MINUTES")? {
            Some(minutes) => Duration::try_minutes(minutes).context("SESSION_TTL_MINUTES is out of range")?,
            None => defaults.session_ttl,
        };
        anyhow::ensure!(session_ttl > Duration::zero(), "SESSION_TTL_MINUTES must be positive");

        Ok(Self {
            bind_addr: var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            nonce_secret: var("SURCHARGE_NONCE_SECRET"),
            nonce_lifetime,
            session_ttl,
            store_file: var("SURCHARGE_STORE_FILE").map(PathBuf::from),
            admin_token: var("ADMIN_TOKEN"),
            static_dir: var("STATIC_DIR").unwrap_or(defaults.static_dir),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<ServerConfig> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| ((*k).into(), (*v).into())).collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("BIND_ADDR", "  ")]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.nonce_lifetime, Duration::hours(24));
        assert_eq!(config.session_ttl, Duration::hours(48));
        assert!(config.admin_token.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("NONCE_LIFETIME_HOURS", "12"),
            ("SESSION_TTL_MINUTES", "90"),
            ("ADMIN_TOKEN", "s3cret"),
            ("SURCHARGE_STORE_FILE", "demos/store.json"),
        ])
        .unwrap();
        assert_eq!(config.nonce_lifetime, Duration::hours(12));
        assert_eq!(config.session_ttl, Duration::minutes(90));
        assert_eq!(config.admin_token.as_deref(), Some("s3cret"));
        assert_eq!(config.store_file, Some(PathBuf::from("demos/store.json")));
    }

    #[test]
    fn test_out_of_range_durations_are_errors() {
        assert!(config(&[("NONCE_LIFETIME_HOURS", "9000000000000000")]).is_err());
        assert!(config(&[("SESSION_TTL_MINUTES", "9000000000000000")]).is_err());
        assert!(config(&[("NONCE_LIFETIME_HOURS", "0")]).is_err());
        assert!(config(&[("SESSION_TTL_MINUTES", "-5")]).is_err());
        assert!(config(&[("SESSION_TTL_MINUTES", "soon")]).is_err());
    }
}
