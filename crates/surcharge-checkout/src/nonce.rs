//! Anti-Forgery Tokens
//!
//! Session-bound tokens for background requests. A token is the truncated
//! HMAC-SHA256 of `(action, session, tick)`, where a tick is half the token
//! lifetime; tokens from the current and the previous tick verify.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{CheckoutError, Result};
use crate::session::SessionId;

type HmacSha256 = Hmac<Sha256>;

/// Bytes of MAC kept in a token (hex encoded, so twice as many chars)
const TOKEN_BYTES: usize = 10;

/// Issues and verifies tokens
pub struct NonceIssuer {
    secret: Vec<u8>,
    lifetime: Duration,
}

impl NonceIssuer {
    pub fn new(secret: impl Into<Vec<u8>>, lifetime: Duration) -> Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(CheckoutError::Config("nonce secret is empty".into()));
        }
        if lifetime < Duration::seconds(2) {
            return Err(CheckoutError::Config("nonce lifetime too short".into()));
        }
        Ok(Self { secret, lifetime })
    }

    /// Issuer with a per-process random secret. Tokens do not survive restarts.
    pub fn random(lifetime: Duration) -> Result<Self> {
        let mut secret = Vec::with_capacity(32);
        secret.extend_from_slice(uuid::Uuid::new_v4().as_bytes());
        secret.extend_from_slice(uuid::Uuid::new_v4().as_bytes());
        Self::new(secret, lifetime)
    }

    fn tick(&self, now: DateTime<Utc>) -> i64 {
        let half = self.lifetime.num_seconds() / 2;
        now.timestamp().div_euclid(half) + 1
    }

    fn mac(&self, action: &str, session: &SessionId, tick: i64) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| CheckoutError::Config(format!("nonce secret: {e}")))?;
        mac.update(action.as_bytes());
        mac.update(b"|");
        mac.update(session.as_str().as_bytes());
        mac.update(b"|");
        mac.update(tick.to_string().as_bytes());
        Ok(mac)
    }

    pub fn create(&self, action: &str, session: &SessionId) -> Result<String> {
        self.create_at(action, session, Utc::now())
    }

    pub fn create_at(&self, action: &str, session: &SessionId, now: DateTime<Utc>) -> Result<String> {
        let tag = self.mac(action, session, self.tick(now))?.finalize().into_bytes();
        Ok(hex::encode(&tag[..TOKEN_BYTES]))
    }

    pub fn verify(&self, action: &str, session: &SessionId, token: &str) -> bool {
        self.verify_at(action, session, token, Utc::now())
    }

    /// Constant-time check against the current and previous tick
    pub fn verify_at(&self, action: &str, session: &SessionId, token: &str, now: DateTime<Utc>) -> bool {
        let Ok(bytes) = hex::decode(token.trim()) else {
            return false;
        };
        if bytes.len() != TOKEN_BYTES {
            return false;
        }

        let tick = self.tick(now);
        [tick, tick - 1].into_iter().any(|t| {
            self.mac(action, session, t)
                .is_ok_and(|mac| mac.verify_truncated_left(&bytes).is_ok())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> NonceIssuer {
        NonceIssuer::new(b"test-secret".to_vec(), Duration::hours(24)).unwrap()
    }

    #[test]
    fn test_roundtrip_within_lifetime() {
        let issuer = issuer();
        let session = SessionId::from_string("abc");
        let now = Utc::now();

        let token = issuer.create_at("update-surcharge", &session, now).unwrap();
        assert_eq!(token.len(), TOKEN_BYTES * 2);
        assert!(issuer.verify_at("update-surcharge", &session, &token, now));
        assert!(issuer.verify_at("update-surcharge", &session, &token, now + Duration::hours(12)));
    }

    #[test]
    fn test_expires_after_two_ticks() {
        let issuer = issuer();
        let session = SessionId::from_string("abc");
        let now = Utc::now();

        let token = issuer.create_at("update-surcharge", &session, now).unwrap();
        assert!(!issuer.verify_at("update-surcharge", &session, &token, now + Duration::hours(25)));
    }

    #[test]
    fn test_bound_to_action_and_session() {
        let issuer = issuer();
        let session = SessionId::from_string("abc");
        let token = issuer.create("update-surcharge", &session).unwrap();

        assert!(!issuer.verify("other-action", &session, &token));
        assert!(!issuer.verify("update-surcharge", &SessionId::from_string("xyz"), &token));
        assert!(!issuer.verify("update-surcharge", &session, "not-hex"));
        assert!(!issuer.verify("update-surcharge", &session, ""));
    }

    #[test]
    fn test_rejects_empty_secret() {
        assert!(NonceIssuer::new(Vec::new(), Duration::hours(24)).is_err());
        assert!(NonceIssuer::random(Duration::hours(24)).is_ok());
    }
}
