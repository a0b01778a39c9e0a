//! Shopper Sessions
//!
//! The session is the explicit context of a fee calculation: it carries the
//! chosen payment method and the cart it applies to.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cart::{Cart, CartTotals, FeeContext, FeePipeline, RequestKind};
use crate::error::{CheckoutError, Result};

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A shopper's checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShopperSession {
    pub id: SessionId,

    /// Payment method selected at checkout
    pub chosen_payment_method: Option<String>,

    pub cart: Cart,

    pub created_at: DateTime<Utc>,

    /// Last activity timestamp
    pub updated_at: DateTime<Utc>,
}

impl ShopperSession {
    pub fn new() -> Self {
        Self::with_id(SessionId::new())
    }

    pub fn with_id(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            chosen_payment_method: None,
            cart: Cart::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn choose_payment_method(&mut self, method: impl Into<String>) {
        self.chosen_payment_method = Some(method.into());
        self.touch();
    }

    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.updated_at > ttl
    }

    /// Fee context for a pass over this session's cart
    pub fn fee_context(&self, request: RequestKind) -> FeeContext<'_> {
        FeeContext::new(self.chosen_payment_method.as_deref(), request)
    }

    /// Run a fee pass over the cart with this session's payment method
    pub fn recalculate(&mut self, pipeline: &FeePipeline, request: RequestKind) -> Result<CartTotals> {
        let mut cart = std::mem::take(&mut self.cart);
        pipeline.calculate_fees(&mut cart, &self.fee_context(request));
        self.cart = cart;
        self.touch();
        self.cart.totals()
    }
}

impl Default for ShopperSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Session store trait
pub trait SessionStore: Send + Sync {
    /// Save or update a session
    fn save(&self, session: &ShopperSession) -> Result<()>;

    /// Load a live session. Expired sessions are treated as absent.
    fn load(&self, id: &SessionId) -> Result<Option<ShopperSession>>;

    /// Apply `f` to a live session and store the result atomically with
    /// respect to other writers. Returns `None` when the session is absent
    /// or expired. Nothing is stored when `f` fails.
    fn update<R, F>(&self, id: &SessionId, f: F) -> Result<Option<R>>
    where
        F: FnOnce(&mut ShopperSession) -> Result<R>;

    /// Drop expired sessions, returning how many were removed
    fn purge_expired(&self) -> Result<usize>;
}

/// In-memory session store
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, ShopperSession>>,
    ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map_or(0, |s| s.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(Duration::hours(48))
    }
}

fn poisoned<E>(_: E) -> CheckoutError {
    CheckoutError::Storage("session store lock poisoned".into())
}

impl SessionStore for MemorySessionStore {
    fn save(&self, session: &ShopperSession) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    fn load(&self, id: &SessionId) -> Result<Option<ShopperSession>> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        Ok(sessions
            .get(id)
            .filter(|s| !s.is_expired(self.ttl, Utc::now()))
            .cloned())
    }

    fn update<R, F>(&self, id: &SessionId, f: F) -> Result<Option<R>>
    where
        F: FnOnce(&mut ShopperSession) -> Result<R>,
    {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        let Some(stored) = sessions
            .get_mut(id)
            .filter(|s| !s.is_expired(self.ttl, Utc::now()))
        else {
            return Ok(None);
        };

        let mut session = stored.clone();
        let out = f(&mut session)?;
        *stored = session;
        Ok(Some(out))
    }

    fn purge_expired(&self) -> Result<usize> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        let now = Utc::now();
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(self.ttl, now));
        Ok(before - sessions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_memory_store() {
        let store = MemorySessionStore::default();
        let mut session = ShopperSession::new();
        session.choose_payment_method("stripe");
        let id = session.id.clone();

        store.save(&session).unwrap();

        let loaded = store.load(&id).unwrap().unwrap();
        assert_eq!(loaded.chosen_payment_method.as_deref(), Some("stripe"));

        let missing = SessionId::from_string("missing");
        assert!(store.load(&missing).unwrap().is_none());
    }

    #[test]
    fn test_update_in_place() {
        let store = MemorySessionStore::default();
        let session = ShopperSession::new();
        let id = session.id.clone();
        store.save(&session).unwrap();

        let method = store
            .update(&id, |s| {
                s.choose_payment_method("bacs");
                Ok(s.chosen_payment_method.clone())
            })
            .unwrap();
        assert_eq!(method, Some(Some("bacs".to_string())));

        // a failing update leaves the session untouched
        let failed = store.update(&id, |s| {
            s.choose_payment_method("stripe");
            Err::<(), _>(CheckoutError::InvalidCart("no".into()))
        });
        assert!(failed.is_err());
        assert_eq!(
            store.load(&id).unwrap().unwrap().chosen_payment_method.as_deref(),
            Some("bacs")
        );

        let absent = store.update(&SessionId::new(), |_| Ok(())).unwrap();
        assert!(absent.is_none());
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let store = MemorySessionStore::default();
        let session = ShopperSession::new();
        let id = session.id.clone();
        store.save(&session).unwrap();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..100 {
                        store
                            .update(&id, |s| {
                                s.cart.contents_total += Decimal::ONE;
                                Ok(())
                            })
                            .unwrap();
                    }
                });
            }
        });

        let session = store.load(&id).unwrap().unwrap();
        assert_eq!(session.cart.contents_total, Decimal::from(800));
    }

    #[test]
    fn test_update_skips_expired() {
        let store = MemorySessionStore::new(Duration::minutes(30));
        let mut stale = ShopperSession::new();
        stale.updated_at = Utc::now() - Duration::hours(1);
        store.save(&stale).unwrap();

        assert!(store.update(&stale.id, |_| Ok(())).unwrap().is_none());
    }

    #[test]
    fn test_expired_sessions() {
        let store = MemorySessionStore::new(Duration::minutes(30));
        let mut stale = ShopperSession::new();
        stale.updated_at = Utc::now() - Duration::hours(1);
        let fresh = ShopperSession::new();

        store.save(&stale).unwrap();
        store.save(&fresh).unwrap();

        assert!(store.load(&stale.id).unwrap().is_none());
        assert_eq!(store.purge_expired().unwrap(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_fee_context_carries_method() {
        let mut session = ShopperSession::new();
        assert_eq!(session.fee_context(RequestKind::Storefront).chosen_payment_method, None);

        session.choose_payment_method("bacs");
        let ctx = session.fee_context(RequestKind::Background);
        assert_eq!(ctx.chosen_payment_method, Some("bacs"));
        assert_eq!(ctx.request, RequestKind::Background);
    }
}
