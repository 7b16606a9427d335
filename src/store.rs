//! Single-use grant stores.
//!
//! Authorization codes and refresh tokens are opaque random values mapped to
//! the grant that produced them. Each kind has its own typed store; an entry
//! is handed out at most once.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::crypto::{CryptoError, opaque_token};

/// Who granted what to whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantContext {
    pub client_id: String,
    pub user_id: String,
    pub redirect_uri: String,
    pub scope: String,
}

/// Grant bound to an authorization code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCode {
    pub context: GrantContext,
    pub expires_at: DateTime<Utc>,
}

/// Grant bound to a refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    pub context: GrantContext,
    pub expires_at: DateTime<Utc>,
}

/// Entry kept by a [`GrantStore`].
pub trait Grant: Send + Sync + 'static {
    /// Human name of the credential, for logs.
    const KIND: &'static str;

    fn new(context: GrantContext, expires_at: DateTime<Utc>) -> Self;
    fn expires_at(&self) -> DateTime<Utc>;

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

impl Grant for AuthorizationCode {
    const KIND: &'static str = "authorization_code";

    fn new(context: GrantContext, expires_at: DateTime<Utc>) -> Self {
        Self { context, expires_at }
    }

    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl Grant for RefreshToken {
    const KIND: &'static str = "refresh_token";

    fn new(context: GrantContext, expires_at: DateTime<Utc>) -> Self {
        Self { context, expires_at }
    }

    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

/// In-memory store with atomic fetch-and-remove redemption.
///
/// Every operation on a key holds that key's shard lock, so two concurrent
/// [`GrantStore::redeem`] calls on the same value cannot both observe it.
#[derive(Debug)]
pub struct GrantStore<G: Grant> {
    entries: DashMap<String, G>,
}

pub type AuthorizationCodeStore = GrantStore<AuthorizationCode>;
pub type RefreshTokenStore = GrantStore<RefreshToken>;

impl<G: Grant> Default for GrantStore<G> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: Grant> GrantStore<G> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Store `context` under a fresh opaque value valid for `ttl`.
    pub fn issue(
        &self,
        context: GrantContext,
        ttl: Duration,
    ) -> Result<String, CryptoError> {
        let value = opaque_token()?;
        let expires_at = Utc::now() + ttl;

        self.entries.insert(value.clone(), G::new(context, expires_at));

        Ok(value)
    }

    /// Remove and return the entry for `value`.
    ///
    /// The entry is gone after this call whatever the outcome; an expired
    /// entry is reported as not found.
    pub fn redeem(&self, value: &str) -> Option<G> {
        let (_, grant) = self.entries.remove(value)?;

        if grant.is_expired(Utc::now()) {
            tracing::debug!(kind = G::KIND, "expired credential presented");
            return None;
        }

        Some(grant)
    }

    /// Drop expired entries. Only bounds memory, [`GrantStore::redeem`]
    /// already ignores them.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, grant| !grant.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
