//! ## 日本語
//!
//! セッションキャッシュの契約です。
//!
//! アクティブトークン索引、ユーザーごとのトークン集合、リフレッシュトークン、
//! ロールの権限集合、プロフィールのスナップショットを保持します。すべて助言的
//! （advisory）であり、失敗しても正本であるレコードの正しさには影響しません。
//!
//! ## English
//!
//! The session cache contract.
//!
//! The cache holds the active-token index, per-identity token sets, refresh tokens,
//! role permission sets and profile snapshots. Everything in it is advisory: a
//! failure degrades performance or revocation latency, never the correctness of the
//! authoritative record.
//!
//! Backends implement the primitive operations. The multi-key operations
//! ([`SessionCache::revoke_all_tokens_for_identity`],
//! [`SessionCache::purge_all_identity_data`]) are provided methods built on those
//! primitives, so every backend runs the same protocol. That protocol is not
//! atomic: a token added to an identity between the list step and the index
//! delete step can survive in the index pointing at a revoked key, or be dropped
//! from the index while its active-token entry lives on until its TTL. The
//! active-token entry, not the index, decides validity.

pub mod keys;
mod memory;

pub use memory::InMemorySessionCache;

use crate::models::{CacheError, ProfileSnapshot, Role};
use async_trait::async_trait;
use std::time::Duration;

pub type CacheResult<T> = Result<T, CacheError>;

/// One sub-delete that failed during [`SessionCache::purge_all_identity_data`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeFailure {
    pub key: String,
    pub error: CacheError,
}

/// Fast, expiring key-value store backing sessions and profile snapshots.
#[async_trait]
pub trait SessionCache: Send + Sync + 'static {
    /// Stores `auth:token:{token}` → `{identity}|{role}` with `ttl`.
    async fn put_active_token(
        &self,
        token: &str,
        identity: &str,
        role: Role,
        ttl: Duration,
    ) -> CacheResult<()>;

    /// Returns the identity and role recorded for an active token, if present.
    async fn active_token_owner(&self, token: &str) -> CacheResult<Option<(String, Role)>>;

    /// Idempotent.
    async fn revoke_active_token(&self, token: &str) -> CacheResult<()>;

    /// Adds `token` to `auth:user:{identity}:tokens`.
    ///
    /// Members whose active-token entry is gone are dropped, and the set's TTL is
    /// raised to `ttl` if it would otherwise expire sooner.
    async fn add_token_to_identity(
        &self,
        identity: &str,
        token: &str,
        ttl: Duration,
    ) -> CacheResult<()>;

    async fn remove_token_from_identity(&self, identity: &str, token: &str) -> CacheResult<()>;

    async fn list_tokens_for_identity(&self, identity: &str) -> CacheResult<Vec<String>>;

    /// Stores `auth:refresh:{token}` → identity with `ttl`.
    async fn put_refresh_token(&self, token: &str, identity: &str, ttl: Duration)
    -> CacheResult<()>;

    async fn identity_for_refresh_token(&self, token: &str) -> CacheResult<Option<String>>;

    async fn revoke_refresh_token(&self, token: &str) -> CacheResult<()>;

    /// Refresh-token counterpart of [`SessionCache::add_token_to_identity`].
    async fn add_refresh_token_to_identity(
        &self,
        identity: &str,
        token: &str,
        ttl: Duration,
    ) -> CacheResult<()>;

    async fn remove_refresh_token_from_identity(
        &self,
        identity: &str,
        token: &str,
    ) -> CacheResult<()>;

    async fn list_refresh_tokens_for_identity(&self, identity: &str) -> CacheResult<Vec<String>>;

    async fn add_permission_to_role(&self, role: Role, permission: &str) -> CacheResult<()>;

    async fn role_has_permission(&self, role: Role, permission: &str) -> CacheResult<bool>;

    /// Replaces the snapshot under `user:profile:{identity}` and sets its TTL.
    async fn put_profile_snapshot(
        &self,
        identity: &str,
        snapshot: &ProfileSnapshot,
        ttl: Duration,
    ) -> CacheResult<()>;

    /// `Ok(None)` on miss. A hash that does not decode is reported as a miss.
    async fn get_profile_snapshot(&self, identity: &str) -> CacheResult<Option<ProfileSnapshot>>;

    async fn put_email(&self, identity: &str, email: &str, ttl: Duration) -> CacheResult<()>;

    /// Prepends to `user:list_email`.
    async fn push_registered_email(&self, email: &str) -> CacheResult<()>;

    /// Inclusive range with Redis `LRANGE` index semantics (negative counts from the end).
    async fn list_registered_emails(&self, start: isize, stop: isize) -> CacheResult<Vec<String>>;

    /// Increments `rate:{key}`; the window starts on the first hit.
    async fn increment_rate(&self, key: &str, window: Duration) -> CacheResult<i64>;

    /// Deletes a raw (unprefixed) key. Idempotent.
    async fn delete_key(&self, key: &str) -> CacheResult<()>;

    async fn is_active_token_valid(&self, token: &str) -> CacheResult<bool> {
        Ok(self.active_token_owner(token).await?.is_some())
    }

    /// Reads and deletes a refresh token, so it can be redeemed once.
    ///
    /// The provided version is a read followed by a delete; backends that can do
    /// both in one step should override it.
    async fn take_refresh_token(&self, token: &str) -> CacheResult<Option<String>> {
        let identity = self.identity_for_refresh_token(token).await?;
        if identity.is_some() {
            self.revoke_refresh_token(token).await?;
        }
        Ok(identity)
    }

    /// Lists the identity's access tokens, revokes each, then deletes the index.
    ///
    /// If any revoke fails the index is kept so a later call can retry, and the
    /// first failure is returned. Returns how many tokens were revoked.
    async fn revoke_all_tokens_for_identity(&self, identity: &str) -> CacheResult<usize> {
        let tokens = self.list_tokens_for_identity(identity).await?;
        let mut revoked = 0;
        let mut first_error = None;
        for token in &tokens {
            match self.revoke_active_token(token).await {
                Ok(()) => revoked += 1,
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }
        self.delete_key(&keys::identity_tokens(identity)).await?;
        Ok(revoked)
    }

    /// Same protocol as [`SessionCache::revoke_all_tokens_for_identity`], for refresh tokens.
    async fn revoke_all_refresh_tokens_for_identity(&self, identity: &str) -> CacheResult<usize> {
        let tokens = self.list_refresh_tokens_for_identity(identity).await?;
        let mut revoked = 0;
        let mut first_error = None;
        for token in &tokens {
            match self.revoke_refresh_token(token).await {
                Ok(()) => revoked += 1,
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }
        self.delete_key(&keys::identity_refresh_tokens(identity)).await?;
        Ok(revoked)
    }

    /// Best-effort removal of everything cached for `identity`.
    ///
    /// Outstanding access and refresh tokens are revoked first, then every key in
    /// [`keys::identity_namespaces`] is deleted. Each step is independent: a failure
    /// is recorded and the purge moves on. An empty result means a clean purge.
    async fn purge_all_identity_data(&self, identity: &str) -> Vec<PurgeFailure> {
        let mut failures = Vec::new();

        if let Err(error) = self.revoke_all_tokens_for_identity(identity).await {
            failures.push(PurgeFailure {
                key: keys::identity_tokens(identity),
                error,
            });
        }
        if let Err(error) = self.revoke_all_refresh_tokens_for_identity(identity).await {
            failures.push(PurgeFailure {
                key: keys::identity_refresh_tokens(identity),
                error,
            });
        }

        for key in keys::identity_namespaces(identity) {
            if let Err(error) = self.delete_key(&key).await {
                failures.push(PurgeFailure { key, error });
            }
        }

        failures
    }
}
