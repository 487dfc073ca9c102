//! Shared harness and fault-injecting doubles for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use r_account::cache::CacheResult;
use r_account::store::StoreResult;
use r_account::{
    AccountConfig, CacheError, Clock, CredentialVerifier, InMemoryRecordStore,
    InMemorySessionCache, ManualClock, NewUser, ProfileSnapshot, RSessionManager, RecordStore,
    Role, SessionCache, StoreError, UserRecord,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub type TestResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub const SECRET: &str = "test-secret";

/// Cheap Argon2 parameters so the suite stays fast.
pub fn fast_verifier() -> CredentialVerifier {
    CredentialVerifier::with_params(8, 1, 1).expect("argon2 params")
}

pub struct Harness {
    pub manager: RSessionManager,
    pub store: Arc<InMemoryRecordStore>,
    pub cache: Arc<InMemorySessionCache>,
    pub clock: ManualClock,
}

pub fn harness() -> Harness {
    harness_with_config(AccountConfig::with_secret(SECRET))
}

pub fn harness_with_config(config: AccountConfig) -> Harness {
    let clock = ManualClock::starting_now();
    let shared: Arc<dyn Clock> = Arc::new(clock.clone());
    let store = Arc::new(InMemoryRecordStore::with_clock(Arc::clone(&shared)));
    let cache = Arc::new(InMemorySessionCache::with_clock(Arc::clone(&shared)));
    let manager = RSessionManager::with_clock(
        config,
        Arc::clone(&store) as Arc<dyn RecordStore>,
        Arc::clone(&cache) as Arc<dyn SessionCache>,
        shared,
    )
    .expect("manager")
    .with_verifier(fast_verifier());
    Harness {
        manager,
        store,
        cache,
        clock,
    }
}

/// A manager over arbitrary collaborators, on a manual clock.
pub fn manager_over(
    config: AccountConfig,
    store: Arc<dyn RecordStore>,
    cache: Arc<dyn SessionCache>,
) -> RSessionManager {
    RSessionManager::with_clock(config, store, cache, Arc::new(ManualClock::starting_now()))
        .expect("manager")
        .with_verifier(fast_verifier())
}

/// Session cache wrapper that fails or stalls on demand.
#[derive(Default)]
pub struct FlakyCache {
    pub inner: InMemorySessionCache,
    fail_all: AtomicBool,
    failing_ops: Mutex<HashSet<&'static str>>,
    failing_keys: Mutex<HashSet<String>>,
    delay: Mutex<Option<Duration>>,
}

impl FlakyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_all(&self, on: bool) {
        self.fail_all.store(on, Ordering::SeqCst);
    }

    pub fn fail_op(&self, op: &'static str) {
        self.failing_ops.lock().expect("lock").insert(op);
    }

    /// Makes `delete_key` fail for one raw key.
    pub fn fail_delete_of(&self, key: impl Into<String>) {
        self.failing_keys.lock().expect("lock").insert(key.into());
    }

    pub fn stall(&self, by: Duration) {
        *self.delay.lock().expect("lock") = Some(by);
    }

    async fn gate(&self, op: &'static str) -> CacheResult<()> {
        let delay = *self.delay.lock().expect("lock");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self.failing_ops.lock().expect("lock").contains(op);
        if failing || self.fail_all.load(Ordering::SeqCst) {
            return Err(CacheError::Backend(format!("{op} unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionCache for FlakyCache {
    async fn put_active_token(
        &self,
        token: &str,
        identity: &str,
        role: Role,
        ttl: Duration,
    ) -> CacheResult<()> {
        self.gate("put_active_token").await?;
        self.inner.put_active_token(token, identity, role, ttl).await
    }

    async fn active_token_owner(&self, token: &str) -> CacheResult<Option<(String, Role)>> {
        self.gate("active_token_owner").await?;
        self.inner.active_token_owner(token).await
    }

    async fn revoke_active_token(&self, token: &str) -> CacheResult<()> {
        self.gate("revoke_active_token").await?;
        self.inner.revoke_active_token(token).await
    }

    async fn add_token_to_identity(
        &self,
        identity: &str,
        token: &str,
        ttl: Duration,
    ) -> CacheResult<()> {
        self.gate("add_token_to_identity").await?;
        self.inner.add_token_to_identity(identity, token, ttl).await
    }

    async fn remove_token_from_identity(&self, identity: &str, token: &str) -> CacheResult<()> {
        self.gate("remove_token_from_identity").await?;
        self.inner.remove_token_from_identity(identity, token).await
    }

    async fn list_tokens_for_identity(&self, identity: &str) -> CacheResult<Vec<String>> {
        self.gate("list_tokens_for_identity").await?;
        self.inner.list_tokens_for_identity(identity).await
    }

    async fn put_refresh_token(
        &self,
        token: &str,
        identity: &str,
        ttl: Duration,
    ) -> CacheResult<()> {
        self.gate("put_refresh_token").await?;
        self.inner.put_refresh_token(token, identity, ttl).await
    }

    async fn identity_for_refresh_token(&self, token: &str) -> CacheResult<Option<String>> {
        self.gate("identity_for_refresh_token").await?;
        self.inner.identity_for_refresh_token(token).await
    }

    async fn revoke_refresh_token(&self, token: &str) -> CacheResult<()> {
        self.gate("revoke_refresh_token").await?;
        self.inner.revoke_refresh_token(token).await
    }

    async fn add_refresh_token_to_identity(
        &self,
        identity: &str,
        token: &str,
        ttl: Duration,
    ) -> CacheResult<()> {
        self.gate("add_refresh_token_to_identity").await?;
        self.inner
            .add_refresh_token_to_identity(identity, token, ttl)
            .await
    }

    async fn remove_refresh_token_from_identity(
        &self,
        identity: &str,
        token: &str,
    ) -> CacheResult<()> {
        self.gate("remove_refresh_token_from_identity").await?;
        self.inner
            .remove_refresh_token_from_identity(identity, token)
            .await
    }

    async fn list_refresh_tokens_for_identity(&self, identity: &str) -> CacheResult<Vec<String>> {
        self.gate("list_refresh_tokens_for_identity").await?;
        self.inner.list_refresh_tokens_for_identity(identity).await
    }

    async fn add_permission_to_role(&self, role: Role, permission: &str) -> CacheResult<()> {
        self.gate("add_permission_to_role").await?;
        self.inner.add_permission_to_role(role, permission).await
    }

    async fn role_has_permission(&self, role: Role, permission: &str) -> CacheResult<bool> {
        self.gate("role_has_permission").await?;
        self.inner.role_has_permission(role, permission).await
    }

    async fn put_profile_snapshot(
        &self,
        identity: &str,
        snapshot: &ProfileSnapshot,
        ttl: Duration,
    ) -> CacheResult<()> {
        self.gate("put_profile_snapshot").await?;
        self.inner.put_profile_snapshot(identity, snapshot, ttl).await
    }

    async fn get_profile_snapshot(&self, identity: &str) -> CacheResult<Option<ProfileSnapshot>> {
        self.gate("get_profile_snapshot").await?;
        self.inner.get_profile_snapshot(identity).await
    }

    async fn put_email(&self, identity: &str, email: &str, ttl: Duration) -> CacheResult<()> {
        self.gate("put_email").await?;
        self.inner.put_email(identity, email, ttl).await
    }

    async fn push_registered_email(&self, email: &str) -> CacheResult<()> {
        self.gate("push_registered_email").await?;
        self.inner.push_registered_email(email).await
    }

    async fn list_registered_emails(&self, start: isize, stop: isize) -> CacheResult<Vec<String>> {
        self.gate("list_registered_emails").await?;
        self.inner.list_registered_emails(start, stop).await
    }

    async fn increment_rate(&self, key: &str, window: Duration) -> CacheResult<i64> {
        self.gate("increment_rate").await?;
        self.inner.increment_rate(key, window).await
    }

    async fn delete_key(&self, key: &str) -> CacheResult<()> {
        self.gate("delete_key").await?;
        if self.failing_keys.lock().expect("lock").contains(key) {
            return Err(CacheError::Backend(format!("delete {key} failed")));
        }
        self.inner.delete_key(key).await
    }
}

/// Record store wrapper that fails or stalls on demand.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: InMemoryRecordStore,
    fail_all: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_all(&self, on: bool) {
        self.fail_all.store(on, Ordering::SeqCst);
    }

    pub fn stall(&self, by: Option<Duration>) {
        *self.delay.lock().expect("lock") = by;
    }

    async fn gate(&self) -> StoreResult<()> {
        let delay = *self.delay.lock().expect("lock");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn create(&self, user: NewUser) -> StoreResult<UserRecord> {
        self.gate().await?;
        self.inner.create(user).await
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<UserRecord> {
        self.gate().await?;
        self.inner.find_by_email(email).await
    }

    async fn find_by_identity(&self, identity: &str) -> StoreResult<UserRecord> {
        self.gate().await?;
        self.inner.find_by_identity(identity).await
    }

    async fn update(&self, identity: &str, name: &str, email: &str) -> StoreResult<UserRecord> {
        self.gate().await?;
        self.inner.update(identity, name, email).await
    }

    async fn update_password(&self, identity: &str, password_hash: &str) -> StoreResult<()> {
        self.gate().await?;
        self.inner.update_password(identity, password_hash).await
    }

    async fn delete(&self, identity: &str) -> StoreResult<()> {
        self.gate().await?;
        self.inner.delete(identity).await
    }
}
