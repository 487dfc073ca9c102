//! The authoritative record store contract.
//!
//! The store owns durable user records and enforces email uniqueness. Anything it
//! reports is final: the session manager aborts on every store failure.

mod memory;

pub use memory::InMemoryRecordStore;

use crate::models::{NewUser, StoreError, UserRecord};
use async_trait::async_trait;

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable user records, looked up by identity or email.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Assigns a fresh identity and both timestamps.
    ///
    /// Fails with [`StoreError::DuplicateEmail`] if the email is taken.
    async fn create(&self, user: NewUser) -> StoreResult<UserRecord>;

    async fn find_by_email(&self, email: &str) -> StoreResult<UserRecord>;

    async fn find_by_identity(&self, identity: &str) -> StoreResult<UserRecord>;

    /// Sets name and email and advances `updated_at`.
    ///
    /// Fails with [`StoreError::DuplicateEmail`] if another record holds `email`.
    async fn update(&self, identity: &str, name: &str, email: &str) -> StoreResult<UserRecord>;

    async fn update_password(&self, identity: &str, password_hash: &str) -> StoreResult<()>;

    async fn delete(&self, identity: &str) -> StoreResult<()>;
}
