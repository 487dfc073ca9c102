use super::{RecordStore, StoreResult};
use crate::clock::{Clock, SystemClock};
use crate::models::{NewUser, StoreError, UserRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct Records {
    by_id: HashMap<String, UserRecord>,
    /// email → identity
    by_email: HashMap<String, String>,
}

/// In-process record store.
///
/// Both indexes sit behind one mutex so a create or an email change is a single
/// critical section and two records never share an email. `Clone` shares the store.
#[derive(Clone)]
pub struct InMemoryRecordStore {
    records: Arc<Mutex<Records>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRecordStore").finish_non_exhaustive()
    }
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Arc::new(Mutex::new(Records::default())),
            clock,
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Records>> {
        self.records.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.lock()?.by_id.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.lock()?.by_id.is_empty())
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn create(&self, user: NewUser) -> StoreResult<UserRecord> {
        let now = self.clock.now();
        let mut records = self.lock()?;
        if records.by_email.contains_key(&user.email) {
            return Err(StoreError::DuplicateEmail);
        }

        let mut id = uuid::Uuid::new_v4().to_string();
        while records.by_id.contains_key(&id) {
            id = uuid::Uuid::new_v4().to_string();
        }

        let record = UserRecord {
            id: id.clone(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        records.by_email.insert(record.email.clone(), id.clone());
        records.by_id.insert(id, record.clone());
        Ok(record)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<UserRecord> {
        let records = self.lock()?;
        records
            .by_email
            .get(email)
            .and_then(|id| records.by_id.get(id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_identity(&self, identity: &str) -> StoreResult<UserRecord> {
        self.lock()?
            .by_id
            .get(identity)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, identity: &str, name: &str, email: &str) -> StoreResult<UserRecord> {
        let now = self.clock.now();
        let mut guard = self.lock()?;
        let records = &mut *guard;

        if records
            .by_email
            .get(email)
            .is_some_and(|owner| owner != identity)
        {
            return Err(StoreError::DuplicateEmail);
        }

        let record = records
            .by_id
            .get_mut(identity)
            .ok_or(StoreError::NotFound)?;
        if record.email != email {
            records.by_email.remove(&record.email);
            records
                .by_email
                .insert(email.to_string(), identity.to_string());
            record.email = email.to_string();
        }
        record.name = name.to_string();
        record.updated_at = now;
        Ok(record.clone())
    }

    async fn update_password(&self, identity: &str, password_hash: &str) -> StoreResult<()> {
        let now = self.clock.now();
        let mut records = self.lock()?;
        let record = records
            .by_id
            .get_mut(identity)
            .ok_or(StoreError::NotFound)?;
        record.password_hash = password_hash.to_string();
        record.updated_at = now;
        Ok(())
    }

    async fn delete(&self, identity: &str) -> StoreResult<()> {
        let mut records = self.lock()?;
        let record = records.by_id.remove(identity).ok_or(StoreError::NotFound)?;
        records.by_email.remove(&record.email);
        Ok(())
    }
}
