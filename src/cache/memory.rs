use super::{CacheResult, SessionCache, keys};
use crate::clock::{Clock, SystemClock, add_ttl};
use crate::models::{CacheError, ProfileSnapshot, Role};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Set(BTreeSet<String>),
    Hash(BTreeMap<String, String>),
    List(VecDeque<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expire_at: Option<DateTime<Utc>>,
}

impl Entry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expire_at.is_some_and(|at| at <= now)
    }
}

/// ## 日本語
///
/// プロセス内で動作するセッションキャッシュです。
///
/// Redis と同じキー空間と TTL の意味を再現します。`Arc<Mutex<...>>` で状態を共有するため、
/// `Clone` は同じストアへのハンドルを増やすだけです。期限切れのエントリは読み出し時に
/// 削除されるか、[`InMemorySessionCache::prune_expired`] でまとめて削除されます。
///
/// ## English
///
/// An in-process session cache.
///
/// Mirrors the Redis key space and TTL semantics. State lives behind an
/// `Arc<Mutex<...>>`, so `Clone` creates another handle to the same store. Expired
/// entries are dropped when read, or in bulk via [`InMemorySessionCache::prune_expired`].
///
/// Expiry follows the injected [`Clock`], which makes it usable as a test double.
#[derive(Clone)]
pub struct InMemorySessionCache {
    store: Arc<Mutex<HashMap<String, Entry>>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemorySessionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemorySessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySessionCache").finish_non_exhaustive()
    }
}

fn expired_removed<'a>(
    store: &'a mut HashMap<String, Entry>,
    key: &str,
    now: DateTime<Utc>,
) -> Option<&'a mut Entry> {
    if store.get(key).is_some_and(|entry| entry.is_expired(now)) {
        store.remove(key);
        return None;
    }
    store.get_mut(key)
}

/// Resolves a Redis-style inclusive range to `(skip, take)`.
fn list_window(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = isize::try_from(len).ok()?;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return None;
    }
    let skip = usize::try_from(start).ok()?;
    let take = usize::try_from(stop - start + 1).ok()?;
    Some((skip, take))
}

impl InMemorySessionCache {
    /// ## 日本語
    ///
    /// 空のキャッシュを作成します。
    ///
    /// ## English
    ///
    /// Creates an empty cache on the wall clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Arc::new(Mutex::new(HashMap::new())),
            clock,
        }
    }

    fn lock(&self) -> CacheResult<MutexGuard<'_, HashMap<String, Entry>>> {
        self.store.lock().map_err(|_| CacheError::Poisoned)
    }

    fn put_string(&self, key: String, value: String, ttl: Option<Duration>) -> CacheResult<()> {
        let now = self.clock.now();
        let entry = Entry {
            value: Value::Str(value),
            expire_at: ttl.map(|ttl| add_ttl(now, ttl)),
        };
        self.lock()?.insert(key, entry);
        Ok(())
    }

    fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        let now = self.clock.now();
        let mut store = self.lock()?;
        match expired_removed(&mut store, key, now) {
            None => Ok(None),
            Some(Entry {
                value: Value::Str(value),
                ..
            }) => Ok(Some(value.clone())),
            Some(_) => Err(CacheError::WrongType(key.to_string())),
        }
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn set_add(&self, key: String, member: &str) -> CacheResult<()> {
        let now = self.clock.now();
        let mut store = self.lock()?;
        match expired_removed(&mut store, &key, now) {
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => {
                members.insert(member.to_string());
            }
            Some(_) => return Err(CacheError::WrongType(key)),
            None => {
                let members = BTreeSet::from([member.to_string()]);
                store.insert(
                    key,
                    Entry {
                        value: Value::Set(members),
                        expire_at: None,
                    },
                );
            }
        }
        Ok(())
    }

    /// Adds `member` to a per-identity index set, dropping members whose backing
    /// key (built by `backing`) is missing or expired, and extends the set's
    /// expiry to at least `now + ttl`.
    fn index_add(
        &self,
        key: String,
        member: &str,
        ttl: Duration,
        backing: fn(&str) -> String,
    ) -> CacheResult<()> {
        let now = self.clock.now();
        let expire_at = add_ttl(now, ttl);
        let mut store = self.lock()?;
        let mut members = match expired_removed(&mut store, &key, now) {
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => std::mem::take(members),
            Some(_) => return Err(CacheError::WrongType(key)),
            None => BTreeSet::new(),
        };
        members.retain(|m| {
            store
                .get(&backing(m))
                .is_some_and(|entry| !entry.is_expired(now))
        });
        members.insert(member.to_string());

        let previous = store.get(&key).and_then(|entry| entry.expire_at);
        let expire_at = previous.map_or(expire_at, |at| at.max(expire_at));
        store.insert(
            key,
            Entry {
                value: Value::Set(members),
                expire_at: Some(expire_at),
            },
        );
        Ok(())
    }

    fn set_remove(&self, key: &str, member: &str) -> CacheResult<()> {
        let now = self.clock.now();
        let mut store = self.lock()?;
        let emptied = match expired_removed(&mut store, key, now) {
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => {
                members.remove(member);
                members.is_empty()
            }
            Some(_) => return Err(CacheError::WrongType(key.to_string())),
            None => false,
        };
        // Redis drops a set once its last member is gone.
        if emptied {
            store.remove(key);
        }
        Ok(())
    }

    fn set_members(&self, key: &str) -> CacheResult<Vec<String>> {
        let now = self.clock.now();
        let mut store = self.lock()?;
        match expired_removed(&mut store, key, now) {
            Some(Entry {
                value: Value::Set(members),
                ..
            }) => Ok(members.iter().cloned().collect()),
            Some(_) => Err(CacheError::WrongType(key.to_string())),
            None => Ok(Vec::new()),
        }
    }

    /// ## 日本語
    ///
    /// キーの残り TTL（秒）を返します。
    ///
    /// - キーが存在しない：`Ok(None)`
    /// - キーは存在するが期限がない：`Ok(Some(-1))`
    ///
    /// ## English
    ///
    /// Returns the remaining TTL in seconds for a raw key.
    ///
    /// Follows Redis TTL semantics:
    /// - `Ok(None)` when the key does not exist
    /// - `Ok(Some(-1))` when the key exists but has no expiration
    /// - `Ok(Some(n))` (n >= 0) for the remaining TTL, rounded up
    pub fn ttl_seconds(&self, key: &str) -> CacheResult<Option<i64>> {
        let now = self.clock.now();
        let mut store = self.lock()?;
        let Some(entry) = expired_removed(&mut store, key, now) else {
            return Ok(None);
        };
        let Some(expire_at) = entry.expire_at else {
            return Ok(Some(-1));
        };
        let remaining_ms = (expire_at - now).num_milliseconds().max(0);
        Ok(Some((remaining_ms + 999) / 1000))
    }

    /// Whether a raw key is currently present.
    pub fn contains_key(&self, key: &str) -> CacheResult<bool> {
        let now = self.clock.now();
        let mut store = self.lock()?;
        Ok(expired_removed(&mut store, key, now).is_some())
    }

    /// ## 日本語
    ///
    /// 期限切れのエントリを削除し、削除した件数を返します。
    ///
    /// ## English
    ///
    /// Removes expired entries and returns how many were removed.
    pub fn prune_expired(&self) -> CacheResult<usize> {
        let now = self.clock.now();
        let mut store = self.lock()?;
        let original_len = store.len();
        store.retain(|_key, entry| !entry.is_expired(now));
        Ok(original_len - store.len())
    }

    /// Number of keys held, expired ones included until pruned.
    pub fn len(&self) -> CacheResult<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.lock()?.is_empty())
    }
}

#[async_trait]
impl SessionCache for InMemorySessionCache {
    async fn put_active_token(
        &self,
        token: &str,
        identity: &str,
        role: Role,
        ttl: Duration,
    ) -> CacheResult<()> {
        self.put_string(
            keys::active_token(token),
            keys::encode_active_token(identity, role),
            Some(ttl),
        )
    }

    async fn active_token_owner(&self, token: &str) -> CacheResult<Option<(String, Role)>> {
        let key = keys::active_token(token);
        match self.get_string(&key)? {
            None => Ok(None),
            Some(value) => keys::decode_active_token(&value)
                .map(Some)
                .ok_or(CacheError::WrongType(key)),
        }
    }

    async fn revoke_active_token(&self, token: &str) -> CacheResult<()> {
        self.remove(&keys::active_token(token))
    }

    async fn add_token_to_identity(
        &self,
        identity: &str,
        token: &str,
        ttl: Duration,
    ) -> CacheResult<()> {
        self.index_add(
            keys::identity_tokens(identity),
            token,
            ttl,
            keys::active_token,
        )
    }

    async fn remove_token_from_identity(&self, identity: &str, token: &str) -> CacheResult<()> {
        self.set_remove(&keys::identity_tokens(identity), token)
    }

    async fn list_tokens_for_identity(&self, identity: &str) -> CacheResult<Vec<String>> {
        self.set_members(&keys::identity_tokens(identity))
    }

    async fn put_refresh_token(
        &self,
        token: &str,
        identity: &str,
        ttl: Duration,
    ) -> CacheResult<()> {
        self.put_string(keys::refresh_token(token), identity.to_string(), Some(ttl))
    }

    async fn identity_for_refresh_token(&self, token: &str) -> CacheResult<Option<String>> {
        self.get_string(&keys::refresh_token(token))
    }

    async fn revoke_refresh_token(&self, token: &str) -> CacheResult<()> {
        self.remove(&keys::refresh_token(token))
    }

    async fn take_refresh_token(&self, token: &str) -> CacheResult<Option<String>> {
        let key = keys::refresh_token(token);
        let now = self.clock.now();
        let mut store = self.lock()?;
        match store.remove(&key) {
            None => Ok(None),
            Some(entry) if entry.is_expired(now) => Ok(None),
            Some(Entry {
                value: Value::Str(identity),
                ..
            }) => Ok(Some(identity)),
            Some(_) => Err(CacheError::WrongType(key)),
        }
    }

    async fn add_refresh_token_to_identity(
        &self,
        identity: &str,
        token: &str,
        ttl: Duration,
    ) -> CacheResult<()> {
        self.index_add(
            keys::identity_refresh_tokens(identity),
            token,
            ttl,
            keys::refresh_token,
        )
    }

    async fn remove_refresh_token_from_identity(
        &self,
        identity: &str,
        token: &str,
    ) -> CacheResult<()> {
        self.set_remove(&keys::identity_refresh_tokens(identity), token)
    }

    async fn list_refresh_tokens_for_identity(&self, identity: &str) -> CacheResult<Vec<String>> {
        self.set_members(&keys::identity_refresh_tokens(identity))
    }

    async fn add_permission_to_role(&self, role: Role, permission: &str) -> CacheResult<()> {
        self.set_add(keys::role_permissions(role), permission)
    }

    async fn role_has_permission(&self, role: Role, permission: &str) -> CacheResult<bool> {
        Ok(self
            .set_members(&keys::role_permissions(role))?
            .iter()
            .any(|p| p == permission))
    }

    async fn put_profile_snapshot(
        &self,
        identity: &str,
        snapshot: &ProfileSnapshot,
        ttl: Duration,
    ) -> CacheResult<()> {
        let now = self.clock.now();
        let fields = BTreeMap::from([
            ("name".to_string(), snapshot.name.clone()),
            ("email".to_string(), snapshot.email.clone()),
            ("role".to_string(), snapshot.role.to_string()),
        ]);
        self.lock()?.insert(
            keys::profile(identity),
            Entry {
                value: Value::Hash(fields),
                expire_at: Some(add_ttl(now, ttl)),
            },
        );
        Ok(())
    }

    async fn get_profile_snapshot(&self, identity: &str) -> CacheResult<Option<ProfileSnapshot>> {
        let key = keys::profile(identity);
        let now = self.clock.now();
        let mut store = self.lock()?;
        let fields = match expired_removed(&mut store, &key, now) {
            None => return Ok(None),
            Some(Entry {
                value: Value::Hash(fields),
                ..
            }) => fields.clone(),
            Some(_) => return Err(CacheError::WrongType(key)),
        };

        let (Some(name), Some(email), Some(role)) =
            (fields.get("name"), fields.get("email"), fields.get("role"))
        else {
            return Ok(None);
        };
        let Ok(role) = role.parse() else {
            return Ok(None);
        };
        Ok(Some(ProfileSnapshot {
            name: name.clone(),
            email: email.clone(),
            role,
        }))
    }

    async fn put_email(&self, identity: &str, email: &str, ttl: Duration) -> CacheResult<()> {
        self.put_string(keys::email(identity), email.to_string(), Some(ttl))
    }

    async fn push_registered_email(&self, email: &str) -> CacheResult<()> {
        let now = self.clock.now();
        let key = keys::REGISTERED_EMAILS;
        let mut store = self.lock()?;
        match expired_removed(&mut store, key, now) {
            Some(Entry {
                value: Value::List(list),
                ..
            }) => list.push_front(email.to_string()),
            Some(_) => return Err(CacheError::WrongType(key.to_string())),
            None => {
                store.insert(
                    key.to_string(),
                    Entry {
                        value: Value::List(VecDeque::from([email.to_string()])),
                        expire_at: None,
                    },
                );
            }
        }
        Ok(())
    }

    async fn list_registered_emails(&self, start: isize, stop: isize) -> CacheResult<Vec<String>> {
        let now = self.clock.now();
        let key = keys::REGISTERED_EMAILS;
        let mut store = self.lock()?;
        let list = match expired_removed(&mut store, key, now) {
            None => return Ok(Vec::new()),
            Some(Entry {
                value: Value::List(list),
                ..
            }) => list,
            Some(_) => return Err(CacheError::WrongType(key.to_string())),
        };
        let Some((skip, take)) = list_window(list.len(), start, stop) else {
            return Ok(Vec::new());
        };
        Ok(list.iter().skip(skip).take(take).cloned().collect())
    }

    async fn increment_rate(&self, key: &str, window: Duration) -> CacheResult<i64> {
        let now = self.clock.now();
        let key = keys::rate(key);
        let mut store = self.lock()?;
        match expired_removed(&mut store, &key, now) {
            Some(Entry {
                value: Value::Str(count),
                ..
            }) => {
                let next = count
                    .parse::<i64>()
                    .map_err(|_| CacheError::WrongType(key.clone()))?
                    .saturating_add(1);
                *count = next.to_string();
                Ok(next)
            }
            Some(_) => Err(CacheError::WrongType(key)),
            None => {
                store.insert(
                    key,
                    Entry {
                        value: Value::Str("1".to_string()),
                        expire_at: Some(add_ttl(now, window)),
                    },
                );
                Ok(1)
            }
        }
    }

    async fn delete_key(&self, key: &str) -> CacheResult<()> {
        self.remove(key)
    }
}
