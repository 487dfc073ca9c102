use crate::cache::{CacheResult, SessionCache, keys};
use crate::models::{CacheError, ProfileSnapshot, Role};
use async_trait::async_trait;
use redis::{AsyncCommands, Script};
use std::collections::HashMap;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;
use tokio::sync::Mutex;

const POOL_SIZE: usize = 4;

// 日本語: GET と DEL を 1 回のスクリプトで実行し、リフレッシュトークンを一度だけ消費できるようにする。
// English: GET + DEL in one script so a refresh token can be redeemed once.
const TAKE_SCRIPT: &str = r#"
local value = redis.call('GET', KEYS[1])
if value then
  redis.call('DEL', KEYS[1])
end
return value
"#;

// 日本語: 失効したメンバーを取り除いてから SADD し、集合の TTL を必要なら延長する。
// English: Drops members whose backing key is gone, SADDs, and raises the set TTL if needed.
// KEYS[1] = index set, ARGV[1] = member, ARGV[2] = ttl seconds, ARGV[3] = backing key prefix.
const INDEX_ADD_SCRIPT: &str = r#"
local members = redis.call('SMEMBERS', KEYS[1])
for _, member in ipairs(members) do
  if redis.call('EXISTS', ARGV[3] .. member) == 0 then
    redis.call('SREM', KEYS[1], member)
  end
end
redis.call('SADD', KEYS[1], ARGV[1])
local ttl = tonumber(ARGV[2])
if redis.call('TTL', KEYS[1]) < ttl then
  redis.call('EXPIRE', KEYS[1], ttl)
end
return 1
"#;

// 日本語: INCR と初回の EXPIRE を不可分に行う。
// English: INCR and the first-hit EXPIRE as one step.
const INCR_WINDOW_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
  redis.call('EXPIRE', KEYS[1], tonumber(ARGV[1]))
end
return count
"#;

/// Redis の `EX` は 0 秒を受け付けないため、最低 1 秒に切り上げる。
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

/// ## 日本語
///
/// Redis/Valkey をバックエンドにした [`SessionCache`] です。
///
/// `Clone` は同じ接続プールへのハンドルを増やすだけです。すべてのキーには
/// `prefix` が付与されます（空でなければ末尾に `:` を補います）。
///
/// ## English
///
/// A [`SessionCache`] backed by Redis/Valkey.
///
/// `Clone` creates another handle to the same connection pool. Every key is
/// prepended with `prefix`; a non-empty prefix is normalized to end with `:`.
#[derive(Clone)]
pub struct RedisSessionCache {
    prefix: String,

    // 日本語: 小さな接続プール。Arc で共有し、tokio::Mutex で各接続へのアクセスを直列化する。
    // English: Small connection pool. Arc shares it; tokio::Mutex serializes access per connection.
    connections: Arc<Vec<Mutex<redis::aio::ConnectionManager>>>,
    next_index: Arc<AtomicUsize>,
}

impl std::fmt::Debug for RedisSessionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisSessionCache")
            .field("prefix", &self.prefix)
            .field("connections", &self.connections.len())
            .finish()
    }
}

fn normalize_prefix(prefix: impl Into<String>) -> String {
    let mut prefix = prefix.into();
    if !prefix.is_empty() && !prefix.ends_with(':') {
        prefix.push(':');
    }
    prefix
}

impl RedisSessionCache {
    /// ## 日本語
    ///
    /// Redis に接続し、接続プールを作成します。
    ///
    /// ## English
    ///
    /// Connects to Redis and opens a small pool used round-robin.
    pub async fn connect(redis_url: &str, prefix: impl Into<String>) -> CacheResult<Self> {
        let client = redis::Client::open(redis_url)?;

        // 日本語: ConnectionManager は切断時に再接続を試みる。
        // English: ConnectionManager reconnects on disconnect.
        let mut connections = Vec::with_capacity(POOL_SIZE);
        for _ in 0..POOL_SIZE {
            connections.push(Mutex::new(client.get_connection_manager().await?));
        }
        Ok(Self {
            prefix: normalize_prefix(prefix),
            connections: Arc::new(connections),
            next_index: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Wraps an existing connection manager.
    pub fn new(prefix: impl Into<String>, connection: redis::aio::ConnectionManager) -> Self {
        Self {
            prefix: normalize_prefix(prefix),
            connections: Arc::new(vec![Mutex::new(connection)]),
            next_index: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Full Redis key for an unprefixed cache key.
    pub fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Remaining TTL in seconds, with `TTL` semantics (`-1` no expiry, `None` missing).
    pub async fn ttl_seconds(&self, key: &str) -> CacheResult<Option<i64>> {
        let mut connection = self.lock_connection().await?;
        let ttl: i64 = connection.ttl(self.key(key)).await?;
        Ok(if ttl == -2 { None } else { Some(ttl) })
    }

    /// Locks and returns the next connection from the pool.
    async fn lock_connection(
        &self,
    ) -> CacheResult<tokio::sync::MutexGuard<'_, redis::aio::ConnectionManager>> {
        let len = self.connections.len();
        if len == 0 {
            return Err(CacheError::Backend("no redis connections".into()));
        }
        let index = self.next_index.fetch_add(1, Ordering::Relaxed) % len;
        match self.connections.get(index) {
            Some(conn) => Ok(conn.lock().await),
            None => Err(CacheError::Backend("no redis connections".into())),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut connection = self.lock_connection().await?;
        let _: () = connection
            .set_ex(self.key(key), value, ttl_secs(ttl))
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut connection = self.lock_connection().await?;
        Ok(connection.get(self.key(key)).await?)
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        let mut connection = self.lock_connection().await?;
        let _: i64 = connection.del(self.key(key)).await?;
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &str) -> CacheResult<()> {
        let mut connection = self.lock_connection().await?;
        let _: i64 = connection.sadd(self.key(key), member).await?;
        Ok(())
    }

    async fn index_add(
        &self,
        key: &str,
        member: &str,
        ttl: Duration,
        backing: fn(&str) -> String,
    ) -> CacheResult<()> {
        let mut connection = self.lock_connection().await?;
        let _: i64 = Script::new(INDEX_ADD_SCRIPT)
            .key(self.key(key))
            .arg(member)
            .arg(ttl_secs(ttl))
            .arg(self.key(&backing("")))
            .invoke_async(&mut *connection)
            .await?;
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> CacheResult<()> {
        let mut connection = self.lock_connection().await?;
        let _: i64 = connection.srem(self.key(key), member).await?;
        Ok(())
    }

    async fn smembers(&self, key: &str) -> CacheResult<Vec<String>> {
        let mut connection = self.lock_connection().await?;
        Ok(connection.smembers(self.key(key)).await?)
    }
}

#[async_trait]
impl SessionCache for RedisSessionCache {
    async fn put_active_token(
        &self,
        token: &str,
        identity: &str,
        role: Role,
        ttl: Duration,
    ) -> CacheResult<()> {
        self.set_ex(
            &keys::active_token(token),
            &keys::encode_active_token(identity, role),
            ttl,
        )
        .await
    }

    async fn active_token_owner(&self, token: &str) -> CacheResult<Option<(String, Role)>> {
        let key = keys::active_token(token);
        match self.get(&key).await? {
            None => Ok(None),
            Some(value) => keys::decode_active_token(&value)
                .map(Some)
                .ok_or(CacheError::WrongType(key)),
        }
    }

    async fn revoke_active_token(&self, token: &str) -> CacheResult<()> {
        self.del(&keys::active_token(token)).await
    }

    async fn add_token_to_identity(
        &self,
        identity: &str,
        token: &str,
        ttl: Duration,
    ) -> CacheResult<()> {
        self.index_add(
            &keys::identity_tokens(identity),
            token,
            ttl,
            keys::active_token,
        )
        .await
    }

    async fn remove_token_from_identity(&self, identity: &str, token: &str) -> CacheResult<()> {
        self.srem(&keys::identity_tokens(identity), token).await
    }

    async fn list_tokens_for_identity(&self, identity: &str) -> CacheResult<Vec<String>> {
        self.smembers(&keys::identity_tokens(identity)).await
    }

    async fn put_refresh_token(
        &self,
        token: &str,
        identity: &str,
        ttl: Duration,
    ) -> CacheResult<()> {
        self.set_ex(&keys::refresh_token(token), identity, ttl).await
    }

    async fn identity_for_refresh_token(&self, token: &str) -> CacheResult<Option<String>> {
        self.get(&keys::refresh_token(token)).await
    }

    async fn revoke_refresh_token(&self, token: &str) -> CacheResult<()> {
        self.del(&keys::refresh_token(token)).await
    }

    async fn take_refresh_token(&self, token: &str) -> CacheResult<Option<String>> {
        let mut connection = self.lock_connection().await?;
        let identity: Option<String> = Script::new(TAKE_SCRIPT)
            .key(self.key(&keys::refresh_token(token)))
            .invoke_async(&mut *connection)
            .await?;
        Ok(identity)
    }

    async fn add_refresh_token_to_identity(
        &self,
        identity: &str,
        token: &str,
        ttl: Duration,
    ) -> CacheResult<()> {
        self.index_add(
            &keys::identity_refresh_tokens(identity),
            token,
            ttl,
            keys::refresh_token,
        )
        .await
    }

    async fn remove_refresh_token_from_identity(
        &self,
        identity: &str,
        token: &str,
    ) -> CacheResult<()> {
        self.srem(&keys::identity_refresh_tokens(identity), token)
            .await
    }

    async fn list_refresh_tokens_for_identity(&self, identity: &str) -> CacheResult<Vec<String>> {
        self.smembers(&keys::identity_refresh_tokens(identity))
            .await
    }

    async fn add_permission_to_role(&self, role: Role, permission: &str) -> CacheResult<()> {
        self.sadd(&keys::role_permissions(role), permission).await
    }

    async fn role_has_permission(&self, role: Role, permission: &str) -> CacheResult<bool> {
        let mut connection = self.lock_connection().await?;
        Ok(connection
            .sismember(self.key(&keys::role_permissions(role)), permission)
            .await?)
    }

    async fn put_profile_snapshot(
        &self,
        identity: &str,
        snapshot: &ProfileSnapshot,
        ttl: Duration,
    ) -> CacheResult<()> {
        let key = self.key(&keys::profile(identity));
        let fields = [
            ("name", snapshot.name.as_str()),
            ("email", snapshot.email.as_str()),
            ("role", snapshot.role.as_str()),
        ];
        let seconds = i64::try_from(ttl_secs(ttl)).unwrap_or(i64::MAX);

        // 日本語: 古いフィールドが残らないよう DEL してから書き込み、TTL まで 1 トランザクションで行う。
        // English: DEL, HSET and EXPIRE in one transaction so no stale field survives.
        let mut connection = self.lock_connection().await?;
        let _: () = redis::pipe()
            .atomic()
            .del(&key)
            .ignore()
            .hset_multiple(&key, &fields)
            .ignore()
            .expire(&key, seconds)
            .ignore()
            .query_async(&mut *connection)
            .await?;
        Ok(())
    }

    async fn get_profile_snapshot(&self, identity: &str) -> CacheResult<Option<ProfileSnapshot>> {
        let mut connection = self.lock_connection().await?;
        let fields: HashMap<String, String> =
            connection.hgetall(self.key(&keys::profile(identity))).await?;

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
        self.set_ex(&keys::email(identity), email, ttl).await
    }

    async fn push_registered_email(&self, email: &str) -> CacheResult<()> {
        let mut connection = self.lock_connection().await?;
        let _: i64 = connection
            .lpush(self.key(keys::REGISTERED_EMAILS), email)
            .await?;
        Ok(())
    }

    async fn list_registered_emails(&self, start: isize, stop: isize) -> CacheResult<Vec<String>> {
        let mut connection = self.lock_connection().await?;
        Ok(connection
            .lrange(self.key(keys::REGISTERED_EMAILS), start, stop)
            .await?)
    }

    async fn increment_rate(&self, key: &str, window: Duration) -> CacheResult<i64> {
        let key = self.key(&keys::rate(key));
        let mut connection = self.lock_connection().await?;
        let count: i64 = Script::new(INCR_WINDOW_SCRIPT)
            .key(key)
            .arg(ttl_secs(window))
            .invoke_async(&mut *connection)
            .await?;
        Ok(count)
    }

    async fn delete_key(&self, key: &str) -> CacheResult<()> {
        self.del(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_prefixes_end_with_a_colon() {
        assert_eq!(normalize_prefix("app"), "app:");
        assert_eq!(normalize_prefix("app:"), "app:");
        assert_eq!(normalize_prefix(""), "");
    }

    #[test]
    fn zero_ttl_rounds_up_to_one_second() {
        assert_eq!(ttl_secs(Duration::ZERO), 1);
        assert_eq!(ttl_secs(Duration::from_millis(2500)), 2);
    }
}
