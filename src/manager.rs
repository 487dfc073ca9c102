//! ## 日本語
//!
//! アカウント操作とセッションを統括するマネージャです。
//!
//! レコードストア（正本）とセッションキャッシュ（助言的）を組み合わせ、登録・ログイン・
//! プロフィールの取得と更新・パスワード変更・アカウント削除を実装します。
//! ストアの失敗は操作を中断し、キャッシュの失敗は警告ログに落とされます。
//!
//! ## English
//!
//! The session manager.
//!
//! Composes the record store (authoritative) and the session cache (advisory) into
//! registration, login, profile read/update, password change and account deletion.
//! Store failures abort the operation; cache failures are downgraded to logged
//! warnings through [`BestEffort`].
//!
//! The manager holds no locks and imposes no ordering between requests. Two
//! concurrent writes for the same identity may interleave in the cache; the last
//! write wins until the entry's TTL runs out.

use crate::best_effort::BestEffort;
use crate::cache::SessionCache;
use crate::clock::{Clock, SystemClock};
use crate::config::AccountConfig;
use crate::context::RequestContext;
use crate::models::{
    CacheError, ConfigError, LoginSession, NewUser, ProfileSnapshot, RAccountError, Role,
    StoreError, UserRecord, UserView,
};
use crate::password::CredentialVerifier;
use crate::store::{RecordStore, StoreResult};
use crate::token::RTokenCodec;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

const MAX_NAME_CHARS: usize = 100;
const MAX_EMAIL_CHARS: usize = 254;
const MIN_PASSWORD_CHARS: usize = 8;
const MAX_PASSWORD_CHARS: usize = 128;

/// ## 日本語
///
/// 認証済みのリクエストコンテキストです。
///
/// [`RSessionManager::authenticate`] が成功したときに返され、axum / actix-web の
/// extractor としても使えます（feature 有効時）。
///
/// ## English
///
/// An authenticated request context.
///
/// Returned by [`RSessionManager::authenticate`]; with the `axum` or `actix`
/// feature it is also a request extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RAuthUser {
    /// The validated user identity.
    pub id: String,
    /// Role carried by the token.
    pub role: Role,
    /// The raw token string from the request.
    pub token: String,
}

impl RAuthUser {
    /// Returns whether the user has the given role.
    pub fn has_role(&self, role: Role) -> bool {
        self.role == role
    }
}

/// ## 日本語
///
/// アカウントとセッションを管理します。
///
/// ストアとキャッシュは構築時に注入されます（グローバル状態は使いません）。
/// `Clone` は同じ依存先へのハンドルを増やすだけです。
///
/// ## English
///
/// Manages accounts and their sessions.
///
/// The store and cache clients are injected at construction; nothing is reached
/// through global state. `Clone` creates another handle to the same collaborators.
#[derive(Clone)]
pub struct RSessionManager {
    store: Arc<dyn RecordStore>,
    cache: Arc<dyn SessionCache>,
    codec: RTokenCodec,
    verifier: Arc<CredentialVerifier>,
    config: Arc<AccountConfig>,
}

impl std::fmt::Debug for RSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RSessionManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn persistence(err: StoreError) -> RAccountError {
    RAccountError::Persistence(err)
}

fn validate_name(name: &str) -> Result<&str, RAccountError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RAccountError::Validation("name must not be empty".into()));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(RAccountError::Validation("name is too long".into()));
    }
    Ok(name)
}

fn validate_email(email: &str) -> Result<&str, RAccountError> {
    let email = email.trim();
    let well_formed = email.chars().count() <= MAX_EMAIL_CHARS
        && !email.chars().any(char::is_whitespace)
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| {
                !local.is_empty() && !domain.is_empty() && !domain.contains('@')
            });
    if !well_formed {
        return Err(RAccountError::Validation("email is malformed".into()));
    }
    Ok(email)
}

fn validate_password(password: &str) -> Result<(), RAccountError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_CHARS {
        return Err(RAccountError::Validation(format!(
            "password must be at least {MIN_PASSWORD_CHARS} characters"
        )));
    }
    if len > MAX_PASSWORD_CHARS {
        return Err(RAccountError::Validation("password is too long".into()));
    }
    Ok(())
}

impl RSessionManager {
    /// ## 日本語
    ///
    /// 設定と依存先からマネージャを作成します。署名鍵が空の場合はエラーです。
    ///
    /// ## English
    ///
    /// Creates a manager on the wall clock. Fails if the signing secret is empty.
    pub fn new(
        config: AccountConfig,
        store: Arc<dyn RecordStore>,
        cache: Arc<dyn SessionCache>,
    ) -> Result<Self, ConfigError> {
        Self::with_clock(config, store, cache, Arc::new(SystemClock))
    }

    /// Creates a manager whose token codec reads time from `clock`.
    pub fn with_clock(
        config: AccountConfig,
        store: Arc<dyn RecordStore>,
        cache: Arc<dyn SessionCache>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let codec = RTokenCodec::with_clock(config.jwt_secret.as_bytes(), clock)?;
        Ok(Self {
            store,
            cache,
            codec,
            verifier: Arc::new(CredentialVerifier::new()),
            config: Arc::new(config),
        })
    }

    /// Replaces the credential verifier (e.g. with cheaper Argon2 parameters).
    pub fn with_verifier(mut self, verifier: CredentialVerifier) -> Self {
        self.verifier = Arc::new(verifier);
        self
    }

    /// The codec signing this manager's access tokens.
    pub fn codec(&self) -> &RTokenCodec {
        &self.codec
    }

    /// ## 日本語
    ///
    /// 起動時に読み込んだ設定を返します。
    ///
    /// ## English
    ///
    /// The settings this manager was built with.
    pub fn config(&self) -> &AccountConfig {
        &self.config
    }

    async fn store_call<T, F>(&self, ctx: &RequestContext, fut: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        ctx.bound(fut)
            .await
            .unwrap_or_else(|_| Err(StoreError::Timeout))
    }

    async fn hash_password(&self, password: &str) -> Result<String, RAccountError> {
        let verifier = Arc::clone(&self.verifier);
        let password = password.to_string();
        tokio::task::spawn_blocking(move || verifier.hash(&password))
            .await
            .map_err(|e| RAccountError::HashFailure(e.to_string()))?
            .map_err(|e| RAccountError::HashFailure(e.0))
    }

    async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, RAccountError> {
        let verifier = Arc::clone(&self.verifier);
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || verifier.verify(&password, &hash))
            .await
            .map_err(|e| RAccountError::HashFailure(e.to_string()))
    }

    /// Issues an access/refresh pair for `record` and indexes both.
    async fn open_session(
        &self,
        effort: &mut BestEffort<'_>,
        record: &UserRecord,
    ) -> Result<LoginSession, RAccountError> {
        let access_ttl = self.config.access_token_ttl;
        let access_token = self
            .codec
            .issue(&record.id, record.role, access_ttl)
            .map_err(RAccountError::TokenSigning)?;

        effort
            .apply(
                "put_active_token",
                self.cache
                    .put_active_token(&access_token, &record.id, record.role, access_ttl),
            )
            .await;
        effort
            .apply(
                "add_token_to_identity",
                self.cache
                    .add_token_to_identity(&record.id, &access_token, access_ttl),
            )
            .await;

        let refresh_token = uuid::Uuid::new_v4().to_string();
        effort
            .apply(
                "put_refresh_token",
                self.cache.put_refresh_token(
                    &refresh_token,
                    &record.id,
                    self.config.refresh_token_ttl,
                ),
            )
            .await;
        effort
            .apply(
                "add_refresh_token_to_identity",
                self.cache.add_refresh_token_to_identity(
                    &record.id,
                    &refresh_token,
                    self.config.refresh_token_ttl,
                ),
            )
            .await;

        Ok(LoginSession {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: access_ttl.as_secs(),
        })
    }

    /// ## 日本語
    ///
    /// 新しいユーザーを登録します。
    ///
    /// メールアドレスが既に使われている場合は [`RAccountError::EmailAlreadyExists`]。
    /// キャッシュの温め（メール一覧・プロフィール）は失敗してもログのみです。
    ///
    /// ## English
    ///
    /// Registers a new user with role `user`.
    ///
    /// Fails with [`RAccountError::EmailAlreadyExists`] if the email is taken and with
    /// [`RAccountError::Persistence`] if the store fails. Warming the cache (email
    /// list, email key, profile snapshot) is best-effort.
    pub async fn register(
        &self,
        ctx: &RequestContext,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<UserView, RAccountError> {
        let name = validate_name(name)?;
        let email = validate_email(email)?;
        validate_password(password)?;

        match self.store_call(ctx, self.store.find_by_email(email)).await {
            Ok(_) => return Err(RAccountError::EmailAlreadyExists),
            Err(StoreError::NotFound) => {}
            Err(err) => return Err(persistence(err)),
        }

        let password_hash = self.hash_password(password).await?;
        let new_user = NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash,
            role: Role::User,
        };
        let record = self
            .store_call(ctx, self.store.create(new_user))
            .await
            .map_err(|err| match err {
                StoreError::DuplicateEmail => RAccountError::EmailAlreadyExists,
                other => persistence(other),
            })?;
        info!(identity = %record.id, "user registered");

        let ttl = self.config.registration_cache_ttl;
        let mut effort = BestEffort::new(ctx, "register");
        effort
            .apply(
                "push_registered_email",
                self.cache.push_registered_email(&record.email),
            )
            .await;
        effort
            .apply(
                "put_email",
                self.cache.put_email(&record.id, &record.email, ttl),
            )
            .await;
        effort
            .apply(
                "put_profile_snapshot",
                self.cache
                    .put_profile_snapshot(&record.id, &record.snapshot(), ttl),
            )
            .await;

        Ok(record.view())
    }

    /// ## 日本語
    ///
    /// メールアドレスとパスワードで認証し、トークンを発行します。
    ///
    /// 存在しないメールアドレスと誤ったパスワードは同じ
    /// [`RAccountError::InvalidCredentials`] になります（アカウント列挙の防止）。
    ///
    /// ## English
    ///
    /// Verifies credentials and opens a session.
    ///
    /// An unknown email and a wrong password both fail with
    /// [`RAccountError::InvalidCredentials`], so callers cannot enumerate accounts.
    /// The access token lives for `access_token_ttl` and is registered in the
    /// active-token index and the identity's token set; a refresh token is minted
    /// alongside it.
    pub async fn login(
        &self,
        ctx: &RequestContext,
        email: &str,
        password: &str,
    ) -> Result<LoginSession, RAccountError> {
        let email = email.trim();
        let mut effort = BestEffort::new(ctx, "login");

        if let Some(attempts) = effort
            .apply(
                "increment_rate",
                self.cache
                    .increment_rate(&format!("login:{email}"), self.config.rate_window),
            )
            .await
        {
            debug!(attempts, "login attempt counted");
        }

        let record = match self.store_call(ctx, self.store.find_by_email(email)).await {
            Ok(record) => record,
            Err(StoreError::NotFound) => {
                debug!("login rejected: unknown email");
                return Err(RAccountError::InvalidCredentials);
            }
            Err(err) => return Err(persistence(err)),
        };

        if !self.verify_password(password, &record.password_hash).await? {
            debug!(identity = %record.id, "login rejected: password mismatch");
            return Err(RAccountError::InvalidCredentials);
        }

        let session = self.open_session(&mut effort, &record).await?;

        effort
            .apply(
                "put_profile_snapshot",
                self.cache.put_profile_snapshot(
                    &record.id,
                    &record.snapshot(),
                    self.config.profile_ttl,
                ),
            )
            .await;
        effort
            .apply(
                "put_email",
                self.cache.put_email(
                    &record.id,
                    &record.email,
                    self.config.registration_cache_ttl,
                ),
            )
            .await;

        info!(identity = %record.id, "user logged in");
        Ok(session)
    }

    /// ## 日本語
    ///
    /// ベアラートークンを検証します。
    ///
    /// 署名・期限に加えて、アクティブトークン索引に存在することを確認します。
    /// 索引に到達できない場合は `fail_closed` 設定に従います。
    ///
    /// ## English
    ///
    /// Verifies a bearer token.
    ///
    /// A token is accepted only if its signature verifies, it has not expired, and it
    /// is present in the active-token index. Any decode failure is
    /// [`RAccountError::Unauthenticated`]. If the index cannot be reached the check
    /// falls back to signature and expiry, unless
    /// [`AccountConfig::fail_closed`] is set.
    pub async fn authenticate(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> Result<RAuthUser, RAccountError> {
        let claims = self.codec.verify(token).map_err(|err| {
            debug!(reason = %err, "token rejected");
            RAccountError::Unauthenticated
        })?;

        let indexed = ctx
            .bound(self.cache.active_token_owner(token))
            .await
            .unwrap_or(Err(CacheError::Timeout));

        match indexed {
            Ok(Some((identity, _role))) if identity == claims.sub => {}
            Ok(_) => {
                debug!(identity = %claims.sub, "token rejected: not in active index");
                return Err(RAccountError::Unauthenticated);
            }
            Err(err) if self.config.fail_closed => {
                warn!(identity = %claims.sub, error = %err, "active index unreachable; rejecting token");
                return Err(RAccountError::Unauthenticated);
            }
            Err(err) => {
                warn!(identity = %claims.sub, error = %err, "active index unreachable; accepting signed token");
            }
        }

        Ok(RAuthUser {
            id: claims.sub,
            role: claims.role,
            token: token.to_string(),
        })
    }

    /// Revokes the caller's access token. Best-effort; always succeeds.
    pub async fn logout(&self, ctx: &RequestContext, user: &RAuthUser) -> Result<(), RAccountError> {
        let mut effort = BestEffort::new(ctx, "logout");
        effort
            .apply(
                "revoke_active_token",
                self.cache.revoke_active_token(&user.token),
            )
            .await;
        effort
            .apply(
                "remove_token_from_identity",
                self.cache.remove_token_from_identity(&user.id, &user.token),
            )
            .await;
        info!(identity = %user.id, "user logged out");
        Ok(())
    }

    /// ## 日本語
    ///
    /// リフレッシュトークンを消費し、新しいトークンの組を発行します（ローテーション）。
    ///
    /// ## English
    ///
    /// Redeems a refresh token for a new access/refresh pair.
    ///
    /// The token is consumed only after the account is reloaded: it can be redeemed
    /// once, and a failed store read leaves it usable. An unknown, expired or already
    /// used token, a cache that cannot be read, and a deleted account are all
    /// [`RAccountError::Unauthenticated`].
    pub async fn refresh(
        &self,
        ctx: &RequestContext,
        refresh_token: &str,
    ) -> Result<LoginSession, RAccountError> {
        let resolved = ctx
            .bound(self.cache.identity_for_refresh_token(refresh_token))
            .await
            .unwrap_or(Err(CacheError::Timeout));
        let identity = match resolved {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                debug!("refresh rejected: unknown refresh token");
                return Err(RAccountError::Unauthenticated);
            }
            Err(err) => {
                warn!(error = %err, "refresh token lookup failed");
                return Err(RAccountError::Unauthenticated);
            }
        };

        // The token is only consumed once the record is loaded, so a store outage
        // leaves it redeemable.
        let record = match self
            .store_call(ctx, self.store.find_by_identity(&identity))
            .await
        {
            Ok(record) => record,
            Err(StoreError::NotFound) => {
                debug!(identity = %identity, "refresh rejected: account is gone");
                return Err(RAccountError::Unauthenticated);
            }
            Err(err) => return Err(persistence(err)),
        };

        let taken = ctx
            .bound(self.cache.take_refresh_token(refresh_token))
            .await
            .unwrap_or(Err(CacheError::Timeout));
        match taken {
            Ok(Some(owner)) if owner == identity => {}
            Ok(_) => {
                debug!(identity = %identity, "refresh rejected: token already redeemed");
                return Err(RAccountError::Unauthenticated);
            }
            Err(err) => {
                warn!(error = %err, "refresh token redemption failed");
                return Err(RAccountError::Unauthenticated);
            }
        }

        let mut effort = BestEffort::new(ctx, "refresh");
        effort
            .apply(
                "remove_refresh_token_from_identity",
                self.cache
                    .remove_refresh_token_from_identity(&identity, refresh_token),
            )
            .await;
        let session = self.open_session(&mut effort, &record).await?;
        debug!(identity = %identity, "session refreshed");
        Ok(session)
    }

    /// ## 日本語
    ///
    /// プロフィールを取得します（キャッシュアサイド）。
    ///
    /// キャッシュにあればそれを返し、なければストアから読み出してキャッシュを再構築します。
    /// 呼び出し側からはどちらから返されたか区別できません。
    ///
    /// ## English
    ///
    /// Reads a profile, cache-aside.
    ///
    /// A cached snapshot is returned as is. On a miss (or an unreachable cache) the
    /// record is read from the store, failing with [`RAccountError::NotFound`] if it
    /// is absent, and the snapshot is repopulated for `profile_ttl`. The result is the
    /// same projection either way.
    pub async fn get_profile(
        &self,
        ctx: &RequestContext,
        identity: &str,
    ) -> Result<ProfileSnapshot, RAccountError> {
        let mut effort = BestEffort::new(ctx, "get_profile");

        if let Some(Some(snapshot)) = effort
            .apply(
                "get_profile_snapshot",
                self.cache.get_profile_snapshot(identity),
            )
            .await
        {
            debug!(identity, "profile cache hit");
            return Ok(snapshot);
        }
        debug!(identity, "profile cache miss");

        let record = self
            .store_call(ctx, self.store.find_by_identity(identity))
            .await
            .map_err(|err| match err {
                StoreError::NotFound => RAccountError::NotFound,
                other => persistence(other),
            })?;

        let snapshot = record.snapshot();
        effort
            .apply(
                "put_profile_snapshot",
                self.cache
                    .put_profile_snapshot(identity, &snapshot, self.config.profile_ttl),
            )
            .await;
        Ok(snapshot)
    }

    /// Updates name and email, then refreshes the cached snapshot.
    ///
    /// Fails with [`RAccountError::EmailConflict`] if the email belongs to another
    /// identity.
    pub async fn update_profile(
        &self,
        ctx: &RequestContext,
        identity: &str,
        name: &str,
        email: &str,
    ) -> Result<UserView, RAccountError> {
        let name = validate_name(name)?;
        let email = validate_email(email)?;

        match self.store_call(ctx, self.store.find_by_email(email)).await {
            Ok(owner) if owner.id != identity => return Err(RAccountError::EmailConflict),
            Ok(_) | Err(StoreError::NotFound) => {}
            Err(err) => return Err(persistence(err)),
        }

        let record = self
            .store_call(ctx, self.store.update(identity, name, email))
            .await
            .map_err(|err| match err {
                StoreError::NotFound => RAccountError::NotFound,
                StoreError::DuplicateEmail => RAccountError::EmailConflict,
                other => persistence(other),
            })?;
        info!(identity, "profile updated");

        let mut effort = BestEffort::new(ctx, "update_profile");
        effort
            .apply(
                "put_profile_snapshot",
                self.cache.put_profile_snapshot(
                    identity,
                    &record.snapshot(),
                    self.config.profile_ttl,
                ),
            )
            .await;
        effort
            .apply(
                "put_email",
                self.cache.put_email(
                    identity,
                    &record.email,
                    self.config.registration_cache_ttl,
                ),
            )
            .await;

        Ok(record.view())
    }

    /// ## 日本語
    ///
    /// パスワードを変更し、既存のセッションを失効させます。
    ///
    /// アクセストークン自体は期限まで暗号学的に有効なままですが、アクティブトークン索引から
    /// 削除されるため [`RSessionManager::authenticate`] では拒否されます。
    /// リフレッシュトークンも同時に失効させます。
    ///
    /// ## English
    ///
    /// Changes the password and revokes existing sessions.
    ///
    /// Previously issued access tokens stay cryptographically valid until they
    /// expire; revocation removes them from the active-token index, which
    /// [`RSessionManager::authenticate`] consults. Refresh tokens are revoked too.
    /// Both revocations are best-effort.
    pub async fn change_password(
        &self,
        ctx: &RequestContext,
        identity: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), RAccountError> {
        validate_password(new_password)?;

        let record = self
            .store_call(ctx, self.store.find_by_identity(identity))
            .await
            .map_err(|err| match err {
                StoreError::NotFound => RAccountError::NotFound,
                other => persistence(other),
            })?;

        if !self
            .verify_password(old_password, &record.password_hash)
            .await?
        {
            debug!(identity, "password change rejected: old password mismatch");
            return Err(RAccountError::IncorrectPassword);
        }

        let password_hash = self.hash_password(new_password).await?;
        self.store_call(ctx, self.store.update_password(identity, &password_hash))
            .await
            .map_err(|err| match err {
                StoreError::NotFound => RAccountError::NotFound,
                other => persistence(other),
            })?;
        info!(identity, "password changed");

        let mut effort = BestEffort::new(ctx, "change_password");
        if let Some(revoked) = effort
            .apply(
                "revoke_all_tokens_for_identity",
                self.cache.revoke_all_tokens_for_identity(identity),
            )
            .await
        {
            debug!(identity, revoked, "access tokens revoked");
        }
        effort
            .apply(
                "revoke_all_refresh_tokens_for_identity",
                self.cache.revoke_all_refresh_tokens_for_identity(identity),
            )
            .await;

        Ok(())
    }

    /// ## 日本語
    ///
    /// アカウントを削除します。
    ///
    /// 先にストアから削除し（失敗したら中断）、その後キャッシュを掃除します。
    /// 途中でクラッシュしても、残るのは TTL で消える古いキャッシュだけです。
    ///
    /// ## English
    ///
    /// Deletes an account: store first, cache second.
    ///
    /// The store delete is authoritative and aborts the operation on failure. The
    /// cache purge is best-effort and runs every sub-delete even if some fail. A crash
    /// between the two steps leaves stale cache entries that expire by TTL, never a
    /// clean cache in front of a surviving record.
    pub async fn delete_account(
        &self,
        ctx: &RequestContext,
        identity: &str,
    ) -> Result<(), RAccountError> {
        self.store_call(ctx, self.store.delete(identity))
            .await
            .map_err(|err| match err {
                StoreError::NotFound => RAccountError::NotFound,
                other => persistence(other),
            })?;
        info!(identity, "account deleted");

        let mut effort = BestEffort::new(ctx, "delete_account");
        match ctx.bound(self.cache.purge_all_identity_data(identity)).await {
            Ok(failures) => {
                for failure in failures {
                    effort.record("purge_all_identity_data", &failure.key, failure.error);
                }
            }
            Err(_) => effort.record("purge_all_identity_data", identity, CacheError::Timeout),
        }

        Ok(())
    }

    /// Adds `permission` to `role`'s permission set.
    pub async fn grant_permission(
        &self,
        ctx: &RequestContext,
        role: Role,
        permission: &str,
    ) -> Result<(), CacheError> {
        ctx.bound(self.cache.add_permission_to_role(role, permission))
            .await
            .unwrap_or(Err(CacheError::Timeout))
    }

    /// Coarse permission check against the role's permission set.
    ///
    /// Fails with [`RAccountError::Forbidden`] when the permission is missing or the
    /// permission set cannot be read.
    pub async fn authorize(
        &self,
        ctx: &RequestContext,
        user: &RAuthUser,
        permission: &str,
    ) -> Result<(), RAccountError> {
        let allowed = ctx
            .bound(self.cache.role_has_permission(user.role, permission))
            .await
            .unwrap_or(Err(CacheError::Timeout));
        match allowed {
            Ok(true) => Ok(()),
            Ok(false) => {
                debug!(identity = %user.id, role = %user.role, permission, "permission denied");
                Err(RAccountError::Forbidden)
            }
            Err(err) => {
                warn!(identity = %user.id, error = %err, "permission set unreachable; denying");
                Err(RAccountError::Forbidden)
            }
        }
    }

    /// Registered emails, newest first, with `LRANGE` index semantics.
    pub async fn registered_emails(
        &self,
        ctx: &RequestContext,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, CacheError> {
        ctx.bound(self.cache.list_registered_emails(start, stop))
            .await
            .unwrap_or(Err(CacheError::Timeout))
    }
}
