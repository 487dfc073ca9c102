#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::empty_loop)]
#![deny(clippy::indexing_slicing)]
//! # r-account
//!
//! Account service core: registration, login, profile management and bearer-token
//! sessions in front of an authoritative record store and an advisory session cache.
//!
//! The library exposes these building blocks:
//! - [`RSessionManager`]: the account operations (register, login, authenticate,
//!   refresh, profile read/update, password change, deletion).
//! - [`RecordStore`]: the authoritative user records. [`InMemoryRecordStore`] ships
//!   with the crate.
//! - [`SessionCache`]: active tokens, refresh tokens, permissions and profile
//!   snapshots. [`InMemorySessionCache`] ships with the crate; `RedisSessionCache`
//!   with the `redis` feature.
//! - [`RTokenCodec`]: HS256 access tokens with typed [`TokenClaims`].
//! - [`CredentialVerifier`]: Argon2id password hashing.
//! - [`RAuthUser`]: the authenticated caller, usable as an axum or actix-web
//!   extractor with the `axum` / `actix` features.
//!
//! ## How authentication works
//!
//! 1. `login` verifies the password and issues an access token plus a refresh token.
//! 2. The client sends the access token back as `Authorization: Bearer <token>`.
//! 3. `authenticate` checks the signature, the expiry and the active-token index.
//!    `logout` and `change_password` remove tokens from that index.
//! 4. `refresh` redeems a refresh token once for a new pair.
//!
//! ## 日本語
//!
//! アカウントサービスの中核です。登録・ログイン・プロフィール管理・ベアラートークンによる
//! セッションを、正本のレコードストアと助言的なセッションキャッシュの上に実装します。
//!
//! - ストアの失敗は操作を中断します（[`RAccountError::Persistence`]）。
//! - キャッシュの失敗はログに記録され、呼び出し側には返されません。
//! - すべてのストア/キャッシュ呼び出しは [`RequestContext`] の期限に従います。

mod best_effort;
pub mod cache;
mod clock;
mod config;
mod context;
mod manager;
mod models;
mod password;
pub mod store;
mod token;

#[cfg(feature = "redis")]
pub mod redis;

#[cfg(feature = "axum")]
mod axum_support;

#[cfg(feature = "actix")]
mod actix_support;

pub use crate::best_effort::{BestEffort, CacheWarning};
pub use crate::cache::{InMemorySessionCache, PurgeFailure, SessionCache};
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::{AccountConfig, JWT_SECRET_ENV};
pub use crate::context::{DeadlineExceeded, RequestContext};
pub use crate::manager::{RAuthUser, RSessionManager};
pub use crate::models::{
    CacheError, ConfigError, ErrorBody, ErrorKind, LoginSession, NewUser, ProfileSnapshot,
    RAccountError, Role, StoreError, TokenClaims, TokenError, UnknownRole, UserRecord, UserView,
};
pub use crate::password::{CredentialVerifier, HashError};
pub use crate::store::{InMemoryRecordStore, RecordStore};
pub use crate::token::RTokenCodec;

#[cfg(feature = "redis")]
pub use crate::redis::RedisSessionCache;

/// ## 日本語
///
/// `Authorization` ヘッダの値からベアラートークンを取り出します。
///
/// `Bearer ` 接頭辞（大文字小文字は区別しない）が必須で、空のトークンは `None` です。
///
/// ## English
///
/// Extracts the token from an `Authorization` header value.
///
/// The `Bearer ` scheme is required (matched case-insensitively); a missing scheme
/// or an empty token yields `None`.
pub fn extract_bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() { None } else { Some(token) }
}

#[cfg(test)]
mod tests {
    use super::extract_bearer_token;

    #[test]
    fn bearer_scheme_is_required() {
        assert_eq!(extract_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(extract_bearer_token("abc"), None);
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }
}
