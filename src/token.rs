//! ## 日本語
//!
//! 署名付きベアラートークンのエンコード／デコードを行います。
//!
//! HS256 の JWT を使い、秘密鍵はプロセス全体で 1 つです。秘密鍵を変更すると、
//! 発行済みのトークンはすべて無効になります。
//!
//! ## English
//!
//! Encodes and decodes signed bearer tokens.
//!
//! Tokens are HS256 JWTs signed with one process-wide secret. Rotating the secret
//! invalidates every outstanding token; there is no grace period.
//!
//! Expiry is checked here against the injected [`Clock`] instead of inside
//! `jsonwebtoken`, so tests can move time forward.

use crate::clock::{Clock, SystemClock};
use crate::models::{ConfigError, Role, TokenClaims, TokenError};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;
use std::time::Duration;

/// Issues and verifies access tokens.
///
/// `Clone` is cheap and shares the keys.
#[derive(Clone)]
pub struct RTokenCodec {
    encoding: Arc<EncodingKey>,
    decoding: Arc<DecodingKey>,
    validation: Arc<Validation>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for RTokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RTokenCodec")
            .field("algorithm", &Algorithm::HS256)
            .finish_non_exhaustive()
    }
}

impl RTokenCodec {
    /// Creates a codec using the wall clock.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, ConfigError> {
        Self::with_clock(secret, Arc::new(SystemClock))
    }

    pub fn with_clock(secret: impl AsRef<[u8]>, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(ConfigError::EmptySecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims.clear();

        Ok(Self {
            encoding: Arc::new(EncodingKey::from_secret(secret)),
            decoding: Arc::new(DecodingKey::from_secret(secret)),
            validation: Arc::new(validation),
            clock,
        })
    }

    /// Signs a token for `subject` valid for `ttl` from now.
    pub fn issue(&self, subject: &str, role: Role, ttl: Duration) -> Result<String, TokenError> {
        let iat = self.clock.now().timestamp();
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = TokenClaims {
            sub: subject.to_string(),
            role,
            iat,
            exp: iat.saturating_add(ttl_secs),
            jti: uuid::Uuid::new_v4().to_string(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|_| TokenError::Signing)
    }

    /// Checks signature, structure and expiry, in that order.
    ///
    /// This does not consult the active-token index; see
    /// [`crate::RSessionManager::authenticate`] for the full check.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding, &self.validation)
            .map_err(|err| match err.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            })?;

        let claims = data.claims;
        if self.clock.now().timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}
