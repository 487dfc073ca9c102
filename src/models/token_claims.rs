use super::Role;
use serde::{Deserialize, Serialize};

/// ## 日本語
///
/// アクセストークンに埋め込まれるクレームです。
///
/// 型付きで検証されるため、型が合わないトークンは `Malformed` として拒否されます。
///
/// ## English
///
/// Claims embedded in an access token.
///
/// Decoded into this struct rather than a dynamic map, so a claim of the wrong
/// type (or an unknown role) rejects the token as malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenClaims {
    /// ## 日本語
    ///
    /// トークンの主体（ユーザー ID）。
    ///
    /// ## English
    ///
    /// Subject: the user identity.
    pub sub: String,
    /// ## 日本語
    ///
    /// 発行時点のロール。
    ///
    /// ## English
    ///
    /// Role at issuance.
    pub role: Role,
    /// Issued-at, Unix epoch seconds.
    pub iat: i64,
    /// Expires-at, Unix epoch seconds. Valid while `now < exp`.
    pub exp: i64,
    /// Token id (UUID v4). Two tokens issued in the same second still differ.
    pub jti: String,
}
