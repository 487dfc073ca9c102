//! Session cache key namespaces.
//!
//! Keys are case-sensitive and colon-delimited. Backends may prepend a deployment
//! prefix; these functions build the unprefixed form.

use crate::models::Role;

/// Append-only list of registered emails.
pub const REGISTERED_EMAILS: &str = "user:list_email";

/// `auth:token:{token}` → `{identity}|{role}`
pub fn active_token(token: &str) -> String {
    format!("auth:token:{token}")
}

/// `auth:user:{identity}:tokens` → set of access tokens
pub fn identity_tokens(identity: &str) -> String {
    format!("auth:user:{identity}:tokens")
}

/// `auth:user:{identity}:refresh` → set of refresh tokens
pub fn identity_refresh_tokens(identity: &str) -> String {
    format!("auth:user:{identity}:refresh")
}

/// `auth:user:{identity}:sessions`. Session marker, only ever purged.
pub fn identity_sessions(identity: &str) -> String {
    format!("auth:user:{identity}:sessions")
}

/// `auth:refresh:{token}` → identity
pub fn refresh_token(token: &str) -> String {
    format!("auth:refresh:{token}")
}

/// `user:role:{role}` → set of permissions
pub fn role_permissions(role: Role) -> String {
    format!("user:role:{role}")
}

/// `user:role:{identity}`. Per-identity role link, only ever purged.
pub fn identity_role_link(identity: &str) -> String {
    format!("user:role:{identity}")
}

/// `user:profile:{identity}` → hash{name, email, role}
pub fn profile(identity: &str) -> String {
    format!("user:profile:{identity}")
}

/// `user:email:{identity}` → email
pub fn email(identity: &str) -> String {
    format!("user:email:{identity}")
}

/// `rate:{key}` → counter
pub fn rate(key: &str) -> String {
    format!("rate:{key}")
}

/// Every plain key owned by `identity`, in purge order.
///
/// The profile goes first so a partially failed purge is least likely to keep
/// serving a deleted user's snapshot.
pub fn identity_namespaces(identity: &str) -> Vec<String> {
    vec![
        profile(identity),
        email(identity),
        identity_tokens(identity),
        identity_sessions(identity),
        identity_refresh_tokens(identity),
        refresh_token(identity),
        identity_role_link(identity),
    ]
}

/// Encodes the value stored under [`active_token`].
pub fn encode_active_token(identity: &str, role: Role) -> String {
    format!("{identity}|{role}")
}

/// Decodes the value stored under [`active_token`].
pub fn decode_active_token(value: &str) -> Option<(String, Role)> {
    let (identity, role) = value.rsplit_once('|')?;
    let role = role.parse().ok()?;
    Some((identity.to_string(), role))
}
