//! Models and error types for the r-account library.
//!
//! This module contains the user record and its projections, the token claims,
//! and the error types used throughout the library.

mod raccount_error;
mod token_claims;
mod user;

pub use raccount_error::{
    CacheError, ConfigError, ErrorBody, ErrorKind, RAccountError, StoreError, TokenError,
};
pub use token_claims::TokenClaims;
pub use user::{LoginSession, NewUser, ProfileSnapshot, Role, UnknownRole, UserRecord, UserView};
