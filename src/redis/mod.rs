//! ## 日本語
//!
//! Redis/Valkey バックエンドの実装です。
//!
//! `redis` feature により [`RedisSessionCache`] が利用可能になります。
//!
//! ## English
//!
//! Redis/Valkey-backed session cache.
//!
//! Enabling the `redis` feature makes [`RedisSessionCache`] available.

mod redis_session_cache;

pub use redis_session_cache::RedisSessionCache;
