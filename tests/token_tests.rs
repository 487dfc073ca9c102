//! Token codec tests: signing, verification and the failure taxonomy.

use jsonwebtoken::{EncodingKey, Header};
use r_account::{ConfigError, ManualClock, RTokenCodec, Role, TokenError};
use std::sync::Arc;
use std::time::Duration;

const SECRET: &[u8] = b"token-test-secret";

fn codec_with_clock() -> (RTokenCodec, ManualClock) {
    let clock = ManualClock::starting_now();
    let codec = RTokenCodec::with_clock(SECRET, Arc::new(clock.clone())).expect("codec");
    (codec, clock)
}

fn forge(claims: serde_json::Value) -> String {
    jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET))
        .expect("encode")
}

#[test]
fn issued_token_verifies_with_its_claims() {
    let (codec, _clock) = codec_with_clock();
    let token = codec
        .issue("user-1", Role::Admin, Duration::from_secs(300))
        .expect("issue");

    let claims = codec.verify(&token).expect("verify");
    assert_eq!(claims.sub, "user-1");
    assert_eq!(claims.role, Role::Admin);
    assert_eq!(claims.exp - claims.iat, 300);
}

#[test]
fn tokens_issued_in_the_same_second_differ() {
    let (codec, _clock) = codec_with_clock();
    let a = codec
        .issue("user-1", Role::User, Duration::from_secs(60))
        .expect("issue");
    let b = codec
        .issue("user-1", Role::User, Duration::from_secs(60))
        .expect("issue");
    assert_ne!(a, b);
}

#[test]
fn token_is_valid_until_expiry() {
    let (codec, clock) = codec_with_clock();
    let token = codec
        .issue("user-1", Role::User, Duration::from_secs(10))
        .expect("issue");

    clock.advance(Duration::from_secs(9));
    assert!(codec.verify(&token).is_ok());

    clock.advance(Duration::from_secs(1));
    assert_eq!(codec.verify(&token), Err(TokenError::Expired));
}

#[test]
fn zero_ttl_token_is_already_expired() {
    let (codec, _clock) = codec_with_clock();
    let token = codec
        .issue("user-1", Role::User, Duration::ZERO)
        .expect("issue");
    assert_eq!(codec.verify(&token), Err(TokenError::Expired));
}

#[test]
fn other_secret_is_an_invalid_signature() {
    let (codec, _clock) = codec_with_clock();
    let other = RTokenCodec::new("rotated-secret").expect("codec");
    let token = other
        .issue("user-1", Role::User, Duration::from_secs(60))
        .expect("issue");
    assert_eq!(codec.verify(&token), Err(TokenError::InvalidSignature));
}

#[test]
fn swapped_payload_is_an_invalid_signature() {
    let (codec, _clock) = codec_with_clock();
    let mine = codec
        .issue("user-1", Role::User, Duration::from_secs(60))
        .expect("issue");
    let admin = codec
        .issue("user-2", Role::Admin, Duration::from_secs(60))
        .expect("issue");

    let mine: Vec<&str> = mine.split('.').collect();
    let admin: Vec<&str> = admin.split('.').collect();
    let spliced = format!("{}.{}.{}", mine[0], admin[1], mine[2]);
    assert_eq!(codec.verify(&spliced), Err(TokenError::InvalidSignature));
}

#[test]
fn garbage_is_malformed() {
    let (codec, _clock) = codec_with_clock();
    for token in ["", "abc", "a.b.c", "Bearer x.y.z"] {
        assert_eq!(codec.verify(token), Err(TokenError::Malformed), "{token:?}");
    }
}

#[test]
fn unknown_role_is_malformed() {
    let (codec, clock) = codec_with_clock();
    let now = clock_secs(&clock);
    let token = forge(serde_json::json!({
        "sub": "user-1",
        "role": "root",
        "iat": now,
        "exp": now + 60,
        "jti": "x",
    }));
    assert_eq!(codec.verify(&token), Err(TokenError::Malformed));
}

#[test]
fn wrongly_typed_claim_is_malformed() {
    let (codec, clock) = codec_with_clock();
    let now = clock_secs(&clock);
    let token = forge(serde_json::json!({
        "sub": 42,
        "role": "user",
        "iat": now,
        "exp": now + 60,
        "jti": "x",
    }));
    assert_eq!(codec.verify(&token), Err(TokenError::Malformed));
}

#[test]
fn unexpected_claim_is_malformed() {
    let (codec, clock) = codec_with_clock();
    let now = clock_secs(&clock);
    let token = forge(serde_json::json!({
        "sub": "user-1",
        "role": "user",
        "iat": now,
        "exp": now + 60,
        "jti": "x",
        "admin": true,
    }));
    assert_eq!(codec.verify(&token), Err(TokenError::Malformed));
}

#[test]
fn empty_secret_is_rejected() {
    assert_eq!(RTokenCodec::new("").unwrap_err(), ConfigError::EmptySecret);
}

fn clock_secs(clock: &ManualClock) -> i64 {
    use r_account::Clock;
    clock.now().timestamp()
}
