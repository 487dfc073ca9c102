//! Concurrency and load tests for r-account.
//!
//! These tests verify the manager's behavior when many requests race.

mod common;

use common::{TestResult, harness};
use r_account::{RAccountError, RequestContext, SessionCache};
use std::collections::HashSet;
use std::time::Instant;

const PASSWORD: &str = "correct horse";

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_registrations_for_one_email_create_one_record() -> TestResult {
    let h = harness();
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let manager = h.manager.clone();
            tokio::spawn(async move {
                manager
                    .register(
                        &RequestContext::background(),
                        &format!("Ann {i}"),
                        "ann@x.com",
                        PASSWORD,
                    )
                    .await
            })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => created += 1,
            Err(RAccountError::EmailAlreadyExists) => {}
            Err(other) => return Err(other.into()),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(h.store.len()?, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_logins_issue_distinct_tokens() -> TestResult {
    let h = harness();
    let user = h
        .manager
        .register(&RequestContext::background(), "Ann", "ann@x.com", PASSWORD)
        .await?;

    let start = Instant::now();
    let handles: Vec<_> = (0..20)
        .map(|_| {
            let manager = h.manager.clone();
            tokio::spawn(async move {
                manager
                    .login(&RequestContext::background(), "ann@x.com", PASSWORD)
                    .await
            })
        })
        .collect();

    let mut tokens = HashSet::new();
    for handle in handles {
        tokens.insert(handle.await??.access_token);
    }
    println!("20 concurrent logins in {:?}", start.elapsed());

    assert_eq!(tokens.len(), 20);
    let indexed: HashSet<String> = h
        .cache
        .list_tokens_for_identity(&user.id)
        .await?
        .into_iter()
        .collect();
    assert_eq!(indexed, tokens);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn a_refresh_token_is_redeemed_by_one_racer() -> TestResult {
    let h = harness();
    h.manager
        .register(&RequestContext::background(), "Ann", "ann@x.com", PASSWORD)
        .await?;
    let session = h
        .manager
        .login(&RequestContext::background(), "ann@x.com", PASSWORD)
        .await?;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let manager = h.manager.clone();
            let token = session.refresh_token.clone();
            tokio::spawn(async move {
                manager
                    .refresh(&RequestContext::background(), &token)
                    .await
            })
        })
        .collect();

    let mut redeemed = 0;
    for handle in handles {
        if handle.await?.is_ok() {
            redeemed += 1;
        }
    }
    assert_eq!(redeemed, 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn authenticate_under_load() -> TestResult {
    let h = harness();
    h.manager
        .register(&RequestContext::background(), "Ann", "ann@x.com", PASSWORD)
        .await?;
    let session = h
        .manager
        .login(&RequestContext::background(), "ann@x.com", PASSWORD)
        .await?;

    let start = Instant::now();
    let handles: Vec<_> = (0..10)
        .map(|_| {
            let manager = h.manager.clone();
            let token = session.access_token.clone();
            tokio::spawn(async move {
                for _ in 0..100 {
                    manager
                        .authenticate(&RequestContext::background(), &token)
                        .await?;
                }
                Ok::<_, RAccountError>(())
            })
        })
        .collect();

    for handle in handles {
        handle.await??;
    }
    println!("1000 authentications in {:?}", start.elapsed());
    Ok(())
}
