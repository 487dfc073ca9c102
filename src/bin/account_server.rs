//! ## 日本語
//!
//! r-account を axum で公開するデモサーバーです。
//!
//! 環境変数：
//! - `JWT_SECRET`（必須）
//! - `REDIS_URL`（任意。`redis` feature 有効時のみ Redis を使用）
//! - `R_ACCOUNT_PREFIX`、`PORT`、`RUST_LOG` など
//!
//! ## English
//!
//! Demo server exposing r-account over axum.
//!
//! Environment variables:
//! - `JWT_SECRET` (required)
//! - `REDIS_URL` (optional; used only when built with the `redis` feature)
//! - `R_ACCOUNT_PREFIX`, `PORT`, the TTL overrides, and `RUST_LOG`
//!
//! ```bash
//! JWT_SECRET=dev cargo run --features server --bin account-server
//! curl -X POST http://127.0.0.1:8080/api/auth/register \
//!   -H "Content-Type: application/json" \
//!   -d '{"name":"Ann","email":"ann@x.com","password":"correct horse"}'
//! ```

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use r_account::{
    AccountConfig, InMemoryRecordStore, InMemorySessionCache, LoginSession, ProfileSnapshot,
    RAccountError, RAuthUser, RSessionManager, RequestContext, Role, SessionCache, UserView,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const LIST_EMAILS_PERMISSION: &str = "emails:list";

type ApiResult<T> = Result<T, RAccountError>;

#[derive(Deserialize)]
struct RegisterRequest {
    name: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

#[derive(Deserialize)]
struct UpdateProfileRequest {
    name: String,
    email: String,
}

#[derive(Deserialize)]
struct ChangePasswordRequest {
    old_password: String,
    new_password: String,
}

#[derive(Deserialize)]
struct EmailRange {
    #[serde(default)]
    start: isize,
    #[serde(default = "default_stop")]
    stop: isize,
}

fn default_stop() -> isize {
    -1
}

fn ctx() -> RequestContext {
    RequestContext::with_timeout(REQUEST_TIMEOUT)
}

async fn register(
    Extension(manager): Extension<RSessionManager>,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<UserView>)> {
    let user = manager
        .register(&ctx(), &body.name, &body.email, &body.password)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn login(
    Extension(manager): Extension<RSessionManager>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<LoginSession>> {
    Ok(Json(manager.login(&ctx(), &body.email, &body.password).await?))
}

async fn refresh(
    Extension(manager): Extension<RSessionManager>,
    Json(body): Json<RefreshRequest>,
) -> ApiResult<Json<LoginSession>> {
    Ok(Json(manager.refresh(&ctx(), &body.refresh_token).await?))
}

async fn logout(
    Extension(manager): Extension<RSessionManager>,
    user: RAuthUser,
) -> ApiResult<StatusCode> {
    manager.logout(&ctx(), &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn profile(
    Extension(manager): Extension<RSessionManager>,
    user: RAuthUser,
) -> ApiResult<Json<ProfileSnapshot>> {
    Ok(Json(manager.get_profile(&ctx(), &user.id).await?))
}

async fn update_profile(
    Extension(manager): Extension<RSessionManager>,
    user: RAuthUser,
    Json(body): Json<UpdateProfileRequest>,
) -> ApiResult<Json<UserView>> {
    let view = manager
        .update_profile(&ctx(), &user.id, &body.name, &body.email)
        .await?;
    Ok(Json(view))
}

async fn change_password(
    Extension(manager): Extension<RSessionManager>,
    user: RAuthUser,
    Json(body): Json<ChangePasswordRequest>,
) -> ApiResult<StatusCode> {
    manager
        .change_password(&ctx(), &user.id, &body.old_password, &body.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_account(
    Extension(manager): Extension<RSessionManager>,
    user: RAuthUser,
) -> ApiResult<StatusCode> {
    manager.delete_account(&ctx(), &user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn registered_emails(
    Extension(manager): Extension<RSessionManager>,
    user: RAuthUser,
    Query(range): Query<EmailRange>,
) -> Result<Json<Vec<String>>, axum::response::Response> {
    let ctx = ctx();
    manager
        .authorize(&ctx, &user, LIST_EMAILS_PERMISSION)
        .await
        .map_err(IntoResponse::into_response)?;
    manager
        .registered_emails(&ctx, range.start, range.stop)
        .await
        .map(Json)
        .map_err(|err| {
            warn!(error = %err, "listing registered emails failed");
            (StatusCode::SERVICE_UNAVAILABLE, "session cache unavailable").into_response()
        })
}

#[cfg(feature = "redis")]
async fn session_cache(
    config: &AccountConfig,
) -> Result<Arc<dyn SessionCache>, r_account::CacheError> {
    match config.redis_url.as_deref() {
        Some(url) => {
            let cache =
                r_account::RedisSessionCache::connect(url, config.redis_prefix.clone()).await?;
            info!(prefix = cache.prefix(), "using redis session cache");
            Ok(Arc::new(cache))
        }
        None => Ok(Arc::new(InMemorySessionCache::new())),
    }
}

#[cfg(not(feature = "redis"))]
async fn session_cache(
    config: &AccountConfig,
) -> Result<Arc<dyn SessionCache>, r_account::CacheError> {
    if config.redis_url.is_some() {
        warn!("REDIS_URL is set but the redis feature is disabled; using the in-memory cache");
    }
    Ok(Arc::new(InMemorySessionCache::new()))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AccountConfig::from_env()?;
    info!(?config, "starting account server");

    let port = config.port;
    let cache = session_cache(&config).await?;
    let manager = RSessionManager::new(config, Arc::new(InMemoryRecordStore::new()), cache)?;
    manager
        .grant_permission(&ctx(), Role::Admin, LIST_EMAILS_PERMISSION)
        .await?;

    let app = Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/user/profile", get(profile).put(update_profile))
        .route("/api/user/password", put(change_password))
        .route("/api/user", delete(delete_account))
        .route("/api/admin/emails", get(registered_emails))
        .layer(Extension(manager))
        .layer(Extension(REQUEST_TIMEOUT));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
