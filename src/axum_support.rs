//! ## 日本語
//!
//! axum 向けの extractor とエラー変換の実装です。
//!
//! - `Extension<RSessionManager>` を state から取得し
//! - `Authorization: Bearer <token>` から token を抽出して検証し
//! - `RAuthUser` を handler 引数として利用できるようにします
//!
//! ## English
//!
//! Axum extractor and error response implementations.
//!
//! - Fetches `Extension<RSessionManager>` from request state
//! - Extracts the token from `Authorization: Bearer <token>` and authenticates it
//! - Enables `RAuthUser` as a handler parameter
//!
//! An optional `Extension<Duration>` sets the per-request deadline applied to the
//! store and cache calls made by the extractor.

use crate::models::{ErrorBody, RAccountError};
use crate::{RAuthUser, RSessionManager, RequestContext, extract_bearer_token};
use axum::{
    Json,
    extract::{Extension, FromRequestParts},
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use std::time::Duration;

impl IntoResponse for RAccountError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorBody::from(&self))).into_response()
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for RAuthUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // 日本語: 1) アプリ state から RSessionManager を取り出す。
        //        ルータに `.layer(Extension(manager))` が必要。
        // English: 1) Fetch RSessionManager from request state.
        //          The router must install `.layer(Extension(manager))`.
        let Extension(manager) = Extension::<RSessionManager>::from_request_parts(parts, state)
            .await
            .map_err(|_| {
                (StatusCode::INTERNAL_SERVER_ERROR, "Session manager not found").into_response()
            })?;

        // 日本語: 2) 期限を任意で読む（無ければ期限なし）。
        // English: 2) Read the request timeout if provided; otherwise no deadline.
        let ctx = match Extension::<Duration>::from_request_parts(parts, state).await {
            Ok(Extension(timeout)) => RequestContext::with_timeout(timeout),
            Err(_) => RequestContext::background(),
        };

        // 日本語: 3) header から token を抽出する。`Bearer ` 以外は 401。
        // English: 3) Extract the token; anything but `Bearer <token>` is a 401.
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(extract_bearer_token)
            .ok_or_else(|| RAccountError::Unauthenticated.into_response())?;

        manager
            .authenticate(&ctx, token)
            .await
            .map_err(IntoResponse::into_response)
    }
}
