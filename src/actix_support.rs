//! ## 日本語
//!
//! actix-web 向けの extractor とエラー変換の実装です。
//! `web::Data<RSessionManager>` を `app_data` に登録してください。
//!
//! ## English
//!
//! Actix-web extractor and error response implementations.
//! Register the manager with `App::app_data(web::Data::new(manager))`.

use crate::models::{ErrorBody, RAccountError};
use crate::{RAuthUser, RSessionManager, RequestContext, extract_bearer_token};
use actix_web::{
    FromRequest, HttpRequest, HttpResponse, ResponseError,
    http::{StatusCode, header},
    web,
};
use std::future::Future;
use std::pin::Pin;

impl ResponseError for RAccountError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(RAccountError::status_code(self))
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(ResponseError::status_code(self)).json(ErrorBody::from(self))
    }
}

/// Extracts [`RAuthUser`] from an actix-web request.
///
/// Failure modes:
/// - 500: manager is missing from `app_data`
/// - 401: token is missing, malformed, expired, or revoked
///
/// ## 日本語
///
/// actix-web のリクエストから [`RAuthUser`] を抽出します。
impl FromRequest for RAuthUser {
    type Error = actix_web::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let manager = match req.app_data::<web::Data<RSessionManager>>() {
            Some(manager) => manager.clone(),
            None => {
                return Box::pin(async {
                    Err(actix_web::error::ErrorInternalServerError(
                        "Session manager not found",
                    ))
                });
            }
        };

        let token = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(extract_bearer_token)
            .map(str::to_string);

        Box::pin(async move {
            let token = token.ok_or(RAccountError::Unauthenticated)?;
            let user = manager
                .authenticate(&RequestContext::background(), &token)
                .await?;
            Ok(user)
        })
    }
}
