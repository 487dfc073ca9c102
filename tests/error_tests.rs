//! Error handling tests for r-account.
//!
//! Tests the error types, their classification and their HTTP mapping.

use r_account::{
    CacheError, ConfigError, ErrorBody, ErrorKind, RAccountError, StoreError, TokenError,
};
use std::error::Error;

#[cfg(test)]
mod error_handling {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(RAccountError::EmailAlreadyExists.to_string(), "email already exists");
        assert_eq!(RAccountError::InvalidCredentials.to_string(), "invalid credentials");
        assert_eq!(
            RAccountError::Validation("name must not be empty".into()).to_string(),
            "invalid input: name must not be empty"
        );
    }

    #[test]
    fn error_debug() {
        let debug_str = format!("{:?}", RAccountError::IncorrectPassword);
        assert!(debug_str.contains("IncorrectPassword"));
    }

    #[test]
    fn persistence_error_keeps_its_source() {
        let error = RAccountError::Persistence(StoreError::Unavailable("refused".into()));

        let _: &dyn Error = &error;
        let source = error.source().expect("source");
        assert_eq!(source.to_string(), "record store unavailable: refused");
    }

    #[test]
    fn signing_failure_names_the_token_primitive() {
        let error = RAccountError::TokenSigning(TokenError::Signing);
        assert_eq!(error.to_string(), "access token could not be signed");
        assert_eq!(
            error.source().map(|s| s.to_string()).as_deref(),
            Some("token signing failed")
        );
        assert_eq!(ErrorBody::from(&error).message, "internal server error");
    }

    #[test]
    fn simple_errors_have_no_source() {
        assert!(RAccountError::NotFound.source().is_none());
        assert!(CacheError::Timeout.source().is_none());
    }

    #[test]
    fn kinds_map_to_statuses() {
        let cases = [
            (RAccountError::Validation("x".into()), ErrorKind::Validation, 400),
            (RAccountError::EmailAlreadyExists, ErrorKind::Conflict, 409),
            (RAccountError::EmailConflict, ErrorKind::Conflict, 409),
            (RAccountError::Unauthenticated, ErrorKind::Unauthenticated, 401),
            (RAccountError::InvalidCredentials, ErrorKind::Unauthenticated, 401),
            (RAccountError::IncorrectPassword, ErrorKind::Unauthenticated, 401),
            (RAccountError::Forbidden, ErrorKind::Forbidden, 403),
            (RAccountError::NotFound, ErrorKind::NotFound, 404),
            (
                RAccountError::Persistence(StoreError::Timeout),
                ErrorKind::Persistence,
                500,
            ),
            (RAccountError::HashFailure("x".into()), ErrorKind::Internal, 500),
            (RAccountError::TokenSigning(TokenError::Signing), ErrorKind::Internal, 500),
        ];
        for (error, kind, status) in cases {
            assert_eq!(error.kind(), kind, "{error:?}");
            assert_eq!(error.status_code(), status, "{error:?}");
        }
    }

    #[test]
    fn server_side_detail_is_withheld() {
        let error = RAccountError::Persistence(StoreError::Unavailable("10.0.0.7:5432".into()));
        let body = ErrorBody::from(&error);
        assert_eq!(body.error, "persistence");
        assert_eq!(body.message, "internal server error");

        let body = ErrorBody::from(&RAccountError::EmailConflict);
        assert_eq!(body.error, "conflict");
        assert_eq!(body.message, "email is used by another account");
    }

    #[test]
    fn collaborator_errors_display() {
        assert_eq!(TokenError::Expired.to_string(), "token has expired");
        assert_eq!(CacheError::Timeout.to_string(), "session cache deadline exceeded");
        assert_eq!(
            ConfigError::Missing("JWT_SECRET").to_string(),
            "missing required setting JWT_SECRET"
        );
    }

    #[test]
    fn error_conversion() {
        let result: Result<(), RAccountError> = Err(RAccountError::NotFound);
        match result {
            Err(RAccountError::NotFound) => {}
            _ => panic!("Unexpected result"),
        }
    }
}

#[cfg(feature = "actix")]
mod actix_error_tests {
    use super::*;
    use actix_web::{App, HttpResponse, post, test};

    #[actix_web::test]
    async fn error_response() {
        #[post("/test")]
        async fn test_endpoint() -> Result<HttpResponse, RAccountError> {
            Err(RAccountError::EmailConflict)
        }

        let app = test::init_service(App::new().service(test_endpoint)).await;
        let req = test::TestRequest::post().uri("/test").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), 409);
        let body: ErrorBody = test::read_body_json(resp).await;
        assert_eq!(body.error, "conflict");
    }

    #[actix_web::test]
    async fn persistence_error_response_hides_detail() {
        #[post("/test")]
        async fn test_endpoint() -> Result<HttpResponse, RAccountError> {
            Err(RAccountError::Persistence(StoreError::Unavailable(
                "db-primary down".into(),
            )))
        }

        let app = test::init_service(App::new().service(test_endpoint)).await;
        let req = test::TestRequest::post().uri("/test").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), 500);
        let body: ErrorBody = test::read_body_json(resp).await;
        assert_eq!(body.message, "internal server error");
    }
}
