//! Internal authentication middleware for the coordination API.
//!
//! Enforces INTERNAL_SERVICE_TOKEN when required (production) and allows
//! health/build-info endpoints to remain public. Browsers' `EventSource`
//! cannot set headers, so event streams may also pass the token as an
//! `access_token` query parameter.

use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready};
use actix_web::{Error, ResponseError, web};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use serde::Deserialize;

use crate::config::Settings;
use crate::error::ConstellationError;

/// Query string of an event stream request.
#[derive(Deserialize)]
struct AccessToken {
    access_token: Option<String>,
}

/// Middleware enforcing internal service token authentication.
#[derive(Clone)]
pub struct InternalAuth {
    required: bool,
    token: Option<String>,
}

impl InternalAuth {
    /// Build from service settings.
    pub fn new(settings: &Settings) -> Self {
        Self {
            required: settings.internal_token_required(),
            token: settings.internal_token().map(ToString::to_string),
        }
    }

    /// Build directly from config (used for tests).
    pub fn from_config(required: bool, token: Option<String>) -> Self {
        Self { required, token }
    }

    fn is_public_path(path: &str) -> bool {
        matches!(path, "/health" | "/build-info")
    }

    fn extract_token(req: &ServiceRequest) -> Option<String> {
        let headers = req.headers();

        // Prefer Authorization: Bearer <token>
        if let Some(value) = headers.get("authorization")
            && let Ok(value) = value.to_str()
            && let Some(token) = value.strip_prefix("Bearer ")
        {
            return Some(token.trim().to_string());
        }

        // Fallback: X-Internal-Token header
        if let Some(value) = headers.get("x-internal-token")
            && let Ok(value) = value.to_str()
        {
            return Some(value.trim().to_string());
        }

        if req.path().starts_with("/events/") {
            return web::Query::<AccessToken>::from_query(req.query_string())
                .ok()
                .and_then(|query| query.into_inner().access_token)
                .map(|token| token.trim().to_string());
        }

        None
    }
}

impl<S, B> Transform<S, ServiceRequest> for InternalAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = InternalAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(InternalAuthMiddleware {
            service,
            required: self.required,
            token: self.token.clone(),
        }))
    }
}

pub struct InternalAuthMiddleware<S> {
    service: S,
    required: bool,
    token: Option<String>,
}

impl<S, B> Service<ServiceRequest> for InternalAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if !InternalAuth::is_public_path(req.path()) {
            let provided = InternalAuth::extract_token(&req);
            if !token_accepted(self.required, self.token.as_deref(), provided.as_deref()) {
                tracing::warn!(path = %req.path(), "Rejected unauthenticated request");
                let (req, _pl) = req.into_parts();
                let response = ConstellationError::Unauthorized.error_response();
                return Box::pin(async move {
                    Ok(ServiceResponse::new(req, response.map_into_right_body()))
                });
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
    }
}

/// A presented token must match the configured one. Requests without a
/// token (or without a configured token) pass only when auth is optional.
fn token_accepted(required: bool, expected: Option<&str>, provided: Option<&str>) -> bool {
    match (expected, provided) {
        (Some(expected), Some(provided)) => provided == expected,
        _ => !required,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::{App, HttpResponse, test, web};

    async fn call(auth: InternalAuth, req: test::TestRequest) -> StatusCode {
        let ok = || async { HttpResponse::Ok().finish() };
        let app = test::init_service(
            App::new()
                .wrap(auth)
                .route("/health", web::get().to(ok))
                .route("/events/{address}", web::get().to(ok))
                .route("/transaction/{hash}", web::get().to(ok)),
        )
        .await;
        test::call_service(&app, req.to_request()).await.status()
    }

    fn required() -> InternalAuth {
        InternalAuth::from_config(true, Some("secret".to_string()))
    }

    #[actix_rt::test]
    async fn test_token_accepted() {
        assert!(token_accepted(true, Some("s"), Some("s")));
        assert!(!token_accepted(true, Some("s"), Some("x")));
        assert!(!token_accepted(true, Some("s"), None));
        assert!(!token_accepted(true, None, Some("s")));
        assert!(!token_accepted(false, Some("s"), Some("x")));
        assert!(token_accepted(false, Some("s"), None));
        assert!(token_accepted(false, None, None));
    }

    #[actix_rt::test]
    async fn allows_public_routes_without_token() {
        let req = test::TestRequest::get().uri("/health");
        assert_eq!(call(required(), req).await, StatusCode::OK);
    }

    #[actix_rt::test]
    async fn rejects_missing_token_when_required() {
        let req = test::TestRequest::get().uri("/transaction/abcd");
        assert_eq!(call(required(), req).await, StatusCode::UNAUTHORIZED);
    }

    #[actix_rt::test]
    async fn accepts_bearer_and_header_tokens() {
        let req = test::TestRequest::get()
            .uri("/transaction/abcd")
            .insert_header(("authorization", "Bearer secret"));
        assert_eq!(call(required(), req).await, StatusCode::OK);

        let req = test::TestRequest::get()
            .uri("/transaction/abcd")
            .insert_header(("x-internal-token", "secret"));
        assert_eq!(call(required(), req).await, StatusCode::OK);
    }

    #[actix_rt::test]
    async fn accepts_query_token_on_event_streams_only() {
        let req = test::TestRequest::get().uri("/events/abcd?access_token=secret");
        assert_eq!(call(required(), req).await, StatusCode::OK);

        let req = test::TestRequest::get().uri("/transaction/abcd?access_token=secret");
        assert_eq!(call(required(), req).await, StatusCode::UNAUTHORIZED);
    }

    #[actix_rt::test]
    async fn decodes_percent_encoded_query_token() {
        let auth = || InternalAuth::from_config(true, Some("a+b/c=&d".to_string()));

        let req = test::TestRequest::get().uri("/events/abcd?since=1&access_token=a%2Bb%2Fc%3D%26d");
        assert_eq!(call(auth(), req).await, StatusCode::OK);

        let req = test::TestRequest::get().uri("/events/abcd?access_token=a+b/c=");
        assert_eq!(call(auth(), req).await, StatusCode::UNAUTHORIZED);
    }
}
