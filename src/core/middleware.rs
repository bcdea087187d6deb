use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use super::app_error::AppError;
use crate::api::identity::TokenVerifier;

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Verifies the bearer credential on guarded routes and attaches the
/// resulting identity as a request extension. Requests without a credential
/// are rejected before any handler runs.
pub async fn authorization(
    State(verifier): State<Arc<dyn TokenVerifier>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&req)
        .ok_or_else(|| AppError::Unauthorized("Missing bearer credentials".into()))?
        .to_owned();

    let identity = verifier.verify(&token).await?;
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::identity::AuthIdentity;
    use axum::{
        Extension, Router,
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        routing,
    };
    use tower::ServiceExt;

    struct StaticVerifier {
        email: &'static str,
    }

    #[async_trait::async_trait]
    impl TokenVerifier for StaticVerifier {
        async fn verify(&self, token: &str) -> Result<AuthIdentity, AppError> {
            if token == "valid-token" {
                Ok(AuthIdentity {
                    email: self.email.to_string(),
                })
            } else {
                Err(AppError::Unauthorized("Invalid access token".into()))
            }
        }
    }

    async fn whoami(Extension(identity): Extension<AuthIdentity>) -> String {
        identity.email
    }

    fn app() -> Router {
        let verifier: Arc<dyn TokenVerifier> = Arc::new(StaticVerifier {
            email: "reader@example.com",
        });

        Router::new()
            .route("/whoami", routing::get(whoami))
            .route_layer(axum::middleware::from_fn_with_state(verifier, authorization))
    }

    #[tokio::test]
    async fn missing_credentials_are_rejected() {
        let res = app()
            .oneshot(HttpRequest::get("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_token_is_rejected() {
        let req = HttpRequest::get("/whoami")
            .header("authorization", "Bearer bogus")
            .body(Body::empty())
            .unwrap();
        let res = app().oneshot(req).await.unwrap();

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn verified_identity_is_injected() {
        let req = HttpRequest::get("/whoami")
            .header("authorization", "Bearer valid-token")
            .body(Body::empty())
            .unwrap();
        let res = app().oneshot(req).await.unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let body = axum::body::to_bytes(res.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"reader@example.com");
    }
}
