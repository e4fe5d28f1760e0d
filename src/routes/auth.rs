use axum::{body::Body, http::Request, middleware::Next, response::Response};

use crate::{error::AppError, services::identity::Identity};

const USER_ID_HEADER: &str = "x-user-id";
const USER_EMAIL_HEADER: &str = "x-user-email";

/// Attach the caller [`Identity`] forwarded by the auth proxy, rejecting anonymous requests.
pub async fn require_identity(mut req: Request<Body>, next: Next) -> Result<Response, AppError> {
    let subject = header(&req, USER_ID_HEADER)
        .ok_or_else(|| AppError::Unauthorized("missing identity header `X-User-Id`".into()))?;
    let email = header(&req, USER_EMAIL_HEADER);

    req.extensions_mut().insert(Identity { subject, email });
    Ok(next.run(req).await)
}

fn header(req: &Request<Body>, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| value.to_owned())
}

#[cfg(test)]
mod tests {
    use axum::{Extension, Router, http::StatusCode, middleware, routing::get};
    use tower::ServiceExt;

    use super::*;

    async fn whoami(Extension(identity): Extension<Identity>) -> String {
        format!("{}|{}", identity.subject, identity.email.unwrap_or_default())
    }

    fn app() -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .route_layer(middleware::from_fn(require_identity))
    }

    #[tokio::test]
    async fn anonymous_requests_are_rejected() {
        let response = app()
            .oneshot(Request::get("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn identity_headers_reach_the_handler() {
        let request = Request::get("/whoami")
            .header("X-User-Id", "auth|ada")
            .header("X-User-Email", "ada@example.com")
            .body(Body::empty())
            .unwrap();

        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"auth|ada|ada@example.com");
    }
}
