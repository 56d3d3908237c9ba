//! Per-request tenancy context. Every API route is scoped to an
//! organization via the `X-Org-Id` header; `X-Actor-Id` identifies the
//! acting user for audit fields and defaults to `system` when absent.

use axum::extract::FromRequestParts;
use axum::http::{request::Parts, StatusCode};
use axum::Json;
use serde_json::json;

pub const ORG_HEADER: &str = "x-org-id";
pub const ACTOR_HEADER: &str = "x-actor-id";

#[derive(Clone, Debug)]
pub struct RequestContext {
    pub org_id: String,
    pub actor_id: String,
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let org_id = header_value(parts, ORG_HEADER).ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("missing required header `{ORG_HEADER}`") })),
            )
        })?;
        let actor_id =
            header_value(parts, ACTOR_HEADER).unwrap_or_else(|| "system".to_string());
        Ok(Self { org_id, actor_id })
    }
}

#[cfg(test)]
mod tests {
    use axum::extract::FromRequestParts;
    use axum::http::{Request, StatusCode};

    use super::RequestContext;

    fn parts(builder: axum::http::request::Builder) -> axum::http::request::Parts {
        builder.body(()).expect("request").into_parts().0
    }

    #[tokio::test]
    async fn extracts_org_and_actor_headers() {
        let mut parts =
            parts(Request::builder().header("X-Org-Id", "org-1").header("X-Actor-Id", "user-7"));
        let context = RequestContext::from_request_parts(&mut parts, &())
            .await
            .expect("headers present");
        assert_eq!(context.org_id, "org-1");
        assert_eq!(context.actor_id, "user-7");
    }

    #[tokio::test]
    async fn actor_defaults_to_system() {
        let mut parts = parts(Request::builder().header("X-Org-Id", "org-1"));
        let context =
            RequestContext::from_request_parts(&mut parts, &()).await.expect("org present");
        assert_eq!(context.actor_id, "system");
    }

    #[tokio::test]
    async fn missing_org_header_is_rejected() {
        let mut parts = parts(Request::builder());
        let (status, _) = RequestContext::from_request_parts(&mut parts, &())
            .await
            .expect_err("org header is required");
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn blank_org_header_is_rejected() {
        let mut parts = parts(Request::builder().header("X-Org-Id", "   "));
        let result = RequestContext::from_request_parts(&mut parts, &()).await;
        assert!(result.is_err());
    }
}
