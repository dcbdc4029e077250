use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{Map, Value};
use switchboard_core::errors::InterfaceError;
use switchboard_slack::{RequestMethod, SlackApp, WebhookError, WebhookRequest, WebhookResponse};
use tracing::warn;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct WebhookState {
    app: Arc<SlackApp>,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    correlation_id: &'a str,
}

pub fn router(app: Arc<SlackApp>) -> Router {
    Router::new()
        .route("/slack", any(webhook))
        .route("/slack/oauth", get(webhook))
        .route("/slack/events", post(webhook))
        .with_state(WebhookState { app })
}

async fn webhook(
    State(state): State<WebhookState>,
    method: Method,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let correlation_id = correlation_id(&headers);

    let body = if method == Method::POST {
        match decode_body(&headers, &body) {
            Ok(body) => body,
            Err(message) => {
                return error_response(InterfaceError::BadRequest { message, correlation_id });
            }
        }
    } else {
        Value::Null
    };

    let request = WebhookRequest::new(RequestMethod::parse(method.as_str()), query, body)
        .with_correlation_id(correlation_id.clone());

    match state.app.handle(request).await {
        Ok(WebhookResponse::Redirect(location)) => {
            (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
        }
        Ok(WebhookResponse::Challenge(challenge)) => (StatusCode::OK, challenge).into_response(),
        Ok(WebhookResponse::Reply(body)) => (StatusCode::OK, Json(body)).into_response(),
        Ok(WebhookResponse::Ack) => StatusCode::OK.into_response(),
        Err(error) => rejected(error, &correlation_id),
    }
}

fn rejected(error: WebhookError, correlation_id: &str) -> Response {
    warn!(
        event_name = "http.webhook.rejected",
        correlation_id,
        error = %error,
        "webhook request rejected"
    );
    error_response(error.into_interface(correlation_id))
}

fn error_response(error: InterfaceError) -> Response {
    let status = match &error {
        InterfaceError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
    };
    let body = ErrorBody { error: error.user_message(), correlation_id: error.correlation_id() };
    (status, Json(body)).into_response()
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Slack posts slash commands, outgoing webhooks and interactive messages as
/// form bodies and Events API callbacks as JSON.
fn decode_body(headers: &HeaderMap, body: &[u8]) -> Result<Value, String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }

    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));

    if is_form {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)
            .map_err(|e| format!("form body could not be decoded: {e}"))?;
        Ok(Value::Object(pairs.into_iter().map(|(k, v)| (k, Value::String(v))).collect()))
    } else {
        serde_json::from_slice(body).map_err(|e| format!("json body could not be decoded: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use switchboard_db::InMemoryAuthorizationStore;
    use switchboard_slack::client::{ClientError, OAuthQuery, SlackApi};
    use switchboard_slack::{AppSettings, HandlerRegistry, Notification, SlackApp};
    use tower::ServiceExt;

    use super::router;

    struct StubSlackApi;

    #[async_trait]
    impl SlackApi for StubSlackApi {
        fn auth_url(&self, query: &OAuthQuery) -> String {
            format!("https://slack.test/authorize?state={}", query.state.as_deref().unwrap_or(""))
        }

        async fn install(&self, _query: &OAuthQuery) -> Result<Value, ClientError> {
            Err(ClientError::Decode("install disabled".to_string()))
        }

        async fn call(
            &self,
            _method: &str,
            _token: Option<&str>,
            _body: &Value,
        ) -> Result<Value, ClientError> {
            Ok(json!({ "ok": true }))
        }

        async fn post_response(&self, _url: &str, _body: &Value) -> Result<(), ClientError> {
            Ok(())
        }
    }

    fn test_router(hits: Arc<AtomicUsize>) -> Router {
        let mut registry = HandlerRegistry::new();
        registry.on("approve", move |_, _| {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        registry.on("/status", |notification: Arc<Notification>, _| async move {
            if let Some(bot) = notification.bot() {
                bot.respond(json!({ "text": "all green", "response_type": "ephemeral" }));
            }
            Ok(())
        });
        let settings = AppSettings {
            verification_token: Some("secret".to_string().into()),
            ignore_bots: false,
            install_redirect_url: "https://example.com/installed".to_string(),
        };
        let app = SlackApp::new(
            registry,
            Arc::new(InMemoryAuthorizationStore::default()),
            Arc::new(StubSlackApi),
            settings,
        );
        router(Arc::new(app))
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn post_form(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_owned()))
            .expect("request")
    }

    #[tokio::test]
    async fn url_verification_echoes_challenge_as_plain_text() {
        let router = test_router(Arc::default());
        let request = post_json(
            "/slack",
            json!({ "token": "secret", "type": "url_verification", "challenge": "abc" }),
        );

        let response = router.oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "abc");
    }

    #[tokio::test]
    async fn wrong_token_is_unauthorized() {
        let router = test_router(Arc::default());
        let request =
            post_json("/slack/events", json!({ "token": "nope", "type": "event_callback" }));

        let response = router.oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body: Value = serde_json::from_str(&body_text(response).await).expect("json");
        assert_eq!(body["error"], "[401] Unauthorized");
    }

    #[tokio::test]
    async fn interactive_form_body_is_dispatched() {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = test_router(hits.clone());
        let inner = json!({ "token": "secret", "callback_id": "approve", "team": { "id": "T1" } });
        let form = serde_urlencoded::to_string([("payload", inner.to_string())]).expect("form");

        let response = router.oneshot(post_form("/slack", &form)).await.expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slash_command_reply_is_returned_as_json() {
        let router = test_router(Arc::default());

        let response = router
            .oneshot(post_form("/slack", "token=secret&command=%2Fstatus&team_id=T1"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_text(response).await).expect("json");
        assert_eq!(body, json!({ "text": "all green", "response_type": "ephemeral" }));
    }

    #[tokio::test]
    async fn oauth_request_without_code_redirects_to_authorization() {
        let router = test_router(Arc::default());
        let request = Request::builder()
            .uri("/slack/oauth?state=s1")
            .body(Body::empty())
            .expect("request");

        let response = router.oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).and_then(|v| v.to_str().ok()),
            Some("https://slack.test/authorize?state=s1")
        );
    }

    #[tokio::test]
    async fn failed_install_redirects_with_error_report() {
        let router = test_router(Arc::default());
        let request =
            Request::builder().uri("/slack?code=C&state=s1").body(Body::empty()).expect("request");

        let response = router.oneshot(request).await.expect("response");

        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .expect("location")
            .to_owned();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert!(location.starts_with("https://example.com/installed?state=s1&error="));
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let router = test_router(Arc::default());
        let request = Request::builder()
            .method("POST")
            .uri("/slack")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-request-id", "req-42")
            .body(Body::from("{not json"))
            .expect("request");

        let response = router.oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_str(&body_text(response).await).expect("json");
        assert_eq!(body["correlation_id"], "req-42");
    }

    #[tokio::test]
    async fn unsupported_method_on_unified_route_is_rejected() {
        let router = test_router(Arc::default());
        let request =
            Request::builder().method("PUT").uri("/slack").body(Body::empty()).expect("request");

        let response = router.oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
