use crate::handler::ContactRelay;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub const CONTACT_PATH: &str = "/api/contact";

const LANDING_PAGE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/index.html"));

pub fn router(relay: Arc<ContactRelay>) -> Router {
    Router::new()
        .route("/", get(landing_page))
        .route(CONTACT_PATH, post(submit_contact_form))
        .layer(TraceLayer::new_for_http())
        .with_state(relay)
}

async fn landing_page() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

async fn submit_contact_form(
    State(relay): State<Arc<ContactRelay>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    match relay.handle(content_type, &body).await {
        Ok(receipt) => (
            StatusCode::OK,
            [(header::CACHE_CONTROL, "no-store")],
            Json(receipt),
        )
            .into_response(),
        Err(error) => {
            error.log();
            error.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::router;
    use crate::{
        config::MailDispatchConfig, handler::test_support::FakeMailTransport,
        handler::ContactRelay,
    };
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use googletest::prelude::*;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(transport: FakeMailTransport) -> axum::Router {
        let config = MailDispatchConfig {
            host: "smtp.example.com".into(),
            port: 465,
            user: Some("relay@example.com".into()),
            pass: Some("secret".into()),
            to_address: "inbox@example.com".into(),
        };
        router(Arc::new(ContactRelay::new(config, Arc::new(transport))))
    }

    fn contact_request(content_type: &'static str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/contact")
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[googletest::test]
    #[tokio::test]
    async fn serves_landing_page() {
        let response = app(FakeMailTransport::default())
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        expect_that!(response.status(), eq(StatusCode::OK));
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        expect_that!(
            String::from_utf8_lossy(&body).to_string(),
            all!(
                contains_substring("Get In Touch"),
                contains_substring("/api/contact")
            )
        );
    }

    #[googletest::test]
    #[tokio::test]
    async fn returns_message_id_on_success() {
        let response = app(FakeMailTransport::default())
            .oneshot(contact_request(
                "application/json",
                r#"{"name":"Asha","email":"asha@example.com","phone":"","message":"Need BIS consult"}"#,
            ))
            .await
            .unwrap();

        expect_that!(response.status(), eq(StatusCode::OK));
        expect_that!(
            response.headers().get(header::CACHE_CONTROL),
            some(eq("no-store"))
        );
        let body = json_body(response).await;
        expect_that!(body["success"].as_bool(), some(eq(true)));
        expect_that!(body["messageId"].as_str(), some(not(eq(""))));
    }

    #[googletest::test]
    #[tokio::test]
    async fn returns_400_for_missing_fields() {
        let response = app(FakeMailTransport::default())
            .oneshot(contact_request(
                "application/json",
                r#"{"name":"","email":"a@b.com","message":"hi"}"#,
            ))
            .await
            .unwrap();

        expect_that!(response.status(), eq(StatusCode::BAD_REQUEST));
        expect_that!(
            response.headers().get(header::CONTENT_TYPE),
            some(eq("application/json"))
        );
        let body = json_body(response).await;
        expect_that!(
            body["error"].as_str(),
            some(eq("Please provide name, email, and message."))
        );
    }

    #[googletest::test]
    #[tokio::test]
    async fn returns_500_when_sending_fails() {
        let response = app(FakeMailTransport::failing())
            .oneshot(contact_request(
                "application/x-www-form-urlencoded",
                "name=Asha&email=asha%40example.com&message=hi",
            ))
            .await
            .unwrap();

        expect_that!(response.status(), eq(StatusCode::INTERNAL_SERVER_ERROR));
        let body = json_body(response).await;
        expect_that!(body["error"].as_str(), some(eq("Failed to send email.")));
    }

    #[googletest::test]
    #[tokio::test]
    async fn does_not_accept_get_on_contact_endpoint() {
        let response = app(FakeMailTransport::default())
            .oneshot(Request::get("/api/contact").body(Body::empty()).unwrap())
            .await
            .unwrap();

        expect_that!(response.status(), eq(StatusCode::METHOD_NOT_ALLOWED));
    }
}
