use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use contact_form::{ContactForm, Field, Notification};
use contact_relay::{
    app::router,
    config::{MailDispatchConfig, SmtpSettings},
    error::TransportError,
    handler::ContactRelay,
    mailer::{ContactMail, MailTransport, SmtpMailTransport},
};
use googletest::prelude::*;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use test_support::{
    fake_smtp::{
        start_poisoned_smtp_server, unused_port, FakeSmtpServer, POISONED_SMTP_PORT, SMTP_PORT,
    },
    setup_logging,
};
use tokio::net::TcpListener;
use tower::ServiceExt;

const ASHA_JSON: &str =
    r#"{"name":"Asha","email":"asha@example.com","phone":"","message":"Need BIS consult"}"#;

#[derive(Default)]
struct RecordingTransport(Mutex<Vec<ContactMail>>);

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(
        &self,
        _settings: &SmtpSettings,
        mail: ContactMail,
    ) -> std::result::Result<String, TransportError> {
        let count = {
            let mut sent = self.0.lock().unwrap();
            sent.push(mail);
            sent.len()
        };
        Ok(format!("<recorded-{count}@example.com>"))
    }
}

fn config_for_port(port: u16) -> MailDispatchConfig {
    MailDispatchConfig {
        host: "localhost".into(),
        port,
        user: Some("relay@example.com".into()),
        pass: Some("fake SMTP password".into()),
        to_address: "inbox@example.com".into(),
    }
}

fn app(config: MailDispatchConfig, transport: Arc<dyn MailTransport>) -> Router {
    router(Arc::new(ContactRelay::new(config, transport)))
}

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{address}/api/contact")
}

async fn post_json(app: Router, body: &'static str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::post("/api/contact")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[googletest::test]
#[tokio::test]
async fn relays_form_submission_end_to_end() {
    setup_logging();
    let transport = Arc::new(RecordingTransport::default());
    let endpoint = serve(app(config_for_port(465), transport.clone())).await;
    let form = ContactForm::new(endpoint);
    form.update_field(Field::Name, "Asha");
    form.update_field(Field::Email, "asha@example.com");
    form.update_field(Field::Message, "Need BIS consult");

    let notification = form.submit().await;

    expect_that!(notification, ok(matches_pattern!(Notification::Success(anything()))));
    let sent = transport.0.lock().unwrap().clone();
    expect_that!(
        sent,
        elements_are![matches_pattern!(ContactMail {
            from_address: eq("relay@example.com"),
            to: eq("inbox@example.com"),
            reply_to: eq("asha@example.com"),
            subject: eq("New contact from Asha"),
            body: contains_substring("Need BIS consult"),
        })]
    );
}

#[googletest::test]
#[tokio::test]
async fn form_shows_configuration_error_from_relay() {
    let config = MailDispatchConfig {
        pass: None,
        ..config_for_port(465)
    };
    let endpoint = serve(app(config, Arc::new(RecordingTransport::default()))).await;
    let form = ContactForm::new(endpoint);
    form.update_field(Field::Name, "Asha");
    form.update_field(Field::Email, "asha@example.com");
    form.update_field(Field::Message, "Need BIS consult");

    let notification = form.submit().await;

    expect_that!(
        notification,
        ok(eq(Notification::Failure(
            "Email is not configured. Set SMTP_USER and SMTP_PASS.".into()
        )))
    );
    expect_that!(form.draft().name, eq("Asha"));
}

#[googletest::test]
#[tokio::test]
async fn delivers_mail_through_smtp_server() {
    setup_logging();
    let smtp_server = FakeSmtpServer::new();
    smtp_server.start();

    let (status, body) = post_json(
        app(
            config_for_port(SMTP_PORT),
            Arc::new(SmtpMailTransport::new().dangerous_accept_invalid_certs()),
        ),
        ASHA_JSON,
    )
    .await;

    expect_that!(status, eq(StatusCode::OK));
    expect_that!(body["success"].as_bool(), some(eq(true)));
    let message_id = body["messageId"].as_str().unwrap_or_default().to_string();
    expect_that!(message_id, ends_with("@example.com>"));
    expect_that!(
        smtp_server.last_mail_content().await,
        some(all!(
            contains_substring("From: \"Website Contact\" <relay@example.com>"),
            contains_substring("To: inbox@example.com"),
            contains_substring("Reply-To: asha@example.com"),
            contains_substring("Subject: New contact from Asha"),
            contains_substring(format!("Message-ID: {message_id}")),
            contains_substring("Need BIS consult")
        ))
    );
    expect_that!(
        smtp_server.logins(),
        elements_are![eq((
            "relay@example.com".to_string(),
            "fake SMTP password".to_string()
        ))]
    );
}

#[googletest::test]
#[tokio::test]
async fn returns_500_when_smtp_server_rejects_session() {
    setup_logging();
    start_poisoned_smtp_server();

    let (status, body) = post_json(
        app(
            config_for_port(POISONED_SMTP_PORT),
            Arc::new(SmtpMailTransport::new()),
        ),
        ASHA_JSON,
    )
    .await;

    expect_that!(status, eq(StatusCode::INTERNAL_SERVER_ERROR));
    expect_that!(body["error"].as_str(), some(eq("Failed to send email.")));
}

#[googletest::test]
#[tokio::test]
async fn returns_500_when_smtp_server_is_unreachable() {
    let (status, body) = post_json(
        app(config_for_port(unused_port()), Arc::new(SmtpMailTransport::new())),
        ASHA_JSON,
    )
    .await;

    expect_that!(status, eq(StatusCode::INTERNAL_SERVER_ERROR));
    expect_that!(body["error"].as_str(), some(eq("Failed to send email.")));
}

#[googletest::test]
#[tokio::test]
async fn does_not_contact_smtp_server_for_invalid_submission() {
    let (status, body) = post_json(
        app(config_for_port(unused_port()), Arc::new(SmtpMailTransport::new())),
        r#"{"name":"","email":"a@b.com","message":"hi"}"#,
    )
    .await;

    expect_that!(status, eq(StatusCode::BAD_REQUEST));
    expect_that!(
        body["error"].as_str(),
        some(eq("Please provide name, email, and message."))
    );
}
