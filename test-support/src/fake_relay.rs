use axum::{
    extract::{Json, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use log::debug;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

const CONTACT_PATH: &str = "/api/contact";

/// Stands in for the contact relay endpoint. Records every submission and
/// answers with a configurable response.
#[derive(Clone)]
pub struct FakeRelay {
    status: StatusCode,
    body: Option<Value>,
    received: Arc<Mutex<Vec<Value>>>,
}

impl FakeRelay {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            body: Some(json!({"success": true, "messageId": "<fake@relay.test>"})),
            received: Default::default(),
        }
    }

    pub fn respond_with_error(self, status: u16, error: impl AsRef<str>) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap(),
            body: Some(json!({"error": error.as_ref()})),
            ..self
        }
    }

    pub fn respond_with_body(self, status: u16, body: Value) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap(),
            body: Some(body),
            ..self
        }
    }

    pub fn return_invalid_response(self, status: u16) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap(),
            body: None,
            ..self
        }
    }

    /// Listens on an ephemeral local port and returns the endpoint URL.
    pub async fn serve(&self) -> String {
        let app = Router::new()
            .route(CONTACT_PATH, post(contact))
            .with_state(self.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{address}{CONTACT_PATH}")
    }

    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }
}

impl Default for FakeRelay {
    fn default() -> Self {
        Self::new()
    }
}

async fn contact(State(state): State<FakeRelay>, Json(payload): Json<Value>) -> Response {
    debug!("Fake relay received {payload}");
    state.received.lock().unwrap().push(payload);
    match state.body {
        Some(body) => (state.status, Json(body)).into_response(),
        None => (
            state.status,
            [(header::CONTENT_TYPE, "text/plain")],
            "Invalid response",
        )
            .into_response(),
    }
}

/// Address on which nothing accepts connections, for exercising network
/// failures.
pub fn unreachable_endpoint() -> String {
    format!(
        "http://127.0.0.1:{}{CONTACT_PATH}",
        crate::fake_smtp::unused_port()
    )
}
