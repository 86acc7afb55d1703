use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

pub const MISSING_FIELDS_MESSAGE: &str = "Please provide name, email, and message.";
pub const MISSING_CREDENTIALS_MESSAGE: &str =
    "Email is not configured. Set SMTP_USER and SMTP_PASS.";
pub const DISPATCH_FAILURE_MESSAGE: &str = "Failed to send email.";

/// Reasons for which a submission is not relayed. The `Display` output is
/// what the caller sees; transport details stay in the source chain.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{}", MISSING_FIELDS_MESSAGE)]
    MissingFields,
    #[error("{}", MISSING_CREDENTIALS_MESSAGE)]
    MissingCredentials,
    #[error("{}", DISPATCH_FAILURE_MESSAGE)]
    Dispatch(#[source] TransportError),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("Error building message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("Error sending message: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MissingFields | RelayError::MissingCredentials => StatusCode::BAD_REQUEST,
            RelayError::Dispatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn log(&self) {
        match self {
            RelayError::MissingFields => {
                warn!("Client error relaying contact form message: missing required fields");
            }
            RelayError::MissingCredentials => {
                warn!("Contact form message not relayed: SMTP_USER or SMTP_PASS is not set");
            }
            RelayError::Dispatch(source) => {
                error!("Internal error relaying contact form message: {source}");
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        (
            status,
            [(header::CACHE_CONTROL, "no-store")],
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
