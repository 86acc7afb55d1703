//! Client side of the contact form: holds the draft the user is typing,
//! submits it to the relay endpoint and turns the outcome into a notification.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, MutexGuard, PoisonError,
};
use thiserror::Error;
use tracing::{debug, warn};

pub const SUCCESS_MESSAGE: &str = "Message sent successfully!";
pub const FALLBACK_FAILURE_MESSAGE: &str = "Failed to send message. Please try again.";

/// The values the user has entered but not yet sent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ContactDraft {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Name,
    Email,
    Phone,
    Message,
}

/// Transient feedback shown to the user after a submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    Success(String),
    Failure(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("A submission from this form is already in flight")]
    AlreadySending,
}

#[derive(Deserialize)]
struct RelayReply {
    error: Option<String>,
}

pub struct ContactForm {
    endpoint: String,
    client: Client,
    draft: Mutex<ContactDraft>,
    sending: AtomicBool,
}

impl ContactForm {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(endpoint, Client::new())
    }

    pub fn with_client(endpoint: impl Into<String>, client: Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
            draft: Default::default(),
            sending: AtomicBool::new(false),
        }
    }

    /// Stores `value` as-is. Nothing is validated until the relay sees it.
    pub fn update_field(&self, field: Field, value: impl Into<String>) {
        let mut draft = self.lock_draft();
        let slot = match field {
            Field::Name => &mut draft.name,
            Field::Email => &mut draft.email,
            Field::Phone => &mut draft.phone,
            Field::Message => &mut draft.message,
        };
        *slot = value.into();
    }

    pub fn draft(&self) -> ContactDraft {
        self.lock_draft().clone()
    }

    /// Whether the submit control should currently be disabled.
    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::Acquire)
    }

    /// Sends the current draft. Only one submission may be in flight per form;
    /// there is no timeout and no retry.
    pub async fn submit(&self) -> Result<Notification, SubmitError> {
        let _sending = SendingGuard::acquire(&self.sending)?;
        let draft = self.draft();
        Ok(match self.post(&draft).await {
            Ok(()) => {
                *self.lock_draft() = ContactDraft::default();
                Notification::Success(SUCCESS_MESSAGE.into())
            }
            Err(message) => Notification::Failure(message),
        })
    }

    async fn post(&self, draft: &ContactDraft) -> Result<(), String> {
        let response = match self.client.post(&self.endpoint).json(draft).send().await {
            Ok(response) => response,
            Err(error) => {
                warn!("Could not reach contact relay at {}: {error}", self.endpoint);
                return Err(FALLBACK_FAILURE_MESSAGE.into());
            }
        };
        let status = response.status();
        let reply = match response.json::<RelayReply>().await {
            Ok(reply) => reply,
            Err(error) => {
                warn!("Contact relay answered {status} with an unreadable body: {error}");
                return Err(FALLBACK_FAILURE_MESSAGE.into());
            }
        };
        match reply.error {
            None if status.is_success() => {
                debug!("Contact relay accepted the message");
                Ok(())
            }
            Some(error) => Err(error),
            None => Err(FALLBACK_FAILURE_MESSAGE.into()),
        }
    }

    fn lock_draft(&self) -> MutexGuard<'_, ContactDraft> {
        self.draft.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds the sending flag for the lifetime of one submission, including one
/// whose future is dropped before completion.
struct SendingGuard<'a>(&'a AtomicBool);

impl<'a> SendingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, SubmitError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SubmitError::AlreadySending)?;
        Ok(Self(flag))
    }
}

impl Drop for SendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
