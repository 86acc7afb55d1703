use crate::{
    config::MailDispatchConfig,
    error::RelayError,
    mailer::{ContactMail, MailTransport},
    submission::{BodyFormat, ContactSubmission, RawFields},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Relays contact form submissions to the configured inbox.
///
/// Holds no mutable state, so one instance is shared by all requests.
pub struct ContactRelay {
    config: MailDispatchConfig,
    transport: Arc<dyn MailTransport>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReceipt {
    pub success: bool,
    pub message_id: String,
}

impl ContactRelay {
    pub fn new(config: MailDispatchConfig, transport: Arc<dyn MailTransport>) -> Self {
        Self { config, transport }
    }

    pub async fn handle(
        &self,
        content_type: Option<&str>,
        body: &[u8],
    ) -> Result<DispatchReceipt, RelayError> {
        let format = BodyFormat::from_content_type(content_type);
        let fields = RawFields::parse_lenient(format, body);
        self.relay(&fields).await
    }

    pub async fn relay(&self, fields: &RawFields) -> Result<DispatchReceipt, RelayError> {
        let submission = ContactSubmission::validate(fields)?;
        let settings = self
            .config
            .smtp_settings()
            .ok_or(RelayError::MissingCredentials)?;
        let mail = ContactMail::compose(&submission, &settings, &self.config.to_address);
        let message_id = self
            .transport
            .send(&settings, mail)
            .await
            .map_err(RelayError::Dispatch)?;
        info!("Relayed contact form message {message_id}");
        Ok(DispatchReceipt {
            success: true,
            message_id,
        })
    }
}
