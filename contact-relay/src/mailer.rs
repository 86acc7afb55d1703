use crate::{config::SmtpSettings, error::TransportError, submission::ContactSubmission};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;
use uuid::Uuid;

const FROM_DISPLAY_NAME: &str = "Website Contact";

/// The email which is relayed for one contact form submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContactMail {
    pub from_name: String,
    pub from_address: String,
    pub to: String,
    pub reply_to: String,
    pub subject: String,
    pub body: String,
}

impl ContactMail {
    /// The sender is always the authenticated SMTP user. The submitter only
    /// appears as `Reply-To`.
    pub fn compose(submission: &ContactSubmission, settings: &SmtpSettings, to: &str) -> Self {
        let ContactSubmission {
            name,
            email,
            phone,
            message,
        } = submission;
        Self {
            from_name: FROM_DISPLAY_NAME.into(),
            from_address: settings.user.clone(),
            to: to.into(),
            reply_to: email.clone(),
            subject: format!("New contact from {name}"),
            body: format!("Name: {name}\nEmail: {email}\nPhone: {phone}\n\nMessage:\n{message}"),
        }
    }

    fn into_message(self, message_id: String) -> Result<Message, TransportError> {
        let from = Mailbox::new(Some(self.from_name), self.from_address.parse()?);
        let to: Mailbox = self.to.parse()?;
        let reply_to: Mailbox = self.reply_to.parse()?;
        Ok(Message::builder()
            .from(from)
            .to(to)
            .reply_to(reply_to)
            .subject(self.subject)
            .message_id(Some(message_id))
            .header(ContentType::TEXT_PLAIN)
            .body(self.body)?)
    }
}

/// Something which can deliver a [`ContactMail`] given SMTP settings.
///
/// Returns the opaque identifier under which the message was accepted.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(
        &self,
        settings: &SmtpSettings,
        mail: ContactMail,
    ) -> Result<String, TransportError>;
}

/// Sends through a real SMTP server. A fresh client is built for every
/// message and dropped afterwards.
///
/// Port 465 gets TLS from the first byte, any other port upgrades with
/// STARTTLS when the server offers it.
#[derive(Clone, Copy, Debug, Default)]
pub struct SmtpMailTransport {
    accept_invalid_certs: bool,
}

impl SmtpMailTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trusts any certificate the SMTP server presents. Only for talking to
    /// local test servers with self-signed certificates.
    pub fn dangerous_accept_invalid_certs(self) -> Self {
        Self {
            accept_invalid_certs: true,
        }
    }

    fn tls(&self, settings: &SmtpSettings) -> Result<Tls, TransportError> {
        let parameters = TlsParameters::builder(settings.host.clone())
            .dangerous_accept_invalid_certs(self.accept_invalid_certs)
            .build()?;
        Ok(if settings.secure {
            Tls::Wrapper(parameters)
        } else {
            Tls::Opportunistic(parameters)
        })
    }

    fn build_transport(
        &self,
        settings: &SmtpSettings,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, TransportError> {
        Ok(
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
                .tls(self.tls(settings)?)
                .port(settings.port)
                .credentials(Credentials::new(
                    settings.user.clone(),
                    settings.pass.clone(),
                ))
                .build(),
        )
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(
        &self,
        settings: &SmtpSettings,
        mail: ContactMail,
    ) -> Result<String, TransportError> {
        let message_id = new_message_id(&settings.user);
        let message = mail.into_message(message_id.clone())?;
        let transport = self.build_transport(settings)?;
        info!(
            "Relaying contact form message via {}:{} (implicit TLS: {})",
            settings.host, settings.port, settings.secure
        );
        let response = transport.send(message).await?;
        info!(
            "SMTP server accepted message {message_id} with code {}",
            response.code()
        );
        Ok(message_id)
    }
}

/// Builds a `Message-ID` in the domain of the sending account. SMTP user names
/// which are not addresses get `localhost`.
fn new_message_id(smtp_user: &str) -> String {
    let domain = smtp_user
        .parse::<Address>()
        .map(|address| address.domain().to_owned())
        .unwrap_or_else(|_| "localhost".into());
    format!("<{}@{domain}>", Uuid::new_v4())
}
