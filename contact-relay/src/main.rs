use anyhow::Context;
use contact_relay::{
    app::router,
    config::{MailDispatchConfig, ServerSettings},
    handler::ContactRelay,
    mailer::SmtpMailTransport,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .without_time()
        .init();

    let mail_config = MailDispatchConfig::from_env().context("Invalid mail configuration")?;
    let server_settings = ServerSettings::from_env().context("Invalid server configuration")?;
    if mail_config.smtp_settings().is_none() {
        warn!("SMTP_USER or SMTP_PASS is not set; contact form messages will be rejected");
    }
    info!(
        "Relaying contact form messages to {} via {}:{}",
        mail_config.to_address, mail_config.host, mail_config.port
    );

    let relay = Arc::new(ContactRelay::new(mail_config, Arc::new(SmtpMailTransport::new())));
    let listener = TcpListener::bind(server_settings.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", server_settings.bind_address))?;
    info!("Listening on {}", server_settings.bind_address);
    axum::serve(listener, router(relay))
        .await
        .context("Server error")?;
    Ok(())
}
