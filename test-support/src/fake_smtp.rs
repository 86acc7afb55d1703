use log::debug;
use mailin_embedded::{AuthMechanism, Handler, Server, SslConfig};
use std::{
    net::{IpAddr, TcpListener, TcpStream},
    sync::{Arc, Mutex, Once},
    time::Duration,
};
use tokio::{
    sync::watch::{self, Receiver, Sender},
    time::timeout,
};

pub const SMTP_PORT: u16 = 4567;
pub const POISONED_SMTP_PORT: u16 = 4568;

#[derive(Clone)]
struct SmtpHandler {
    data: Vec<u8>,
    mail_sender: Arc<Sender<String>>,
    logins: Arc<Mutex<Vec<(String, String)>>>,
}

impl Handler for SmtpHandler {
    fn data(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.data.extend(buf);
        Ok(())
    }

    fn data_end(&mut self) -> mailin_embedded::Response {
        let content = String::from_utf8_lossy(&self.data).into_owned();
        self.data.clear();
        debug!("Got mail:\n{content}");
        let _ = self.mail_sender.send(content);
        mailin_embedded::response::OK
    }

    fn auth_plain(
        &mut self,
        _authorization_id: &str,
        authentication_id: &str,
        password: &str,
    ) -> mailin_embedded::Response {
        debug!("Got login for {authentication_id}");
        self.logins
            .lock()
            .unwrap()
            .push((authentication_id.into(), password.into()));
        mailin_embedded::response::AUTH_OK
    }
}

/// SMTP server on [`SMTP_PORT`] which offers STARTTLS with a self-signed
/// certificate, accepts any PLAIN login and keeps every mail it receives.
///
/// Clients have to accept invalid certificates to talk to it.
pub struct FakeSmtpServer {
    server: Mutex<Option<Server<SmtpHandler>>>,
    mail_receiver: tokio::sync::Mutex<Receiver<String>>,
    logins: Arc<Mutex<Vec<(String, String)>>>,
}

impl FakeSmtpServer {
    pub fn new() -> Self {
        install_crypto_provider();
        let (mail_sender, mail_receiver) = watch::channel(String::new());
        let logins = Arc::new(Mutex::new(Vec::new()));
        let handler = SmtpHandler {
            data: Vec::new(),
            mail_sender: Arc::new(mail_sender),
            logins: logins.clone(),
        };

        let certificate = rcgen::generate_simple_self_signed(vec!["localhost".to_string()])
            .expect("Could not generate certificate for fake SMTP server");
        let certificate_dir = tempfile::tempdir().unwrap();
        let cert_path = certificate_dir.path().join("cert.pem");
        let key_path = certificate_dir.path().join("key.pem");
        std::fs::write(&cert_path, certificate.cert.pem()).unwrap();
        std::fs::write(&key_path, certificate.key_pair.serialize_pem()).unwrap();

        let mut server = Server::new(handler);
        server
            .with_name("contact-relay.test")
            .with_ssl(SslConfig::SelfSigned {
                cert_path: cert_path.to_string_lossy().into_owned(),
                key_path: key_path.to_string_lossy().into_owned(),
            })
            .unwrap()
            .with_auth(AuthMechanism::Plain)
            .with_addr(format!("127.0.0.1:{SMTP_PORT}"))
            .unwrap();
        Self {
            server: Mutex::new(Some(server)),
            mail_receiver: tokio::sync::Mutex::new(mail_receiver),
            logins,
        }
    }

    pub fn start(&self) {
        let mut guard = self.server.lock().unwrap();
        if let Some(server) = guard.take() {
            std::thread::spawn(move || {
                let _ = server.serve();
            });
            wait_until_listening(SMTP_PORT);
        }
    }

    /// Waits for the next mail to arrive and returns it as transmitted, or
    /// `None` if nothing arrives within a few seconds.
    pub async fn last_mail_content(&self) -> Option<String> {
        let mut receiver = self.mail_receiver.lock().await;
        match timeout(Duration::from_secs(5), receiver.changed()).await {
            Ok(Ok(())) => Some(receiver.borrow_and_update().clone()),
            _ => None,
        }
    }

    /// Username and password pairs from every successful login.
    pub fn logins(&self) -> Vec<(String, String)> {
        self.logins.lock().unwrap().clone()
    }
}

impl Default for FakeSmtpServer {
    fn default() -> Self {
        Self::new()
    }
}

// Both rustls backends end up enabled in the test build, so rustls cannot
// pick one for the server side on its own.
fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

#[derive(Clone)]
struct PoisonedSmtpHandler;

impl Handler for PoisonedSmtpHandler {
    fn helo(&mut self, ip: IpAddr, domain: &str) -> mailin_embedded::Response {
        debug!("Refusing greeting from {domain} ({ip})");
        mailin_embedded::response::INTERNAL_ERROR
    }

    fn mail(&mut self, _ip: IpAddr, _domain: &str, _from: &str) -> mailin_embedded::Response {
        mailin_embedded::response::INTERNAL_ERROR
    }
}

/// Starts, once per process, an SMTP server on [`POISONED_SMTP_PORT`] which
/// accepts connections and then fails every command.
pub fn start_poisoned_smtp_server() {
    static STARTED: Once = Once::new();
    STARTED.call_once(|| {
        let mut server = Server::new(PoisonedSmtpHandler);
        server
            .with_name("contact-relay.test")
            .with_ssl(SslConfig::None)
            .unwrap()
            .with_addr(format!("127.0.0.1:{POISONED_SMTP_PORT}"))
            .unwrap();
        std::thread::spawn(move || {
            let _ = server.serve();
        });
        wait_until_listening(POISONED_SMTP_PORT);
    });
}

fn wait_until_listening(port: u16) {
    for _ in 0..50 {
        if TcpStream::connect(("127.0.0.1", port)).is_ok() {
            break;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

/// A local port on which nothing is listening.
pub fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}
