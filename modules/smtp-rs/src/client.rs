//! Connecting client: TCP + TLS setup around the generic session.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

use crate::error::SmtpError;
use crate::message::{render_message, OutgoingEmail};
use crate::session::{Capabilities, Session};

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Implicit TLS (secure submission port). Otherwise STARTTLS is
    /// required; plaintext credential submission is never attempted.
    pub implicit_tls: bool,
    /// Name presented in EHLO.
    pub client_name: String,
    /// Budget for connect, TLS handshake and each server reply.
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

pub struct SmtpClient {
    config: SmtpConfig,
    credentials: Credentials,
    tls: TlsConnector,
}

impl SmtpClient {
    /// Build a client with a root store from the platform plus the bundled
    /// webpki roots.
    pub fn new(config: SmtpConfig, credentials: Credentials) -> Result<Self, SmtpError> {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        match rustls_native_certs::load_native_certs() {
            Ok(certs) => {
                for cert in certs {
                    let _ = roots.add(cert);
                }
            }
            Err(e) => debug!(error = %e, "No native root certs, using webpki bundle only"),
        }
        let tls_config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        Ok(Self {
            config,
            credentials,
            tls: TlsConnector::from(Arc::new(tls_config)),
        })
    }

    /// Deliver one message over one connection. The socket is closed on
    /// every exit path when the session drops.
    pub async fn deliver(&self, email: &OutgoingEmail) -> Result<(), SmtpError> {
        let data = render_message(email, &self.config.client_name);
        let server_name = ServerName::try_from(self.config.host.clone())
            .map_err(|e| SmtpError::Tls(e.to_string()))?;

        let tcp = timeout(
            self.config.timeout,
            TcpStream::connect((self.config.host.as_str(), self.config.port)),
        )
        .await
        .map_err(|_| SmtpError::Timeout("connect"))??;

        if self.config.implicit_tls {
            let tls = timeout(self.config.timeout, self.tls.connect(server_name, tcp))
                .await
                .map_err(|_| SmtpError::Timeout("TLS handshake"))??;
            let mut session = Session::new(tls, true, self.config.timeout);
            session.greet().await?;
            let caps = session.ehlo(&self.config.client_name).await?;
            self.finish(&mut session, caps, email, &data).await
        } else {
            let mut session = Session::new(tcp, false, self.config.timeout);
            session.greet().await?;
            let caps = session.ehlo(&self.config.client_name).await?;
            if !caps.starttls {
                return Err(SmtpError::Tls(
                    "server does not advertise STARTTLS; refusing to continue in the clear".into(),
                ));
            }
            let tcp = session.starttls().await?;
            let tls = timeout(self.config.timeout, self.tls.connect(server_name, tcp))
                .await
                .map_err(|_| SmtpError::Timeout("TLS handshake"))??;

            // Capabilities must be re-parsed: servers may advertise AUTH
            // only after the link is encrypted.
            let mut session = Session::resume_secure(tls, self.config.timeout);
            let caps = session.ehlo(&self.config.client_name).await?;
            self.finish(&mut session, caps, email, &data).await
        }
    }

    async fn finish<S: AsyncRead + AsyncWrite + Unpin>(
        &self,
        session: &mut Session<S>,
        caps: Capabilities,
        email: &OutgoingEmail,
        data: &str,
    ) -> Result<(), SmtpError> {
        session
            .authenticate(&caps, &self.credentials.user, &self.credentials.password)
            .await?;
        session.send_mail(&email.from, &email.to, data).await?;
        session.quit().await;
        Ok(())
    }
}
