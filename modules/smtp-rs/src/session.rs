//! The SMTP session state machine.
//!
//! One `Session` drives one connection. Every command names its required
//! reply codes from the table below; any other code is a fatal protocol
//! error for this delivery attempt — there are no fallback codes.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;
use tracing::debug;

use crate::error::SmtpError;
use crate::message::dot_stuff;
use crate::reply::{read_reply, Reply};

// Required reply codes, one row per protocol step.
const GREETING: &[u16] = &[220];
const EHLO_OK: &[u16] = &[250];
const STARTTLS_OK: &[u16] = &[220];
const AUTH_CHALLENGE: u16 = 334;
const AUTH_OK: u16 = 235;
const MAIL_OK: &[u16] = &[250];
const RCPT_OK: &[u16] = &[250, 251];
const DATA_GO: &[u16] = &[354];
const BODY_OK: &[u16] = &[250];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Greeted,
    EhloSent,
    StartTlsRequested,
    EhloSentSecure,
    Authenticated,
    MailFromSent,
    RcptToSent,
    DataSent,
    BodySent,
    Closed,
}

/// Server capabilities parsed from the EHLO reply. Re-parsed after a
/// STARTTLS upgrade — servers may only advertise AUTH once encrypted.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    pub starttls: bool,
    pub auth_plain: bool,
    pub auth_login: bool,
}

impl Capabilities {
    pub fn parse(reply: &Reply) -> Self {
        let mut caps = Capabilities::default();
        // First line is the server banner, not a capability.
        for line in reply.lines.iter().skip(1) {
            let upper = line.trim().to_ascii_uppercase();
            if upper == "STARTTLS" {
                caps.starttls = true;
            } else if let Some(rest) = upper.strip_prefix("AUTH") {
                for token in rest.split([' ', '=']) {
                    match token {
                        "PLAIN" => caps.auth_plain = true,
                        "LOGIN" => caps.auth_login = true,
                        _ => {}
                    }
                }
            }
        }
        caps
    }
}

pub struct Session<S> {
    stream: BufReader<S>,
    state: SessionState,
    secure: bool,
    reply_timeout: Duration,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Session<S> {
    pub fn new(stream: S, secure: bool, reply_timeout: Duration) -> Self {
        Self {
            stream: BufReader::new(stream),
            state: SessionState::Connected,
            secure,
            reply_timeout,
        }
    }

    /// Resume after a STARTTLS upgrade: the link is now encrypted and the
    /// server sends no fresh greeting, so the next step is the re-EHLO.
    pub fn resume_secure(stream: S, reply_timeout: Duration) -> Self {
        Self {
            stream: BufReader::new(stream),
            state: SessionState::Greeted,
            secure: true,
            reply_timeout,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    async fn read_reply(&mut self) -> Result<Reply, SmtpError> {
        timeout(self.reply_timeout, read_reply(&mut self.stream))
            .await
            .map_err(|_| SmtpError::Timeout("server reply"))?
    }

    async fn write_line(&mut self, line: &str) -> Result<(), SmtpError> {
        self.stream.write_all(line.as_bytes()).await?;
        self.stream.write_all(b"\r\n").await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Send a command, require one of `expected`, advance to `next`.
    async fn command(
        &mut self,
        line: &str,
        expected: &'static [u16],
        next: SessionState,
    ) -> Result<Reply, SmtpError> {
        self.write_line(line).await?;
        let reply = self.read_reply().await?;
        if !expected.contains(&reply.code) {
            return Err(SmtpError::Protocol {
                state: self.state,
                expected,
                code: reply.code,
                text: reply.text(),
            });
        }
        self.state = next;
        Ok(reply)
    }

    /// Consume the connection greeting.
    pub async fn greet(&mut self) -> Result<(), SmtpError> {
        let reply = self.read_reply().await?;
        if !GREETING.contains(&reply.code) {
            return Err(SmtpError::Protocol {
                state: self.state,
                expected: GREETING,
                code: reply.code,
                text: reply.text(),
            });
        }
        self.state = SessionState::Greeted;
        Ok(())
    }

    /// Send EHLO and parse the advertised capabilities.
    pub async fn ehlo(&mut self, client_name: &str) -> Result<Capabilities, SmtpError> {
        let next = if self.secure {
            SessionState::EhloSentSecure
        } else {
            SessionState::EhloSent
        };
        let reply = self
            .command(&format!("EHLO {client_name}"), EHLO_OK, next)
            .await?;
        let caps = Capabilities::parse(&reply);
        debug!(?caps, secure = self.secure, "EHLO capabilities");
        Ok(caps)
    }

    /// Request STARTTLS and hand back the raw stream for the TLS handshake.
    /// After the 220 the server writes nothing until the handshake starts,
    /// so the read buffer is empty and dropping it is safe.
    pub async fn starttls(mut self) -> Result<S, SmtpError> {
        self.command("STARTTLS", STARTTLS_OK, SessionState::StartTlsRequested)
            .await?;
        Ok(self.stream.into_inner())
    }

    /// One AUTH step; any unexpected code is a fatal auth failure.
    async fn auth_step(&mut self, line: &str, expected: u16) -> Result<Reply, SmtpError> {
        self.write_line(line).await?;
        let reply = self.read_reply().await?;
        if reply.code != expected {
            return Err(SmtpError::Auth(format!(
                "expected {expected}, got {} {}",
                reply.code,
                reply.text()
            )));
        }
        Ok(reply)
    }

    /// Authenticate, preferring AUTH PLAIN over AUTH LOGIN when both are
    /// advertised. Never writes credentials over a plaintext link.
    pub async fn authenticate(
        &mut self,
        caps: &Capabilities,
        user: &str,
        password: &str,
    ) -> Result<(), SmtpError> {
        if !self.secure {
            return Err(SmtpError::Auth(
                "refusing to authenticate on an unencrypted connection".into(),
            ));
        }
        if caps.auth_plain {
            let token = BASE64.encode(format!("\0{user}\0{password}"));
            self.auth_step(&format!("AUTH PLAIN {token}"), AUTH_OK).await?;
        } else if caps.auth_login {
            self.auth_step("AUTH LOGIN", AUTH_CHALLENGE).await?;
            self.auth_step(&BASE64.encode(user), AUTH_CHALLENGE).await?;
            self.auth_step(&BASE64.encode(password), AUTH_OK).await?;
        } else {
            return Err(SmtpError::Auth(
                "server advertises no supported AUTH mechanism".into(),
            ));
        }
        self.state = SessionState::Authenticated;
        Ok(())
    }

    /// Envelope plus DATA phase. `data` is the rendered message; it is
    /// dot-stuffed here so the `\r\n.\r\n` terminator stays unambiguous.
    pub async fn send_mail(&mut self, from: &str, to: &str, data: &str) -> Result<(), SmtpError> {
        self.command(
            &format!("MAIL FROM:<{from}>"),
            MAIL_OK,
            SessionState::MailFromSent,
        )
        .await?;
        self.command(&format!("RCPT TO:<{to}>"), RCPT_OK, SessionState::RcptToSent)
            .await?;
        self.command("DATA", DATA_GO, SessionState::DataSent).await?;

        self.stream.write_all(dot_stuff(data).as_bytes()).await?;
        self.stream.write_all(b".\r\n").await?;
        self.stream.flush().await?;

        let reply = self.read_reply().await?;
        if !BODY_OK.contains(&reply.code) {
            return Err(SmtpError::Protocol {
                state: self.state,
                expected: BODY_OK,
                code: reply.code,
                text: reply.text(),
            });
        }
        self.state = SessionState::BodySent;
        Ok(())
    }

    /// Best-effort QUIT; failures are not propagated. The socket itself is
    /// closed when the session is dropped, on every exit path.
    pub async fn quit(&mut self) {
        if self.write_line("QUIT").await.is_ok() {
            let _ = self.read_reply().await;
        }
        self.state = SessionState::Closed;
    }
}
