//! SMTP-backed mailer: one connection per digest.

use std::time::Duration;

use async_trait::async_trait;

use pricewatch_common::Config;
use pricewatch_notify::Digest;
use smtp::{Credentials, OutgoingEmail, SmtpClient, SmtpConfig, SmtpError};

use crate::traits::Mailer;

pub struct SmtpMailer {
    client: SmtpClient,
    sender: String,
}

impl SmtpMailer {
    pub fn new(config: &Config) -> Result<Self, SmtpError> {
        let client = SmtpClient::new(
            SmtpConfig {
                host: config.smtp_host.clone(),
                port: config.smtp_port,
                implicit_tls: config.smtp_implicit_tls,
                client_name: config.client_name.clone(),
                timeout: Duration::from_secs(config.command_timeout_secs),
            },
            Credentials {
                user: config.smtp_user.clone(),
                password: config.smtp_password.clone(),
            },
        )?;
        Ok(Self {
            client,
            sender: config.smtp_sender.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, recipient: &str, digest: &Digest) -> anyhow::Result<()> {
        let email = OutgoingEmail {
            from: self.sender.clone(),
            to: recipient.to_string(),
            subject: digest.subject.clone(),
            text: digest.text.clone(),
            html: Some(digest.html.clone()),
        };
        self.client.deliver(&email).await?;
        Ok(())
    }
}
