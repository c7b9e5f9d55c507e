use std::env;

use tracing::info;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // SMTP
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: String,
    pub smtp_password: String,
    /// Envelope sender and From header.
    pub smtp_sender: String,
    /// Name presented in EHLO.
    pub client_name: String,
    /// Implicit TLS (secure submission port) instead of STARTTLS.
    pub smtp_implicit_tls: bool,

    // Budgets, in seconds
    pub command_timeout_secs: u64,
    pub send_timeout_secs: u64,

    // Directory scan
    pub directory_prefix: String,
    pub directory_page_size: u32,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        let smtp_port: u16 = env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse()
            .expect("SMTP_PORT must be a number");
        Self {
            smtp_host: required_env("SMTP_HOST"),
            smtp_port,
            smtp_user: required_env("SMTP_USER"),
            smtp_password: required_env("SMTP_PASSWORD"),
            smtp_sender: required_env("SMTP_SENDER"),
            client_name: env::var("SMTP_CLIENT_NAME")
                .unwrap_or_else(|_| "pricewatch.local".to_string()),
            // Port 465 is implicit TLS by convention; 587 negotiates STARTTLS.
            smtp_implicit_tls: env::var("SMTP_IMPLICIT_TLS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(smtp_port == 465),
            command_timeout_secs: env_u64("SMTP_COMMAND_TIMEOUT_SECS", 30),
            send_timeout_secs: env_u64("SEND_TIMEOUT_SECS", 120),
            directory_prefix: env::var("DIRECTORY_PREFIX").unwrap_or_else(|_| "acct:".to_string()),
            directory_page_size: env_u64("DIRECTORY_PAGE_SIZE", 200) as u32,
        }
    }

    /// Log the effective configuration with credentials masked.
    pub fn log_redacted(&self) {
        info!(
            smtp_host = self.smtp_host.as_str(),
            smtp_port = self.smtp_port,
            smtp_user = self.smtp_user.as_str(),
            smtp_password = "***",
            sender = self.smtp_sender.as_str(),
            implicit_tls = self.smtp_implicit_tls,
            send_timeout_secs = self.send_timeout_secs,
            directory_prefix = self.directory_prefix.as_str(),
            "Configuration loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
