use thiserror::Error;

use crate::session::SessionState;

#[derive(Error, Debug)]
pub enum SmtpError {
    #[error("unexpected {code} reply in {state:?} (expected {expected:?}): {text}")]
    Protocol {
        state: SessionState,
        expected: &'static [u16],
        code: u16,
        text: String,
    },

    #[error("malformed reply line: {0:?}")]
    Malformed(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    #[error("connection closed by server")]
    Closed,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
