//! Minimal SMTP/ESMTP submission client.
//!
//! Drives one delivery per connection: greeting, EHLO with capability
//! parsing, STARTTLS upgrade (with the mandatory re-EHLO) or implicit TLS,
//! AUTH PLAIN/LOGIN, envelope, dot-stuffed DATA, best-effort QUIT. The
//! session is an explicit state machine generic over the underlying stream,
//! so the whole command phase runs over an in-memory duplex in tests.

pub mod client;
pub mod error;
pub mod message;
pub mod reply;
pub mod session;

pub use client::{Credentials, SmtpClient, SmtpConfig};
pub use error::SmtpError;
pub use message::{render_message, OutgoingEmail};
pub use reply::Reply;
pub use session::{Capabilities, Session, SessionState};
