//! Delivery pipeline: directory scan, per-user matching, digest dispatch.
//!
//! External collaborators (the account directory, the mail transport) sit
//! behind traits so the whole pipeline runs against in-memory fakes in
//! tests.

pub mod dispatch;
pub mod mailer;
pub mod memory;
pub mod report;
pub mod scanner;
pub mod traits;

pub use dispatch::Dispatcher;
pub use mailer::SmtpMailer;
pub use memory::MemoryKv;
pub use report::{DeliveryFailure, DispatchReport};
pub use traits::{KvPage, KvStore, Mailer};
