// Trait abstractions for the pipeline's external collaborators.
//
// KvStore — the account directory contract. The pipeline only ever reads;
//   put/delete exist because the store supports them and tests seed
//   through them. List results are cursor pages and may lag writes
//   (eventual consistency), so a listed key whose get comes back absent is
//   simply skipped.
// Mailer — one digest delivery. The SMTP client lives behind this seam so
//   dispatch tests run with a recording mock: no network, no mail server.

use async_trait::async_trait;
use serde_json::Value;

use pricewatch_notify::Digest;

/// One page of a prefix listing.
#[derive(Debug, Clone)]
pub struct KvPage {
    pub keys: Vec<String>,
    pub next_cursor: Option<String>,
    pub is_complete: bool,
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Value>>;

    async fn put(&self, key: &str, value: Value) -> anyhow::Result<()>;

    async fn delete(&self, key: &str) -> anyhow::Result<()>;

    /// List keys under `prefix`, resuming after `cursor` when given.
    async fn list(&self, prefix: &str, cursor: Option<&str>, limit: u32) -> anyhow::Result<KvPage>;
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver one digest to one recipient.
    async fn send(&self, recipient: &str, digest: &Digest) -> anyhow::Result<()>;
}
