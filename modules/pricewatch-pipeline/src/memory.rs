//! In-memory key-value store with ordered prefix listing.
//!
//! Backs the bin's snapshot mode and every pipeline test. Cursor semantics
//! match the directory contract: the cursor is the last key of the previous
//! page and listing resumes strictly after it.

use std::collections::BTreeMap;
use std::ops::Bound;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::traits::{KvPage, KvStore};

#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a `{key: value}` snapshot object.
    pub async fn load_snapshot(&self, snapshot: &Value) -> anyhow::Result<()> {
        let obj = snapshot
            .as_object()
            .ok_or_else(|| anyhow::anyhow!("directory snapshot must be a JSON object"))?;
        let mut entries = self.entries.write().await;
        for (key, value) in obj {
            entries.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> anyhow::Result<()> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str, cursor: Option<&str>, limit: u32) -> anyhow::Result<KvPage> {
        let entries = self.entries.read().await;
        let start = match cursor {
            Some(c) => Bound::Excluded(c.to_string()),
            None => Bound::Included(prefix.to_string()),
        };
        let mut keys = Vec::new();
        let mut truncated = false;
        for key in entries.range((start, Bound::Unbounded)).map(|(k, _)| k) {
            if !key.starts_with(prefix) {
                break;
            }
            if keys.len() as u32 == limit {
                truncated = true;
                break;
            }
            keys.push(key.clone());
        }
        let next_cursor = if truncated { keys.last().cloned() } else { None };
        Ok(KvPage {
            keys,
            next_cursor,
            is_complete: !truncated,
        })
    }
}
