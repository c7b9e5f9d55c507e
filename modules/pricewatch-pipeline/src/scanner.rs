//! Directory scan: discover candidate recipients and their rule configs.

use std::collections::HashSet;

use anyhow::Context;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use pricewatch_common::rules::parse_rules;
use pricewatch_common::types::{Rule, RuleScope};

use crate::traits::KvStore;

/// One qualified recipient: verified, unique user id, at least one enabled
/// rule, favourites loaded when a shortlist rule needs them.
#[derive(Debug, Clone)]
pub struct Recipient {
    pub user_id: Uuid,
    pub email: String,
    pub rules: Vec<Rule>,
    pub favourites: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub recipients: Vec<Recipient>,
    /// Directory entries examined, including skipped ones.
    pub scanned: u32,
}

/// Walk the account directory page by page until exhaustion.
///
/// The directory may hold several keys for the same user (email aliases),
/// so dedup is on user id, never on the directory key. Listing may lag
/// writes; keys whose `get` comes back absent are skipped.
pub async fn scan_directory(
    store: &dyn KvStore,
    prefix: &str,
    page_size: u32,
) -> anyhow::Result<ScanOutcome> {
    let mut outcome = ScanOutcome::default();
    let mut seen: HashSet<Uuid> = HashSet::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = store
            .list(prefix, cursor.as_deref(), page_size)
            .await
            .context("directory list failed")?;

        for key in &page.keys {
            outcome.scanned += 1;
            let Some(entry) = store.get(key).await? else {
                debug!(key = key.as_str(), "Listed key no longer readable, skipping");
                continue;
            };
            let Some((user_id, email)) = parse_entry(&entry) else {
                debug!(key = key.as_str(), "Skipping unverified or malformed entry");
                continue;
            };
            if !seen.insert(user_id) {
                debug!(%user_id, "User already processed under another key");
                continue;
            }

            let Some(profile) = store.get(&format!("profile:{user_id}")).await? else {
                continue;
            };
            let rules = match parse_rules(&profile) {
                Ok(rules) => rules,
                Err(e) => {
                    warn!(%user_id, error = %e, "Skipping user with bad rule document");
                    continue;
                }
            };
            if !rules.iter().any(|r| r.enabled) {
                continue;
            }

            // Favourites are only read when a shortlist rule can use them.
            let favourites = if rules
                .iter()
                .any(|r| r.enabled && r.scope == RuleScope::Shortlist)
            {
                fetch_favourites(store, user_id).await?
            } else {
                HashSet::new()
            };

            outcome.recipients.push(Recipient {
                user_id,
                email,
                rules,
                favourites,
            });
        }

        if page.is_complete || page.next_cursor.is_none() {
            break;
        }
        cursor = page.next_cursor;
    }
    Ok(outcome)
}

/// Returns `(user_id, email)` for a usable entry. Entries explicitly
/// marked unverified, without a well-formed UUID, or without an email are
/// skipped.
fn parse_entry(entry: &Value) -> Option<(Uuid, String)> {
    if entry.get("verified").and_then(Value::as_bool) == Some(false) {
        return None;
    }
    let user_id = Uuid::parse_str(entry.get("userId")?.as_str()?).ok()?;
    let email = entry.get("email")?.as_str()?;
    if email.is_empty() {
        return None;
    }
    Some((user_id, email.to_string()))
}

async fn fetch_favourites(store: &dyn KvStore, user_id: Uuid) -> anyhow::Result<HashSet<String>> {
    let Some(doc) = store.get(&format!("favs:{user_id}")).await? else {
        return Ok(HashSet::new());
    };
    Ok(doc
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default())
}
