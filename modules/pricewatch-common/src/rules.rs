//! Per-user rule document parsing.
//!
//! The rule document lives on the user's profile record and is versioned
//! independently of the directory entry. A bad document belongs to one user
//! only, so parse failures are surfaced as `Error::Validation` and the
//! caller decides whether to skip the user or abort.

use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

use crate::error::Error;
use crate::types::{Rule, MAX_RULES_PER_USER};

/// Parse a `{version: 1, rules: [...]}` document into validated rules.
///
/// Malformed individual rules are dropped; duplicate ids keep the first
/// occurrence; anything past [`MAX_RULES_PER_USER`] is discarded.
///
/// # Errors
/// `Error::Validation` when the document itself is not a version-1 object.
pub fn parse_rules(doc: &Value) -> Result<Vec<Rule>, Error> {
    let obj = doc
        .as_object()
        .ok_or_else(|| Error::Validation("rule document must be a JSON object".into()))?;

    let version = obj.get("version").and_then(Value::as_u64).unwrap_or(0);
    if version != 1 {
        return Err(Error::Validation(format!(
            "unsupported rule document version {version}, expected 1"
        )));
    }

    let raw = match obj.get("rules") {
        Some(Value::Array(items)) => items.as_slice(),
        _ => &[],
    };

    let mut seen = HashSet::new();
    let mut rules = Vec::new();
    for value in raw {
        if rules.len() >= MAX_RULES_PER_USER {
            break;
        }
        let Ok(rule) = serde_json::from_value::<Rule>(value.clone()) else {
            debug!("Dropping malformed rule entry");
            continue;
        };
        if rule.id.is_empty() || !seen.insert(rule.id.clone()) {
            debug!(id = rule.id.as_str(), "Dropping duplicate or unnamed rule");
            continue;
        }
        rules.push(rule);
    }
    Ok(rules)
}
