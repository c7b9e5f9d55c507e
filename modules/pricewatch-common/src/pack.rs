//! Event pack validation.
//!
//! The pack arrives as untyped JSON from the feed producer. Structural
//! problems (wrong version, missing generatedAt, oversized batch) abort the
//! run; malformed individual skus and events are skipped and counted so one
//! bad row never sinks the batch.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::error::Error;
use crate::types::{Event, EventPack, EventType, SkuInfo, MAX_EVENTS_PER_PACK};

/// A validated pack plus counters for entries the validator dropped.
#[derive(Debug, Clone)]
pub struct ValidatedPack {
    pub pack: EventPack,
    pub skipped_skus: u32,
    pub skipped_events: u32,
}

/// SKU token grammar: ASCII alphanumeric plus `:`, 1..=256 chars.
pub fn is_valid_sku(token: &str) -> bool {
    !token.is_empty()
        && token.len() <= 256
        && token.chars().all(|c| c.is_ascii_alphanumeric() || c == ':')
}

/// Store ids share the SKU alphabet but may be empty (market-wide rows
/// carry no store).
fn is_valid_store_id(token: &str) -> bool {
    token.is_empty() || is_valid_sku(token)
}

/// Validate an untyped event pack document into the trusted model.
///
/// # Errors
/// `Error::Validation` when the document as a whole is unusable: not an
/// object, wrong version, empty generatedAt, or more than
/// [`MAX_EVENTS_PER_PACK`] events.
pub fn validate(doc: Value) -> Result<ValidatedPack, Error> {
    let obj = doc
        .as_object()
        .ok_or_else(|| Error::Validation("event pack must be a JSON object".into()))?;

    let version = obj.get("version").and_then(Value::as_u64).unwrap_or(0);
    if version != 1 {
        return Err(Error::Validation(format!(
            "unsupported pack version {version}, expected 1"
        )));
    }

    let generated_at = obj
        .get("generatedAt")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if generated_at.is_empty() {
        return Err(Error::Validation("generatedAt must be a non-empty string".into()));
    }

    let mut skipped_skus = 0u32;
    let mut skus = HashMap::new();
    if let Some(raw) = obj.get("skus").and_then(Value::as_object) {
        for (key, value) in raw {
            match parse_sku(key, value) {
                Some(info) => {
                    skus.insert(key.clone(), info);
                }
                None => {
                    skipped_skus += 1;
                    debug!(key = key.as_str(), "Dropping malformed sku entry");
                }
            }
        }
    }

    let raw_events = match obj.get("events") {
        Some(Value::Array(items)) => items.as_slice(),
        Some(_) => return Err(Error::Validation("events must be an array".into())),
        None => &[],
    };
    if raw_events.len() > MAX_EVENTS_PER_PACK {
        return Err(Error::Validation(format!(
            "event pack has {} events, cap is {MAX_EVENTS_PER_PACK}",
            raw_events.len()
        )));
    }

    let mut skipped_events = 0u32;
    let mut events = Vec::with_capacity(raw_events.len());
    for raw in raw_events {
        match parse_event(raw) {
            Some(event) => events.push(event),
            None => {
                skipped_events += 1;
                debug!("Dropping malformed event entry");
            }
        }
    }

    Ok(ValidatedPack {
        pack: EventPack {
            version: 1,
            generated_at: generated_at.to_string(),
            skus,
            events,
        },
        skipped_skus,
        skipped_events,
    })
}

fn parse_sku(key: &str, value: &Value) -> Option<SkuInfo> {
    if !is_valid_sku(key) {
        return None;
    }
    let mut info: SkuInfo = serde_json::from_value(value.clone()).ok()?;
    if !is_valid_sku(&info.sku) {
        return None;
    }
    info.members.retain(|m| is_valid_sku(m));
    Some(info)
}

fn parse_event(raw: &Value) -> Option<Event> {
    // Unknown eventType fails the enum deserialize, which skips the row.
    let mut event: Event = serde_json::from_value(raw.clone()).ok()?;
    if !is_valid_sku(&event.sku) || !is_valid_store_id(&event.store_id) {
        return None;
    }
    if event.event_type != EventType::PriceDrop {
        event.old_price = None;
        event.new_price = None;
        event.drop_abs = None;
        event.drop_pct = None;
        event.is_cheapest_now = None;
    }
    Some(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_pack(events: Value) -> Value {
        json!({
            "version": 1,
            "generatedAt": "2026-08-28T06:00:00Z",
            "skus": {
                "figure:123": {"sku": "figure:123", "name": "Space Captain", "members": ["figure:123b"]}
            },
            "events": events,
        })
    }

    #[test]
    fn accepts_minimal_pack() {
        let v = validate(minimal_pack(json!([]))).unwrap();
        assert_eq!(v.pack.version, 1);
        assert_eq!(v.pack.skus.len(), 1);
        assert!(v.pack.events.is_empty());
        assert_eq!(v.skipped_skus, 0);
    }

    #[test]
    fn rejects_wrong_version() {
        let doc = json!({"version": 2, "generatedAt": "x", "skus": {}, "events": []});
        assert!(matches!(validate(doc), Err(Error::Validation(_))));
    }

    #[test]
    fn rejects_empty_generated_at() {
        let doc = json!({"version": 1, "generatedAt": "", "skus": {}, "events": []});
        assert!(matches!(validate(doc), Err(Error::Validation(_))));
    }

    #[test]
    fn drops_malformed_sku_entries_without_failing() {
        let doc = json!({
            "version": 1,
            "generatedAt": "t",
            "skus": {
                "ok:1": {"sku": "ok:1", "name": "Fine"},
                "bad key!": {"sku": "bad key!", "name": "Nope"},
                "ok:2": "not an object",
            },
            "events": [],
        });
        let v = validate(doc).unwrap();
        assert_eq!(v.pack.skus.len(), 1);
        assert_eq!(v.skipped_skus, 2);
    }

    #[test]
    fn skips_unknown_event_type_and_bad_sku() {
        let events = json!([
            {"id": "e1", "eventType": "PRICE_DROP", "sku": "figure:123", "storeId": "store:1"},
            {"id": "e2", "eventType": "MYSTERY", "sku": "figure:123", "storeId": "store:1"},
            {"id": "e3", "eventType": "GLOBAL_NEW", "sku": "bad sku", "storeId": "store:1"},
        ]);
        let v = validate(minimal_pack(events)).unwrap();
        assert_eq!(v.pack.events.len(), 1);
        assert_eq!(v.skipped_events, 2);
        assert_eq!(v.pack.events[0].id, "e1");
    }

    #[test]
    fn clears_price_fields_on_non_price_drop() {
        let events = json!([
            {"id": "e1", "eventType": "GLOBAL_RETURN", "sku": "figure:123", "storeId": "store:1",
             "oldPrice": 10.0, "newPrice": 5.0, "dropAbs": 5.0, "dropPct": 50.0, "isCheapestNow": true},
        ]);
        let v = validate(minimal_pack(events)).unwrap();
        let e = &v.pack.events[0];
        assert!(e.old_price.is_none());
        assert!(e.drop_abs.is_none());
        assert!(e.is_cheapest_now.is_none());
    }

    #[test]
    fn allows_empty_store_id() {
        let events = json!([
            {"id": "e1", "eventType": "GLOBAL_NEW", "sku": "figure:123", "marketNew": true},
        ]);
        let v = validate(minimal_pack(events)).unwrap();
        assert_eq!(v.pack.events.len(), 1);
        assert_eq!(v.pack.events[0].store_id, "");
    }

    #[test]
    fn market_key_falls_back_to_type_and_sku() {
        let events = json!([
            {"id": "e1", "eventType": "GLOBAL_NEW", "sku": "figure:123", "marketNew": true},
        ]);
        let v = validate(minimal_pack(events)).unwrap();
        assert_eq!(v.pack.events[0].market_key(), "GLOBAL_NEW|figure:123");
    }
}
