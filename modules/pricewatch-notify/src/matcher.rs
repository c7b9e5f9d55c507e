//! Rule matching and match deduplication.
//!
//! Matching runs every enabled rule against every event and emits one
//! candidate per hit. Dedup then collapses candidates into two maps — one
//! keyed by market id for market-wide hits, one keyed by event id for
//! store-level hits — merges rule ids, lets a store-level hit suppress the
//! market-wide duplicate for the same market, and sorts the survivors into
//! the order the digest renders.

use std::collections::{HashMap, HashSet};

use pricewatch_common::types::{
    Event, EventPack, EventType, MatchedEvent, Rule, RuleScope, SkuInfo,
};

/// Match one user's rules against a validated pack and return the final
/// deduplicated, sorted match list.
pub fn match_events(
    pack: &EventPack,
    rules: &[Rule],
    favourites: &HashSet<String>,
) -> Vec<MatchedEvent> {
    dedup(collect_matches(pack, rules, favourites))
}

/// Raw matching pass: one candidate [`MatchedEvent`] per (event, rule) hit.
pub fn collect_matches(
    pack: &EventPack,
    rules: &[Rule],
    favourites: &HashSet<String>,
) -> Vec<MatchedEvent> {
    let mut out = Vec::new();
    for event in &pack.events {
        let sku_info = pack.skus.get(&event.sku);
        for rule in rules {
            if rule_matches(rule, event, sku_info, favourites) {
                out.push(project(event, sku_info, rule));
            }
        }
    }
    out
}

/// Does a single rule match a single event? All active predicates are ANDed.
pub fn rule_matches(
    rule: &Rule,
    event: &Event,
    sku_info: Option<&SkuInfo>,
    favourites: &HashSet<String>,
) -> bool {
    if !rule.enabled || rule.event_type != event.event_type {
        return false;
    }

    if rule.scope == RuleScope::Shortlist && !in_favourites(event, sku_info, favourites) {
        return false;
    }

    if let Some(store_id) = &rule.filters.store_id {
        if store_id != &event.store_id {
            return false;
        }
    }

    let name = display_name(event, sku_info).to_lowercase();
    // Empty keywords carry no constraint, in either direction.
    let wanted: Vec<&str> = rule
        .filters
        .keywords_any
        .iter()
        .filter(|k| !k.is_empty())
        .map(String::as_str)
        .collect();
    if !wanted.is_empty() && !wanted.iter().any(|k| name.contains(&k.to_lowercase())) {
        return false;
    }
    if rule
        .filters
        .keywords_none
        .iter()
        .any(|k| !k.is_empty() && name.contains(&k.to_lowercase()))
    {
        return false;
    }

    // Market-wide rules require the matching market flag on the event.
    // Price drops carry no market flag and never check one.
    if rule.effective_across_market()
        && event.event_type != EventType::PriceDrop
        && !event.market_flag()
    {
        return false;
    }

    if event.event_type == EventType::PriceDrop {
        if let Some(min) = rule.filters.min_drop_abs {
            if !meets_threshold(event.drop_abs, min) {
                return false;
            }
        }
        if let Some(min) = rule.filters.min_drop_pct {
            if !meets_threshold(event.drop_pct, min) {
                return false;
            }
        }
        if rule.filters.require_cheapest_now == Some(true) && event.is_cheapest_now != Some(true) {
            return false;
        }
    }

    true
}

/// Missing or non-finite values never satisfy a threshold.
fn meets_threshold(value: Option<f64>, min: f64) -> bool {
    matches!(value, Some(v) if v.is_finite() && v >= min)
}

fn in_favourites(event: &Event, sku_info: Option<&SkuInfo>, favourites: &HashSet<String>) -> bool {
    if favourites.contains(&event.sku) {
        return true;
    }
    match sku_info {
        Some(info) => {
            favourites.contains(&info.sku) || info.members.iter().any(|m| favourites.contains(m))
        }
        None => false,
    }
}

fn display_name<'a>(event: &'a Event, sku_info: Option<&'a SkuInfo>) -> &'a str {
    match sku_info {
        Some(info) if !info.name.is_empty() => &info.name,
        _ => &event.sku,
    }
}

fn project(event: &Event, sku_info: Option<&SkuInfo>, rule: &Rule) -> MatchedEvent {
    MatchedEvent {
        event_id: event.id.clone(),
        event_type: event.event_type,
        sku: event.sku.clone(),
        sku_name: display_name(event, sku_info).to_string(),
        image_url: sku_info.and_then(|i| i.image_url.clone()),
        store_id: event.store_id.clone(),
        store_label: event.store_label.clone(),
        listing_url: event.listing_url.clone(),
        market_id: event.market_key(),
        market_wide: rule.effective_across_market(),
        old_price: event.old_price,
        new_price: event.new_price,
        drop_abs: event.drop_abs,
        drop_pct: event.drop_pct,
        is_cheapest_now: event.is_cheapest_now,
        matched_rule_ids: vec![rule.id.clone()],
    }
}

/// Collapse candidate matches into the canonical per-user list.
///
/// Idempotent: running it again over its own output is a no-op.
pub fn dedup(candidates: Vec<MatchedEvent>) -> Vec<MatchedEvent> {
    let mut market: HashMap<String, MatchedEvent> = HashMap::new();
    let mut store: HashMap<String, MatchedEvent> = HashMap::new();

    for candidate in candidates {
        let (map, key) = if candidate.market_wide {
            (&mut market, candidate.market_id.clone())
        } else {
            (&mut store, candidate.store_key())
        };
        match map.get_mut(&key) {
            Some(existing) => {
                for id in candidate.matched_rule_ids {
                    if !existing.matched_rule_ids.contains(&id) {
                        existing.matched_rule_ids.push(id);
                    }
                }
            }
            None => {
                map.insert(key, candidate);
            }
        }
    }

    // A specific store hit suppresses the market-wide duplicate.
    let covered: HashSet<String> = store.values().map(|m| m.market_id.clone()).collect();

    let mut out: Vec<MatchedEvent> = market
        .into_values()
        .filter(|m| !covered.contains(&m.market_id))
        .chain(store.into_values())
        .collect();

    // Total deterministic order; the trailing dedup key breaks ties between
    // distinct events sharing type, name and store.
    out.sort_by(|a, b| {
        (a.event_type.as_str(), &a.sku_name, &a.store_id, sort_key(a)).cmp(&(
            b.event_type.as_str(),
            &b.sku_name,
            &b.store_id,
            sort_key(b),
        ))
    });
    out
}

fn sort_key(m: &MatchedEvent) -> String {
    if m.market_wide {
        m.market_id.clone()
    } else {
        m.store_key()
    }
}
