//! Core types for the notification pipeline.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of events accepted in one pack.
pub const MAX_EVENTS_PER_PACK: usize = 50_000;

/// Maximum number of rules per user. Anything past this is dropped.
pub const MAX_RULES_PER_USER: usize = 50;

// --- Event pack ---

/// A validated batch of market events. Immutable for the rest of the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPack {
    pub version: u32,
    pub generated_at: String,
    pub skus: HashMap<String, SkuInfo>,
    pub events: Vec<Event>,
}

/// A tracked item and its market price summary. Aliased listings are
/// collected under `members`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkuInfo {
    pub sku: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub lowest_price: Option<f64>,
    #[serde(default)]
    pub shop_count: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    PriceDrop,
    GlobalNew,
    GlobalReturn,
    OutOfStock,
}

impl EventType {
    /// Wire name; also the sort key for digest ordering (lexicographic).
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PriceDrop => "PRICE_DROP",
            EventType::GlobalNew => "GLOBAL_NEW",
            EventType::GlobalReturn => "GLOBAL_RETURN",
            EventType::OutOfStock => "OUT_OF_STOCK",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One market event. Price fields are only meaningful for `PriceDrop`;
/// the validator clears them on every other type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub market_id: Option<String>,
    pub event_type: EventType,
    pub sku: String,
    #[serde(default)]
    pub store_id: String,
    #[serde(default)]
    pub store_label: String,
    #[serde(default)]
    pub listing_url: String,
    #[serde(default)]
    pub market_new: bool,
    #[serde(default)]
    pub market_return: bool,
    #[serde(default)]
    pub market_out: bool,
    #[serde(default)]
    pub old_price: Option<f64>,
    #[serde(default)]
    pub new_price: Option<f64>,
    #[serde(default)]
    pub drop_abs: Option<f64>,
    #[serde(default)]
    pub drop_pct: Option<f64>,
    #[serde(default)]
    pub is_cheapest_now: Option<bool>,
}

impl Event {
    /// Market-wide aggregation key, `eventType|sku` when no explicit id.
    pub fn market_key(&self) -> String {
        match &self.market_id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => format!("{}|{}", self.event_type, self.sku),
        }
    }

    /// Store-level dedup key, `eventType|sku|storeId` when no event id.
    pub fn store_key(&self) -> String {
        if self.id.is_empty() {
            format!("{}|{}|{}", self.event_type, self.sku, self.store_id)
        } else {
            self.id.clone()
        }
    }

    /// The market flag corresponding to this event's type.
    /// `PriceDrop` has none.
    pub fn market_flag(&self) -> bool {
        match self.event_type {
            EventType::GlobalNew => self.market_new,
            EventType::GlobalReturn => self.market_return,
            EventType::OutOfStock => self.market_out,
            EventType::PriceDrop => false,
        }
    }
}

// --- Rules ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleScope {
    All,
    Shortlist,
}

impl Default for RuleScope {
    fn default() -> Self {
        RuleScope::All
    }
}

/// One saved notification rule. All active filters are ANDed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub scope: RuleScope,
    pub event_type: EventType,
    #[serde(default)]
    pub filters: RuleFilters,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleFilters {
    #[serde(default)]
    pub store_id: Option<String>,
    #[serde(default)]
    pub across_market: Option<bool>,
    #[serde(default)]
    pub keywords_any: Vec<String>,
    #[serde(default)]
    pub keywords_none: Vec<String>,
    #[serde(default)]
    pub min_drop_abs: Option<f64>,
    #[serde(default)]
    pub min_drop_pct: Option<f64>,
    #[serde(default)]
    pub require_cheapest_now: Option<bool>,
}

impl Rule {
    /// Effective `acrossMarket`: the explicit filter value when set,
    /// otherwise true only for `GlobalNew`. New-arrival alerts fire
    /// market-wide unless narrowed.
    pub fn effective_across_market(&self) -> bool {
        self.filters
            .across_market
            .unwrap_or(self.event_type == EventType::GlobalNew)
    }
}

// --- Matches and jobs ---

/// An event that matched at least one rule, projected together with its
/// SKU info and the ids of the rules that matched it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedEvent {
    pub event_id: String,
    pub event_type: EventType,
    pub sku: String,
    pub sku_name: String,
    pub image_url: Option<String>,
    pub store_id: String,
    pub store_label: String,
    pub listing_url: String,
    pub market_id: String,
    /// True when this entry was matched at market scope (dedup key is the
    /// market id rather than the event id).
    pub market_wide: bool,
    pub old_price: Option<f64>,
    pub new_price: Option<f64>,
    pub drop_abs: Option<f64>,
    pub drop_pct: Option<f64>,
    pub is_cheapest_now: Option<bool>,
    pub matched_rule_ids: Vec<String>,
}

impl MatchedEvent {
    /// Store-level dedup key, mirroring [`Event::store_key`].
    pub fn store_key(&self) -> String {
        if self.event_id.is_empty() {
            format!("{}|{}|{}", self.event_type, self.sku, self.store_id)
        } else {
            self.event_id.clone()
        }
    }
}

/// One recipient's delivery unit for this run.
#[derive(Debug, Clone)]
pub struct Job {
    pub user_id: Uuid,
    pub recipient: String,
    pub events: Vec<MatchedEvent>,
}
