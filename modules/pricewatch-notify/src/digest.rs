//! Digest building: matched events in, subject/text/html out.
//!
//! Rendering is deliberately plain. The contract is the input order (the
//! deduplicated sort from the matcher) and the three output strings; anything
//! fancier belongs to a template layer outside this core.

use pricewatch_common::types::{EventType, MatchedEvent};

/// A rendered digest for one recipient.
#[derive(Debug, Clone)]
pub struct Digest {
    pub subject: String,
    pub text: String,
    pub html: String,
}

fn heading(event_type: EventType) -> &'static str {
    match event_type {
        EventType::PriceDrop => "Price drops",
        EventType::GlobalNew => "New on the market",
        EventType::GlobalReturn => "Back on the market",
        EventType::OutOfStock => "Out of stock",
    }
}

/// Build the digest for an already deduplicated, sorted match list.
pub fn build_digest(events: &[MatchedEvent]) -> Digest {
    let n = events.len();
    let subject = if n == 1 {
        "Pricewatch: 1 update for your tracked items".to_string()
    } else {
        format!("Pricewatch: {n} updates for your tracked items")
    };

    let mut text = String::new();
    let mut html = String::from("<html><body>");
    let mut current: Option<EventType> = None;

    for event in events {
        if current != Some(event.event_type) {
            if current.is_some() {
                text.push('\n');
                html.push_str("</ul>");
            }
            let h = heading(event.event_type);
            text.push_str(h);
            text.push('\n');
            html.push_str(&format!("<h2>{}</h2><ul>", escape(h)));
            current = Some(event.event_type);
        }
        text.push_str(&text_line(event));
        html.push_str(&html_item(event));
    }
    if current.is_some() {
        html.push_str("</ul>");
    }
    html.push_str("</body></html>");

    Digest { subject, text, html }
}

fn where_label(event: &MatchedEvent) -> String {
    if event.market_wide || event.store_label.is_empty() {
        "across the market".to_string()
    } else {
        format!("at {}", event.store_label)
    }
}

fn price_detail(event: &MatchedEvent) -> Option<String> {
    let (old, new) = (event.old_price?, event.new_price?);
    let mut s = format!("{old:.2} -> {new:.2}");
    if let (Some(abs), Some(pct)) = (event.drop_abs, event.drop_pct) {
        s.push_str(&format!(" (-{abs:.2}, -{pct:.1}%)"));
    }
    if event.is_cheapest_now == Some(true) {
        s.push_str(" [cheapest offer]");
    }
    Some(s)
}

fn text_line(event: &MatchedEvent) -> String {
    let mut line = format!("- {} {}", event.sku_name, where_label(event));
    if let Some(detail) = price_detail(event) {
        line.push_str(": ");
        line.push_str(&detail);
    }
    line.push('\n');
    if !event.listing_url.is_empty() {
        line.push_str(&format!("  {}\n", event.listing_url));
    }
    line
}

fn html_item(event: &MatchedEvent) -> String {
    let name = if event.listing_url.is_empty() {
        escape(&event.sku_name)
    } else {
        format!(
            "<a href=\"{}\">{}</a>",
            escape(&event.listing_url),
            escape(&event.sku_name)
        )
    };
    let mut item = format!("<li>{name} {}", escape(&where_label(event)));
    if let Some(detail) = price_detail(event) {
        item.push_str(&format!(": {}", escape(&detail)));
    }
    item.push_str("</li>");
    item
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matched(event_type: EventType, name: &str, store_label: &str) -> MatchedEvent {
        MatchedEvent {
            event_id: "e1".to_string(),
            event_type,
            sku: "figure:123".to_string(),
            sku_name: name.to_string(),
            image_url: None,
            store_id: "s1".to_string(),
            store_label: store_label.to_string(),
            listing_url: "https://shop.example/e1".to_string(),
            market_id: "m1".to_string(),
            market_wide: false,
            old_price: None,
            new_price: None,
            drop_abs: None,
            drop_pct: None,
            is_cheapest_now: None,
            matched_rule_ids: vec!["r1".to_string()],
        }
    }

    #[test]
    fn subject_counts_events() {
        let events = vec![
            matched(EventType::GlobalNew, "Space Captain", "Shop A"),
            matched(EventType::PriceDrop, "Space Captain", "Shop B"),
        ];
        let digest = build_digest(&events);
        assert_eq!(digest.subject, "Pricewatch: 2 updates for your tracked items");
    }

    #[test]
    fn groups_by_event_type_in_input_order() {
        let mut drop = matched(EventType::PriceDrop, "Space Captain", "Shop B");
        drop.old_price = Some(120.0);
        drop.new_price = Some(90.0);
        drop.drop_abs = Some(30.0);
        drop.drop_pct = Some(25.0);
        let events = vec![matched(EventType::GlobalNew, "Space Captain", "Shop A"), drop];

        let digest = build_digest(&events);
        let new_at = digest.text.find("New on the market").unwrap();
        let drops_at = digest.text.find("Price drops").unwrap();
        assert!(new_at < drops_at);
        assert!(digest.text.contains("120.00 -> 90.00 (-30.00, -25.0%)"));
        assert!(digest.html.contains("<h2>Price drops</h2>"));
        assert!(digest.html.contains("href=\"https://shop.example/e1\""));
    }

    #[test]
    fn escapes_html_in_names() {
        let events = vec![matched(EventType::GlobalNew, "A <b> & co", "Shop")];
        let digest = build_digest(&events);
        assert!(digest.html.contains("A &lt;b&gt; &amp; co"));
        assert!(!digest.html.contains("A <b> & co"));
    }

    #[test]
    fn market_wide_entries_say_across_the_market() {
        let mut e = matched(EventType::GlobalNew, "Space Captain", "Shop A");
        e.market_wide = true;
        let digest = build_digest(&[e]);
        assert!(digest.text.contains("across the market"));
    }
}
