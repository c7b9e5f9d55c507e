//! Integration tests for the dispatch loop: in-memory directory, recording
//! mailer, no network.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use pricewatch_common::pack;
use pricewatch_notify::Digest;
use pricewatch_pipeline::{Dispatcher, KvStore, Mailer, MemoryKv};

const USER_A: &str = "11111111-1111-1111-1111-111111111111";
const USER_B: &str = "22222222-2222-2222-2222-222222222222";
const USER_C: &str = "33333333-3333-3333-3333-333333333333";

// ---------------------------------------------------------------------------
// Recording mailer
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MockMailer {
    sent: Mutex<Vec<(String, String)>>,
    fail_for: Option<String>,
    delay: Option<Duration>,
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, recipient: &str, digest: &Digest) -> anyhow::Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_for.as_deref() == Some(recipient) {
            anyhow::bail!("550 5.1.1 no such user");
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), digest.subject.clone()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn pack_doc() -> Value {
    json!({
        "version": 1,
        "generatedAt": "2026-08-28T06:00:00Z",
        "skus": {
            "figure:123": {"sku": "figure:123", "name": "Space Captain", "members": ["figure:123b"]},
            "figure:456": {"sku": "figure:456", "name": "Deep Sea Diver"},
        },
        "events": [
            {"id": "e1", "eventType": "PRICE_DROP", "sku": "figure:123", "storeId": "store:1",
             "storeLabel": "Shop One", "oldPrice": 120.0, "newPrice": 90.0,
             "dropAbs": 30.0, "dropPct": 25.0, "isCheapestNow": true},
            {"id": "e2", "eventType": "GLOBAL_NEW", "sku": "figure:456", "marketId": "m-456",
             "marketNew": true},
        ],
    })
}

async fn seed_user(kv: &MemoryKv, key: &str, user_id: &str, email: &str, verified: bool) {
    kv.put(key, json!({"userId": user_id, "email": email, "verified": verified}))
        .await
        .unwrap();
}

async fn seed_rules(kv: &MemoryKv, user_id: &str, rules: Value) {
    kv.put(&format!("profile:{user_id}"), json!({"version": 1, "rules": rules}))
        .await
        .unwrap();
}

fn dispatcher<'a>(kv: &'a MemoryKv, mailer: &'a MockMailer) -> Dispatcher<'a> {
    Dispatcher::new(kv, mailer, "acct:", 200, Duration::from_secs(5))
}

// ---------------------------------------------------------------------------
// Behavior
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delivers_one_digest_per_matching_recipient() {
    let kv = MemoryKv::new();
    seed_user(&kv, "acct:a@example.com", USER_A, "a@example.com", true).await;
    seed_rules(&kv, USER_A, json!([{"id": "r1", "eventType": "PRICE_DROP"}])).await;
    seed_user(&kv, "acct:b@example.com", USER_B, "b@example.com", true).await;
    seed_rules(&kv, USER_B, json!([{"id": "r1", "eventType": "GLOBAL_NEW"}])).await;

    let mailer = MockMailer::default();
    let report = dispatcher(&kv, &mailer)
        .run(&pack::validate(pack_doc()).unwrap())
        .await
        .unwrap();

    assert_eq!(report.accounts_scanned, 2);
    assert_eq!(report.accounts_matched, 2);
    assert_eq!(report.emails_attempted, 2);
    assert_eq!(report.emails_sent, 2);
    assert_eq!(report.emails_failed, 0);

    let sent = mailer.sent.lock().unwrap();
    // Directory order is deterministic (key order).
    assert_eq!(sent[0].0, "a@example.com");
    assert_eq!(sent[1].0, "b@example.com");
    assert!(sent[0].1.contains("1 update"));
}

#[tokio::test]
async fn one_failed_recipient_never_blocks_the_rest() {
    let kv = MemoryKv::new();
    seed_user(&kv, "acct:a@example.com", USER_A, "a@example.com", true).await;
    seed_rules(&kv, USER_A, json!([{"id": "r1", "eventType": "PRICE_DROP"}])).await;
    seed_user(&kv, "acct:b@example.com", USER_B, "b@example.com", true).await;
    seed_rules(&kv, USER_B, json!([{"id": "r1", "eventType": "GLOBAL_NEW"}])).await;

    let mailer = MockMailer {
        fail_for: Some("a@example.com".to_string()),
        ..Default::default()
    };
    let report = dispatcher(&kv, &mailer)
        .run(&pack::validate(pack_doc()).unwrap())
        .await
        .unwrap();

    assert_eq!(report.emails_attempted, 2);
    assert_eq!(report.emails_sent, 1);
    assert_eq!(report.emails_failed, 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].recipient, "a@example.com");
    assert!(report.failures[0].error.contains("550"));

    let sent = mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "b@example.com");
}

#[tokio::test]
async fn slow_delivery_is_recorded_as_timeout_failure() {
    let kv = MemoryKv::new();
    seed_user(&kv, "acct:a@example.com", USER_A, "a@example.com", true).await;
    seed_rules(&kv, USER_A, json!([{"id": "r1", "eventType": "PRICE_DROP"}])).await;

    let mailer = MockMailer {
        delay: Some(Duration::from_millis(500)),
        ..Default::default()
    };
    let dispatcher = Dispatcher::new(&kv, &mailer, "acct:", 200, Duration::from_millis(20));
    let report = dispatcher
        .run(&pack::validate(pack_doc()).unwrap())
        .await
        .unwrap();

    assert_eq!(report.emails_sent, 0);
    assert_eq!(report.emails_failed, 1);
    assert!(report.failures[0].error.contains("timed out"));
}

#[tokio::test]
async fn alias_keys_for_one_user_produce_one_digest() {
    let kv = MemoryKv::new();
    seed_user(&kv, "acct:a@example.com", USER_A, "a@example.com", true).await;
    seed_user(&kv, "acct:alias@example.com", USER_A, "a@example.com", true).await;
    seed_rules(&kv, USER_A, json!([{"id": "r1", "eventType": "PRICE_DROP"}])).await;

    let mailer = MockMailer::default();
    let report = dispatcher(&kv, &mailer)
        .run(&pack::validate(pack_doc()).unwrap())
        .await
        .unwrap();

    assert_eq!(report.accounts_scanned, 2);
    assert_eq!(report.accounts_matched, 1);
    assert_eq!(mailer.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn skips_unverified_malformed_and_ruleless_accounts() {
    let kv = MemoryKv::new();
    // Unverified.
    seed_user(&kv, "acct:a@example.com", USER_A, "a@example.com", false).await;
    seed_rules(&kv, USER_A, json!([{"id": "r1", "eventType": "PRICE_DROP"}])).await;
    // Malformed user id.
    seed_user(&kv, "acct:b@example.com", "not-a-uuid", "b@example.com", true).await;
    // Only disabled rules.
    seed_user(&kv, "acct:c@example.com", USER_B, "c@example.com", true).await;
    seed_rules(
        &kv,
        USER_B,
        json!([{"id": "r1", "eventType": "PRICE_DROP", "enabled": false}]),
    )
    .await;
    // No profile at all.
    seed_user(&kv, "acct:d@example.com", USER_C, "d@example.com", true).await;

    let mailer = MockMailer::default();
    let report = dispatcher(&kv, &mailer)
        .run(&pack::validate(pack_doc()).unwrap())
        .await
        .unwrap();

    assert_eq!(report.accounts_scanned, 4);
    assert_eq!(report.accounts_matched, 0);
    assert_eq!(report.emails_attempted, 0);
}

#[tokio::test]
async fn shortlist_rules_only_fire_for_favourited_skus() {
    let kv = MemoryKv::new();
    seed_user(&kv, "acct:a@example.com", USER_A, "a@example.com", true).await;
    seed_rules(
        &kv,
        USER_A,
        json!([{"id": "r1", "eventType": "PRICE_DROP", "scope": "shortlist"}]),
    )
    .await;
    // Favourites cover the alias member, not the canonical sku.
    kv.put(&format!("favs:{USER_A}"), json!(["figure:123b"]))
        .await
        .unwrap();

    seed_user(&kv, "acct:b@example.com", USER_B, "b@example.com", true).await;
    seed_rules(
        &kv,
        USER_B,
        json!([{"id": "r1", "eventType": "PRICE_DROP", "scope": "shortlist"}]),
    )
    .await;
    kv.put(&format!("favs:{USER_B}"), json!(["figure:999"]))
        .await
        .unwrap();

    let mailer = MockMailer::default();
    let report = dispatcher(&kv, &mailer)
        .run(&pack::validate(pack_doc()).unwrap())
        .await
        .unwrap();

    assert_eq!(report.accounts_matched, 1);
    let sent = mailer.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "a@example.com");
}

#[tokio::test]
async fn scan_walks_every_page() {
    let kv = MemoryKv::new();
    let ids = [
        USER_A,
        USER_B,
        USER_C,
        "44444444-4444-4444-4444-444444444444",
        "55555555-5555-5555-5555-555555555555",
    ];
    for (i, id) in ids.iter().enumerate() {
        let email = format!("u{i}@example.com");
        seed_user(&kv, &format!("acct:{email}"), id, &email, true).await;
        seed_rules(&kv, id, json!([{"id": "r1", "eventType": "GLOBAL_NEW"}])).await;
    }

    let mailer = MockMailer::default();
    let dispatcher = Dispatcher::new(&kv, &mailer, "acct:", 2, Duration::from_secs(5));
    let report = dispatcher
        .run(&pack::validate(pack_doc()).unwrap())
        .await
        .unwrap();

    assert_eq!(report.accounts_scanned, 5);
    assert_eq!(report.emails_sent, 5);
}
