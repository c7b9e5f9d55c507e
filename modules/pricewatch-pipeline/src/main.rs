use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pricewatch_common::{pack, Config};
use pricewatch_pipeline::{Dispatcher, MemoryKv, SmtpMailer};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("pricewatch=info".parse()?))
        .init();

    info!("Pricewatch dispatch starting...");

    // Load config
    let config = Config::from_env();
    config.log_redacted();

    let mut args = std::env::args().skip(1);
    let pack_path = args
        .next()
        .context("usage: pricewatch <event-pack.json> [directory-snapshot.json]")?;

    let raw = std::fs::read_to_string(&pack_path)
        .with_context(|| format!("failed to read event pack {pack_path}"))?;
    let doc: Value = serde_json::from_str(&raw).context("event pack is not valid JSON")?;
    let validated = pack::validate(doc)?;
    info!(
        events = validated.pack.events.len(),
        skus = validated.pack.skus.len(),
        skipped_events = validated.skipped_events,
        skipped_skus = validated.skipped_skus,
        "Event pack validated"
    );

    let store = MemoryKv::new();
    if let Some(snapshot_path) = args.next() {
        let raw = std::fs::read_to_string(&snapshot_path)
            .with_context(|| format!("failed to read directory snapshot {snapshot_path}"))?;
        let snapshot: Value =
            serde_json::from_str(&raw).context("directory snapshot is not valid JSON")?;
        store.load_snapshot(&snapshot).await?;
        info!(path = snapshot_path.as_str(), "Directory snapshot loaded");
    }

    let mailer = SmtpMailer::new(&config).map_err(|e| anyhow::anyhow!("SMTP setup failed: {e}"))?;
    let dispatcher = Dispatcher::new(
        &store,
        &mailer,
        &config.directory_prefix,
        config.directory_page_size,
        std::time::Duration::from_secs(config.send_timeout_secs),
    );

    let report = dispatcher.run(&validated).await?;
    info!("Dispatch run complete. {report}");
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
