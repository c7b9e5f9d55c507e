//! The dispatch loop: scan → match → dedup → digest → send.
//!
//! Jobs run strictly sequentially (one live SMTP connection at a time) in
//! directory order. One recipient's failure is recorded and never blocks
//! the rest of the run; the run as a whole always completes with a report.

use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use pricewatch_common::pack::ValidatedPack;
use pricewatch_common::types::Job;
use pricewatch_notify::{build_digest, match_events};

use crate::report::DispatchReport;
use crate::scanner::scan_directory;
use crate::traits::{KvStore, Mailer};

pub struct Dispatcher<'a> {
    store: &'a dyn KvStore,
    mailer: &'a dyn Mailer,
    directory_prefix: &'a str,
    page_size: u32,
    /// Budget for one complete delivery attempt.
    send_timeout: Duration,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        store: &'a dyn KvStore,
        mailer: &'a dyn Mailer,
        directory_prefix: &'a str,
        page_size: u32,
        send_timeout: Duration,
    ) -> Self {
        Self {
            store,
            mailer,
            directory_prefix,
            page_size,
            send_timeout,
        }
    }

    /// Run one full dispatch cycle over a validated pack.
    pub async fn run(&self, validated: &ValidatedPack) -> anyhow::Result<DispatchReport> {
        let mut report = DispatchReport {
            skus_skipped: validated.skipped_skus,
            events_skipped: validated.skipped_events,
            ..Default::default()
        };

        let scan = scan_directory(self.store, self.directory_prefix, self.page_size)
            .await
            .context("directory scan failed")?;
        report.accounts_scanned = scan.scanned;
        info!(
            scanned = scan.scanned,
            candidates = scan.recipients.len(),
            "Directory scan complete"
        );

        let mut jobs: Vec<Job> = Vec::new();
        for recipient in scan.recipients {
            let events = match_events(&validated.pack, &recipient.rules, &recipient.favourites);
            if events.is_empty() {
                continue;
            }
            report.accounts_matched += 1;
            jobs.push(Job {
                user_id: recipient.user_id,
                recipient: recipient.email,
                events,
            });
        }

        for job in &jobs {
            let digest = build_digest(&job.events);
            report.emails_attempted += 1;
            match tokio::time::timeout(self.send_timeout, self.mailer.send(&job.recipient, &digest))
                .await
            {
                Ok(Ok(())) => {
                    report.emails_sent += 1;
                    info!(
                        recipient = job.recipient.as_str(),
                        events = job.events.len(),
                        "Digest delivered"
                    );
                }
                Ok(Err(e)) => {
                    warn!(recipient = job.recipient.as_str(), error = %e, "Delivery failed");
                    report.record_failure(&job.recipient, e.to_string());
                }
                Err(_) => {
                    warn!(recipient = job.recipient.as_str(), "Delivery timed out");
                    report.record_failure(
                        &job.recipient,
                        format!("delivery timed out after {:?}", self.send_timeout),
                    );
                }
            }
        }

        Ok(report)
    }
}
