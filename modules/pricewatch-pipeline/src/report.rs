//! The delivery report handed back to the caller.

use serde::Serialize;

/// Cap on the failure list; enough for operator triage without letting a
/// bad run bloat the report.
pub const MAX_REPORTED_FAILURES: usize = 25;

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryFailure {
    pub recipient: String,
    pub error: String,
}

/// Counters and failures from one dispatch run.
#[derive(Debug, Default, Serialize)]
pub struct DispatchReport {
    pub accounts_scanned: u32,
    pub accounts_matched: u32,
    pub emails_attempted: u32,
    pub emails_sent: u32,
    pub emails_failed: u32,
    pub skus_skipped: u32,
    pub events_skipped: u32,
    /// First [`MAX_REPORTED_FAILURES`] failures; `emails_failed` keeps the
    /// full count.
    pub failures: Vec<DeliveryFailure>,
}

impl DispatchReport {
    pub fn record_failure(&mut self, recipient: &str, error: String) {
        self.emails_failed += 1;
        if self.failures.len() < MAX_REPORTED_FAILURES {
            self.failures.push(DeliveryFailure {
                recipient: recipient.to_string(),
                error,
            });
        }
    }
}

impl std::fmt::Display for DispatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Dispatch Run Complete ===")?;
        writeln!(f, "Accounts scanned:   {}", self.accounts_scanned)?;
        writeln!(f, "Accounts matched:   {}", self.accounts_matched)?;
        writeln!(f, "Emails attempted:   {}", self.emails_attempted)?;
        writeln!(f, "Emails sent:        {}", self.emails_sent)?;
        writeln!(f, "Emails failed:      {}", self.emails_failed)?;
        if self.skus_skipped + self.events_skipped > 0 {
            writeln!(
                f,
                "Pack entries dropped: {} skus, {} events",
                self.skus_skipped, self.events_skipped
            )?;
        }
        if !self.failures.is_empty() {
            writeln!(f, "\nFailures:")?;
            for failure in &self.failures {
                writeln!(f, "  {}: {}", failure.recipient, failure.error)?;
            }
        }
        Ok(())
    }
}
