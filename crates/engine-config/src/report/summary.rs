use crate::settings::AdvancePolicyKind;
use engine_core::metrics::MetricsSnapshot;
use model::{execution::loss::EnrichmentLoss, pagination::cursor::Cursor};
use serde::Serialize;
use std::fmt;

/// Final accounting of a completed pipeline run.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PipelineSummary {
    pub run_id: String,
    pub policy: AdvancePolicyKind,
    pub records_fetched: u64,
    pub records_enriched: u64,
    pub records_delivered: u64,
    pub records_lost: u64,
    pub pages_fetched: u64,
    pub batches_sent: u64,
    /// Highest cursor that was requested from the source.
    pub last_cursor: Option<Cursor>,
    /// Every cursor requested, in issue order.
    pub cursor_sequence: Vec<Cursor>,
    pub losses: Vec<EnrichmentLoss>,
    pub elapsed_ms: u64,
    pub metrics: MetricsSnapshot,
}

impl PipelineSummary {
    pub fn is_lossless(&self) -> bool {
        self.records_lost == 0
    }

    pub fn records_per_sec(&self) -> f64 {
        if self.elapsed_ms == 0 {
            return self.records_delivered as f64;
        }
        self.records_delivered as f64 / (self.elapsed_ms as f64 / 1000.0)
    }
}

impl fmt::Display for PipelineSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run {} ({})", self.run_id, self.policy)?;
        writeln!(
            f,
            "  fetched={} enriched={} delivered={} lost={}",
            self.records_fetched, self.records_enriched, self.records_delivered, self.records_lost
        )?;
        writeln!(
            f,
            "  pages={} batches={} last_cursor={}",
            self.pages_fetched,
            self.batches_sent,
            self.last_cursor
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string())
        )?;
        for loss in &self.losses {
            writeln!(f, "  lost record {}: {}", loss.record_id, loss.error)?;
        }
        write!(
            f,
            "  elapsed={}ms ({:.1} records/sec)",
            self.elapsed_ms,
            self.records_per_sec()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::records::record::RecordId;

    fn summary() -> PipelineSummary {
        PipelineSummary {
            run_id: "run-1".to_string(),
            policy: AdvancePolicyKind::QueueBounded,
            records_fetched: 10,
            records_enriched: 9,
            records_delivered: 9,
            records_lost: 1,
            pages_fetched: 3,
            batches_sent: 2,
            last_cursor: Some(Cursor::at(10)),
            cursor_sequence: vec![Cursor::at(0), Cursor::at(5), Cursor::at(10)],
            losses: vec![EnrichmentLoss::new(RecordId(4), "lookup refused")],
            elapsed_ms: 500,
            metrics: MetricsSnapshot::default(),
        }
    }

    #[test]
    fn throughput_uses_delivered_records() {
        assert_eq!(summary().records_per_sec(), 18.0);
        assert!(!summary().is_lossless());
    }

    #[test]
    fn display_lists_losses() {
        let text = summary().to_string();
        assert!(text.contains("lost record 4: lookup refused"));
        assert!(text.contains("last_cursor=10"));
    }

    #[test]
    fn serializes_policy_in_snake_case() {
        let json = serde_json::to_value(summary()).unwrap();
        assert_eq!(json["policy"], "queue_bounded");
        assert_eq!(json["cursor_sequence"].as_array().map(Vec::len), Some(3));
    }
}
