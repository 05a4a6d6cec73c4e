use crate::{adapter::RecordSource, error::ConnectorError, simulated::LatencyRange};
use async_trait::async_trait;
use model::records::record::Record;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

const CITIES: [&str; 6] = ["Lisbon", "Osaka", "Denver", "Tallinn", "Cusco", "Perth"];
const COUNTRY_CODES: [&str; 6] = ["PT", "JP", "US", "EE", "PE", "AU"];

/// Company directory with a fixed number of entries, served page by page.
pub struct SimulatedCompanySource {
    total: usize,
    per_record_latency: LatencyRange,
    calls: AtomicUsize,
}

impl SimulatedCompanySource {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            per_record_latency: LatencyRange::new(4, 8),
            calls: AtomicUsize::new(0),
        }
    }

    /// Latency paid per served record, so larger pages take longer.
    pub fn with_latency(mut self, latency: LatencyRange) -> Self {
        self.per_record_latency = latency;
        self
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RecordSource for SimulatedCompanySource {
    async fn fetch(&self, limit: usize, offset: usize) -> Result<Vec<Record>, ConnectorError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let end = self.total.min(offset.saturating_add(limit));
        let records: Vec<Record> = (offset..end)
            .map(|i| {
                Record::new(
                    i as u64,
                    json!({
                        "name": format!("Company {i}"),
                        "city": CITIES[i % CITIES.len()],
                        "country_code": COUNTRY_CODES[i % COUNTRY_CODES.len()],
                    }),
                )
            })
            .collect();

        // An empty page still costs one round trip.
        let served = u32::try_from(records.len().max(1)).unwrap_or(u32::MAX);
        let delay = self.per_record_latency.sample(offset as u64).saturating_mul(served);
        tokio::time::sleep(delay).await;

        if records.is_empty() {
            debug!(offset, "Simulated source exhausted");
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn serves_short_last_page_then_empty() {
        let source = SimulatedCompanySource::new(12).with_latency(LatencyRange::zero());

        let page = source.fetch(5, 10).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id.0, 10);

        assert!(source.fetch(5, 15).await.unwrap().is_empty());
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn short_page_costs_only_the_records_served() {
        let source = SimulatedCompanySource::new(12).with_latency(LatencyRange::new(10, 10));

        let started = tokio::time::Instant::now();
        assert_eq!(source.fetch(5, 0).await.unwrap().len(), 5);
        assert_eq!(started.elapsed(), Duration::from_millis(50));

        let started = tokio::time::Instant::now();
        assert_eq!(source.fetch(5, 10).await.unwrap().len(), 2);
        assert_eq!(started.elapsed(), Duration::from_millis(20));

        let started = tokio::time::Instant::now();
        assert!(source.fetch(usize::MAX, 12).await.unwrap().is_empty());
        assert_eq!(started.elapsed(), Duration::from_millis(10));
    }
}
