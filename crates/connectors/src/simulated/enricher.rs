use crate::{
    adapter::Enricher,
    error::ConnectorError,
    simulated::{LatencyRange, draw},
};
use async_trait::async_trait;
use model::records::record::Record;
use serde_json::json;

const PRODUCTS: [&str; 5] = ["Chair", "Keyboard", "Lamp", "Kettle", "Bicycle"];

/// Every `every`-th record takes `multiplier` times longer to enrich.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anomaly {
    pub every: u64,
    pub multiplier: u32,
}

/// Looks up the orders of a company. The lookup latency grows with the
/// number of orders.
pub struct SimulatedOrderEnricher {
    per_order_latency: LatencyRange,
    orders_per_company: (u64, u64),
    anomaly: Option<Anomaly>,
    fail_every: Option<u64>,
}

impl Default for SimulatedOrderEnricher {
    fn default() -> Self {
        Self {
            per_order_latency: LatencyRange::new(3, 7),
            orders_per_company: (4, 8),
            anomaly: Some(Anomaly {
                every: 10,
                multiplier: 10,
            }),
            fail_every: None,
        }
    }
}

impl SimulatedOrderEnricher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: LatencyRange) -> Self {
        self.per_order_latency = latency;
        self
    }

    pub fn with_anomaly(mut self, anomaly: Option<Anomaly>) -> Self {
        self.anomaly = anomaly;
        self
    }

    /// Makes the lookup fail for every `n`-th record (ids `n-1`, `2n-1`, ...).
    pub fn with_failures_every(mut self, n: Option<u64>) -> Self {
        self.fail_every = n.filter(|n| *n > 0);
        self
    }

    fn is_nth(id: u64, every: u64) -> bool {
        every > 0 && (id + 1) % every == 0
    }
}

#[async_trait]
impl Enricher for SimulatedOrderEnricher {
    async fn enrich(&self, record: &Record) -> Result<serde_json::Value, ConnectorError> {
        let id = record.id.0;
        let (min_orders, max_orders) = self.orders_per_company;
        let order_count = draw(id, min_orders, max_orders);

        let multiplier = match self.anomaly {
            Some(a) if Self::is_nth(id, a.every) => a.multiplier,
            _ => 1,
        };
        let delay = self.per_order_latency.sample(id) * (order_count as u32) * multiplier;
        tokio::time::sleep(delay).await;

        if let Some(n) = self.fail_every
            && Self::is_nth(id, n)
        {
            return Err(ConnectorError::Rejected(format!(
                "orders lookup failed for company {id}"
            )));
        }

        let orders: Vec<_> = (0..order_count)
            .map(|i| {
                let order_id = id * 100 + i;
                json!({
                    "id": order_id,
                    "product_name": PRODUCTS[(order_id % PRODUCTS.len() as u64) as usize],
                    "price": format!("{}.00", draw(order_id, 5, 500)),
                })
            })
            .collect();

        Ok(json!({ "orders": orders }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn produces_orders_and_injected_failures() {
        let enricher = SimulatedOrderEnricher::new()
            .with_latency(LatencyRange::zero())
            .with_failures_every(Some(3));

        let ok = enricher.enrich(&Record::new(0, json!({}))).await.unwrap();
        let orders = ok["orders"].as_array().unwrap();
        assert!((4..=8).contains(&orders.len()));

        let err = enricher.enrich(&Record::new(2, json!({}))).await;
        assert!(matches!(err, Err(ConnectorError::Rejected(_))));
    }
}
