use crate::error::CliError;
use connectors::simulated::{
    SimulatedCompanySource, SimulatedEmailSink, SimulatedOrderEnricher,
};
use engine_config::settings::{AdvancePolicyKind, PipelineSettings};
use engine_runtime::execution::PipelineExecutor;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct BenchRun {
    pub policy: AdvancePolicyKind,
    pub repetition: usize,
    pub elapsed_ms: u64,
    pub records_delivered: u64,
    pub batches_sent: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PolicyAverage {
    pub policy: AdvancePolicyKind,
    pub runs: usize,
    pub avg_elapsed_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub records: usize,
    pub runs: Vec<BenchRun>,
    pub averages: Vec<PolicyAverage>,
}

impl BenchReport {
    fn new(records: usize, runs: Vec<BenchRun>) -> Self {
        let averages = [AdvancePolicyKind::QueueBounded, AdvancePolicyKind::BatchGated]
            .into_iter()
            .filter_map(|policy| {
                let elapsed: Vec<u64> = runs
                    .iter()
                    .filter(|r| r.policy == policy)
                    .map(|r| r.elapsed_ms)
                    .collect();
                if elapsed.is_empty() {
                    return None;
                }
                Some(PolicyAverage {
                    policy,
                    runs: elapsed.len(),
                    avg_elapsed_ms: elapsed.iter().sum::<u64>() as f64 / elapsed.len() as f64,
                })
            })
            .collect();

        Self {
            records,
            runs,
            averages,
        }
    }
}

/// Runs both policies `repetitions` times over fresh simulated collaborators.
pub async fn run(
    settings: PipelineSettings,
    records: usize,
    repetitions: usize,
    cancel: CancellationToken,
) -> Result<BenchReport, CliError> {
    let mut runs = Vec::with_capacity(repetitions * 2);

    for policy in [AdvancePolicyKind::QueueBounded, AdvancePolicyKind::BatchGated] {
        for repetition in 1..=repetitions {
            if cancel.is_cancelled() {
                return Err(CliError::ShutdownRequested);
            }

            let summary = PipelineExecutor::new(
                settings.clone().with_policy(policy),
                Arc::new(SimulatedCompanySource::new(records)),
                Arc::new(SimulatedOrderEnricher::new()),
                Arc::new(SimulatedEmailSink::new()),
            )
            .with_cancellation(cancel.clone())
            .run()
            .await?;

            info!(
                policy = %policy,
                repetition,
                elapsed_ms = summary.elapsed_ms,
                "Benchmark run finished"
            );
            runs.push(BenchRun {
                policy,
                repetition,
                elapsed_ms: summary.elapsed_ms,
                records_delivered: summary.records_delivered,
                batches_sent: summary.batches_sent,
            });
        }
    }

    Ok(BenchReport::new(records, runs))
}
