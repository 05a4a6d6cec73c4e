use crate::{bench::BenchReport, error::CliError};
use engine_config::{report::summary::PipelineSummary, settings::validated::ValidatedSettings};
use serde_json::{Value, json};

pub fn print_summary(summary: &PipelineSummary, as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        println!("{summary}");
    }
    Ok(())
}

pub async fn write_summary(summary: &PipelineSummary, path: &str) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(summary)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

fn validated_json(settings: &ValidatedSettings) -> Value {
    json!({
        "batch_size": settings.batch_size(),
        "max_queue_size": settings.max_queue_size(),
        "max_batch_size": settings.max_batch_size(),
        "fetch_concurrency": settings.fetch_concurrency().get(),
        "enrich_concurrency": settings.enrich_concurrency().get(),
        "delivery_concurrency": settings.delivery_concurrency().get(),
        "flush_timeout_ms": settings.flush_timeout().map(|t| t.as_millis() as u64),
        "policy": settings.policy(),
        "on_enrichment_error": settings.on_enrichment_error(),
        "channel_capacity": settings.channel_capacity(),
        "mailbox_capacity": settings.mailbox_capacity(),
    })
}

pub fn print_validated(settings: &ValidatedSettings, as_json: bool) -> Result<(), CliError> {
    let value = validated_json(settings);
    if as_json {
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Settings are valid:");
    if let Value::Object(fields) = value {
        for (key, v) in fields {
            let shown = match v {
                Value::Null => "disabled".to_string(),
                Value::String(s) => s,
                other => other.to_string(),
            };
            println!("  {key:<22} {shown}");
        }
    }
    Ok(())
}

pub fn print_violations(violations: &[String]) {
    eprintln!("Settings are invalid:");
    for violation in violations {
        eprintln!("  - {violation}");
    }
}

pub fn print_bench(report: &BenchReport, as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("Benchmark over {} records", report.records);
    println!("{:<15} {:>4} {:>12} {:>10}", "policy", "run", "elapsed_ms", "batches");
    for run in &report.runs {
        println!(
            "{:<15} {:>4} {:>12} {:>10}",
            run.policy.to_string(),
            run.repetition,
            run.elapsed_ms,
            run.batches_sent
        );
    }
    for avg in &report.averages {
        println!(
            "{:<15} avg over {} runs: {:.1}ms",
            avg.policy.to_string(),
            avg.runs,
            avg.avg_elapsed_ms
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_config::settings::{PipelineSettings, validator::SettingsValidator};

    #[test]
    fn zero_timeout_shows_as_null() {
        let settings = PipelineSettings::default().with_flush_timeout_ms(0);
        let validated = SettingsValidator::new().validate(&settings).unwrap();

        let value = validated_json(&validated);
        assert_eq!(value["flush_timeout_ms"], Value::Null);
        assert_eq!(value["policy"], "queue_bounded");
        assert_eq!(value["enrich_concurrency"], 5);
    }
}
