use crate::settings::{
    PipelineSettings, error::SettingsError, validated::ValidatedSettings,
};
use std::{num::NonZeroUsize, time::Duration};
use tracing::{info, warn};

const LARGE_QUEUE_WARNING: usize = 1_000_000;
const LARGE_CONCURRENCY_WARNING: usize = 1_024;

/// Validates pipeline settings before the pipeline is allowed to start.
///
/// Every rule is checked and all violations are reported together.
#[derive(Debug, Default)]
pub struct SettingsValidator;

impl SettingsValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(
        &self,
        settings: &PipelineSettings,
    ) -> Result<ValidatedSettings, SettingsError> {
        let mut errors: Vec<String> = Vec::new();

        let batch_size = Self::positive("batch_size", settings.batch_size, &mut errors);
        let max_queue_size = Self::positive("max_queue_size", settings.max_queue_size, &mut errors);
        let fetch_concurrency =
            Self::positive("fetch_concurrency", settings.fetch_concurrency, &mut errors);
        let enrich_concurrency =
            Self::positive("enrich_concurrency", settings.enrich_concurrency, &mut errors);
        let delivery_concurrency = Self::positive(
            "delivery_concurrency",
            settings.delivery_concurrency,
            &mut errors,
        );
        let max_batch_size = Self::positive("max_batch_size", settings.max_batch_size, &mut errors);
        let channel_capacity =
            Self::positive("channel_capacity", settings.channel_capacity, &mut errors);
        let mailbox_capacity =
            Self::positive("mailbox_capacity", settings.mailbox_capacity, &mut errors);

        self.check_relations(settings, &mut errors);
        self.warn_on_large_values(settings);

        if !errors.is_empty() {
            return Err(SettingsError::ValidationFailed(errors));
        }

        // Every `positive` check passed, so the options below are all `Some`.
        let (
            Some(batch_size),
            Some(max_queue_size),
            Some(fetch_concurrency),
            Some(enrich_concurrency),
            Some(delivery_concurrency),
            Some(max_batch_size),
            Some(channel_capacity),
            Some(mailbox_capacity),
        ) = (
            batch_size,
            max_queue_size,
            fetch_concurrency,
            enrich_concurrency,
            delivery_concurrency,
            max_batch_size,
            channel_capacity,
            mailbox_capacity,
        )
        else {
            return Err(SettingsError::ValidationFailed(vec![
                "settings contain zero-sized values".to_string(),
            ]));
        };

        let validated = ValidatedSettings {
            batch_size,
            max_queue_size,
            fetch_concurrency,
            enrich_concurrency,
            delivery_concurrency,
            max_batch_size,
            flush_timeout: (settings.flush_timeout_ms > 0)
                .then(|| Duration::from_millis(settings.flush_timeout_ms)),
            policy: settings.policy,
            on_enrichment_error: settings.on_enrichment_error,
            channel_capacity,
            mailbox_capacity,
        };

        info!("Settings validation completed successfully");
        self.log_validated_settings(&validated);

        Ok(validated)
    }

    fn positive(name: &str, value: usize, errors: &mut Vec<String>) -> Option<NonZeroUsize> {
        let value = NonZeroUsize::new(value);
        if value.is_none() {
            errors.push(format!("{name} must be greater than 0"));
        }
        value
    }

    fn check_relations(&self, settings: &PipelineSettings, errors: &mut Vec<String>) {
        if settings.batch_size == 0 {
            return;
        }

        if settings.max_queue_size < settings.batch_size {
            errors.push(format!(
                "max_queue_size {} must be at least batch_size {}",
                settings.max_queue_size, settings.batch_size
            ));
        }

        if settings.max_batch_size > settings.batch_size {
            errors.push(format!(
                "max_batch_size {} cannot be higher than batch_size {}",
                settings.max_batch_size, settings.batch_size
            ));
        }
    }

    fn warn_on_large_values(&self, settings: &PipelineSettings) {
        if settings.max_queue_size > LARGE_QUEUE_WARNING {
            warn!(
                "max_queue_size {} is very large, may cause memory issues",
                settings.max_queue_size
            );
        }

        let concurrency = [
            ("fetch_concurrency", settings.fetch_concurrency),
            ("enrich_concurrency", settings.enrich_concurrency),
            ("delivery_concurrency", settings.delivery_concurrency),
        ];
        for (name, value) in concurrency {
            if value > LARGE_CONCURRENCY_WARNING {
                warn!("{name} {value} is very large for a single pipeline");
            }
        }
    }

    fn log_validated_settings(&self, settings: &ValidatedSettings) {
        info!("=== Validated Settings ===");
        info!("  Batch Size: {}", settings.batch_size());
        info!("  Max Queue Size: {}", settings.max_queue_size());
        info!("  Max Batch Size: {}", settings.max_batch_size());
        info!(
            "  Concurrency (fetch/enrich/deliver): {}/{}/{}",
            settings.fetch_concurrency(),
            settings.enrich_concurrency(),
            settings.delivery_concurrency()
        );
        info!("  Flush Timeout: {:?}", settings.flush_timeout());
        info!("  Policy: {}", settings.policy());
        info!("  On Enrichment Error: {:?}", settings.on_enrichment_error());
        info!("=========================");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(settings: PipelineSettings) -> Result<ValidatedSettings, SettingsError> {
        SettingsValidator::new().validate(&settings)
    }

    #[test]
    fn defaults_are_valid() {
        let validated = validate(PipelineSettings::default()).unwrap();
        assert_eq!(validated.batch_size(), 5);
        assert_eq!(validated.flush_timeout(), Some(Duration::from_millis(500)));
    }

    #[test]
    fn queue_smaller_than_page_is_rejected() {
        let err = validate(
            PipelineSettings::default()
                .with_batch_size(5)
                .with_max_queue_size(3)
                .with_max_batch_size(5),
        )
        .unwrap_err();

        assert!(matches!(err, SettingsError::ValidationFailed(_)));
        assert_eq!(err.violations().len(), 1);
        assert!(err.violations()[0].contains("max_queue_size"));
    }

    #[test]
    fn batch_larger_than_page_is_rejected() {
        let err = validate(
            PipelineSettings::default()
                .with_batch_size(5)
                .with_max_batch_size(10),
        )
        .unwrap_err();

        assert!(err.violations()[0].contains("max_batch_size 10"));
    }

    #[test]
    fn collects_every_violation() {
        let err = validate(PipelineSettings::default().with_concurrency(0, 0, 0)).unwrap_err();
        assert_eq!(err.violations().len(), 3);
    }

    #[test]
    fn zero_batch_size_skips_relation_checks() {
        let err = validate(PipelineSettings::default().with_batch_size(0)).unwrap_err();
        assert_eq!(err.violations(), ["batch_size must be greater than 0"]);
    }

    #[test]
    fn zero_timeout_disables_time_flush() {
        let validated = validate(PipelineSettings::default().with_flush_timeout_ms(0)).unwrap();
        assert_eq!(validated.flush_timeout(), None);
    }
}
