use engine_config::settings::AdvancePolicyKind;
use std::fmt;

/// Decides whether the offset controller may request another page.
///
/// `depth` is the controller's optimistic queue depth: records requested
/// (reconciled against short pages) minus records settled.
pub trait AdvancePolicy: Send + Sync + fmt::Debug {
    fn kind(&self) -> AdvancePolicyKind;

    fn may_advance(&self, depth: u64, batch_size: u64, max_queue_size: u64) -> bool;
}

/// Keeps the queue topped up to `max_queue_size`.
#[derive(Debug, Default, Clone, Copy)]
pub struct QueueBoundedPolicy;

impl AdvancePolicy for QueueBoundedPolicy {
    fn kind(&self) -> AdvancePolicyKind {
        AdvancePolicyKind::QueueBounded
    }

    fn may_advance(&self, depth: u64, batch_size: u64, max_queue_size: u64) -> bool {
        depth.saturating_add(batch_size) <= max_queue_size
    }
}

/// One page at a time: the next page is requested only once every record
/// of the previous one has been delivered or lost.
#[derive(Debug, Default, Clone, Copy)]
pub struct BatchGatedPolicy;

impl AdvancePolicy for BatchGatedPolicy {
    fn kind(&self) -> AdvancePolicyKind {
        AdvancePolicyKind::BatchGated
    }

    fn may_advance(&self, depth: u64, _batch_size: u64, _max_queue_size: u64) -> bool {
        depth == 0
    }
}

pub fn policy_for(kind: AdvancePolicyKind) -> Box<dyn AdvancePolicy> {
    match kind {
        AdvancePolicyKind::QueueBounded => Box::new(QueueBoundedPolicy),
        AdvancePolicyKind::BatchGated => Box::new(BatchGatedPolicy),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_bounded_fills_up_to_the_bound() {
        let policy = QueueBoundedPolicy;
        assert!(policy.may_advance(0, 5, 15));
        assert!(policy.may_advance(10, 5, 15));
        assert!(!policy.may_advance(11, 5, 15));
    }

    #[test]
    fn batch_gated_waits_for_an_empty_queue() {
        let policy = BatchGatedPolicy;
        assert!(policy.may_advance(0, 5, 15));
        assert!(!policy.may_advance(1, 5, 15));
    }

    #[test]
    fn kind_round_trips_through_factory() {
        for kind in [AdvancePolicyKind::QueueBounded, AdvancePolicyKind::BatchGated] {
            assert_eq!(policy_for(kind).kind(), kind);
        }
    }
}
