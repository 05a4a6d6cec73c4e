use crate::actor::{coordinator::PipelineCoordinator, spawn::spawn_actor};
use engine_config::settings::AdvancePolicyKind;
use engine_core::{event_bus::bus::EventBus, metrics::Metrics};
use engine_processing::{
    controller::{OffsetController, policy::policy_for},
    message::{BufferCommand, FetchRequest, StageEvent},
    state::PipelineState,
};
use model::{
    events::pipeline::PhaseChanged,
    execution::phase::PipelinePhase,
    pagination::cursor::Cursor,
    records::{batch::FlushTrigger, record::RecordId},
};
use tokio::sync::mpsc;

struct Wiring {
    fetch_rx: mpsc::UnboundedReceiver<FetchRequest>,
    flush_rx: mpsc::UnboundedReceiver<BufferCommand>,
    coordinator: PipelineCoordinator,
}

fn wiring(policy: AdvancePolicyKind, bus: EventBus) -> Wiring {
    let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();
    let (flush_tx, flush_rx) = mpsc::unbounded_channel();
    let state = PipelineState::new(OffsetController::new(policy_for(policy), 5, 15));
    let coordinator =
        PipelineCoordinator::new("run-test", state, fetch_tx, flush_tx, bus, Metrics::new());

    Wiring {
        fetch_rx,
        flush_rx,
        coordinator,
    }
}

async fn next_offset(rx: &mut mpsc::UnboundedReceiver<FetchRequest>) -> usize {
    rx.recv().await.unwrap().cursor.offset()
}

#[tokio::test]
async fn drives_a_short_source_to_completion() {
    let bus = EventBus::new();
    let (_sub, mut phases) = bus.subscribe::<PhaseChanged>(16).await;
    let mut w = wiring(AdvancePolicyKind::QueueBounded, bus);
    let (actor, handle) = spawn_actor("coordinator", 16, w.coordinator);

    assert_eq!(next_offset(&mut w.fetch_rx).await, 0);
    actor
        .send(StageEvent::PageFetched {
            cursor: Cursor::start(),
            count: 3,
        })
        .await
        .unwrap();
    assert_eq!(next_offset(&mut w.fetch_rx).await, 5);
    assert_eq!(next_offset(&mut w.fetch_rx).await, 10);

    for offset in [5, 10] {
        actor
            .send(StageEvent::SourceExhausted {
                cursor: Cursor::at(offset),
            })
            .await
            .unwrap();
    }
    // Intake closed: the fetch queue ends.
    assert!(w.fetch_rx.recv().await.is_none());

    for id in 0..3 {
        actor
            .send(StageEvent::RecordEnriched {
                record_id: RecordId(id),
            })
            .await
            .unwrap();
    }
    actor
        .send(StageEvent::BatchFlushed {
            batch_id: "b1".into(),
            size: 3,
            trigger: FlushTrigger::Drain,
        })
        .await
        .unwrap();
    actor
        .send(StageEvent::BatchDelivered {
            batch_id: "b1".into(),
            size: 3,
        })
        .await
        .unwrap();
    drop(actor);

    let coordinator = handle.await.unwrap();
    let summary = coordinator.into_summary().unwrap();
    assert_eq!(summary.records_delivered, 3);
    assert_eq!(summary.batches_sent, 1);
    assert_eq!(
        summary.cursor_sequence,
        vec![Cursor::at(0), Cursor::at(5), Cursor::at(10)]
    );
    assert!(w.flush_rx.try_recv().is_err());

    let mut seen = Vec::new();
    while let Ok(change) = phases.try_recv() {
        seen.push((change.from, change.to));
    }
    assert_eq!(
        seen,
        vec![
            (PipelinePhase::Idle, PipelinePhase::Running),
            (PipelinePhase::Running, PipelinePhase::Draining),
            (PipelinePhase::Draining, PipelinePhase::Complete),
        ]
    );
}

#[tokio::test]
async fn requests_a_settle_flush_for_a_stranded_partial_batch() {
    let mut w = wiring(AdvancePolicyKind::BatchGated, EventBus::new());
    let (actor, handle) = spawn_actor("coordinator", 16, w.coordinator);

    assert_eq!(next_offset(&mut w.fetch_rx).await, 0);
    actor
        .send(StageEvent::PageFetched {
            cursor: Cursor::start(),
            count: 2,
        })
        .await
        .unwrap();
    for id in 0..2 {
        actor
            .send(StageEvent::RecordEnriched {
                record_id: RecordId(id),
            })
            .await
            .unwrap();
    }

    assert_eq!(
        w.flush_rx.recv().await,
        Some(BufferCommand::Flush { through: 2 })
    );

    drop(actor);
    let err = handle.await.unwrap().into_summary().unwrap_err();
    assert_eq!(err.kind(), "invariant_violation");
}

#[tokio::test]
async fn fatal_event_fails_the_run() {
    let mut w = wiring(AdvancePolicyKind::QueueBounded, EventBus::new());
    let (actor, handle) = spawn_actor("coordinator", 16, w.coordinator);

    assert_eq!(next_offset(&mut w.fetch_rx).await, 0);
    actor.send(StageEvent::Cancelled).await.unwrap();
    actor
        .send(StageEvent::SourceExhausted {
            cursor: Cursor::start(),
        })
        .await
        .unwrap();
    assert!(w.fetch_rx.recv().await.is_none());

    drop(actor);
    let coordinator = handle.await.unwrap();
    assert_eq!(coordinator.state().phase(), PipelinePhase::Failed);
    assert_eq!(coordinator.into_summary().unwrap_err().kind(), "cancelled");
}
