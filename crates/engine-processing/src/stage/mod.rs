//! Bounded-concurrency worker pools for the fetch, enrichment and delivery
//! stages. Each pool drains its input channel with at most `concurrency`
//! calls in flight and ends once the input closes and every call finished.

use crate::message::StageEvent;
use futures::{Stream, stream};
use tokio::sync::mpsc;
use tracing::error;

pub mod delivery;
pub mod enrich;
pub mod fetch;

pub use delivery::DeliveryStage;
pub use enrich::EnrichStage;
pub use fetch::FetchStage;

pub(crate) fn receiver_stream<T>(rx: mpsc::Receiver<T>) -> impl Stream<Item = T> {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) })
}

pub(crate) fn unbounded_stream<T>(rx: mpsc::UnboundedReceiver<T>) -> impl Stream<Item = T> {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) })
}

/// Sends a progress event to the coordinator. The mailbox only closes if the
/// coordinator is gone, in which case there is nobody left to tell.
pub(crate) async fn report(events: &mpsc::Sender<StageEvent>, event: StageEvent) {
    let name = event.name();
    if events.send(event).await.is_err() {
        error!(event = name, "Coordinator mailbox closed, event dropped");
    }
}
