use crate::actor::{Actor, ActorContext, ActorRef};
use std::fmt::Debug;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error};

/// Spawns a Tokio task that runs the actor event loop.
///
/// The loop ends when every `ActorRef` (and every sender cloned from one) is
/// dropped. The join handle yields the actor back so its final state can be
/// inspected.
pub fn spawn_actor<M, A>(
    name: impl Into<String>,
    mailbox_capacity: usize,
    mut actor: A,
) -> (ActorRef<M>, JoinHandle<A>)
where
    A: Actor<M>,
    M: Send + Debug + 'static,
{
    let name_str = name.into();
    let mut ctx = ActorContext::new(name_str.clone());
    let (tx, mut rx) = mpsc::channel::<M>(mailbox_capacity.max(1));
    let actor_ref = ActorRef::new(name_str, tx);

    let handle = tokio::spawn(async move {
        if let Err(e) = actor.on_start(&ctx).await {
            error!(actor = %ctx.name(), ?e, "actor on_start failed");
            rx.close();
        }

        while let Some(msg) = rx.recv().await {
            ctx.record_message();
            if let Err(e) = actor.handle(msg, &ctx).await {
                error!(actor = %ctx.name(), ?e, "actor handle failed");
            }
        }

        debug!(actor = %ctx.name(), handled = ctx.handled(), "mailbox closed");
        if let Err(e) = actor.on_stop(&ctx).await {
            error!(actor = %ctx.name(), ?e, "actor on_stop failed");
        }
        actor
    });

    (actor_ref, handle)
}
