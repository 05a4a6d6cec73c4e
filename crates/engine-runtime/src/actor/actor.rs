use crate::error::ActorError;
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};
use tokio::sync::mpsc;

/// Per-actor bookkeeping handed to every callback.
#[derive(Debug, Clone)]
pub struct ActorContext {
    name: Arc<str>,
    handled: u64,
}

impl ActorContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            handled: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Messages handled so far, counting the one being handled.
    pub fn handled(&self) -> u64 {
        self.handled
    }

    pub(crate) fn record_message(&mut self) {
        self.handled += 1;
    }
}

/// A single-threaded state owner driven by its mailbox.
///
/// Messages are handled strictly one at a time, so an actor's state needs no
/// locking. `on_start` runs before the first message and `on_stop` after the
/// mailbox has closed and drained.
#[async_trait]
pub trait Actor<M>: Send + 'static
where
    M: Send + Debug + 'static,
{
    async fn on_start(&mut self, _ctx: &ActorContext) -> Result<(), ActorError> {
        Ok(())
    }

    async fn handle(&mut self, msg: M, ctx: &ActorContext) -> Result<(), ActorError>;

    async fn on_stop(&mut self, _ctx: &ActorContext) -> Result<(), ActorError> {
        Ok(())
    }
}

/// Sending side of an actor's mailbox.
#[derive(Debug)]
pub struct ActorRef<M>
where
    M: Send + Debug + 'static,
{
    name: Arc<str>,
    tx: mpsc::Sender<M>,
}

impl<M> Clone for ActorRef<M>
where
    M: Send + Debug + 'static,
{
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            tx: self.tx.clone(),
        }
    }
}

impl<M> ActorRef<M>
where
    M: Send + Debug + 'static,
{
    pub fn new(name: impl Into<String>, tx: mpsc::Sender<M>) -> Self {
        Self {
            name: Arc::from(name.into()),
            tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Waits for mailbox capacity, then enqueues `msg`.
    pub async fn send(&self, msg: M) -> Result<(), ActorError> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| ActorError::MailboxClosed)
    }

    /// A plain sender for components that report into this mailbox. Each
    /// clone keeps the actor alive until it is dropped.
    pub fn sender(&self) -> mpsc::Sender<M> {
        self.tx.clone()
    }

    /// A sender that does not keep the mailbox open.
    pub fn downgrade(&self) -> mpsc::WeakSender<M> {
        self.tx.downgrade()
    }
}
