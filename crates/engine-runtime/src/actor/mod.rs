#[allow(clippy::module_inception)]
pub mod actor;
pub mod coordinator;
pub mod spawn;

pub use actor::{Actor, ActorContext, ActorRef};
