pub mod backpressure;
pub mod buffer;
pub mod controller;
pub mod error;
pub mod message;
pub mod stage;
pub mod state;
