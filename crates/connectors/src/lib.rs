pub mod adapter;
pub mod error;
pub mod simulated;
