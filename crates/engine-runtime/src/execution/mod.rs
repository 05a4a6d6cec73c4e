pub mod executor;
pub mod workers;

pub use executor::{PipelineExecutor, start};
