pub mod batch;
pub mod enriched;
pub mod record;
