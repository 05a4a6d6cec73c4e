pub mod loss;
pub mod phase;
