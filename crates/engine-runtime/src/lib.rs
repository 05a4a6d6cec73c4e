pub mod actor;
pub mod error;
pub mod execution;

#[cfg(test)]
mod tests;
