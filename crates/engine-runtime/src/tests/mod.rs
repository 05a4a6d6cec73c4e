mod coordinator;
mod executor;
