pub mod kv;
pub mod mirror;
pub mod queue;
