//! Data models

pub mod agent;
pub mod example;
pub mod llm_model;
pub mod message;
pub mod metrics;
pub mod query_log;

pub use agent::*;
pub use example::*;
pub use llm_model::*;
pub use message::*;
pub use query_log::*;

#[cfg(test)]
mod tests;
