//! Request handlers

pub mod agents;
pub mod ask;
pub mod export;
pub mod health;
pub mod messages;
pub mod metrics;
pub mod models;
pub mod query_logs;
pub mod training;

#[cfg(test)]
mod tests;
