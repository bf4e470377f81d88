//! Multi-backend LLM workflow orchestration.
//!
//! A request is planned into a dependency graph of sub-tasks, approved by a
//! human, then executed in concurrent batches. Model calls are routed across
//! inference backends using a continuously refreshed health snapshot.

pub mod api;
pub mod config;
pub mod constants;
pub mod core;
pub mod db;
pub mod errors;
pub mod event;
pub mod health;
pub mod llm;
pub mod router;
pub mod schema;
pub mod utils;
