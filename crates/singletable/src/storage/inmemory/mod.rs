//! In-memory storage engine.
//!
//! Stands in for the real engine in tests and local development.

mod engine;
mod eval;

pub use engine::{CallStats, InMemoryEngine};
