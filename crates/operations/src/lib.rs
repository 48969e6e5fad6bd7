//! Aggregation operations over a database collection.
//!
//! [`Collection`] exposes the three caller-facing operations, `map_reduce`,
//! `group` and `aggregate`. Each call builds exactly one command with the
//! [`commands`] crate, submits it once through the injected ports, and
//! resolves exactly once with either a normalized result or an error.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** This crate sequences calls between the business
//! logic in [`commands`] and the executor, evaluator and resolver ports. It
//! contains no command or response rules of its own.
//!
//! ## Concurrency
//!
//! Calls share no mutable state; every call builds its own command document.
//! Timeouts, cancellation and retries belong to the executor behind the port.

mod collection;
mod database;

pub use collection::{Collection, MapReduceOutput};
pub use database::Database;
