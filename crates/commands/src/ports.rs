//! Port traits consumed by the aggregation operations.
//!
//! This crate defines *what* it needs from the outside world; infrastructure
//! crates define *how* to supply it. Transport, connection management, wire
//! encoding and retry policy all live behind these traits.

use async_trait::async_trait;

use crate::{
    AggregationError, Code, CollectionName, CommandReply, DatabaseName, Document, ReadPreference,
    TransportError, Value,
};

/// Per-submission options handed to the [`CommandExecutor`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandOptions {
    /// The resolved read preference for this submission.
    pub read_preference: ReadPreference,
    /// Further caller options forwarded to the executor (aggregate only).
    pub extra: Document,
}

impl CommandOptions {
    pub fn new(read_preference: ReadPreference) -> Self {
        Self {
            read_preference,
            extra: Document::new(),
        }
    }
}

/// Submits one command document to the server.
///
/// The command is moved into the executor: it is never reused or changed
/// after submission. A reply of `None` means the server returned nothing.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(
        &self,
        database: &DatabaseName,
        command: Document,
        options: CommandOptions,
    ) -> Result<Option<CommandReply>, TransportError>;
}

/// Evaluates an ad-hoc procedure on the server and returns its value.
///
/// Only the evaluation strategy of the group operation uses this port.
#[async_trait]
pub trait RemoteEvaluator: Send + Sync {
    async fn eval(&self, database: &DatabaseName, procedure: Code) -> Result<Value, AggregationError>;
}

/// Produces collection handles for a map/reduce output target.
pub trait CollectionResolver {
    /// The handle type returned to callers.
    type Handle;

    fn resolve(&self, database: &DatabaseName, collection: &CollectionName) -> Self::Handle;
}
