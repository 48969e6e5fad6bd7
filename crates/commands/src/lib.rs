//! Aggregation command domain.
//!
//! This crate turns flexible caller input for three server-side aggregation
//! operations (map/reduce, group, and pipeline aggregate) into canonical
//! command documents, and turns the heterogeneous server responses back into
//! uniform results. Orchestration crates sequence the calls; they never add
//! rules of their own.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is submitted and how replies are read; infrastructure
//! crates supply the [`CommandExecutor`] and [`RemoteEvaluator`] that carry it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`value`] | `Value`, `Document`, `Function`, `Code` |
//! | [`identifiers`] | `DatabaseName`, `CollectionName`, `OperationId` |
//! | [`errors`] | `AggregationError`, `TransportError` |
//! | [`normalize`] | Scope/Code Normalizer |
//! | [`read_preference`] | `ReadPreference` and its resolver |
//! | [`response`] | `CommandReply`, `Statistics`, shared response checks |
//! | [`map_reduce`] | MapReduce builder and interpreter |
//! | [`group`] | Group builder, evaluation procedure, interpreters |
//! | [`aggregate`] | Pipeline builder and interpreter |
//! | [`ports`] | Executor, evaluator, and collection-resolver traits |

pub mod aggregate;
pub mod errors;
pub mod group;
pub mod identifiers;
pub mod map_reduce;
pub mod normalize;
pub mod ports;
pub mod read_preference;
pub mod response;
pub mod value;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use aggregate::{
    build_aggregate, interpret_aggregate, AggregateCommand, AggregateOutcome, AggregateRequest,
};
pub use errors::{AggregationError, Result, TransportError};
pub use group::{
    build_group, interpret_group_command, interpret_group_evaluation, GroupKeys, GroupPlan,
    GroupProcedure, GroupRequest, GroupStrategy,
};
pub use identifiers::{CollectionName, DatabaseName, OperationId};
pub use map_reduce::{
    build_map_reduce, interpret_map_reduce, MapReduceCommand, MapReduceOutcome, MapReduceRequest,
    OutputTarget,
};
pub use normalize::{function_source, normalize_code, normalize_scope};
pub use ports::{CollectionResolver, CommandExecutor, CommandOptions, RemoteEvaluator};
pub use read_preference::{ReadPreference, ReadPreferenceDefaults};
pub use response::{check_command_ok, CommandReply, Statistics};
pub use value::{Code, Document, Function, Value};
