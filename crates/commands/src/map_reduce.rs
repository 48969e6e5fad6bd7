//! MapReduce command builder and response interpreter.
//!
//! ## Command shape
//!
//! ```text
//! { mapreduce: <collection>, map: <text|code>, reduce: <text|code>, <every option verbatim> }
//! ```
//!
//! `finalize` callables become source text and `scope` goes through the
//! Scope/Code Normalizer; every other option is copied as given.
//!
//! ## Preconditions
//!
//! - `out` must be present; the server never picks an output target.
//! - A read preference other than primary is only allowed with inline output.

use tracing::debug;

use crate::normalize::{function_source, normalize_code};
use crate::response::check_command_ok;
use crate::{
    AggregationError, CollectionName, CommandReply, DatabaseName, Document, ReadPreference,
    ReadPreferenceDefaults, Result, Statistics, Value,
};

/// Input of one map/reduce call.
///
/// The options mapping defaults to empty when the caller supplies none.
#[derive(Debug, Clone, PartialEq)]
pub struct MapReduceRequest {
    pub map: Value,
    pub reduce: Value,
    pub options: Document,
}

impl MapReduceRequest {
    pub fn new(map: impl Into<Value>, reduce: impl Into<Value>) -> Self {
        Self {
            map: map.into(),
            reduce: reduce.into(),
            options: Document::new(),
        }
    }

    pub fn with_options(mut self, options: Document) -> Self {
        self.options = options;
        self
    }

    /// Sets a single option, keeping the others.
    pub fn option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(name, value);
        self
    }
}

/// A fully built map/reduce command, ready for submission.
#[derive(Debug, Clone, PartialEq)]
pub struct MapReduceCommand {
    pub document: Document,
    pub read_preference: ReadPreference,
    /// Whether statistics accompany a non-inline result.
    pub verbose: bool,
}

/// Returns `true` for `{inline: 1}` and `"inline"`.
fn is_inline_output(out: &Value) -> bool {
    match out {
        Value::String(s) => s == "inline",
        Value::Document(doc) => doc.get("inline").is_some_and(Value::is_one),
        _ => false,
    }
}

/// Builds the map/reduce command document.
///
/// Fails with `ConfigurationError` before anything is submitted if `out` is
/// missing, or if a non-primary read preference is combined with an output
/// that is not inline.
pub fn build_map_reduce(
    collection: &CollectionName,
    request: MapReduceRequest,
    defaults: &ReadPreferenceDefaults,
) -> Result<MapReduceCommand> {
    let MapReduceRequest {
        map,
        reduce,
        options,
    } = request;

    let out = match options.get("out") {
        Some(out) if !out.is_null() => out,
        _ => {
            return Err(AggregationError::configuration(
                "the out option parameter must be defined",
            ))
        }
    };

    let read_preference = defaults.resolve(&options)?;
    if read_preference.is_override() && !is_inline_output(out) {
        return Err(AggregationError::configuration(
            "a readPreference can only be provided when performing an inline mapReduce",
        ));
    }

    let verbose = options.is_set("verbose");

    let mut document = Document::new();
    document.insert("mapreduce", collection.as_str());
    document.insert("map", function_source(map));
    document.insert("reduce", function_source(reduce));
    for (name, value) in options {
        let value = match name.as_str() {
            "scope" => normalize_code(value),
            "finalize" => function_source(value),
            _ => value,
        };
        document.insert(name, value);
    }

    debug!(collection = %collection, read_preference = %read_preference, "built mapreduce command");

    Ok(MapReduceCommand {
        document,
        read_preference,
        verbose,
    })
}

// ---------------------------------------------------------------------------
// Interpretation
// ---------------------------------------------------------------------------

/// Where a non-inline map/reduce wrote its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// A collection in the same database as the source collection.
    SameDatabase(CollectionName),
    OtherDatabase {
        database: DatabaseName,
        collection: CollectionName,
    },
}

/// Normalized map/reduce result.
#[derive(Debug, Clone, PartialEq)]
pub enum MapReduceOutcome {
    /// Results returned in the response; statistics always accompany them.
    Inline {
        results: Vec<Value>,
        statistics: Statistics,
    },
    /// Results written to a collection; statistics only when `verbose` was set.
    Collection {
        target: OutputTarget,
        statistics: Option<Statistics>,
    },
}

/// Interprets the raw reply to a map/reduce command.
pub fn interpret_map_reduce(reply: Option<CommandReply>, verbose: bool) -> Result<MapReduceOutcome> {
    let response = check_command_ok(CommandReply::into_first(reply)?)?;
    let statistics = Statistics::from_response(&response);

    if let Some(results) = response.get("results").filter(|v| v.is_truthy()) {
        let results = match results {
            Value::Array(items) => items.clone(),
            _ => {
                return Err(AggregationError::execution(
                    "inline mapreduce results were not an array",
                ))
            }
        };
        return Ok(MapReduceOutcome::Inline {
            results,
            statistics,
        });
    }

    let target = output_target(response.get("result"))?;
    Ok(MapReduceOutcome::Collection {
        target,
        statistics: verbose.then_some(statistics),
    })
}

fn output_target(result: Option<&Value>) -> Result<OutputTarget> {
    match result {
        Some(Value::String(name)) => CollectionName::new(name.as_str())
            .map(OutputTarget::SameDatabase)
            .ok_or_else(|| AggregationError::execution("mapreduce output collection name is empty")),
        Some(Value::Document(doc)) => {
            let name = |field: &str| {
                doc.get(field)
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .unwrap_or_default()
            };
            let database = DatabaseName::new(name("db"));
            let collection = CollectionName::new(name("collection"));
            match (database, collection) {
                (Some(database), Some(collection)) => Ok(OutputTarget::OtherDatabase {
                    database,
                    collection,
                }),
                _ => Err(AggregationError::execution(
                    "mapreduce output document must name both db and collection",
                )),
            }
        }
        _ => Err(AggregationError::execution(
            "mapreduce response named neither inline results nor an output collection",
        )),
    }
}
