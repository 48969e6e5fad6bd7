//! Collection handle and the three aggregation operations.

use commands::{
    build_aggregate, build_group, build_map_reduce, interpret_aggregate, interpret_group_command,
    interpret_group_evaluation, interpret_map_reduce, AggregateOutcome, AggregateRequest,
    AggregationError, CollectionName, CollectionResolver, CommandOptions, GroupPlan, GroupRequest,
    MapReduceOutcome, MapReduceRequest, OperationId, OutputTarget, ReadPreference,
    ReadPreferenceDefaults, Result, Statistics, Value,
};
use tracing::{debug, info_span, warn, Instrument};

use crate::Database;

/// Caller-facing result of a map/reduce call.
#[derive(Debug, Clone)]
pub enum MapReduceOutput {
    /// Results returned inline, always with statistics.
    Inline {
        results: Vec<Value>,
        statistics: Statistics,
    },
    /// A handle to the collection the results were written to.
    ///
    /// `statistics` is present only when the `verbose` option was set.
    Collection {
        collection: Collection,
        statistics: Option<Statistics>,
    },
}

/// A collection within a [`Database`].
#[derive(Debug, Clone)]
pub struct Collection {
    database: Database,
    name: CollectionName,
    read_preference: Option<ReadPreference>,
}

impl Collection {
    pub(crate) fn new(database: Database, name: CollectionName) -> Self {
        Self {
            database,
            name,
            read_preference: None,
        }
    }

    /// Sets the collection-level default read preference.
    pub fn with_read_preference(mut self, read_preference: ReadPreference) -> Self {
        self.read_preference = Some(read_preference);
        self
    }

    pub fn name(&self) -> &CollectionName {
        &self.name
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    fn read_preference_defaults(&self) -> ReadPreferenceDefaults {
        ReadPreferenceDefaults::new(self.read_preference, self.database.read_preference())
    }

    /// Runs a map/reduce job over this collection.
    ///
    /// Configuration errors (missing `out`, a read preference combined with
    /// non-inline output) are returned before anything is submitted.
    pub async fn map_reduce(&self, request: MapReduceRequest) -> Result<MapReduceOutput> {
        let span = info_span!(
            "map_reduce",
            collection = %self.name,
            operation_id = %OperationId::new_random()
        );
        let result = async {
            let command = build_map_reduce(&self.name, request, &self.read_preference_defaults())?;
            debug!(read_preference = %command.read_preference, "submitting mapreduce command");

            let reply = self
                .database
                .executor()
                .execute(
                    self.database.name(),
                    command.document,
                    CommandOptions::new(command.read_preference),
                )
                .await?;

            let output = match interpret_map_reduce(reply, command.verbose)? {
                MapReduceOutcome::Inline {
                    results,
                    statistics,
                } => MapReduceOutput::Inline {
                    results,
                    statistics,
                },
                MapReduceOutcome::Collection { target, statistics } => MapReduceOutput::Collection {
                    collection: self.output_collection(target),
                    statistics,
                },
            };
            Ok::<_, AggregationError>(output)
        }
        .instrument(span.clone())
        .await;

        span.in_scope(|| log_completion(&result));
        result
    }

    fn output_collection(&self, target: OutputTarget) -> Collection {
        match target {
            OutputTarget::SameDatabase(collection) => {
                self.database.resolve(self.database.name(), &collection)
            }
            OutputTarget::OtherDatabase {
                database,
                collection,
            } => self.database.resolve(&database, &collection),
        }
    }

    /// Groups the documents of this collection and reduces each group.
    ///
    /// Uses the `group` command unless the request selects the evaluation
    /// strategy. Errors from either strategy are returned unchanged.
    pub async fn group(&self, request: GroupRequest) -> Result<Value> {
        let span = info_span!(
            "group",
            collection = %self.name,
            operation_id = %OperationId::new_random()
        );
        let result = async {
            match build_group(&self.name, request, &self.read_preference_defaults())? {
                GroupPlan::Command {
                    document,
                    read_preference,
                } => {
                    debug!(read_preference = %read_preference, "submitting group command");
                    let reply = self
                        .database
                        .executor()
                        .execute(
                            self.database.name(),
                            document,
                            CommandOptions::new(read_preference),
                        )
                        .await?;
                    interpret_group_command(reply)
                }
                GroupPlan::Evaluation { procedure } => {
                    debug!("submitting group procedure for evaluation");
                    let value = self
                        .database
                        .evaluator()
                        .eval(self.database.name(), procedure)
                        .await?;
                    Ok(interpret_group_evaluation(value))
                }
            }
        }
        .instrument(span.clone())
        .await;

        span.in_scope(|| log_completion(&result));
        result
    }

    /// Runs an aggregation pipeline over this collection.
    pub async fn aggregate(&self, request: AggregateRequest) -> Result<AggregateOutcome> {
        let span = info_span!(
            "aggregate",
            collection = %self.name,
            operation_id = %OperationId::new_random()
        );
        let result = async {
            let command = build_aggregate(&self.name, request, &self.read_preference_defaults())?;
            debug!(
                read_preference = %command.options.read_preference,
                stages = command.document.get("pipeline").and_then(commands::Value::as_array).map_or(0, <[commands::Value]>::len),
                "submitting aggregate command"
            );

            let reply = self
                .database
                .executor()
                .execute(self.database.name(), command.document, command.options)
                .await?;
            interpret_aggregate(reply)
        }
        .instrument(span.clone())
        .await;

        span.in_scope(|| log_completion(&result));
        result
    }
}

fn log_completion<T>(result: &Result<T>) {
    match result {
        Ok(_) => debug!("operation completed"),
        Err(err @ AggregationError::ConfigurationError { .. }) => {
            warn!(error = %err, "operation rejected before submission")
        }
        Err(err) => warn!(error = %err, "operation failed"),
    }
}
