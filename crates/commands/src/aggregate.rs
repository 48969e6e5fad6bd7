//! Pipeline (aggregate) command builder and response interpreter.
//!
//! ```text
//! { aggregate: <collection>, pipeline: [<stage>, ...], explain?: <value> }
//! ```

use tracing::{debug, warn};

use crate::read_preference::READ_PREFERENCE_OPTION;
use crate::{
    AggregationError, CollectionName, CommandOptions, CommandReply, Document,
    ReadPreferenceDefaults, Result, Value,
};

/// Normalized input of one aggregate call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregateRequest {
    pub pipeline: Vec<Document>,
    pub options: Document,
}

impl AggregateRequest {
    pub fn new(pipeline: Vec<Document>) -> Self {
        Self {
            pipeline,
            options: Document::new(),
        }
    }

    pub fn with_options(mut self, options: Document) -> Self {
        self.options = options;
        self
    }

    /// Classifies the positional form of an aggregate call.
    ///
    /// Accepts either a single array of stages or a sequence of stage
    /// documents, optionally followed by an options mapping. The last
    /// argument is taken as options only when it is a document carrying a
    /// `readPreference` or `explain` key; otherwise every argument is a stage.
    pub fn from_positional(mut args: Vec<Value>) -> Result<Self> {
        let last_is_options = matches!(
            args.last(),
            Some(Value::Document(doc))
                if doc.contains_key(READ_PREFERENCE_OPTION) || doc.contains_key("explain")
        );
        let options = match last_is_options.then(|| args.pop()).flatten() {
            Some(Value::Document(options)) => options,
            _ => Document::new(),
        };

        let mut args = args.into_iter();
        let stages = match args.next() {
            None => {
                return Err(AggregationError::configuration(
                    "aggregate requires at least one pipeline stage",
                ))
            }
            Some(Value::Array(stages)) => {
                let ignored = args.len();
                if ignored > 0 {
                    warn!(ignored, "ignoring arguments after the pipeline array");
                }
                stages
            }
            Some(first) => std::iter::once(first).chain(args).collect(),
        };

        let pipeline = stages
            .into_iter()
            .map(|stage| match stage {
                Value::Document(stage) => Ok(stage),
                other => Err(AggregationError::configuration(format!(
                    "pipeline stages must be documents, got {}",
                    other.to_json()
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { pipeline, options })
    }
}

/// A fully built aggregate command, ready for submission.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateCommand {
    pub document: Document,
    /// Submission options: the caller's options with the resolved read preference merged in.
    pub options: CommandOptions,
}

/// Builds the aggregate command document and its submission options.
pub fn build_aggregate(
    collection: &CollectionName,
    request: AggregateRequest,
    defaults: &ReadPreferenceDefaults,
) -> Result<AggregateCommand> {
    let AggregateRequest {
        pipeline,
        mut options,
    } = request;

    let read_preference = defaults.resolve(&options)?;
    options.insert(READ_PREFERENCE_OPTION, read_preference.to_value());

    let mut document = Document::new();
    document.insert("aggregate", collection.as_str());
    document.insert(
        "pipeline",
        pipeline.into_iter().map(Value::Document).collect::<Vec<_>>(),
    );
    if let Some(explain) = options.get("explain").filter(|v| v.is_truthy()) {
        document.insert("explain", explain.clone());
    }

    debug!(collection = %collection, read_preference = %read_preference, "built aggregate command");

    Ok(AggregateCommand {
        document,
        options: CommandOptions {
            read_preference,
            extra: options,
        },
    })
}

// ---------------------------------------------------------------------------
// Interpretation
// ---------------------------------------------------------------------------

/// Normalized aggregate result.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateOutcome {
    /// The documents produced by the final stage.
    Results(Vec<Value>),
    /// The server's view of the pipeline, returned for explain requests.
    ServerPipeline(Value),
}

/// Interprets the raw reply to an aggregate command.
pub fn interpret_aggregate(reply: Option<CommandReply>) -> Result<AggregateOutcome> {
    let mut response = CommandReply::into_first(reply)?;

    let reported_failure = response.get("ok").is_some_and(|ok| !ok.is_one());
    if response.is_set("err") || response.is_set("errmsg") || reported_failure {
        return Err(AggregationError::from_response(response));
    }

    if response.is_set("serverPipeline") {
        let pipeline = response.remove("serverPipeline").unwrap_or(Value::Null);
        return Ok(AggregateOutcome::ServerPipeline(pipeline));
    }

    match response.remove("result") {
        Some(Value::Array(results)) => Ok(AggregateOutcome::Results(results)),
        Some(_) => Err(AggregationError::execution(
            "aggregate result was not an array",
        )),
        None => Err(AggregationError::execution(
            "aggregate response carried no result",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReadPreference;
    use serde_json::json;

    fn doc(json: serde_json::Value) -> Document {
        Document::from_json(json).unwrap()
    }

    fn value(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    fn orders() -> CollectionName {
        CollectionName::new("orders").unwrap()
    }

    fn stages() -> Vec<Value> {
        vec![
            value(json!({ "$match": { "a": 1 } })),
            value(json!({ "$group": { "_id": "$a" } })),
        ]
    }

    #[test]
    fn variadic_stages_are_assembled_in_order() {
        let request = AggregateRequest::from_positional(stages()).unwrap();
        let command =
            build_aggregate(&orders(), request, &ReadPreferenceDefaults::default()).unwrap();
        assert_eq!(command.document.first_key(), Some("aggregate"));
        assert_eq!(command.document.get("pipeline"), Some(&Value::from(stages())));
        assert!(!command.document.contains_key("explain"));
    }

    #[test]
    fn array_form_with_explain_option() {
        let request = AggregateRequest::from_positional(vec![
            Value::from(stages()),
            value(json!({ "explain": true })),
        ])
        .unwrap();
        let command =
            build_aggregate(&orders(), request, &ReadPreferenceDefaults::default()).unwrap();
        assert_eq!(command.document.get("pipeline"), Some(&Value::from(stages())));
        assert_eq!(command.document.get("explain"), Some(&Value::Bool(true)));
    }

    #[test]
    fn trailing_document_without_option_keys_is_a_stage() {
        let mut args = stages();
        args.push(value(json!({ "$limit": 5 })));
        let request = AggregateRequest::from_positional(args).unwrap();
        assert_eq!(request.pipeline.len(), 3);
        assert!(request.options.is_empty());
    }

    #[test]
    fn read_preference_option_is_resolved_and_merged() {
        let mut args = stages();
        args.push(value(json!({ "readPreference": "secondary" })));
        let request = AggregateRequest::from_positional(args).unwrap();
        assert_eq!(request.pipeline.len(), 2);

        let command =
            build_aggregate(&orders(), request, &ReadPreferenceDefaults::default()).unwrap();
        assert_eq!(command.options.read_preference, ReadPreference::Secondary);
        assert_eq!(
            command.options.extra.get("readPreference"),
            Some(&Value::from("secondary"))
        );
    }

    #[test]
    fn inherited_read_preference_is_merged() {
        let defaults = ReadPreferenceDefaults::new(None, Some(ReadPreference::Nearest));
        let request = AggregateRequest::new(vec![doc(json!({ "$match": {} }))]);
        let command = build_aggregate(&orders(), request, &defaults).unwrap();
        assert_eq!(
            command.options.extra.get("readPreference"),
            Some(&Value::from("nearest"))
        );
    }

    #[test]
    fn malformed_arguments_are_rejected() {
        assert!(AggregateRequest::from_positional(vec![])
            .unwrap_err()
            .is_configuration());
        assert!(AggregateRequest::from_positional(vec![Value::Int(1)])
            .unwrap_err()
            .is_configuration());
    }

    #[test]
    fn results_are_returned() {
        let reply = CommandReply::single(doc(json!({ "ok": 1, "result": [{ "_id": 1 }] })));
        assert_eq!(
            interpret_aggregate(Some(reply)).unwrap(),
            AggregateOutcome::Results(vec![value(json!({ "_id": 1 }))])
        );
    }

    #[test]
    fn server_pipeline_wins_over_result() {
        let reply = CommandReply::single(doc(json!({
            "ok": 1,
            "serverPipeline": [{ "query": {} }],
            "result": []
        })));
        assert_eq!(
            interpret_aggregate(Some(reply)).unwrap(),
            AggregateOutcome::ServerPipeline(value(json!([{ "query": {} }])))
        );
    }

    #[test]
    fn errors_become_command_errors() {
        let reply = CommandReply::single(doc(json!({ "ok": 0, "errmsg": "boom" })));
        let err = interpret_aggregate(Some(reply)).unwrap_err();
        assert_eq!(
            err,
            AggregationError::CommandError {
                message: "boom".to_owned(),
                response: doc(json!({ "ok": 0, "errmsg": "boom" })),
            }
        );
    }

    #[test]
    fn missing_reply_or_result_is_an_execution_error() {
        assert!(matches!(
            interpret_aggregate(None),
            Err(AggregationError::ExecutionError { .. })
        ));
        let reply = CommandReply::single(doc(json!({ "ok": 1 })));
        assert!(matches!(
            interpret_aggregate(Some(reply)),
            Err(AggregationError::ExecutionError { .. })
        ));
    }
}
