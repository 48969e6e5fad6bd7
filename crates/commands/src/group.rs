//! Group command builder and response interpreters.
//!
//! A group request runs through one of two strategies:
//!
//! - **Command** (default): a `group` command document with inline output.
//! - **Evaluation**: an ad-hoc procedure that walks the matching documents,
//!   groups them by key and applies the reduce function, submitted through
//!   the [`RemoteEvaluator`](crate::RemoteEvaluator) port.
//!
//! Both strategies start from the same [`GroupRequest`]; positional caller
//! input is folded into it by [`GroupRequest::from_positional`] before either
//! strategy runs.

use tracing::debug;

use crate::normalize::function_source;
use crate::response::check_command_ok;
use crate::{
    AggregationError, Code, CollectionName, CommandReply, Document, ReadPreference,
    ReadPreferenceDefaults, Result, Value,
};

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// How documents are assigned to groups.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupKeys {
    /// Group by the values of these fields.
    Fields(Vec<String>),
    /// Group by the key document a server-side function computes.
    KeyFunction(Code),
}

impl GroupKeys {
    /// Classifies caller-supplied keys.
    ///
    /// Arrays must hold field names; a document contributes its own field
    /// names; callables and code values become a key function.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(field) => Ok(field),
                    other => Err(AggregationError::configuration(format!(
                        "group key fields must be strings, got {}",
                        other.to_json()
                    ))),
                })
                .collect::<Result<Vec<_>>>()
                .map(Self::Fields),
            Value::Document(doc) => Ok(Self::Fields(doc.keys().map(str::to_owned).collect())),
            Value::Function(f) => Ok(Self::KeyFunction(f.to_code())),
            Value::Code(code) => Ok(Self::KeyFunction(code)),
            other => Err(AggregationError::configuration(format!(
                "group keys must be an array, a document or a key function, got {}",
                other.to_json()
            ))),
        }
    }

    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Fields(fields.into_iter().map(Into::into).collect())
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Which execution strategy a group request uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupStrategy {
    #[default]
    Command,
    Evaluation,
}

/// Normalized input of one group call.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupRequest {
    pub keys: GroupKeys,
    pub condition: Value,
    pub initial: Value,
    pub reduce: Code,
    /// Finalize function as source text or code.
    pub finalize: Option<Value>,
    pub strategy: GroupStrategy,
    pub options: Document,
}

/// Converts a caller-supplied reduce function into code.
fn reduce_code(value: Value) -> Result<Code> {
    match value {
        Value::Function(f) => Ok(f.to_code()),
        Value::String(text) => Ok(Code::new(text)),
        Value::Code(code) => Ok(code),
        other => Err(AggregationError::configuration(format!(
            "group reduce must be a function or code, got {}",
            other.to_json()
        ))),
    }
}

fn document_or_empty(value: Value) -> Value {
    if value.is_null() {
        Value::Document(Document::new())
    } else {
        value
    }
}

impl GroupRequest {
    pub fn new(keys: GroupKeys, reduce: impl Into<Value>) -> Result<Self> {
        Ok(Self {
            keys,
            condition: Value::Document(Document::new()),
            initial: Value::Document(Document::new()),
            reduce: reduce_code(reduce.into())?,
            finalize: None,
            strategy: GroupStrategy::Command,
            options: Document::new(),
        })
    }

    pub fn condition(mut self, condition: impl Into<Value>) -> Self {
        self.condition = document_or_empty(condition.into());
        self
    }

    pub fn initial(mut self, initial: impl Into<Value>) -> Self {
        self.initial = document_or_empty(initial.into());
        self
    }

    /// Sets the finalize function; callables are reduced to their source text.
    pub fn finalize(mut self, finalize: impl Into<Value>) -> Self {
        self.finalize = Some(function_source(finalize.into()));
        self
    }

    pub fn strategy(mut self, strategy: GroupStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn options(mut self, options: Document) -> Self {
        self.options = options;
        self
    }

    /// Folds the positional form `(keys, condition, initial, reduce,
    /// finalize?, command?, options?)` into a request.
    ///
    /// `trailing` holds everything after `initial`. The slots after `reduce`
    /// are read in this fixed order:
    ///
    /// 1. A callable or code value is the finalize function. A null is an
    ///    empty finalize placeholder. Anything else is not a finalize
    ///    function and is read again as the command flag (the legacy shift).
    /// 2. A document in the flag position is the options mapping and the flag
    ///    keeps its default. Otherwise the value is the flag: null means
    ///    `true`, anything else is taken by truthiness.
    /// 3. The next slot, if the flag was consumed, is the options mapping; a
    ///    falsy value means no options.
    pub fn from_positional(
        keys: Value,
        condition: Value,
        initial: Value,
        trailing: Vec<Value>,
    ) -> Result<Self> {
        let mut slots = trailing.into_iter().peekable();

        let reduce = slots
            .next()
            .ok_or_else(|| AggregationError::configuration("group requires a reduce function"))?;
        let mut request = Self::new(GroupKeys::from_value(keys)?, reduce)?
            .condition(condition)
            .initial(initial);

        let holds_finalize = matches!(slots.peek(), Some(Value::Function(_) | Value::Code(_)));
        let holds_placeholder = matches!(slots.peek(), Some(Value::Null));
        if holds_finalize {
            if let Some(finalize) = slots.next() {
                request = request.finalize(finalize);
            }
        } else if holds_placeholder {
            slots.next();
        }

        let mut use_command = true;
        match slots.next() {
            Some(Value::Document(options)) => request.options = options,
            Some(flag) => {
                use_command = flag.is_null() || flag.is_truthy();
                match slots.next() {
                    Some(Value::Document(options)) => request.options = options,
                    Some(other) if other.is_truthy() => {
                        return Err(AggregationError::configuration(format!(
                            "group options must be a document, got {}",
                            other.to_json()
                        )))
                    }
                    _ => {}
                }
            }
            None => {}
        }

        if slots.next().is_some() {
            return Err(AggregationError::configuration(
                "group received more positional arguments than it accepts",
            ));
        }

        request.strategy = if use_command {
            GroupStrategy::Command
        } else {
            GroupStrategy::Evaluation
        };
        Ok(request)
    }
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

/// A built group request, ready for submission.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupPlan {
    Command {
        document: Document,
        read_preference: ReadPreference,
    },
    Evaluation {
        procedure: Code,
    },
}

/// Builds the command document or evaluation procedure for a group request.
pub fn build_group(
    collection: &CollectionName,
    request: GroupRequest,
    defaults: &ReadPreferenceDefaults,
) -> Result<GroupPlan> {
    match request.strategy {
        GroupStrategy::Command => build_group_command(collection, request, defaults),
        GroupStrategy::Evaluation => build_group_procedure(collection, request),
    }
}

fn build_group_command(
    collection: &CollectionName,
    request: GroupRequest,
    defaults: &ReadPreferenceDefaults,
) -> Result<GroupPlan> {
    let read_preference = defaults.resolve(&request.options)?;

    let mut group = Document::new();
    group.insert("ns", collection.as_str());
    group.insert("$reduce", request.reduce);
    group.insert("cond", request.condition);
    group.insert("initial", request.initial);
    group.insert("out", "inline");
    if let Some(finalize) = request.finalize {
        group.insert("finalize", finalize);
    }
    match request.keys {
        GroupKeys::KeyFunction(code) => {
            group.insert("$keyf", code);
        }
        GroupKeys::Fields(fields) => {
            let key: Document = fields.into_iter().map(|field| (field, 1)).collect();
            group.insert("key", key);
        }
    }

    let mut document = Document::new();
    document.insert("group", group);

    debug!(collection = %collection, read_preference = %read_preference, "built group command");

    Ok(GroupPlan::Command {
        document,
        read_preference,
    })
}

fn build_group_procedure(collection: &CollectionName, request: GroupRequest) -> Result<GroupPlan> {
    let GroupKeys::Fields(fields) = request.keys else {
        return Err(AggregationError::configuration(
            "key functions are only supported by the group command strategy",
        ));
    };

    // A copy: the caller's reduce scope stays as it was.
    let mut scope = request.reduce.scope().cloned().unwrap_or_default();
    scope.insert("ns", collection.as_str());
    scope.insert(
        "keys",
        fields.into_iter().map(Value::String).collect::<Vec<_>>(),
    );
    scope.insert("condition", request.condition);
    scope.insert("initial", request.initial);

    let procedure = Code::with_scope(GroupProcedure::render(request.reduce.code()), scope);

    debug!(collection = %collection, "built group evaluation procedure");

    Ok(GroupPlan::Evaluation { procedure })
}

/// Server-side procedure template for the evaluation strategy.
///
/// The template reads `ns`, `keys`, `condition` and `initial` from its scope
/// and has one insertion point, `reduce`, for the reduce function body.
pub struct GroupProcedure;

impl GroupProcedure {
    pub fn render(reduce: &str) -> String {
        format!(
            r#"function () {{
  var c = db[ns].find(condition);
  var map = new Map();
  var reduce_function = {reduce};

  while (c.hasNext()) {{
    var obj = c.next();
    var key = {{}};

    for (var i = 0, len = keys.length; i < len; ++i) {{
      var k = keys[i];
      key[k] = obj[k];
    }}

    var aggObj = map.get(key);

    if (aggObj == null) {{
      var newObj = Object.extend({{}}, key);
      aggObj = Object.extend(newObj, initial);
      map.put(key, aggObj);
    }}

    reduce_function(obj, aggObj);
  }}

  return {{ "result": map.values() }};
}}"#
        )
    }
}

// ---------------------------------------------------------------------------
// Interpretation
// ---------------------------------------------------------------------------

/// Interprets the reply to a group command: the inline `retval`.
pub fn interpret_group_command(reply: Option<CommandReply>) -> Result<Value> {
    let mut response = check_command_ok(CommandReply::into_first(reply)?)?;
    response
        .remove("retval")
        .ok_or_else(|| AggregationError::execution("group command returned no retval"))
}

/// Interprets the value of an evaluated group procedure.
///
/// Returns its truthy `result` field, or the whole value when there is none.
pub fn interpret_group_evaluation(value: Value) -> Value {
    match value {
        Value::Document(mut doc) if doc.is_set("result") => {
            doc.remove("result").unwrap_or(Value::Null)
        }
        other => other,
    }
}
