//! Request files: the JSON form of each operation's positional arguments.
//!
//! Callables are written as `{"$function": "<source>"}` and code values as
//! `{"$code": "<source>", "$scope": {...}}`.
//!
//! ```text
//! map-reduce: { "map": ..., "reduce": ..., "options": {...} }
//! group:      { "keys": ..., "condition": ..., "initial": ..., "args": [reduce, finalize?, command?, options?] }
//! aggregate:  { "args": [ [stage, ...] | stage, ..., options? ] }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use commands::{AggregateRequest, Document, GroupRequest, MapReduceRequest, Value};
use serde::de::DeserializeOwned;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MapReduceFile {
    map: serde_json::Value,
    reduce: serde_json::Value,
    #[serde(default)]
    options: Option<serde_json::Value>,
}

impl MapReduceFile {
    pub fn into_request(self) -> Result<MapReduceRequest> {
        let request = MapReduceRequest::new(Value::from(self.map), Value::from(self.reduce));
        let options = match self.options {
            None | Some(serde_json::Value::Null) => Document::new(),
            Some(json) => Document::from_json(json).context("map-reduce options must be an object")?,
        };
        Ok(request.with_options(options))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupFile {
    keys: serde_json::Value,
    #[serde(default)]
    condition: serde_json::Value,
    #[serde(default)]
    initial: serde_json::Value,
    args: Vec<serde_json::Value>,
}

impl GroupFile {
    pub fn into_request(self) -> Result<GroupRequest> {
        let trailing = self.args.into_iter().map(Value::from).collect();
        let request = GroupRequest::from_positional(
            Value::from(self.keys),
            Value::from(self.condition),
            Value::from(self.initial),
            trailing,
        )?;
        Ok(request)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregateFile {
    args: Vec<serde_json::Value>,
}

impl AggregateFile {
    pub fn into_request(self) -> Result<AggregateRequest> {
        let args = self.args.into_iter().map(Value::from).collect();
        Ok(AggregateRequest::from_positional(args)?)
    }
}

/// Reads and parses a request file.
pub fn read_request<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading request file {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing request file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use commands::{AggregationError, GroupStrategy};

    #[test]
    fn map_reduce_file_carries_functions() {
        let file: MapReduceFile = serde_json::from_str(
            r#"{
                "map": { "$function": "function() { emit(this.a, 1); }" },
                "reduce": { "$function": "function(k, v) { return v.length; }" },
                "options": { "out": { "inline": 1 } }
            }"#,
        )
        .unwrap();
        let request = file.into_request().unwrap();
        assert!(request.map.is_function());
        assert!(request.options.contains_key("out"));
    }

    #[test]
    fn request_files_keep_field_order() {
        let file: AggregateFile =
            serde_json::from_str(r#"{ "args": [{ "$sort": { "b": 1, "a": 1 } }] }"#).unwrap();
        let request = file.into_request().unwrap();
        let sort = request.pipeline[0]
            .get("$sort")
            .and_then(Value::as_document)
            .unwrap();
        assert_eq!(sort.keys().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn group_file_applies_legacy_shift() {
        let file: GroupFile = serde_json::from_str(
            r#"{
                "keys": ["a"],
                "initial": { "count": 0 },
                "args": [{ "$function": "function(o, p) { p.count++; }" }, false]
            }"#,
        )
        .unwrap();
        let request = file.into_request().unwrap();
        assert_eq!(request.strategy, GroupStrategy::Evaluation);
    }

    #[test]
    fn aggregate_file_requires_arguments() {
        let file: AggregateFile = serde_json::from_str(r#"{ "args": [] }"#).unwrap();
        let err = file.into_request().unwrap_err();
        let err = err.downcast_ref::<AggregationError>().unwrap();
        assert!(err.is_configuration());
    }
}
