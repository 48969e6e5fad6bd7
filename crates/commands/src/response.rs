//! Raw command responses and the checks shared by every interpreter.

use serde::Serialize;

use crate::{AggregationError, Document, Result, Value};

/// The raw reply to one command submission.
///
/// A reply holds the documents the server sent back; command replies
/// normally carry exactly one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommandReply {
    documents: Vec<Document>,
}

impl CommandReply {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    /// A reply consisting of a single document.
    pub fn single(document: Document) -> Self {
        Self {
            documents: vec![document],
        }
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Takes the first document out of an optional reply.
    ///
    /// Fails with `ExecutionError` when the reply is absent or empty.
    pub fn into_first(reply: Option<Self>) -> Result<Document> {
        reply
            .and_then(|reply| reply.documents.into_iter().next())
            .ok_or_else(|| AggregationError::execution("command failed to return results"))
    }
}

/// Fails with `CommandError` if the response reports `ok != 1` or carries a
/// truthy `err` / `errmsg` field.
pub fn check_command_ok(response: Document) -> Result<Document> {
    let ok = response.get("ok").is_some_and(Value::is_one);
    if !ok || response.is_set("err") || response.is_set("errmsg") {
        return Err(AggregationError::from_response(response));
    }
    Ok(response)
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Execution statistics reported alongside a map/reduce result.
///
/// Every field is optional; each is copied only when the server sent a
/// truthy value for it.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Statistics {
    /// Server-side processing time, from `timeMillis`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processtime: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing: Option<Value>,
}

impl Statistics {
    /// Collects whichever statistics fields are present on a response.
    pub fn from_response(response: &Document) -> Self {
        let pick = |field: &str| response.get(field).filter(|v| v.is_truthy()).cloned();
        Self {
            processtime: pick("timeMillis"),
            counts: pick("counts"),
            timing: pick("timing"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.processtime.is_none() && self.counts.is_none() && self.timing.is_none()
    }

    /// Renders the statistics as a document with keys `processtime`, `counts`, `timing`.
    pub fn to_document(&self) -> Document {
        [
            ("processtime", &self.processtime),
            ("counts", &self.counts),
            ("timing", &self.timing),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.clone().map(|v| (key, v)))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(json: serde_json::Value) -> Document {
        Document::from_json(json).unwrap()
    }

    #[test]
    fn absent_or_empty_replies_are_execution_errors() {
        assert!(matches!(
            CommandReply::into_first(None),
            Err(AggregationError::ExecutionError { .. })
        ));
        assert!(matches!(
            CommandReply::into_first(Some(CommandReply::new(vec![]))),
            Err(AggregationError::ExecutionError { .. })
        ));
    }

    #[test]
    fn ok_check_rejects_errors() {
        assert!(check_command_ok(doc(json!({ "ok": 1 }))).is_ok());
        assert!(check_command_ok(doc(json!({ "ok": 1.0 }))).is_ok());
        assert!(check_command_ok(doc(json!({ "ok": 0 }))).is_err());
        assert!(check_command_ok(doc(json!({}))).is_err());
        assert!(check_command_ok(doc(json!({ "ok": 1, "errmsg": "boom" }))).is_err());
        assert!(check_command_ok(doc(json!({ "ok": 1, "err": null }))).is_ok());
    }

    #[test]
    fn statistics_are_collected_opportunistically() {
        let stats = Statistics::from_response(&doc(json!({
            "ok": 1,
            "timeMillis": 5,
            "timing": { "mapTime": 2 }
        })));
        assert_eq!(stats.processtime, Some(Value::Int(5)));
        assert_eq!(stats.counts, None);
        assert!(stats.timing.is_some());
        assert_eq!(
            stats.to_document(),
            doc(json!({ "processtime": 5, "timing": { "mapTime": 2 } }))
        );
    }

    #[test]
    fn zero_time_is_not_reported() {
        let stats = Statistics::from_response(&doc(json!({ "ok": 1, "timeMillis": 0 })));
        assert!(stats.is_empty());
    }
}
