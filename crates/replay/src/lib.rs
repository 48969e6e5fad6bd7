//! Scripted infrastructure adapters.
//!
//! Implements the [`commands::CommandExecutor`] and [`commands::RemoteEvaluator`]
//! ports without a server: every submission is recorded, and each one is
//! answered with the next entry of a prepared script.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** The [`commands`] crate sees only the port traits. The
//! `cli` crate uses these adapters to replay captured server replies, and the
//! integration tests use them to observe exactly what was submitted.
//!
//! ## Script files
//!
//! [`Script::from_json`] reads a JSON document of the form:
//!
//! ```text
//! {
//!   "replies":     [ {"documents": [{...}]}, {"transportError": "..."}, "absent" ],
//!   "evaluations": [ {"value": ...}, {"error": "..."} ]
//! }
//! ```

use std::collections::VecDeque;

use async_trait::async_trait;
use commands::{
    AggregationError, Code, CommandExecutor, CommandOptions, CommandReply, DatabaseName, Document,
    RemoteEvaluator, TransportError, Value,
};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

// ---------------------------------------------------------------------------
// Script loading
// ---------------------------------------------------------------------------

/// Errors raised while loading a script file.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("script is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("reply document #{index} is not a JSON object")]
    NotADocument { index: usize },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
enum ReplyEntry {
    Documents(Vec<serde_json::Value>),
    TransportError(String),
    Absent,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
enum EvaluationEntry {
    Value(serde_json::Value),
    Error(String),
}

#[derive(Debug, Default, Deserialize)]
struct ScriptFile {
    #[serde(default)]
    replies: Vec<ReplyEntry>,
    #[serde(default)]
    evaluations: Vec<EvaluationEntry>,
}

/// A prepared sequence of executor replies and evaluation results.
#[derive(Debug, Clone, Default)]
pub struct Script {
    replies: VecDeque<Result<Option<CommandReply>, TransportError>>,
    evaluations: VecDeque<Result<Value, AggregationError>>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a script from its JSON text.
    pub fn from_json(text: &str) -> Result<Self, ScriptError> {
        let file: ScriptFile = serde_json::from_str(text)?;
        let mut script = Script::new();

        for reply in file.replies {
            script = match reply {
                ReplyEntry::Documents(documents) => {
                    let documents = documents
                        .into_iter()
                        .enumerate()
                        .map(|(index, json)| {
                            Document::from_json(json).ok_or(ScriptError::NotADocument { index })
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    script.reply(CommandReply::new(documents))
                }
                ReplyEntry::TransportError(message) => script.transport_error(message),
                ReplyEntry::Absent => script.absent_reply(),
            };
        }

        for evaluation in file.evaluations {
            script = match evaluation {
                EvaluationEntry::Value(json) => script.evaluation(Value::from(json)),
                EvaluationEntry::Error(message) => script.evaluation_error(message),
            };
        }

        Ok(script)
    }

    pub fn reply(mut self, reply: CommandReply) -> Self {
        self.replies.push_back(Ok(Some(reply)));
        self
    }

    /// Queues a reply consisting of a single document.
    pub fn document(self, document: Document) -> Self {
        self.reply(CommandReply::single(document))
    }

    /// Queues a submission that completes with no response at all.
    pub fn absent_reply(mut self) -> Self {
        self.replies.push_back(Ok(None));
        self
    }

    pub fn transport_error(mut self, message: impl Into<String>) -> Self {
        self.replies.push_back(Err(TransportError::new(message)));
        self
    }

    pub fn evaluation(mut self, value: Value) -> Self {
        self.evaluations.push_back(Ok(value));
        self
    }

    /// Queues an evaluation that the server rejects with `errmsg`.
    pub fn evaluation_error(mut self, message: impl Into<String>) -> Self {
        let mut response = Document::new();
        response.insert("ok", 0);
        response.insert("errmsg", message.into());
        self.evaluations
            .push_back(Err(AggregationError::from_response(response)));
        self
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// One recorded command submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub database: DatabaseName,
    pub command: Document,
    pub options: CommandOptions,
}

/// Recorded evaluation request.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub database: DatabaseName,
    pub procedure: Code,
}

/// A [`CommandExecutor`] and [`RemoteEvaluator`] driven by a [`Script`].
///
/// When the script runs out, further submissions fail with a
/// [`TransportError`].
#[derive(Debug, Default)]
pub struct ScriptedServer {
    script: Mutex<Script>,
    submissions: Mutex<Vec<Submission>>,
    evaluations: Mutex<Vec<Evaluation>>,
}

impl ScriptedServer {
    pub fn new(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            ..Self::default()
        }
    }

    /// Every command submitted so far, in order.
    pub async fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().await.clone()
    }

    /// Every procedure evaluated so far, in order.
    pub async fn evaluations(&self) -> Vec<Evaluation> {
        self.evaluations.lock().await.clone()
    }
}

#[async_trait]
impl CommandExecutor for ScriptedServer {
    async fn execute(
        &self,
        database: &DatabaseName,
        command: Document,
        options: CommandOptions,
    ) -> Result<Option<CommandReply>, TransportError> {
        debug!(
            database = %database,
            kind = command.first_key().unwrap_or_default(),
            read_preference = %options.read_preference,
            "recording submission"
        );
        self.submissions.lock().await.push(Submission {
            database: database.clone(),
            command,
            options,
        });

        self.script
            .lock()
            .await
            .replies
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::new("script has no reply left")))
    }
}

#[async_trait]
impl RemoteEvaluator for ScriptedServer {
    async fn eval(&self, database: &DatabaseName, procedure: Code) -> Result<Value, AggregationError> {
        debug!(database = %database, "recording evaluation");
        self.evaluations.lock().await.push(Evaluation {
            database: database.clone(),
            procedure,
        });

        self.script
            .lock()
            .await
            .evaluations
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::new("script has no evaluation left").into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commands::ReadPreference;
    use serde_json::json;

    fn test_db() -> DatabaseName {
        DatabaseName::new("test").unwrap()
    }

    #[tokio::test]
    async fn replies_are_served_in_order_and_recorded() {
        let server = ScriptedServer::new(
            Script::new()
                .document(Document::from_json(json!({ "ok": 1 })).unwrap())
                .transport_error("connection reset"),
        );

        let mut command = Document::new();
        command.insert("ping", 1);

        let first = server
            .execute(&test_db(), command.clone(), CommandOptions::new(ReadPreference::Primary))
            .await
            .unwrap();
        assert_eq!(first.unwrap().documents().len(), 1);

        let second = server
            .execute(&test_db(), command.clone(), CommandOptions::default())
            .await;
        assert_eq!(second.unwrap_err().message(), "connection reset");

        let third = server
            .execute(&test_db(), command, CommandOptions::default())
            .await;
        assert!(third.is_err());

        let submissions = server.submissions().await;
        assert_eq!(submissions.len(), 3);
        assert_eq!(submissions[0].command.first_key(), Some("ping"));
    }

    #[tokio::test]
    async fn evaluations_are_served_and_recorded() {
        let server = ScriptedServer::new(Script::new().evaluation(Value::Int(7)).evaluation_error("eval disabled"));

        let value = server.eval(&test_db(), Code::new("function() { return 7; }")).await;
        assert_eq!(value.unwrap(), Value::Int(7));

        let err = server.eval(&test_db(), Code::new("f")).await.unwrap_err();
        assert!(matches!(err, AggregationError::CommandError { ref message, .. } if message == "eval disabled"));

        assert_eq!(server.evaluations().await.len(), 2);
    }

    #[test]
    fn scripts_load_from_json() {
        let script = Script::from_json(
            r#"{
                "replies": [
                    { "documents": [{ "ok": 1, "result": [] }] },
                    { "transportError": "timeout" },
                    "absent"
                ],
                "evaluations": [{ "value": { "result": [1] } }, { "error": "no eval" }]
            }"#,
        )
        .unwrap();
        assert_eq!(script.replies.len(), 3);
        assert!(matches!(script.replies[2], Ok(None)));
        assert_eq!(script.evaluations.len(), 2);
    }

    #[test]
    fn non_object_reply_documents_are_rejected() {
        let err = Script::from_json(r#"{ "replies": [{ "documents": [1] }] }"#).unwrap_err();
        assert!(matches!(err, ScriptError::NotADocument { index: 0 }));
    }
}
