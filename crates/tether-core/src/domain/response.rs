//! Response model: the envelope posted back to the task server.
//!
//! Shape on the wire:
//! `{"type": "success" | "error", "body": <rows | exec status | message>}`

use serde::Serialize;

use super::row::ResultRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    Success,
    Error,
}

/// Result of a successfully executed task, before it is wrapped for transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutput {
    /// Rows returned by a query, in the order the database produced them.
    Rows(Vec<ResultRow>),

    /// Status of a statement that returns no rows.
    Affected(u64),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecStatus {
    #[serde(rename = "rowsAffected")]
    pub rows_affected: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Rows(Vec<ResultRow>),
    Status(ExecStatus),
    Message(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseEnvelope {
    #[serde(rename = "type")]
    pub kind: ResponseKind,
    pub body: ResponseBody,
}

impl ResponseEnvelope {
    pub fn success(output: TaskOutput) -> Self {
        let body = match output {
            TaskOutput::Rows(rows) => ResponseBody::Rows(rows),
            TaskOutput::Affected(n) => ResponseBody::Status(ExecStatus { rows_affected: n }),
        };
        Self {
            kind: ResponseKind::Success,
            body,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: ResponseKind::Error,
            body: ResponseBody::Message(message.into()),
        }
    }
}
