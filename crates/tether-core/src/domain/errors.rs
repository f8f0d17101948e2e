//! Errors - イテレーション内で発生するエラーの分類
//!
//! どの variant もイテレーションローカルで、Poller が捕まえて
//! サーバへ error レスポンスとして報告した後、次の tick に進む。
//! `Report` だけは再報告しない（報告の失敗を報告しようとするとループする）。

use std::time::Duration;

use thiserror::Error;

use super::task::TaskCode;

/// サーバへ返す未知タスクのメッセージ
pub const UNKNOWN_TASK_MESSAGE: &str = "Task type not recognised";

#[derive(Debug, Error)]
pub enum AgentError {
    /// fetch の通信失敗
    #[error("network: {0}")]
    Network(String),

    /// envelope または config の JSON が壊れている
    #[error("decode: {0}")]
    Decode(String),

    #[error("unknown task type: {0}")]
    UnknownTaskType(TaskCode),

    #[error("connection: {0}")]
    Connection(String),

    #[error("execution: {0}")]
    Execution(String),

    /// 行の値を文字列に変換できなかった
    #[error("cannot convert index {index} column {column} to text: {reason}")]
    Scan {
        index: usize,
        column: String,
        reason: String,
    },

    #[error("timeout: task exceeded {0:?}")]
    Timeout(Duration),

    #[error("report: {0}")]
    Report(String),
}

impl AgentError {
    /// error レスポンスの body に入れる文字列
    pub fn report_message(&self) -> String {
        match self {
            AgentError::UnknownTaskType(_) => UNKNOWN_TASK_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_report_failure(&self) -> bool {
        matches!(self, AgentError::Report(_))
    }
}
