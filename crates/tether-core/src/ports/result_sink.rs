//! ResultSink port - 実行結果の報告先

use async_trait::async_trait;

use crate::domain::{AgentError, ResponseEnvelope};

/// ResultSink は success / error のレスポンスをサーバへ送る
///
/// 失敗は `AgentError::Report` で返す。呼び出し側はそれをログに残すだけで、
/// 再度 report しない。
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn report(&self, response: &ResponseEnvelope) -> Result<(), AgentError>;
}
