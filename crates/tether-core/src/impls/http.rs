//! TaskServerClient - タスクサーバとの HTTP 通信
//!
//! 1 つの reqwest::Client を共有して TaskSource（GET で poll）と
//! ResultSink（POST で報告）の両方を実装する。
//! どちらのリクエストにも `X-Digistorm-Key` ヘッダで API キーを付ける。

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info};

use crate::domain::{AgentError, ResponseEnvelope, TaskEnvelope};
use crate::ports::{FetchOutcome, ResultSink, TaskSource};

pub const AUTH_HEADER: &str = "X-Digistorm-Key";

/// poll レスポンスが「タスクなし」を表す番兵値
pub const NO_TASK_SENTINEL: &str = "0";

#[derive(Debug, Clone)]
pub struct TaskServerClient {
    client: Client,
    poll_url: String,
    report_url: String,
    api_key: String,
}

impl TaskServerClient {
    pub fn new(
        client: Client,
        poll_url: impl Into<String>,
        report_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            poll_url: poll_url.into(),
            report_url: report_url.into(),
            api_key: api_key.into(),
        }
    }
}

/// poll レスポンスの body を解釈する
///
/// body がちょうど `0` ならタスクなし、それ以外は TaskEnvelope としてデコードする。
pub fn parse_poll_body(body: &str) -> Result<FetchOutcome, AgentError> {
    if body == NO_TASK_SENTINEL {
        return Ok(FetchOutcome::NoTask);
    }
    serde_json::from_str::<TaskEnvelope>(body)
        .map(FetchOutcome::Task)
        .map_err(|e| AgentError::Decode(format!("task envelope: {e}")))
}

#[async_trait]
impl TaskSource for TaskServerClient {
    async fn fetch(&self) -> Result<FetchOutcome, AgentError> {
        let response = self
            .client
            .get(&self.poll_url)
            .header(AUTH_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| AgentError::Network(format!("poll request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AgentError::Network(format!("failed to read poll response: {e}")))?;

        if !status.is_success() {
            return Err(AgentError::Network(format!(
                "poll returned {status}: {body}"
            )));
        }

        let outcome = parse_poll_body(&body)?;
        if let FetchOutcome::Task(envelope) = &outcome {
            info!(task_id = envelope.id(), type_code = %envelope.code(), "task found");
        }
        Ok(outcome)
    }
}

#[async_trait]
impl ResultSink for TaskServerClient {
    async fn report(&self, response: &ResponseEnvelope) -> Result<(), AgentError> {
        let payload = serde_json::to_vec(response)
            .map_err(|e| AgentError::Report(format!("serialize response: {e}")))?;

        let ack = self
            .client
            .post(&self.report_url)
            .header(AUTH_HEADER, &self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(|e| AgentError::Report(format!("report request failed: {e}")))?;

        let status = ack.status();
        let body = ack
            .text()
            .await
            .map_err(|e| AgentError::Report(format!("failed to read acknowledgment: {e}")))?;

        if !status.is_success() {
            return Err(AgentError::Report(format!(
                "report returned {status}: {body}"
            )));
        }

        debug!(%status, ack = %body, "report acknowledged");
        Ok(())
    }
}
