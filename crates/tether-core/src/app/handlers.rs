//! Database handlers - QUERY（コード 1）と EXEC（コード 2）
//!
//! どちらも envelope の `config` を DbTaskConfig にデコードしてから
//! StatementRunner に payload を渡す。違いは行を期待するかどうかだけ。

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::runtime::TaskHandler;
use crate::domain::{AgentError, DbTaskConfig, TaskCode, TaskEnvelope, TaskOutput};
use crate::ports::StatementRunner;

pub struct QueryHandler {
    runner: Arc<dyn StatementRunner>,
}

impl QueryHandler {
    pub fn new(runner: Arc<dyn StatementRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl TaskHandler for QueryHandler {
    fn code(&self) -> TaskCode {
        TaskCode::QUERY
    }

    async fn handle(&self, envelope: &TaskEnvelope) -> Result<TaskOutput, AgentError> {
        let config = DbTaskConfig::from_raw(envelope.raw_config())?;
        info!(task_id = envelope.id(), driver = %config.driver(), "running query");

        let rows = self.runner.query(&config, envelope.payload()).await?;
        info!(task_id = envelope.id(), rows = rows.len(), "query finished");
        Ok(TaskOutput::Rows(rows))
    }
}

pub struct ExecHandler {
    runner: Arc<dyn StatementRunner>,
}

impl ExecHandler {
    pub fn new(runner: Arc<dyn StatementRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl TaskHandler for ExecHandler {
    fn code(&self) -> TaskCode {
        TaskCode::EXEC
    }

    async fn handle(&self, envelope: &TaskEnvelope) -> Result<TaskOutput, AgentError> {
        let config = DbTaskConfig::from_raw(envelope.raw_config())?;
        info!(task_id = envelope.id(), driver = %config.driver(), "running exec");

        let affected = self.runner.exec(&config, envelope.payload()).await?;
        info!(task_id = envelope.id(), rows_affected = affected, "exec finished");
        Ok(TaskOutput::Affected(affected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Cell, ResultRow};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl StatementRunner for RecordingRunner {
        async fn query(&self, config: &DbTaskConfig, sql: &str) -> Result<Vec<ResultRow>, AgentError> {
            self.calls
                .lock()
                .unwrap()
                .push((config.describe(), sql.to_string()));
            let mut row = ResultRow::default();
            row.push("one", Cell::Text("1".to_string()));
            Ok(vec![row])
        }

        async fn exec(&self, config: &DbTaskConfig, sql: &str) -> Result<u64, AgentError> {
            self.calls
                .lock()
                .unwrap()
                .push((config.describe(), sql.to_string()));
            Ok(4)
        }
    }

    #[tokio::test]
    async fn query_handler_decodes_config_and_returns_rows() {
        let runner = Arc::new(RecordingRunner::default());
        let handler = QueryHandler::new(runner.clone());
        let env = TaskEnvelope::new("1", TaskCode::QUERY, "SELECT 1 AS one", json!("{\"dsn\":\"u:p@/db\"}"));

        let out = handler.handle(&env).await.unwrap();
        assert!(matches!(out, TaskOutput::Rows(rows) if rows.len() == 1));

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0].0, "mysql://u@127.0.0.1:3306/db");
        assert_eq!(calls[0].1, "SELECT 1 AS one");
    }

    #[tokio::test]
    async fn exec_handler_returns_affected_rows() {
        let runner = Arc::new(RecordingRunner::default());
        let handler = ExecHandler::new(runner);
        let env = TaskEnvelope::new("2", TaskCode::EXEC, "DELETE FROM t", json!({"dsn": "sqlite::memory:"}));

        assert_eq!(handler.handle(&env).await.unwrap(), TaskOutput::Affected(4));
    }

    #[tokio::test]
    async fn bad_config_never_reaches_the_runner() {
        let runner = Arc::new(RecordingRunner::default());
        let handler = QueryHandler::new(runner.clone());
        let env = TaskEnvelope::new("3", TaskCode::QUERY, "SELECT 1", json!({"nodsn": true}));

        let err = handler.handle(&env).await.unwrap_err();
        assert!(matches!(err, AgentError::Decode(_)));
        assert!(runner.calls.lock().unwrap().is_empty());
    }
}
