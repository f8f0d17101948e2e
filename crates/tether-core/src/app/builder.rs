//! AgentBuilder - Dispatcher の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）

use std::sync::Arc;

use super::handlers::{ExecHandler, QueryHandler};
use super::runtime::{Dispatcher, HandlerRegistry, RegistryError, TaskHandler};
use crate::domain::TaskCode;
use crate::ports::StatementRunner;

/// AgentBuilder は handler を登録して Dispatcher を作る
///
/// # 使用例
/// ```ignore
/// let dispatcher = AgentBuilder::new()
///     .with_database(Arc::new(SqlxRunner::default()))?
///     .expect_tasks(&[TaskCode::QUERY, TaskCode::EXEC])
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - expect_tasks() で期待される task code を登録
/// - build() 時に「期待集合 ⊆ 登録済み集合」をチェック
pub struct AgentBuilder {
    registry: HandlerRegistry,
    expected_tasks: Option<Vec<TaskCode>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing task types: {0:?}. These tasks were expected but not registered.")]
    MissingTaskTypes(Vec<TaskCode>),
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::new(),
            expected_tasks: None,
        }
    }

    pub fn register(mut self, handler: Arc<dyn TaskHandler>) -> Result<Self, RegistryError> {
        self.registry.register(handler)?;
        Ok(self)
    }

    /// QUERY と EXEC の handler を同じ runner で登録する
    pub fn with_database(self, runner: Arc<dyn StatementRunner>) -> Result<Self, RegistryError> {
        self.register(Arc::new(QueryHandler::new(Arc::clone(&runner))))?
            .register(Arc::new(ExecHandler::new(runner)))
    }

    pub fn expect_tasks(mut self, codes: &[TaskCode]) -> Self {
        self.expected_tasks = Some(codes.to_vec());
        self
    }

    pub fn build(self) -> Result<Dispatcher, BuildError> {
        if let Some(expected) = &self.expected_tasks {
            let registered = self.registry.registered_codes();
            let missing: Vec<TaskCode> = expected
                .iter()
                .filter(|code| !registered.contains(code))
                .copied()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingTaskTypes(missing));
            }
        }
        Ok(Dispatcher::new(self.registry))
    }
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentError, DbTaskConfig, ResultRow};
    use async_trait::async_trait;

    struct NoopRunner;

    #[async_trait]
    impl StatementRunner for NoopRunner {
        async fn query(&self, _: &DbTaskConfig, _: &str) -> Result<Vec<ResultRow>, AgentError> {
            Ok(Vec::new())
        }

        async fn exec(&self, _: &DbTaskConfig, _: &str) -> Result<u64, AgentError> {
            Ok(0)
        }
    }

    #[test]
    fn test_build_with_database() {
        let dispatcher = AgentBuilder::new()
            .with_database(Arc::new(NoopRunner))
            .unwrap()
            .expect_tasks(&[TaskCode::QUERY, TaskCode::EXEC])
            .build()
            .unwrap();
        assert_eq!(
            dispatcher.registry().registered_codes(),
            vec![TaskCode::QUERY, TaskCode::EXEC]
        );
    }

    #[test]
    fn test_build_missing_task_types() {
        let result = AgentBuilder::new()
            .register(Arc::new(QueryHandler::new(Arc::new(NoopRunner))))
            .unwrap()
            .expect_tasks(&[TaskCode::QUERY, TaskCode::EXEC])
            .build();
        assert!(matches!(
            result,
            Err(BuildError::MissingTaskTypes(missing)) if missing == vec![TaskCode::EXEC]
        ));
    }

    #[test]
    fn test_database_registered_twice() {
        let result = AgentBuilder::new()
            .with_database(Arc::new(NoopRunner))
            .unwrap()
            .with_database(Arc::new(NoopRunner));
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(_))));
    }

    #[test]
    fn test_build_no_expect_tasks() {
        assert!(AgentBuilder::new().build().is_ok());
    }
}
