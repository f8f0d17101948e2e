use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::{AgentError, TaskCode, TaskEnvelope, TaskOutput, is_database_task};

/// A handler for a specific task code.
///
/// Handlers take the whole `TaskEnvelope` so each one can decode the raw
/// `config` into its own typed configuration after dispatch.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    fn code(&self) -> TaskCode;

    async fn handle(&self, envelope: &TaskEnvelope) -> Result<TaskOutput, AgentError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Handler for task type '{0}' is already registered")]
    AlreadyRegistered(TaskCode),
}

/// Registry of handlers (task code -> handler).
///
/// Design:
/// - Built during initialization (mutable).
/// - Used during runtime (immutable).
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<TaskCode, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, handler: Arc<dyn TaskHandler>) -> Result<(), RegistryError> {
        let code = handler.code();
        if self.handlers.contains_key(&code) {
            return Err(RegistryError::AlreadyRegistered(code));
        }
        self.handlers.insert(code, handler);
        Ok(())
    }

    pub fn get(&self, code: TaskCode) -> Option<&Arc<dyn TaskHandler>> {
        self.handlers.get(&code)
    }

    pub fn registered_codes(&self) -> Vec<TaskCode> {
        let mut codes: Vec<TaskCode> = self.handlers.keys().copied().collect();
        codes.sort();
        codes
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Dispatcher routes a `TaskEnvelope` to the handler registered for its code.
pub struct Dispatcher {
    registry: HandlerRegistry,
}

impl Dispatcher {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Unknown codes are rejected before anything runs.
    pub fn dispatch(&self, envelope: &TaskEnvelope) -> Result<Arc<dyn TaskHandler>, AgentError> {
        let code = envelope.code();
        let handler = self
            .registry
            .get(code)
            .ok_or(AgentError::UnknownTaskType(code))?;
        debug!(
            task_id = envelope.id(),
            type_code = %code,
            database = is_database_task(envelope),
            "dispatched"
        );
        Ok(Arc::clone(handler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FixedHandler(TaskCode);

    #[async_trait]
    impl TaskHandler for FixedHandler {
        fn code(&self) -> TaskCode {
            self.0
        }

        async fn handle(&self, _envelope: &TaskEnvelope) -> Result<TaskOutput, AgentError> {
            Ok(TaskOutput::Affected(self.0.as_u64()))
        }
    }

    fn envelope(code: u64) -> TaskEnvelope {
        TaskEnvelope::new("t-1", TaskCode::new(code), "", json!({}))
    }

    #[test]
    fn double_registration_is_rejected() {
        let mut reg = HandlerRegistry::new();
        reg.register(Arc::new(FixedHandler(TaskCode::QUERY))).unwrap();
        let err = reg
            .register(Arc::new(FixedHandler(TaskCode::QUERY)))
            .unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered(c) if c == TaskCode::QUERY));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn registered_codes_are_sorted() {
        let mut reg = HandlerRegistry::new();
        reg.register(Arc::new(FixedHandler(TaskCode::EXEC))).unwrap();
        reg.register(Arc::new(FixedHandler(TaskCode::QUERY))).unwrap();
        assert_eq!(reg.registered_codes(), vec![TaskCode::QUERY, TaskCode::EXEC]);
    }

    #[tokio::test]
    async fn dispatcher_runs_registered_handler() {
        let mut reg = HandlerRegistry::new();
        reg.register(Arc::new(FixedHandler(TaskCode::EXEC))).unwrap();
        let dispatcher = Dispatcher::new(reg);

        let env = envelope(2);
        let out = dispatcher.dispatch(&env).unwrap().handle(&env).await.unwrap();
        assert_eq!(out, TaskOutput::Affected(2));
    }

    #[tokio::test]
    async fn dispatcher_rejects_unknown_code() {
        let dispatcher = Dispatcher::new(HandlerRegistry::new());

        let Err(err) = dispatcher.dispatch(&envelope(99)) else {
            panic!("unknown code must not resolve to a handler");
        };
        assert!(matches!(err, AgentError::UnknownTaskType(c) if c.as_u64() == 99));
    }
}
