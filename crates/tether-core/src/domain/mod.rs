//! Domain model (envelopes, rows, responses, errors, ids).
//!
//! - task: TaskEnvelope と TaskCode
//! - db_config: データベースタスクの接続設定
//! - row: Cell / ResultRow
//! - response: サーバへ返すレスポンス
//! - errors: イテレーション内のエラー分類

pub mod db_config;
pub mod errors;
pub mod ids;
pub mod response;
pub mod row;
pub mod task;

pub use db_config::{ConnectTarget, DbTaskConfig, DriverKind};
pub use errors::{AgentError, UNKNOWN_TASK_MESSAGE};
pub use ids::IterationId;
pub use response::{ExecStatus, ResponseBody, ResponseEnvelope, ResponseKind, TaskOutput};
pub use row::{Cell, ResultRow};
pub use task::{TaskCode, TaskEnvelope, is_database_task};
