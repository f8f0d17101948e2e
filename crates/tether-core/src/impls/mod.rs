//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **TaskServerClient**: HTTP でタスクサーバと通信（TaskSource + ResultSink）
//! - **SqlxRunner**: sqlx で MySQL / SQLite に文を実行（StatementRunner）

pub mod http;
pub mod sqlx_runner;

pub use self::http::{AUTH_HEADER, NO_TASK_SENTINEL, TaskServerClient, parse_poll_body};
pub use self::sqlx_runner::{DEFAULT_MAX_CONNECTIONS, SqlxRunner};
