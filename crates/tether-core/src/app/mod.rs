//! App - アプリケーション層
//!
//! ports を組み合わせてエージェントのロジックを実装します。
//!
//! # 主要コンポーネント
//! - **AgentBuilder**: handler の登録と起動時検証
//! - **Dispatcher**: task code から handler を選ぶ
//! - **QueryHandler / ExecHandler**: データベースタスク
//! - **Poller**: fetch→dispatch→execute→report のループ

pub mod builder;
pub mod handlers;
pub mod poller;
pub mod runtime;

// 主要な型を再エクスポート
pub use self::builder::{AgentBuilder, BuildError};
pub use self::handlers::{ExecHandler, QueryHandler};
pub use self::poller::{IterationOutcome, Poller, PollerSettings};
pub use self::runtime::{Dispatcher, HandlerRegistry, RegistryError, TaskHandler};
