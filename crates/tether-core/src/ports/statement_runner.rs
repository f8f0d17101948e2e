//! StatementRunner port - ローカルデータベースでの SQL 実行
//!
//! # 実装
//! - **SqlxRunner**（impls/sqlx_runner）: MySQL / SQLite
//!
//! 接続はタスク 1 件ごとに開いて、成否にかかわらずタスク終了時に閉じる。

use async_trait::async_trait;

use crate::domain::{AgentError, DbTaskConfig, ResultRow};

#[async_trait]
pub trait StatementRunner: Send + Sync {
    /// 行を返す文を実行し、行を返された順に返す
    async fn query(&self, config: &DbTaskConfig, sql: &str) -> Result<Vec<ResultRow>, AgentError>;

    /// 行を返さない文を実行し、影響を受けた行数を返す
    async fn exec(&self, config: &DbTaskConfig, sql: &str) -> Result<u64, AgentError>;
}
