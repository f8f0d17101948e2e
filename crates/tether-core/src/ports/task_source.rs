//! TaskSource port - タスクサーバへの poll
//!
//! # 実装
//! - **TaskServerClient**（impls/http）: reqwest による HTTP 実装

use async_trait::async_trait;

use crate::domain::{AgentError, TaskEnvelope};

/// 1 回の poll の結果
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// サーバが番兵値 `0` を返した（エラーではない）
    NoTask,
    Task(TaskEnvelope),
}

/// TaskSource は 1 回の呼び出しで 1 回だけリクエストを送る
///
/// リトライはしない。次の試行は Poller の次の tick に任せる。
#[async_trait]
pub trait TaskSource: Send + Sync {
    async fn fetch(&self) -> Result<FetchOutcome, AgentError>;
}
