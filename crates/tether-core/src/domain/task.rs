//! TaskEnvelope - タスクサーバから受け取る作業単位
//!
//! `config` は task code ごとにスキーマが異なるため、dispatch されるまで
//! 生の JSON のまま保持します。

use serde::{Deserialize, Serialize};
use std::fmt;

/// タスクの種類を表す数値コード
///
/// # 既知のコード
/// - `1`: データベースクエリ（行を返す）
/// - `2`: データベース exec（行を返さない）
///
/// 未知のコードは Dispatcher で拒否される。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskCode(u64);

impl TaskCode {
    pub const QUERY: TaskCode = TaskCode(1);
    pub const EXEC: TaskCode = TaskCode(2);

    pub const fn new(code: u64) -> Self {
        Self(code)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// poll レスポンスの JSON に対応する“運搬用”データ。
///
/// ```json
/// {"id": "42", "type": 1, "payload": "SELECT 1", "config": {"dsn": "..."}}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    #[serde(default)]
    id: String,

    #[serde(rename = "type")]
    code: TaskCode,

    #[serde(default)]
    payload: String,

    /// dispatch 前には解釈しない
    #[serde(default)]
    config: serde_json::Value,
}

impl TaskEnvelope {
    pub fn new(
        id: impl Into<String>,
        code: TaskCode,
        payload: impl Into<String>,
        config: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            code,
            payload: payload.into(),
            config,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn code(&self) -> TaskCode {
        self.code
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn raw_config(&self) -> &serde_json::Value {
        &self.config
    }
}

/// QUERY と EXEC はどちらもデータベースタスク
pub fn is_database_task(envelope: &TaskEnvelope) -> bool {
    matches!(envelope.code(), TaskCode::QUERY | TaskCode::EXEC)
}
