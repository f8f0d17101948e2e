//! Domain identifiers.
//!
//! タスク ID はサーバが決める不透明な文字列なので、ここで扱うのは
//! エージェント側で生成するイテレーション ID だけ。
//!
//! ## ULID を使う理由
//! - **時刻でソート可能**: ログをイテレーション順に並べられる
//! - **調整不要**: 複数ホストのエージェントが独立に生成できる

use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// 1 回の poll イテレーションの識別子
///
/// Display は `iter-` プレフィックス付き（ログ用）。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IterationId(Ulid);

impl IterationId {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for IterationId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for IterationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "iter-{}", self.0)
    }
}
