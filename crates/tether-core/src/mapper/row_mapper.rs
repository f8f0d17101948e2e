//! RowMapper - 列の型が分からない DB 行を ResultRow に変換する
//!
//! # 流れ
//! 1. 最初の行のメタデータから列名を 1 度だけ取得し、scan 先を列数分確保する
//! 2. 行ごとに scan 先へ値を取り込む
//! 3. scan 先の値を列名つきで ResultRow へ移し、scan 先は `Null` に戻す
//!
//! 3 のリセットを省くと、ドライバが値を書かなかった列（NULL など）に
//! 前の行の値が残ってしまう。

use crate::domain::{AgentError, Cell, ResultRow};

/// scan に失敗した列
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFailure {
    pub index: usize,
    pub reason: String,
}

/// RowMapper が読める行
///
/// `scan_into` は値を持つ列の scan 先だけを書き換えてよい。
/// 書き換えなかった scan 先は `Null` のまま扱われる。
pub trait ScanRow {
    fn column_names(&self) -> Vec<String>;

    fn scan_into(&self, targets: &mut [Cell]) -> Result<(), ScanFailure>;
}

pub struct RowMapper {
    names: Vec<String>,
    targets: Vec<Cell>,
}

impl RowMapper {
    pub fn new(names: Vec<String>) -> Self {
        let targets = vec![Cell::Null; names.len()];
        Self { names, targets }
    }

    /// 行のメタデータから列名を取って初期化する
    pub fn for_row<R: ScanRow + ?Sized>(row: &R) -> Self {
        Self::new(row.column_names())
    }

    /// 1 行を読み取って ResultRow を返す
    pub fn update<R: ScanRow + ?Sized>(&mut self, row: &R) -> Result<ResultRow, AgentError> {
        if let Err(failure) = row.scan_into(&mut self.targets) {
            self.reset();
            let column = self
                .names
                .get(failure.index)
                .cloned()
                .unwrap_or_else(|| "<unknown>".to_string());
            return Err(AgentError::Scan {
                index: failure.index,
                column,
                reason: failure.reason,
            });
        }

        let mut out = ResultRow::with_capacity(self.names.len());
        for (name, target) in self.names.iter().zip(self.targets.iter_mut()) {
            // 値を取り出すと同時に scan 先を Null に戻す
            out.push(name.clone(), std::mem::take(target));
        }
        Ok(out)
    }

    fn reset(&mut self) {
        self.targets.iter_mut().for_each(|t| *t = Cell::Null);
    }
}
