//! SqlxRunner - sqlx による StatementRunner 実装
//!
//! タスク 1 件ごとにプールを開き、終わったら必ず閉じる。
//! 文はプリペアせずにそのまま送るので、MySQL ではテキストプロトコルになり、
//! どの型の列も文字列として RowMapper に届く。

use std::time::Duration;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use sqlx::mysql::{MySql, MySqlQueryResult, MySqlRow};
use sqlx::pool::PoolOptions;
use sqlx::sqlite::{Sqlite, SqliteQueryResult, SqliteRow};
use sqlx::{Column, ColumnIndex, Database, Decode, Executor, Pool, Row};
use tracing::debug;

use crate::domain::{AgentError, Cell, ConnectTarget, DbTaskConfig, ResultRow};
use crate::mapper::{RowMapper, ScanFailure, ScanRow};
use crate::ports::StatementRunner;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 100;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// sqlx の QueryResult から影響行数を取り出す
trait AffectedRows {
    fn affected(&self) -> u64;
}

impl AffectedRows for MySqlQueryResult {
    fn affected(&self) -> u64 {
        self.rows_affected()
    }
}

impl AffectedRows for SqliteQueryResult {
    fn affected(&self) -> u64 {
        self.rows_affected()
    }
}

fn column_names<R: Row>(row: &R) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

fn scan_text_columns<R>(row: &R, targets: &mut [Cell]) -> Result<(), ScanFailure>
where
    R: Row,
    usize: ColumnIndex<R>,
    for<'r> Option<String>: Decode<'r, R::Database>,
{
    for (index, target) in targets.iter_mut().enumerate() {
        let value: Option<String> = row
            .try_get_unchecked(index)
            .map_err(|e| ScanFailure {
                index,
                reason: e.to_string(),
            })?;
        *target = Cell::from(value);
    }
    Ok(())
}

impl ScanRow for MySqlRow {
    fn column_names(&self) -> Vec<String> {
        column_names(self)
    }

    fn scan_into(&self, targets: &mut [Cell]) -> Result<(), ScanFailure> {
        scan_text_columns(self, targets)
    }
}

impl ScanRow for SqliteRow {
    fn column_names(&self) -> Vec<String> {
        column_names(self)
    }

    fn scan_into(&self, targets: &mut [Cell]) -> Result<(), ScanFailure> {
        scan_text_columns(self, targets)
    }
}

/// sqlx を使う StatementRunner
#[derive(Debug, Clone)]
pub struct SqlxRunner {
    max_connections: u32,
}

impl SqlxRunner {
    pub fn new(max_connections: u32) -> Self {
        Self {
            max_connections: max_connections.max(1),
        }
    }

    fn pool_options<DB: Database>(&self) -> PoolOptions<DB> {
        PoolOptions::<DB>::new()
            .max_connections(self.max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
    }
}

impl Default for SqlxRunner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONNECTIONS)
    }
}

fn connection_error(e: sqlx::Error) -> AgentError {
    AgentError::Connection(e.to_string())
}

#[async_trait]
impl StatementRunner for SqlxRunner {
    async fn query(&self, config: &DbTaskConfig, sql: &str) -> Result<Vec<ResultRow>, AgentError> {
        debug!(driver = %config.driver(), target = %config.describe(), "opening database pool for query");
        match config.target() {
            ConnectTarget::MySql(opts) => {
                let pool = self
                    .pool_options::<MySql>()
                    .connect_with(opts.clone())
                    .await
                    .map_err(connection_error)?;
                query_scoped(pool, sql).await
            }
            ConnectTarget::Sqlite(opts) => {
                let pool = self
                    .pool_options::<Sqlite>()
                    .connect_with(opts.clone())
                    .await
                    .map_err(connection_error)?;
                query_scoped(pool, sql).await
            }
        }
    }

    async fn exec(&self, config: &DbTaskConfig, sql: &str) -> Result<u64, AgentError> {
        debug!(driver = %config.driver(), target = %config.describe(), "opening database pool for exec");
        match config.target() {
            ConnectTarget::MySql(opts) => {
                let pool = self
                    .pool_options::<MySql>()
                    .connect_with(opts.clone())
                    .await
                    .map_err(connection_error)?;
                exec_scoped(pool, sql).await
            }
            ConnectTarget::Sqlite(opts) => {
                let pool = self
                    .pool_options::<Sqlite>()
                    .connect_with(opts.clone())
                    .await
                    .map_err(connection_error)?;
                exec_scoped(pool, sql).await
            }
        }
    }
}

/// 行を返す文を 1 つ実行し、結果にかかわらずプールを閉じる
async fn query_scoped<DB>(pool: Pool<DB>, sql: &str) -> Result<Vec<ResultRow>, AgentError>
where
    DB: Database,
    for<'c> &'c mut DB::Connection: Executor<'c, Database = DB>,
    DB::Row: ScanRow,
{
    let result = fetch_rows(&pool, sql).await;
    pool.close().await;
    result
}

/// 行を返さない文を 1 つ実行し、結果にかかわらずプールを閉じる
async fn exec_scoped<DB>(pool: Pool<DB>, sql: &str) -> Result<u64, AgentError>
where
    DB: Database,
    for<'c> &'c mut DB::Connection: Executor<'c, Database = DB>,
    DB::QueryResult: AffectedRows,
{
    let result = (&pool)
        .execute(sql)
        .await
        .map(|r| r.affected())
        .map_err(|e| AgentError::Execution(e.to_string()));
    pool.close().await;
    result
}

async fn fetch_rows<DB>(pool: &Pool<DB>, sql: &str) -> Result<Vec<ResultRow>, AgentError>
where
    DB: Database,
    for<'c> &'c mut DB::Connection: Executor<'c, Database = DB>,
    DB::Row: ScanRow,
{
    let mut stream = pool.fetch(sql);
    let mut mapper: Option<RowMapper> = None;
    let mut rows = Vec::new();

    while let Some(row) = stream
        .try_next()
        .await
        .map_err(|e| AgentError::Execution(e.to_string()))?
    {
        // 列名は最初の行のメタデータから 1 度だけ取る
        let mapper = mapper.get_or_insert_with(|| RowMapper::for_row(&row));
        rows.push(mapper.update(&row)?);
    }

    Ok(rows)
}
