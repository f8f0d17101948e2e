//! tether-core
//!
//! Core building blocks for the tether task agent.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（task, db_config, row, response, errors, ids）
//! - **ports**: 抽象化レイヤー（TaskSource, ResultSink, StatementRunner, Clock, IdGenerator）
//! - **mapper**: DB の行を ResultRow に変換する RowMapper
//! - **impls**: 実装（HTTP の TaskServerClient、sqlx の SqlxRunner）
//! - **app**: アプリケーションロジック（builder, runtime, handlers, poller）
//! - **config**: conf.json とコマンドライン上書きのマージ

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod mapper;
pub mod ports;
