//! Ports - 抽象化レイヤー
//!
//! 外部システム（タスクサーバ、ローカルデータベース）へのインターフェースを
//! trait として定義し、Poller がテストで差し替えられるようにする。

pub mod clock;
pub mod id_generator;
pub mod result_sink;
pub mod statement_runner;
pub mod task_source;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::result_sink::ResultSink;
pub use self::statement_runner::StatementRunner;
pub use self::task_source::{FetchOutcome, TaskSource};
