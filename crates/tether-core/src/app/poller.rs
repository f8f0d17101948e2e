//! Poller - 定期的にタスクを取りに行く実行ループ
//!
//! # フロー（1 イテレーション）
//! 1. TaskSource::fetch() で poll（`0` ならここで終わり）
//! 2. Dispatcher でコードから handler を選ぶ（未知コードはエラー）
//! 3. handler を task_timeout 付きで実行
//! 4. ResultSink::report() で success / error を報告
//!
//! # 並行性
//! - イテレーションはループ内で逐次実行する（同時に走るタスクは常に 1 つ）
//! - 実行中に過ぎた tick はスキップする
//! - shutdown は tick 待ちの間も、実行中のイテレーションも止める

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::runtime::Dispatcher;
use crate::domain::{AgentError, ResponseEnvelope, TaskEnvelope, TaskOutput};
use crate::ports::{FetchOutcome, IdGenerator, ResultSink, TaskSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerSettings {
    pub interval: Duration,
    pub task_timeout: Duration,
}

/// 1 イテレーションの結果
#[derive(Debug)]
pub enum IterationOutcome {
    NoTask,

    Succeeded {
        task_id: String,
        /// success レスポンスがサーバに届いたか
        delivered: bool,
    },

    Failed {
        error: AgentError,
        /// error レスポンスがサーバに届いたか
        delivered: bool,
    },
}

pub struct Poller {
    source: Arc<dyn TaskSource>,
    sink: Arc<dyn ResultSink>,
    dispatcher: Arc<Dispatcher>,
    ids: Arc<dyn IdGenerator>,
    settings: PollerSettings,
}

impl Poller {
    pub fn new(
        source: Arc<dyn TaskSource>,
        sink: Arc<dyn ResultSink>,
        dispatcher: Arc<Dispatcher>,
        ids: Arc<dyn IdGenerator>,
        settings: PollerSettings,
    ) -> Self {
        Self {
            source,
            sink,
            dispatcher,
            ids,
            settings,
        }
    }

    /// shutdown が来るまで poll を続ける
    ///
    /// 最初のイテレーションは即座に走り、以後は interval ごと。
    /// `shutdown` の送信側を drop しても止まる。
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval = ?self.settings.interval, "poller started");

        loop {
            tokio::select! {
                _ = shutdown_requested(&mut shutdown) => break,
                _ = ticker.tick() => {}
            }

            let started = Instant::now();
            tokio::select! {
                _ = shutdown_requested(&mut shutdown) => {
                    warn!("shutdown requested, in-flight iteration cancelled");
                    break;
                }
                _ = self.run_once() => {}
            }

            let elapsed = started.elapsed();
            if elapsed > self.settings.interval {
                warn!(?elapsed, "iteration overran the poll interval, missed ticks skipped");
                // 期限切れの tick を 1 つ捨てる。次の tick は元の周期に揃う
                ticker.tick().await;
            }
        }

        info!("poller stopped");
    }

    /// 1 イテレーションを実行する（エラーはすべてここで吸収する）
    pub async fn run_once(&self) -> IterationOutcome {
        let iteration = self.ids.generate_iteration_id();
        self.iterate()
            .instrument(info_span!("iteration", %iteration))
            .await
    }

    async fn iterate(&self) -> IterationOutcome {
        debug!("checking for tasks");

        let envelope = match self.source.fetch().await {
            Ok(FetchOutcome::NoTask) => {
                debug!("no tasks");
                return IterationOutcome::NoTask;
            }
            Ok(FetchOutcome::Task(envelope)) => envelope,
            Err(error) => return self.fail(None, error).await,
        };

        match self.execute(&envelope).await {
            Ok(output) => {
                let delivered = self.deliver(&ResponseEnvelope::success(output)).await;
                IterationOutcome::Succeeded {
                    task_id: envelope.id().to_string(),
                    delivered,
                }
            }
            Err(error) => self.fail(Some(envelope.id()), error).await,
        }
    }

    async fn execute(&self, envelope: &TaskEnvelope) -> Result<TaskOutput, AgentError> {
        let handler = self.dispatcher.dispatch(envelope)?;
        let timeout = self.settings.task_timeout;
        tokio::time::timeout(timeout, handler.handle(envelope))
            .await
            .map_err(|_| AgentError::Timeout(timeout))?
    }

    async fn fail(&self, task_id: Option<&str>, error: AgentError) -> IterationOutcome {
        error!(task_id, error = %error, "iteration failed");
        let delivered = self
            .deliver(&ResponseEnvelope::error(error.report_message()))
            .await;
        IterationOutcome::Failed { error, delivered }
    }

    /// report の失敗はログに残すだけで、もう一度 report はしない
    async fn deliver(&self, response: &ResponseEnvelope) -> bool {
        match self.sink.report(response).await {
            Ok(()) => {
                info!(kind = ?response.kind, "response reported");
                true
            }
            Err(err) => {
                error!(error = %err, "failed to report response");
                false
            }
        }
    }
}

async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        // 送信側が drop された場合も停止扱い
        if rx.changed().await.is_err() {
            return;
        }
    }
}
