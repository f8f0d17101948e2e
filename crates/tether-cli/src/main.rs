use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use tether_core::app::{AgentBuilder, BuildError, IterationOutcome, Poller, RegistryError};
use tether_core::config::{self, AgentConfig, CONFIG_FILENAME, ConfigError, ConfigOverrides};
use tether_core::domain::TaskCode;
use tether_core::impls::{SqlxRunner, TaskServerClient};
use tether_core::ports::{SystemClock, UlidGenerator};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "tether", about = "Polls a task server and runs database tasks locally")]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, default_value = CONFIG_FILENAME)]
    config: PathBuf,

    /// API key sent with every request
    #[arg(long)]
    key: Option<String>,

    /// Task server URL to poll
    #[arg(long)]
    url: Option<String>,

    /// Seconds between polls
    #[arg(long)]
    interval: Option<u64>,

    /// URL to post results to (defaults to --url)
    #[arg(long)]
    report_url: Option<String>,

    /// Seconds a single task may run
    #[arg(long)]
    task_timeout: Option<u64>,

    /// Connection limit for each task's pool
    #[arg(long)]
    max_connections: Option<u32>,

    /// Run a single iteration and exit
    #[arg(long)]
    once: bool,

    /// Validate and persist the config, then exit
    #[arg(long)]
    check_config: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            url: self.url.clone(),
            interval: self.interval,
            key: self.key.clone(),
            report_url: self.report_url.clone(),
            task_timeout: self.task_timeout,
            max_connections: self.max_connections,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("http client: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Build(#[from] BuildError),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(StartupError::Config(e)) => {
            error!(error = %e, "configuration error");
            ExitCode::from(2)
        }
        Err(e) => {
            error!(error = %e, "startup failed");
            ExitCode::from(1)
        }
    }
}

/// conf.json を読み、上書きをマージし、検証してから必要なら書き戻す
fn load_config(cli: &Cli) -> Result<AgentConfig, ConfigError> {
    let loaded = config::load_merged(&cli.config, cli.overrides())?;
    loaded.config.validate()?;
    if loaded.changed {
        config::save(&cli.config, &loaded.config)?;
        info!(path = %cli.config.display(), "config updated");
    }
    Ok(loaded.config)
}

async fn run(cli: Cli) -> Result<ExitCode, StartupError> {
    let config = load_config(&cli)?;
    info!(
        url = config.poll_url(),
        report_url = config.report_url(),
        interval = config.interval,
        "config loaded"
    );
    if cli.check_config {
        return Ok(ExitCode::SUCCESS);
    }

    let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    let server = Arc::new(TaskServerClient::new(
        http,
        config.poll_url(),
        config.report_url(),
        config.key.clone(),
    ));

    let dispatcher = AgentBuilder::new()
        .with_database(Arc::new(SqlxRunner::new(config.max_connections)))?
        .expect_tasks(&[TaskCode::QUERY, TaskCode::EXEC])
        .build()?;

    let poller = Poller::new(
        server.clone(),
        server,
        Arc::new(dispatcher),
        Arc::new(UlidGenerator::new(SystemClock)),
        config.poller_settings(),
    );

    if cli.once {
        return Ok(match poller.run_once().await {
            IterationOutcome::Failed { .. } => ExitCode::from(1),
            _ => ExitCode::SUCCESS,
        });
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    poller.run(shutdown_rx).await;
    Ok(ExitCode::SUCCESS)
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let ctrl_c = async { signal_or_pending(tokio::signal::ctrl_c().await, "ctrl-c").await };
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "cannot listen for SIGTERM, only ctrl-c will stop the agent");
            ctrl_c.await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    signal_or_pending(tokio::signal::ctrl_c().await, "ctrl-c").await;
}

/// シグナル待ちの登録に失敗したら止まらずに待ち続ける
async fn signal_or_pending(received: std::io::Result<()>, name: &str) {
    if let Err(e) = received {
        warn!(error = %e, signal = name, "cannot listen for signal, ignoring it");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failed_signal_registration_never_resolves() {
        let waited = tokio::time::timeout(
            Duration::from_millis(50),
            signal_or_pending(Err(std::io::Error::other("no handler")), "ctrl-c"),
        )
        .await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn received_signal_resolves_immediately() {
        let waited = tokio::time::timeout(Duration::from_millis(50), signal_or_pending(Ok(()), "ctrl-c")).await;
        assert!(waited.is_ok());
    }
}
