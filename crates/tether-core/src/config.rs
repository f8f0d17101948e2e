//! Config - エージェント設定（conf.json + コマンドライン上書き）
//!
//! # マージ順
//! 1. conf.json の値（ファイルが無ければ空）
//! 2. コマンドラインで渡された値で上書き
//! 3. どちらにも無い値はデフォルト
//!
//! 上書きやデフォルト補完が起きた場合は `changed` が立ち、呼び出し側が
//! [`save`] でファイルに書き戻す。

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app::PollerSettings;
use crate::impls::DEFAULT_MAX_CONNECTIONS;

pub const CONFIG_FILENAME: &str = "conf.json";
pub const DEFAULT_URL: &str = "http://taskserver:8888/";
pub const DEFAULT_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid API Key.")]
    MissingApiKey,

    #[error("interval must be greater than zero")]
    InvalidInterval,

    #[error("{field} must be greater than zero")]
    ZeroLimit { field: &'static str },

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// conf.json に保存される設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub url: String,

    /// poll 間隔（秒）
    pub interval: u64,

    /// `X-Digistorm-Key` に載せる API キー
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_url: Option<String>,

    /// 1 タスクの実行上限（秒）
    pub task_timeout: u64,

    pub max_connections: u32,
}

impl AgentConfig {
    pub fn poll_url(&self) -> &str {
        &self.url
    }

    /// 指定が無ければ poll と同じ URL に報告する
    pub fn report_url(&self) -> &str {
        self.report_url.as_deref().unwrap_or(&self.url)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout)
    }

    pub fn poller_settings(&self) -> PollerSettings {
        PollerSettings {
            interval: self.interval(),
            task_timeout: self.task_timeout(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.interval == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        if self.task_timeout == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "task_timeout",
            });
        }
        if self.max_connections == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "max_connections",
            });
        }
        Ok(())
    }
}

/// コマンドラインから来る上書き値（None は「指定なし」）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub url: Option<String>,
    pub interval: Option<u64>,
    pub key: Option<String>,
    pub report_url: Option<String>,
    pub task_timeout: Option<u64>,
    pub max_connections: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedConfig {
    pub config: AgentConfig,
    /// ファイルの内容と違う（書き戻しが必要）
    pub changed: bool,
}

/// ファイル上の表現。欠けたフィールドやゼロ値は「未設定」扱い
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    interval: Option<u64>,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    report_url: Option<String>,
    #[serde(default)]
    task_timeout: Option<u64>,
    #[serde(default)]
    max_connections: Option<u32>,
}

/// 1 フィールド分のマージ。戻り値の bool はファイルから変わったか
fn pick<T: PartialEq>(file: Option<T>, flag: Option<T>, default: impl FnOnce() -> T) -> (T, bool) {
    match (file, flag) {
        (Some(current), Some(wanted)) => {
            let changed = current != wanted;
            (wanted, changed)
        }
        (None, Some(wanted)) => (wanted, true),
        (Some(current), None) => (current, false),
        (None, None) => (default(), true),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn non_zero<T: PartialEq + Default>(value: Option<T>) -> Option<T> {
    value.filter(|v| *v != T::default())
}

fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(FileConfig::default()),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_str(&content).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// ファイルと上書き値をマージする（検証はしない）
pub fn load_merged(path: &Path, overrides: ConfigOverrides) -> Result<LoadedConfig, ConfigError> {
    let file = read_file(path)?;

    let (url, c1) = pick(non_empty(file.url), overrides.url, || DEFAULT_URL.to_string());
    let (interval, c2) = pick(non_zero(file.interval), overrides.interval, || {
        DEFAULT_INTERVAL_SECS
    });
    let (key, c3) = pick(non_empty(file.key), overrides.key, String::new);
    let (task_timeout, c4) = pick(non_zero(file.task_timeout), overrides.task_timeout, || {
        DEFAULT_TASK_TIMEOUT_SECS
    });
    let (max_connections, c5) = pick(
        non_zero(file.max_connections),
        overrides.max_connections,
        || DEFAULT_MAX_CONNECTIONS,
    );

    // report_url は省略可能なので、デフォルト補完では変更扱いにしない
    let file_report_url = non_empty(file.report_url);
    let c6 = overrides
        .report_url
        .as_ref()
        .is_some_and(|wanted| file_report_url.as_ref() != Some(wanted));
    let report_url = overrides.report_url.or(file_report_url);

    Ok(LoadedConfig {
        config: AgentConfig {
            url,
            interval,
            key,
            report_url,
            task_timeout,
            max_connections,
        },
        changed: c1 || c2 || c3 || c4 || c5 || c6,
    })
}

pub fn save(path: &Path, config: &AgentConfig) -> Result<(), ConfigError> {
    let json = serde_json::to_string_pretty(config).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, json).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    fn full_file(dir: &TempDir) -> PathBuf {
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(
            &path,
            r#"{"url":"http://tasks.local/","interval":5,"key":"abc","task_timeout":60,"max_connections":4}"#,
        )
        .unwrap();
        path
    }

    #[test]
    fn missing_file_gets_defaults_and_needs_saving() {
        let dir = TempDir::new().unwrap();
        let loaded = load_merged(&dir.path().join(CONFIG_FILENAME), ConfigOverrides::default()).unwrap();

        assert!(loaded.changed);
        assert_eq!(loaded.config.url, DEFAULT_URL);
        assert_eq!(loaded.config.interval, 10);
        assert_eq!(loaded.config.task_timeout, 300);
        assert_eq!(loaded.config.max_connections, 100);
        assert!(loaded.config.key.is_empty());
    }

    #[test]
    fn complete_file_is_unchanged() {
        let dir = TempDir::new().unwrap();
        let loaded = load_merged(&full_file(&dir), ConfigOverrides::default()).unwrap();

        assert!(!loaded.changed);
        assert_eq!(loaded.config.url, "http://tasks.local/");
        assert_eq!(loaded.config.interval(), Duration::from_secs(5));
        assert_eq!(loaded.config.report_url(), "http://tasks.local/");
    }

    #[test]
    fn flags_override_file_values() {
        let dir = TempDir::new().unwrap();
        let overrides = ConfigOverrides {
            key: Some("other".to_string()),
            interval: Some(30),
            ..ConfigOverrides::default()
        };
        let loaded = load_merged(&full_file(&dir), overrides).unwrap();

        assert!(loaded.changed);
        assert_eq!(loaded.config.key, "other");
        assert_eq!(loaded.config.interval, 30);
        assert_eq!(loaded.config.url, "http://tasks.local/");
    }

    #[test]
    fn flag_equal_to_file_value_is_not_a_change() {
        let dir = TempDir::new().unwrap();
        let overrides = ConfigOverrides {
            key: Some("abc".to_string()),
            ..ConfigOverrides::default()
        };
        assert!(!load_merged(&full_file(&dir), overrides).unwrap().changed);
    }

    #[test]
    fn report_url_override_is_kept_separately() {
        let dir = TempDir::new().unwrap();
        let overrides = ConfigOverrides {
            report_url: Some("http://tasks.local/report".to_string()),
            ..ConfigOverrides::default()
        };
        let loaded = load_merged(&full_file(&dir), overrides).unwrap();

        assert!(loaded.changed);
        assert_eq!(loaded.config.poll_url(), "http://tasks.local/");
        assert_eq!(loaded.config.report_url(), "http://tasks.local/report");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        fs::write(&path, "{not json").unwrap();

        let err = load_merged(&path, ConfigOverrides::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Json { .. }));
    }

    #[test]
    fn save_then_load_is_stable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        let overrides = ConfigOverrides {
            key: Some("abc".to_string()),
            ..ConfigOverrides::default()
        };
        let first = load_merged(&path, overrides).unwrap();
        assert!(first.changed);
        save(&path, &first.config).unwrap();

        let second = load_merged(&path, ConfigOverrides::default()).unwrap();
        assert!(!second.changed);
        assert_eq!(second.config, first.config);
    }

    #[rstest]
    #[case::empty_key("", 10, 300, 100)]
    #[case::blank_key("   ", 10, 300, 100)]
    fn missing_key_is_rejected(
        #[case] key: &str,
        #[case] interval: u64,
        #[case] task_timeout: u64,
        #[case] max_connections: u32,
    ) {
        let config = AgentConfig {
            url: DEFAULT_URL.to_string(),
            interval,
            key: key.to_string(),
            report_url: None,
            task_timeout,
            max_connections,
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
        assert_eq!(err.to_string(), "Invalid API Key.");
    }

    #[rstest]
    #[case::zero_interval(0, 300, 100, "interval")]
    #[case::zero_timeout(10, 0, 100, "task_timeout")]
    #[case::zero_connections(10, 300, 0, "max_connections")]
    fn zero_limits_are_rejected(
        #[case] interval: u64,
        #[case] task_timeout: u64,
        #[case] max_connections: u32,
        #[case] field: &str,
    ) {
        let config = AgentConfig {
            url: DEFAULT_URL.to_string(),
            interval,
            key: "abc".to_string(),
            report_url: None,
            task_timeout,
            max_connections,
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains(field), "got: {err}");
    }
}
