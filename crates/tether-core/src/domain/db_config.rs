//! DbTaskConfig - データベースタスク用の接続設定
//!
//! envelope の `config` から dispatch 後に遅延デコードされる。
//!
//! # driver の決定
//! driver の種類は DSN だけから決まる（サーバが `type` を送ってきても無視する）。
//! - `sqlite:` で始まる → SQLite
//! - `mysql://` で始まる → MySQL
//! - それ以外 → Go 形式の MySQL DSN（`user:pass@tcp(host:port)/db?params`）として
//!   各部分を MySqlConnectOptions に直接設定する

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use sqlx::mysql::MySqlConnectOptions;
use sqlx::sqlite::SqliteConnectOptions;
use tracing::debug;

use super::errors::AgentError;

const DEFAULT_MYSQL_HOST: &str = "127.0.0.1";
const DEFAULT_MYSQL_PORT: u16 = 3306;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    MySql,
    Sqlite,
}

impl fmt::Display for DriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverKind::MySql => f.write_str("mysql"),
            DriverKind::Sqlite => f.write_str("sqlite"),
        }
    }
}

/// sqlx にそのまま渡せる接続オプション
#[derive(Clone)]
pub enum ConnectTarget {
    MySql(MySqlConnectOptions),
    Sqlite(SqliteConnectOptions),
}

#[derive(Debug, Deserialize)]
struct RawDbConfig {
    #[serde(default)]
    dsn: String,
}

/// データベースタスクの接続設定（パース済み）
#[derive(Clone)]
pub struct DbTaskConfig {
    target: ConnectTarget,
}

impl DbTaskConfig {
    /// 生の `config` 値からデコードする
    ///
    /// サーバは `config` をオブジェクトで送ることも、JSON を含む文字列で送ることもある。
    pub fn from_raw(raw: &serde_json::Value) -> Result<Self, AgentError> {
        let parsed: RawDbConfig = match raw {
            serde_json::Value::String(s) => serde_json::from_str(s),
            serde_json::Value::Object(_) => serde_json::from_value(raw.clone()),
            other => {
                return Err(AgentError::Decode(format!(
                    "database config must be a JSON object, got {other}"
                )));
            }
        }
        .map_err(|e| AgentError::Decode(format!("database config: {e}")))?;

        Self::from_dsn(&parsed.dsn)
    }

    pub fn from_dsn(dsn: &str) -> Result<Self, AgentError> {
        let dsn = dsn.trim();
        if dsn.is_empty() {
            return Err(AgentError::Decode("database config: empty dsn".to_string()));
        }

        let target = if dsn.starts_with("sqlite:") {
            ConnectTarget::Sqlite(
                SqliteConnectOptions::from_str(dsn)
                    .map_err(|e| AgentError::Decode(format!("invalid sqlite DSN: {e}")))?,
            )
        } else if dsn.starts_with("mysql://") {
            ConnectTarget::MySql(
                MySqlConnectOptions::from_str(dsn)
                    .map_err(|e| AgentError::Decode(format!("invalid mysql URL: {e}")))?,
            )
        } else {
            ConnectTarget::MySql(mysql_options_from_go_dsn(dsn)?)
        };

        Ok(Self { target })
    }

    pub fn driver(&self) -> DriverKind {
        match self.target {
            ConnectTarget::MySql(_) => DriverKind::MySql,
            ConnectTarget::Sqlite(_) => DriverKind::Sqlite,
        }
    }

    pub fn target(&self) -> &ConnectTarget {
        &self.target
    }

    /// パスワードを含まない接続先の表示（ログ用）
    pub fn describe(&self) -> String {
        match &self.target {
            ConnectTarget::MySql(opts) => {
                let addr = match opts.get_socket() {
                    Some(socket) => format!("unix({})", socket.display()),
                    None => format!("{}:{}", opts.get_host(), opts.get_port()),
                };
                format!(
                    "mysql://{}@{}/{}",
                    opts.get_username(),
                    addr,
                    opts.get_database().unwrap_or_default()
                )
            }
            ConnectTarget::Sqlite(opts) => format!("sqlite:{}", opts.get_filename().display()),
        }
    }
}

impl fmt::Debug for DbTaskConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbTaskConfig")
            .field("driver", &self.driver())
            .field("target", &self.describe())
            .finish()
    }
}

/// `[user[:password]@][net[(addr)]]/dbname[?params]` を MySqlConnectOptions にする
fn mysql_options_from_go_dsn(dsn: &str) -> Result<MySqlConnectOptions, AgentError> {
    let (head, tail) = dsn.rsplit_once('/').ok_or_else(|| {
        AgentError::Decode("invalid DSN: missing the slash separating the database name".to_string())
    })?;

    let (userinfo, net_addr) = match head.rsplit_once('@') {
        Some((userinfo, net_addr)) => (Some(userinfo), net_addr),
        None => (None, head),
    };

    let (net, addr) = match net_addr.split_once('(') {
        Some((net, rest)) => {
            let addr = rest.strip_suffix(')').ok_or_else(|| {
                AgentError::Decode("invalid DSN: network address not terminated".to_string())
            })?;
            (net, addr)
        }
        None => (net_addr, ""),
    };

    let (dbname, params) = tail.split_once('?').unwrap_or((tail, ""));

    let mut options = MySqlConnectOptions::new();
    if let Some(userinfo) = userinfo {
        let (user, password) = match userinfo.split_once(':') {
            Some((user, password)) => (user, Some(password)),
            None => (userinfo, None),
        };
        options = options.username(user);
        if let Some(password) = password {
            options = options.password(password);
        }
    }

    options = match net {
        "unix" => options.socket(addr),
        "" | "tcp" | "tcp6" => {
            let (host, port) = split_host_port(addr)?;
            options.host(host).port(port)
        }
        other => {
            return Err(AgentError::Decode(format!(
                "invalid DSN: unsupported network {other}"
            )));
        }
    };

    if !dbname.is_empty() {
        options = options.database(dbname);
    }

    for pair in params.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        options = match key {
            // Go ドライバはカンマ区切りで候補を並べられる。先頭だけ使う
            "charset" => options.charset(value.split(',').next().unwrap_or(value)),
            "collation" => options.collation(value),
            _ => {
                debug!(param = key, "ignoring unsupported DSN parameter");
                options
            }
        };
    }

    Ok(options)
}

/// `host:port`、`[v6]:port`、`host` のいずれか。空ならデフォルトのアドレス
fn split_host_port(addr: &str) -> Result<(&str, u16), AgentError> {
    if addr.is_empty() {
        return Ok((DEFAULT_MYSQL_HOST, DEFAULT_MYSQL_PORT));
    }

    let (host, port) = match addr.rsplit_once(':') {
        Some((host, port)) if !port.contains(']') && !host.is_empty() => {
            let port = port
                .parse::<u16>()
                .map_err(|e| AgentError::Decode(format!("invalid DSN: bad port {port}: {e}")))?;
            (host, port)
        }
        _ => (addr, DEFAULT_MYSQL_PORT),
    };

    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    Ok((host, port))
}
