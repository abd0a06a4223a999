// --------------------------------------------------
// Startup configuration.
//
// Everything the process needs from its environment is read once in
// Config::from_env and then handed to AppState. Handlers never consult
// the environment themselves.
// --------------------------------------------------

use std::{collections::HashMap, env, net::SocketAddr, path::PathBuf, time::Duration};

use thiserror::Error;

use crate::auth::DEFAULT_SESSION_TTL;
use crate::models::Role;
use crate::store::DEFAULT_DB_PATH;

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_HTTP_API_HOST: &str = "https://api.brevo.com";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("{0} is required when mail transport is enabled")]
    Missing(&'static str),
    #[error("invalid seed user entry: {0} (expected name:role:password)")]
    SeedUser(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Disabled,
    HttpApi,
    StartTls,
    ImplicitTls,
}

impl TransportKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "disabled" | "none" => Some(Self::Disabled),
            "http-api" | "http" | "api" => Some(Self::HttpApi),
            "starttls" => Some(Self::StartTls),
            "implicit-tls" | "tls" | "smtps" => Some(Self::ImplicitTls),
            _ => None,
        }
    }

    fn default_port(self) -> Option<u16> {
        match self {
            Self::StartTls => Some(587),
            Self::ImplicitTls => Some(465),
            Self::Disabled | Self::HttpApi => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailCredentials {
    pub username: Option<String>,
    pub secret: String, // API key for http-api, password for SMTP
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailConfig {
    pub transport: TransportKind,
    pub host: String,
    pub port: Option<u16>,
    pub sender: String, // may be "Name <addr>"
    pub credentials: Option<MailCredentials>,
    pub notify_address: String,
}

impl MailConfig {
    pub fn disabled() -> Self {
        Self {
            transport: TransportKind::Disabled,
            host: String::new(),
            port: None,
            sender: String::new(),
            credentials: None,
            notify_address: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedUser {
    pub username: String,
    pub role: Role,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub db_path: PathBuf,
    pub static_dir: PathBuf,
    pub production: bool,
    pub log_json: bool,
    pub cron_secret: Option<String>,
    pub session_ttl: Duration,
    pub seed_users: Vec<SeedUser>,
    pub mail: MailConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self::from_vars(&vars)
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| {
            vars.get(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind_raw = get("TASKBOARD_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            name: "TASKBOARD_BIND",
            value: bind_raw.clone(),
        })?;

        let session_ttl = match get("TASKBOARD_SESSION_TTL_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "TASKBOARD_SESSION_TTL_SECS",
                        value: raw,
                    })
                }
            },
            None => DEFAULT_SESSION_TTL,
        };

        Ok(Self {
            bind,
            db_path: get("TASKBOARD_DB_PATH")
                .unwrap_or_else(|| DEFAULT_DB_PATH.to_string())
                .into(),
            static_dir: get("TASKBOARD_STATIC_DIR")
                .unwrap_or_else(|| "static".to_string())
                .into(),
            production: get("TASKBOARD_ENV").is_some_and(|v| v.eq_ignore_ascii_case("production")),
            log_json: get("TASKBOARD_LOG_JSON").is_some_and(|v| is_truthy(&v)),
            cron_secret: get("TASKBOARD_CRON_SECRET"),
            session_ttl,
            seed_users: match get("TASKBOARD_SEED_USERS") {
                Some(raw) => parse_seed_users(&raw)?,
                None => Vec::new(),
            },
            mail: mail_from_vars(&get)?,
        })
    }

    // Defaults for tests and local runs
    pub fn for_db(db_path: impl Into<PathBuf>) -> Self {
        Self {
            bind: DEFAULT_BIND.parse().unwrap_or_else(|_| ([127, 0, 0, 1], 3000).into()),
            db_path: db_path.into(),
            static_dir: "static".into(),
            production: false,
            log_json: false,
            cron_secret: None,
            session_ttl: DEFAULT_SESSION_TTL,
            seed_users: Vec::new(),
            mail: MailConfig::disabled(),
        }
    }
}

fn is_truthy(v: &str) -> bool {
    matches!(v, "1" | "true" | "TRUE" | "yes" | "YES")
}

fn mail_from_vars(get: &impl Fn(&str) -> Option<String>) -> Result<MailConfig, ConfigError> {
    let raw = get("TASKBOARD_MAIL_TRANSPORT").unwrap_or_default();
    let transport = TransportKind::parse(&raw).ok_or(ConfigError::Invalid {
        name: "TASKBOARD_MAIL_TRANSPORT",
        value: raw.clone(),
    })?;
    if transport == TransportKind::Disabled {
        return Ok(MailConfig::disabled());
    }

    let host = match (get("TASKBOARD_MAIL_HOST"), transport) {
        (Some(h), _) => h,
        (None, TransportKind::HttpApi) => DEFAULT_HTTP_API_HOST.to_string(),
        (None, _) => return Err(ConfigError::Missing("TASKBOARD_MAIL_HOST")),
    };

    let port = match get("TASKBOARD_MAIL_PORT") {
        Some(p) => Some(p.parse::<u16>().map_err(|_| ConfigError::Invalid {
            name: "TASKBOARD_MAIL_PORT",
            value: p.clone(),
        })?),
        None => transport.default_port(),
    };

    let credentials = get("TASKBOARD_MAIL_SECRET").map(|secret| MailCredentials {
        username: get("TASKBOARD_MAIL_USERNAME"),
        secret,
    });
    if transport == TransportKind::HttpApi && credentials.is_none() {
        return Err(ConfigError::Missing("TASKBOARD_MAIL_SECRET"));
    }

    Ok(MailConfig {
        transport,
        host,
        port,
        sender: get("TASKBOARD_MAIL_SENDER").ok_or(ConfigError::Missing("TASKBOARD_MAIL_SENDER"))?,
        credentials,
        notify_address: get("TASKBOARD_NOTIFY_ADDRESS")
            .ok_or(ConfigError::Missing("TASKBOARD_NOTIFY_ADDRESS"))?,
    })
}

// "alice:ceo:secret,bob:assistant:hunter2"; password may itself contain ':'
pub fn parse_seed_users(raw: &str) -> Result<Vec<SeedUser>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let mut parts = entry.splitn(3, ':');
            let (Some(name), Some(role), Some(password)) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(ConfigError::SeedUser(entry.to_string()));
            };
            let role = match role.trim().to_ascii_lowercase().as_str() {
                "ceo" => Role::Ceo,
                "assistant" => Role::Assistant,
                _ => return Err(ConfigError::SeedUser(entry.to_string())),
            };
            if name.trim().is_empty() || password.is_empty() {
                return Err(ConfigError::SeedUser(entry.to_string()));
            }
            Ok(SeedUser {
                username: name.trim().to_string(),
                role,
                password: password.to_string(),
            })
        })
        .collect()
}
