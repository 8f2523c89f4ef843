// Runtime Settings
//
// Loaded once by the daemon (file + environment) and passed down by reference.
// Every field has a default so an empty configuration is valid.

use crate::application::constants::*;
use crate::application::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// sqlx connection string, e.g. `sqlite:///var/lib/conduit/conduit.db`
    pub database_url: String,
    pub rpc: RpcSettings,
    /// AES passphrase or `arn:aws:kms:...`; empty disables encryption
    pub secret_key: String,
    pub runner: RunnerSettings,
    pub engine: EngineSettings,
    pub log: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://~/.conduit/conduit.db".to_string(),
            rpc: RpcSettings::default(),
            secret_key: String::new(),
            runner: RunnerSettings::default(),
            engine: EngineSettings::default(),
            log: LogSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcSettings {
    pub host: String,
    pub port: u16,
    pub rate_limit_burst: u32,
    pub rate_limit_per_sec: u32,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9527,
            rate_limit_burst: 100,
            rate_limit_per_sec: 50,
        }
    }
}

impl RpcSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    /// Container runtime binary (`docker`, `podman`, ...)
    pub container_runtime: String,
    /// Root of per-execution working directories
    pub config_dir: String,
    /// Host path that `config_dir` is mounted from, when running inside a container
    pub persistent_dir: Option<String>,
    pub image_namespace: String,
    /// Mount point of the working directory inside the connector container
    pub mount_point: String,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            container_runtime: "docker".to_string(),
            config_dir: "/tmp/conduit-config".to_string(),
            persistent_dir: None,
            image_namespace: "conduit".to_string(),
            mount_point: "/mnt/config".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub task_queue: String,
    pub schedule_tick_secs: u64,
    pub retry: RetrySettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            task_queue: DOCKER_TASK_QUEUE.to_string(),
            schedule_tick_secs: DEFAULT_SCHEDULE_TICK.as_secs(),
            retry: RetrySettings::default(),
        }
    }
}

impl EngineSettings {
    pub fn schedule_tick(&self) -> Duration {
        Duration::from_secs(self.schedule_tick_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub initial_interval_secs: u64,
    pub backoff_coefficient: f64,
    pub maximum_interval_secs: u64,
    pub maximum_attempts: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            initial_interval_secs: DEFAULT_RETRY_INITIAL_INTERVAL.as_secs(),
            backoff_coefficient: DEFAULT_RETRY_BACKOFF_COEFFICIENT,
            maximum_interval_secs: DEFAULT_RETRY_MAXIMUM_INTERVAL.as_secs(),
            maximum_attempts: DEFAULT_RETRY_MAXIMUM_ATTEMPTS,
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(s: &RetrySettings) -> Self {
        RetryPolicy::new(
            Duration::from_secs(s.initial_interval_secs),
            s.backoff_coefficient,
            Duration::from_secs(s.maximum_interval_secs),
            s.maximum_attempts,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LogSettings {
    pub format: LogFormat,
    /// Daily rolling log files go here when set
    pub dir: Option<String>,
}
