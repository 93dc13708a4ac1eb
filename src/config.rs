//! Runtime configuration.
//!
//! Defaults match the values the controller has always shipped with. A YAML
//! file named by `GENSERVE_CONFIG` can override any section; `LISTEN_PORT`
//! overrides the HTTP port on its own.

use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub wifi: WifiConfig,
    pub notify: NotifyConfig,
    pub timing: TimingConfig,
    pub limits: LimitsConfig,
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Location name shown in every page heading.
    pub title: String,
    /// Shared secret that unlocks the remote buttons.
    pub action_password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WifiConfig {
    pub ssid: String,
    pub password: String,
    pub port: u16,
    pub static_ip: Option<StaticIp>,
}

/// Fixed addressing applied before each association attempt.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StaticIp {
    pub address: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub dns: Ipv4Addr,
    #[serde(default = "default_subnet")]
    pub subnet: Ipv4Addr,
}

fn default_subnet() -> Ipv4Addr {
    Ipv4Addr::new(255, 255, 255, 0)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub host: String,
    pub port: u16,
    pub event: String,
    pub key: String,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub connect_delay_secs: u64,
    pub max_connect_attempts: u32,
    pub delayed_response_ms: u64,
    pub power_on_web_delay_secs: u64,
    pub read_timeout_ms: u64,
    pub chunk_pause_ms: u64,
    pub drain_timeout_ms: u64,
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_visitors: usize,
    pub max_line: usize,
    pub chunk_size: usize,
    pub log_capacity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "Generator location".to_string(),
            action_password: "password".to_string(),
        }
    }
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            ssid: "name".to_string(),
            password: "password".to_string(),
            port: 80,
            static_ip: None,
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            host: "maker.ifttt.com".to_string(),
            port: 80,
            event: "generator".to_string(),
            key: "...something...".to_string(),
            max_retries: 5,
            retry_delay_secs: 60,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            connect_delay_secs: 10,
            max_connect_attempts: 3,
            delayed_response_ms: 1000,
            power_on_web_delay_secs: 120,
            read_timeout_ms: 1000,
            chunk_pause_ms: 10,
            drain_timeout_ms: 5000,
            connect_timeout_ms: 5000,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_visitors: 25,
            max_line: 500,
            chunk_size: 500,
            log_capacity: 100,
        }
    }
}

impl TimingConfig {
    pub fn connect_delay(&self) -> Duration {
        Duration::from_secs(self.connect_delay_secs)
    }

    pub fn delayed_response(&self) -> Duration {
        Duration::from_millis(self.delayed_response_ms)
    }

    pub fn power_on_web_delay(&self) -> Duration {
        Duration::from_secs(self.power_on_web_delay_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn chunk_pause(&self) -> Duration {
        Duration::from_millis(self.chunk_pause_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl NotifyConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

impl LogLevel {
    pub fn as_tracing(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

impl Config {
    /// Loads the file named by `GENSERVE_CONFIG` (or the defaults), then
    /// applies `LISTEN_PORT`.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var("GENSERVE_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };

        if let Ok(port) = std::env::var("LISTEN_PORT") {
            cfg.wifi.port = port
                .parse()
                .with_context(|| format!("LISTEN_PORT is not a port number: {port}"))?;
        }

        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_yaml_str(text: &str) -> anyhow::Result<Self> {
        let cfg: Config = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.limits.max_visitors == 0 {
            anyhow::bail!("limits.max_visitors must be at least 1");
        }
        if self.limits.log_capacity == 0 {
            anyhow::bail!("limits.log_capacity must be at least 1");
        }
        if self.limits.chunk_size == 0 {
            anyhow::bail!("limits.chunk_size must be at least 1");
        }
        if self.limits.max_line < 2 {
            anyhow::bail!("limits.max_line must be at least 2");
        }
        if self.timing.max_connect_attempts == 0 {
            anyhow::bail!("timing.max_connect_attempts must be at least 1");
        }
        Ok(())
    }
}
