// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Service configuration.
//!
//! Loaded from a YAML file (`config.yaml`, or `config_dev.yaml` when
//! `ENV=dev`) and checked by [`Config::validate`] before anything starts.

use crate::dialect::Dialect;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Annotated sample written by `gen-config`.
pub const EXAMPLE_CONFIG: &str = r#"# LoRaWAN fragment reassembler configuration

input:
  mqtt:
    enable: true
    host: localhost
    port: 1883
    # TTN: v3/<app>@<tenant>/devices/+/up, Loriot: the app's MQTT output topic
    topic: input
    # auth:
    #   username: user
    #   password: secret
  http:
    enable: false
    host: 0.0.0.0
    port: 8080

output:
  mqtt:
    enable: true
    host: localhost
    port: 1883
    # Results are published on <topic>/<DevEUI>
    topic: output
  http:
    enable: false
    url: http://localhost:9000/frames

local-broker:
  enable: false
  command: mosquitto
  config: /etc/mosquitto.conf

frame:
  # Pending sets with more fragments are dropped
  max_chunks: 15
  # Hours without a new fragment before a pending set is dropped
  timeout: 48
  # ttn | loriot
  lns: ttn
  sweep_interval_secs: 10

decoder:
  command: [node, decoder/decode.js]
  function: te_decoder
  timeout_secs: 10

log:
  # debug | info | warning | error | critical
  level: info
"#;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Ingress transports.
    #[serde(default)]
    pub input: InputConfig,

    /// Egress transports.
    #[serde(default)]
    pub output: OutputConfig,

    /// Embedded broker subprocess.
    #[serde(default, rename = "local-broker")]
    pub local_broker: LocalBrokerConfig,

    /// Reassembly limits and dialect.
    pub frame: FrameConfig,

    /// External payload decoder.
    #[serde(default)]
    pub decoder: DecoderConfig,

    /// Logging.
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputConfig {
    #[serde(default)]
    pub mqtt: MqttInputConfig,
    #[serde(default)]
    pub http: HttpInputConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default)]
    pub mqtt: MqttOutputConfig,
    #[serde(default)]
    pub http: HttpOutputConfig,
}

/// MQTT subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MqttInputConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    /// Subscription filter; wildcards allowed.
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub auth: Option<MqttAuth>,
}

/// Broker credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MqttAuth {
    pub username: String,
    pub password: String,
}

/// HTTP listener serving `/input` and the monitoring pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpInputConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "default_http_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
}

/// MQTT publisher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MqttOutputConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    /// Topic prefix; results go to `<topic>/<DevEUI>`.
    #[serde(default = "default_output_topic")]
    pub topic: String,
    #[serde(default)]
    pub auth: Option<MqttAuth>,
}

/// HTTP POST sink.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpOutputConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalBrokerConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "default_broker_command")]
    pub command: String,
    #[serde(default = "default_broker_config")]
    pub config: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FrameConfig {
    /// Maximum fragments per pending set.
    pub max_chunks: usize,
    /// Staleness timeout in hours.
    pub timeout: f64,
    /// Network server dialect.
    pub lns: Dialect,
    /// Sweeper period in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecoderConfig {
    /// Program and arguments.
    #[serde(default = "default_decoder_command")]
    pub command: Vec<String>,
    /// Decoder entry point.
    #[serde(default = "default_decoder_function")]
    pub function: String,
    #[serde(default = "default_decoder_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,
}

/// Log levels accepted in the config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// `tracing` filter directive for this level.
    pub fn directive(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error | Self::Critical => "error",
        }
    }
}

fn default_mqtt_host() -> String {
    "localhost".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_output_topic() -> String {
    "output".to_string()
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_http_timeout() -> u64 {
    10
}

fn default_broker_command() -> String {
    "mosquitto".to_string()
}

fn default_broker_config() -> PathBuf {
    PathBuf::from("/etc/mosquitto.conf")
}

fn default_sweep_interval() -> u64 {
    10
}

fn default_decoder_command() -> Vec<String> {
    vec!["node".to_string(), "decoder/decode.js".to_string()]
}

fn default_decoder_function() -> String {
    "te_decoder".to_string()
}

fn default_decoder_timeout() -> u64 {
    10
}

impl Default for MqttInputConfig {
    fn default() -> Self {
        Self {
            enable: false,
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            topic: String::new(),
            auth: None,
        }
    }
}

impl Default for HttpInputConfig {
    fn default() -> Self {
        Self {
            enable: false,
            host: default_http_host(),
            port: default_http_port(),
        }
    }
}

impl Default for MqttOutputConfig {
    fn default() -> Self {
        Self {
            enable: false,
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            topic: default_output_topic(),
            auth: None,
        }
    }
}

impl Default for LocalBrokerConfig {
    fn default() -> Self {
        Self {
            enable: false,
            command: default_broker_command(),
            config: default_broker_config(),
        }
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            command: default_decoder_command(),
            function: default_decoder_function(),
            timeout_secs: default_decoder_timeout(),
        }
    }
}

impl FrameConfig {
    /// Staleness timeout as a duration.
    pub fn max_age(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout * 3600.0).unwrap_or(Duration::MAX)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl DecoderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Config file used when none is given: `config_dev.yaml` if `ENV=dev`,
    /// `config.yaml` otherwise.
    pub fn default_path() -> PathBuf {
        default_path_for(std::env::var("ENV").ok().as_deref())
    }

    /// Load and validate a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let input = &self.input;
        if !input.mqtt.enable && !input.http.enable {
            return Err(ConfigError::Invalid(
                "At least one input (MQTT or HTTP) must be enabled".into(),
            ));
        }

        if input.mqtt.enable {
            check_endpoint("input.mqtt", &input.mqtt.host, input.mqtt.port)?;
            check_non_empty("input.mqtt.topic", &input.mqtt.topic)?;
        }

        if input.http.enable {
            check_endpoint("input.http", &input.http.host, input.http.port)?;
        }

        let output = &self.output;
        if output.mqtt.enable {
            check_endpoint("output.mqtt", &output.mqtt.host, output.mqtt.port)?;
            check_non_empty("output.mqtt.topic", &output.mqtt.topic)?;
        }

        if output.http.enable {
            let url = output.http.url.as_deref().unwrap_or_default();
            check_non_empty("output.http.url", url)?;
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::Invalid(format!(
                    "output.http.url must be an http(s) URL, got '{}'",
                    url
                )));
            }
        }

        if self.local_broker.enable {
            check_non_empty("local-broker.command", &self.local_broker.command)?;
        }

        let frame = &self.frame;
        if frame.max_chunks < 1 {
            return Err(ConfigError::Invalid("frame.max_chunks must be >= 1".into()));
        }
        if !(frame.timeout.is_finite() && frame.timeout > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "frame.timeout must be a positive number of hours, got {}",
                frame.timeout
            )));
        }
        if frame.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "frame.sweep_interval_secs must be >= 1".into(),
            ));
        }

        if self.decoder.command.first().map_or(true, |p| p.is_empty()) {
            return Err(ConfigError::Invalid("decoder.command is empty".into()));
        }
        check_non_empty("decoder.function", &self.decoder.function)?;
        if self.decoder.timeout_secs == 0 {
            return Err(ConfigError::Invalid("decoder.timeout_secs must be >= 1".into()));
        }

        Ok(())
    }
}

fn default_path_for(env: Option<&str>) -> PathBuf {
    match env {
        Some("dev") => PathBuf::from("config_dev.yaml"),
        _ => PathBuf::from("config.yaml"),
    }
}

fn check_endpoint(section: &str, host: &str, port: u16) -> Result<(), ConfigError> {
    check_non_empty(&format!("{}.host", section), host)?;
    if port == 0 {
        return Err(ConfigError::Invalid(format!("{}.port must be 1-65535", section)));
    }
    Ok(())
}

fn check_non_empty(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{} is required", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
input:
  http:
    enable: true
frame:
  max_chunks: 15
  timeout: 48
  lns: loriot
"#;

    fn invalid(yaml: &str) -> String {
        match Config::from_yaml(yaml) {
            Err(ConfigError::Invalid(msg)) => msg,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_example_config_is_valid() {
        let config = Config::from_yaml(EXAMPLE_CONFIG).expect("example config");
        assert!(config.input.mqtt.enable);
        assert_eq!(config.input.mqtt.topic, "input");
        assert_eq!(config.output.mqtt.topic, "output");
        assert_eq!(config.frame.lns, Dialect::Ttn);
        assert_eq!(config.frame.max_age(), Duration::from_secs(48 * 3600));
        assert_eq!(config.decoder.command, vec!["node", "decoder/decode.js"]);
        assert_eq!(config.log.level, LogLevel::Info);
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_yaml(MINIMAL).expect("minimal config");
        assert_eq!(config.input.http.host, "0.0.0.0");
        assert_eq!(config.input.http.port, 8080);
        assert!(!config.output.mqtt.enable);
        assert!(!config.local_broker.enable);
        assert_eq!(config.local_broker.command, "mosquitto");
        assert_eq!(config.frame.sweep_interval(), Duration::from_secs(10));
        assert_eq!(config.decoder.function, "te_decoder");
        assert_eq!(config.decoder.timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_fractional_timeout() {
        let yaml = MINIMAL.replace("timeout: 48", "timeout: 0.5");
        let config = Config::from_yaml(&yaml).expect("config");
        assert_eq!(config.frame.max_age(), Duration::from_secs(1800));
    }

    #[test]
    fn test_no_input_enabled() {
        let yaml = MINIMAL.replace("enable: true", "enable: false");
        assert!(invalid(&yaml).contains("At least one input"));
    }

    #[test]
    fn test_mqtt_input_requires_topic() {
        let yaml = MINIMAL.replace(
            "input:\n  http:\n    enable: true",
            "input:\n  mqtt:\n    enable: true\n    host: broker",
        );
        assert!(invalid(&yaml).contains("input.mqtt.topic"));
    }

    #[test]
    fn test_http_output_requires_url() {
        let yaml = format!("{}output:\n  http:\n    enable: true\n", MINIMAL);
        assert!(invalid(&yaml).contains("output.http.url"));

        let yaml = format!("{}output:\n  http:\n    enable: true\n    url: ftp://x\n", MINIMAL);
        assert!(invalid(&yaml).contains("http(s)"));
    }

    #[test]
    fn test_frame_limits() {
        let yaml = MINIMAL.replace("max_chunks: 15", "max_chunks: 0");
        assert!(invalid(&yaml).contains("max_chunks"));

        let yaml = MINIMAL.replace("timeout: 48", "timeout: 0");
        assert!(invalid(&yaml).contains("frame.timeout"));
    }

    #[test]
    fn test_port_zero() {
        let yaml = MINIMAL.replace("enable: true", "enable: true\n    port: 0");
        assert!(invalid(&yaml).contains("input.http.port"));
    }

    #[test]
    fn test_empty_decoder_command() {
        let yaml = format!("{}decoder:\n  command: []\n", MINIMAL);
        assert!(invalid(&yaml).contains("decoder.command"));
    }

    #[test]
    fn test_unknown_lns_rejected() {
        let yaml = MINIMAL.replace("lns: loriot", "lns: chirpstack");
        assert!(matches!(Config::from_yaml(&yaml), Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let yaml = format!("{}log:\n  level: verbose\n", MINIMAL);
        assert!(matches!(Config::from_yaml(&yaml), Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = format!("{}extra: 1\n", MINIMAL);
        assert!(matches!(Config::from_yaml(&yaml), Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_missing_frame_section() {
        let yaml = "input:\n  http:\n    enable: true\n";
        assert!(matches!(Config::from_yaml(yaml), Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_log_level_directive() {
        assert_eq!(LogLevel::Warning.directive(), "warn");
        assert_eq!(LogLevel::Critical.directive(), "error");
        assert_eq!(LogLevel::Debug.directive(), "debug");
    }

    #[test]
    fn test_default_path() {
        assert_eq!(default_path_for(Some("dev")), PathBuf::from("config_dev.yaml"));
        assert_eq!(default_path_for(Some("prod")), PathBuf::from("config.yaml"));
        assert_eq!(default_path_for(None), PathBuf::from("config.yaml"));
    }

    #[test]
    fn test_local_broker_section_name() {
        let yaml = format!(
            "{}local-broker:\n  enable: true\n  config: /tmp/m.conf\n",
            MINIMAL
        );
        let config = Config::from_yaml(&yaml).expect("config");
        assert!(config.local_broker.enable);
        assert_eq!(config.local_broker.config, PathBuf::from("/tmp/m.conf"));
    }
}
