// ABOUTME: Service settings loaded from TOML with per-field defaults and environment overrides
// ABOUTME: Settings are read once at startup; nothing mutates them afterwards

use crate::client::{BindCredentials, KeepAliveConfig, SessionConfig, SubmitOptions};
use crate::datatypes::BindType;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("Invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub smsc: SmscSettings,
    pub store: StoreSettings,
    pub http: HttpSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    Transmitter,
    Receiver,
    #[default]
    Transceiver,
}

impl From<BindMode> for BindType {
    fn from(mode: BindMode) -> Self {
        match mode {
            BindMode::Transmitter => BindType::Transmitter,
            BindMode::Receiver => BindType::Receiver,
            BindMode::Transceiver => BindType::Transceiver,
        }
    }
}

/// SMSC connection, bind and delivery settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SmscSettings {
    pub host: String,
    pub port: u16,
    pub system_id: String,
    pub password: String,
    pub system_type: String,
    /// Sender id placed in source_addr
    pub source_addr: String,
    pub bind_type: BindMode,
    pub connect_timeout_secs: u64,
    pub response_timeout_secs: u64,
    pub enquire_link_interval_secs: u64,
    pub enquire_link_timeout_secs: u64,
    pub enquire_link_max_failures: u32,
    /// How long a send waits for its delivery receipt
    pub delivery_timeout_secs: u64,
    /// Bit-pack GSM 7-bit text; false sends one septet per octet
    pub pack_gsm7: bool,
}

impl Default for SmscSettings {
    fn default() -> Self {
        // Public simulator at smpp.org
        Self {
            host: "smscsim.smpp.org".to_string(),
            port: 2775,
            system_id: "gs4ITii6wu1kJBL".to_string(),
            password: "FpSK3c4c".to_string(),
            system_type: String::new(),
            source_addr: String::new(),
            bind_type: BindMode::Transceiver,
            connect_timeout_secs: 10,
            response_timeout_secs: 10,
            enquire_link_interval_secs: 30,
            enquire_link_timeout_secs: 10,
            enquire_link_max_failures: 3,
            delivery_timeout_secs: 30,
            pack_gsm7: true,
        }
    }
}

impl SmscSettings {
    pub fn session_config(&self) -> SessionConfig {
        let mut credentials = BindCredentials::with_bind_type(
            self.bind_type.into(),
            self.system_id.clone(),
            self.password.clone(),
        );
        if !self.system_type.is_empty() {
            credentials = credentials.with_system_type(self.system_type.clone());
        }

        let keep_alive = match self.enquire_link_interval_secs {
            0 => KeepAliveConfig::disabled(),
            interval => KeepAliveConfig::new(Duration::from_secs(interval))
                .with_timeout(Duration::from_secs(self.enquire_link_timeout_secs))
                .with_max_failures(self.enquire_link_max_failures),
        };

        SessionConfig {
            submit: SubmitOptions::new(self.source_addr.clone()),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            response_timeout: Duration::from_secs(self.response_timeout_secs),
            keep_alive,
            ..SessionConfig::new(self.host.clone(), self.port, credentials)
        }
    }

    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.delivery_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub sent_key: String,
    pub delivered_key: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            host: "localhost".to_string(),
            port: 6379,
            password: None,
            sent_key: "smpp:is_sent".to_string(),
            delivered_key: "smpp:is_delivered".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpSettings {
    pub host: String,
    pub port: u16,
    /// Reported in the service card
    pub server_name: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8383,
            server_name: String::new(),
        }
    }
}

impl HttpSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive used when RUST_LOG is unset
    pub level: String,
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Settings {
    /// Read settings from a TOML file; missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Override from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    /// Override from `lookup`, which returns the value of a variable if set
    pub fn apply_vars(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let string = |name: &str, target: &mut String| {
            if let Some(value) = lookup(name) {
                *target = value;
            }
        };
        string("SMSC_HOST", &mut self.smsc.host);
        string("SMSC_SYSTEM_ID", &mut self.smsc.system_id);
        string("SMSC_PASSWORD", &mut self.smsc.password);
        string("SOURCE_ADDR", &mut self.smsc.source_addr);
        string("REDIS_HOST", &mut self.store.host);
        string("REDIS_SENT_KEY", &mut self.store.sent_key);
        string("REDIS_DELIVERED_KEY", &mut self.store.delivered_key);
        string("LISTENING_HOST", &mut self.http.host);
        string("SERVERNAME", &mut self.http.server_name);

        if let Some(password) = lookup("REDIS_PASSWORD") {
            self.store.password = Some(password).filter(|p| !p.is_empty());
        }

        let ports: [(&'static str, &mut u16); 3] = [
            ("SMSC_PORT", &mut self.smsc.port),
            ("REDIS_PORT", &mut self.store.port),
            ("LISTENING_PORT", &mut self.http.port),
        ];
        for (name, target) in ports {
            if let Some(value) = lookup(name) {
                let parsed: Result<u16, _> = value.trim().parse();
                *target = parsed.map_err(|_| ConfigError::InvalidEnv { name, value })?;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let hosts = [
            ("smsc.host", &self.smsc.host),
            ("store.host", &self.store.host),
            ("http.host", &self.http.host),
        ];
        for (name, host) in hosts {
            if host.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} must not be empty", name)));
            }
        }

        let ports = [
            ("smsc.port", self.smsc.port),
            ("store.port", self.store.port),
        ];
        for (name, port) in ports {
            if port == 0 {
                return Err(ConfigError::Invalid(format!("{} must not be 0", name)));
            }
        }
        if self.http.port == 0 {
            return Err(ConfigError::Invalid("http.port must not be 0".into()));
        }

        // A zero here fails every bind or every keep-alive at once
        let smsc = &self.smsc;
        let mut timings = vec![
            ("smsc.connect_timeout_secs", smsc.connect_timeout_secs),
            ("smsc.response_timeout_secs", smsc.response_timeout_secs),
        ];
        if smsc.enquire_link_interval_secs > 0 {
            timings.push((
                "smsc.enquire_link_timeout_secs",
                smsc.enquire_link_timeout_secs,
            ));
            timings.push((
                "smsc.enquire_link_max_failures",
                u64::from(smsc.enquire_link_max_failures),
            ));
        }
        for (name, value) in timings {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must not be 0", name)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_public_simulator() {
        let settings = Settings::default();
        assert_eq!(settings.smsc.host, "smscsim.smpp.org");
        assert_eq!(settings.smsc.port, 2775);
        assert_eq!(settings.store.port, 6379);
        assert_eq!(settings.store.sent_key, "smpp:is_sent");
        assert_eq!(settings.http.bind_address(), "0.0.0.0:8383");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let settings = Settings::from_toml(
            r#"
            [smsc]
            host = "127.0.0.1"
            bind_type = "transmitter"
            pack_gsm7 = false

            [store]
            backend = "redis"
            "#,
        )
        .unwrap();

        assert_eq!(settings.smsc.host, "127.0.0.1");
        assert_eq!(settings.smsc.port, 2775);
        assert_eq!(settings.smsc.bind_type, BindMode::Transmitter);
        assert!(!settings.smsc.pack_gsm7);
        assert_eq!(settings.store.backend, StoreBackend::Redis);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn environment_overrides_file_values() {
        let vars: HashMap<&str, &str> = [
            ("SMSC_HOST", "smsc.example.net"),
            ("SMSC_PORT", "2776"),
            ("SOURCE_ADDR", "ACME"),
            ("REDIS_PASSWORD", "secret"),
            ("SERVERNAME", "node-1"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings
            .apply_vars(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(settings.smsc.host, "smsc.example.net");
        assert_eq!(settings.smsc.port, 2776);
        assert_eq!(settings.smsc.source_addr, "ACME");
        assert_eq!(settings.store.password.as_deref(), Some("secret"));
        assert_eq!(settings.http.server_name, "node-1");
    }

    #[test]
    fn malformed_port_is_rejected() {
        let mut settings = Settings::default();
        let result = settings.apply_vars(|name| (name == "LISTENING_PORT").then(|| "http".into()));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnv {
                name: "LISTENING_PORT",
                ..
            })
        ));
    }

    #[test]
    fn validation_rejects_empty_host_and_zero_port() {
        let mut settings = Settings::default();
        settings.smsc.host = " ".into();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.store.port = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn validation_rejects_zero_session_timings() {
        let mut settings = Settings::default();
        settings.smsc.response_timeout_secs = 0;
        let error = settings.validate().unwrap_err();
        assert!(error.to_string().contains("response_timeout_secs"), "{}", error);

        let mut settings = Settings::default();
        settings.smsc.connect_timeout_secs = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.smsc.enquire_link_max_failures = 0;
        let error = settings.validate().unwrap_err();
        assert!(error.to_string().contains("enquire_link_max_failures"), "{}", error);

        // Keep-alive off: its failure budget and timeout are never consulted
        settings.smsc.enquire_link_interval_secs = 0;
        settings.smsc.enquire_link_timeout_secs = 0;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn session_config_carries_keep_alive_and_addressing() {
        let mut smsc = SmscSettings::default();
        smsc.source_addr = "ACME".into();
        smsc.enquire_link_interval_secs = 0;

        let config = smsc.session_config();
        assert!(!config.keep_alive.enabled);
        assert_eq!(config.submit.source_addr, "ACME");
        assert_eq!(config.credentials.bind_type, BindType::Transceiver);
    }
}
