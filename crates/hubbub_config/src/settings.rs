use config::ConfigError;
use serde::Deserialize;

/// Top-level configuration settings for the broker process.
///
/// Aggregates network settings for the two server surfaces, operational
/// parameters for the broker kernel, transport buffer tuning, and logging.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub transport: TransportSettings,
    pub log: LogSettings,
}

/// Network settings for the streaming and admin surfaces.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    /// The host address (e.g., "127.0.0.1" or "0.0.0.0") both servers bind to.
    pub host: String,
    /// Port for the WebSocket streaming surface.
    pub port: u16,
    /// Port for the HTTP admin surface.
    pub admin_port: u16,
}

/// Operational parameters for the broker kernel.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    /// Ring capacity: how many recent messages each topic retains for replay.
    pub max_messages_per_topic: usize,
    /// Declared publish-rate ceiling (messages per second per topic).
    /// Accepted and validated but not enforced anywhere.
    pub max_publish_rate: usize,
}

/// WebSocket transport buffer tuning.
#[derive(Debug, Deserialize, Clone)]
pub struct TransportSettings {
    pub read_buffer_size: usize,
    pub write_buffer_size: usize,
}

/// Logging settings.
#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    /// Maximum level: error, warn, info, debug, trace.
    pub level: String,
    /// Output format: "text" or "json".
    pub format: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values are filled
/// from `Settings::default()`.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub transport: Option<PartialTransportSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub admin_port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub max_messages_per_topic: Option<usize>,
    pub max_publish_rate: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialTransportSettings {
    pub read_buffer_size: Option<usize>,
    pub write_buffer_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
    pub format: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "0.0.0.0".to_string(),
                port: 8080,
                admin_port: 8081,
            },
            broker: BrokerSettings {
                max_messages_per_topic: 1000,
                max_publish_rate: 100,
            },
            transport: TransportSettings {
                read_buffer_size: 1024,
                write_buffer_size: 1024,
            },
            log: LogSettings {
                level: "info".to_string(),
                format: "text".to_string(),
            },
        }
    }
}

impl Settings {
    /// Reject values that would misconfigure the broker. All numeric knobs
    /// must be positive; a zero-capacity ring or zero-sized buffer is a
    /// configuration mistake, not a feature.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker.max_messages_per_topic == 0 {
            return Err(ConfigError::Message(
                "broker.max_messages_per_topic must be positive".into(),
            ));
        }
        if self.broker.max_publish_rate == 0 {
            return Err(ConfigError::Message(
                "broker.max_publish_rate must be positive".into(),
            ));
        }
        if self.transport.read_buffer_size == 0 {
            return Err(ConfigError::Message(
                "transport.read_buffer_size must be positive".into(),
            ));
        }
        if self.transport.write_buffer_size == 0 {
            return Err(ConfigError::Message(
                "transport.write_buffer_size must be positive".into(),
            ));
        }
        Ok(())
    }
}
