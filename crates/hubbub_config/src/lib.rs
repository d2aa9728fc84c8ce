//! Configuration for the hubbub broker.
//!
//! Settings are layered: an optional `config/default` file (TOML/YAML/JSON)
//! is read first, environment variables with `__` separators override it
//! (e.g. `SERVER__PORT=9000`, `BROKER__MAX_MESSAGES_PER_TOPIC=50`), and any
//! value still missing falls back to `Settings::default()`.

pub mod settings;

use crate::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{
    BrokerSettings, LogSettings, ServerSettings, Settings, TransportSettings,
};

/// Loads application settings from file, environment, and defaults.
///
/// The result is validated by the caller via [`Settings::validate`]; loading
/// itself only fails when a source cannot be parsed or deserialized.
pub fn load_config() -> Result<Settings, ConfigError> {
    // Double-underscore separator so multi-word keys survive
    // (BROKER__MAX_MESSAGES_PER_TOPIC → broker.max_messages_per_topic).
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(Environment::default().separator("__"));

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;
    let default = Settings::default();

    Ok(Settings {
        server: ServerSettings {
            host: partial
                .server
                .as_ref()
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            port: partial
                .server
                .as_ref()
                .and_then(|s| s.port)
                .unwrap_or(default.server.port),
            admin_port: partial
                .server
                .as_ref()
                .and_then(|s| s.admin_port)
                .unwrap_or(default.server.admin_port),
        },
        broker: BrokerSettings {
            max_messages_per_topic: partial
                .broker
                .as_ref()
                .and_then(|b| b.max_messages_per_topic)
                .unwrap_or(default.broker.max_messages_per_topic),
            max_publish_rate: partial
                .broker
                .as_ref()
                .and_then(|b| b.max_publish_rate)
                .unwrap_or(default.broker.max_publish_rate),
        },
        transport: TransportSettings {
            read_buffer_size: partial
                .transport
                .as_ref()
                .and_then(|t| t.read_buffer_size)
                .unwrap_or(default.transport.read_buffer_size),
            write_buffer_size: partial
                .transport
                .as_ref()
                .and_then(|t| t.write_buffer_size)
                .unwrap_or(default.transport.write_buffer_size),
        },
        log: LogSettings {
            level: partial
                .log
                .as_ref()
                .and_then(|l| l.level.clone())
                .unwrap_or(default.log.level),
            format: partial
                .log
                .as_ref()
                .and_then(|l| l.format.clone())
                .unwrap_or(default.log.format),
        },
    })
}
