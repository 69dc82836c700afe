// src/config/config_load.rs
//
// loading of config.toml

use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::config_types::{
    default_messages, ClientConfig, DispatchConfig, MessageConfig, RuntimeConfig, ServerConfig,
};
use crate::error::Result;

pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub runtime: RuntimeConfig,
    pub clients: Vec<ClientConfig>,
    pub servers: Vec<ServerConfig>,
    pub dispatch: DispatchConfig,
    pub messages: Vec<MessageConfig>,
}

impl Default for Config {
    /// The loopback demo: one client and one server on port 12000.
    fn default() -> Self {
        Self {
            runtime: RuntimeConfig::default(),
            clients: vec![ClientConfig {
                name: "aclientname".to_string(),
                host: "127.0.0.1".to_string(),
                port: 12000,
            }],
            servers: vec![ServerConfig {
                name: "aservername".to_string(),
                host: "0.0.0.0".to_string(),
                port: 12000,
            }],
            dispatch: DispatchConfig::default(),
            messages: default_messages(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // First try to load from the executable's directory
        if let Some(exe_config) = Self::load_from_exe_dir() {
            return Ok(exe_config);
        }

        // Fallback to loading from the current working directory
        Self::load_from_working_dir()
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn load_from_exe_dir() -> Option<Self> {
        let exe_path = std::env::current_exe().ok()?;
        let exe_dir = exe_path.parent()?;
        let config_path = exe_dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => Some(config),
                Err(e) => {
                    debug!("Ignoring {}: {}", config_path.display(), e);
                    None
                }
            }
        } else {
            None
        }
    }

    fn load_from_working_dir() -> Result<Self> {
        Self::load_from(CONFIG_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;

    #[test]
    fn test_parse_full_config() {
        let config = Config::parse(
            r#"
            [runtime]
            interval_ms = 250

            [[clients]]
            name = "c1"
            host = "127.0.0.1"
            port = 9000

            [[servers]]
            name = "s1"
            port = 9001

            [dispatch]
            patterns = ["/*"]

            [[messages]]
            endpoint = "c1"
            address = "/ping"
            tags = ",i"
            args = [42]

            [[messages]]
            endpoint = "c1"
            address = "/fader"
            tags = ",f"
            args = [0.5]
            interval_ms = 100
            "#,
        )
        .unwrap();

        assert_eq!(config.runtime.interval_ms, 250);
        assert_eq!(config.runtime.max_packets_per_step, 64);
        assert_eq!(config.clients[0].port, 9000);
        assert_eq!(config.servers[0].host, "0.0.0.0");
        assert_eq!(config.dispatch.patterns, vec!["/*"]);

        let message = config.messages[0].to_message().unwrap();
        assert_eq!(message.addr, "/ping");
        assert_eq!(message.type_tags(), ",i");
        assert_eq!(config.messages[0].interval_ms, None);
        assert_eq!(config.messages[1].interval_ms, Some(100));
    }

    #[test]
    fn test_missing_sections_fall_back_to_demo() {
        let config = Config::parse("[runtime]\ninterval_ms = 10\n").unwrap();

        assert_eq!(config.runtime.interval_ms, 10);
        assert_eq!(config.clients[0].name, "aclientname");
        assert_eq!(config.servers[0].port, 12000);
        assert_eq!(config.dispatch.patterns, vec!["//*"]);
        assert_eq!(config.messages.len(), 4);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[runtime]\nmax_packets_per_step = 8").unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.runtime.max_packets_per_step, 8);
        assert_eq!(config.runtime.interval_ms, 1000);
    }

    #[test]
    fn test_load_errors() {
        assert!(matches!(
            Config::load_from("/definitely/not/here/config.toml"),
            Err(Error::ConfigFile(_))
        ));
        assert!(matches!(
            Config::parse("[runtime\n"),
            Err(Error::ConfigParse(_))
        ));
    }
}
