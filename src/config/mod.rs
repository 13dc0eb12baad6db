use std::fs::File;
use std::io::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Duration;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_yml;
use thiserror::Error;

use crate::transport::GatewayFraming;

const CONFIG_PATHS: [&str; 2] = ["config/meter-setup.yaml", "meter-setup.yaml"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unable to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unable to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yml::Error,
    },
    #[error("Invalid value in config file {path}: {message}")]
    Invalid {
        path: PathBuf,
        message: String,
    },
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq)]
pub enum ModbusProtoConfig {
    TCP,
    RTUoverTCP,
}

impl From<ModbusProtoConfig> for GatewayFraming {
    fn from(proto: ModbusProtoConfig) -> Self {
        match proto {
            ModbusProtoConfig::TCP => GatewayFraming::Tcp,
            ModbusProtoConfig::RTUoverTCP => GatewayFraming::RtuOverTcp,
        }
    }
}

fn timeout_secs_default() -> u64 { return 2 }
fn retries_default() -> u32 { return 3 }
fn settle_delay_ms_default() -> u64 { return 1000 }
fn tcp_port_default() -> u16 { return 502 }
fn baud_rate_default() -> u32 { return 9600 }
fn unit_id_default() -> u8 { return 1 }
fn gateway_proto_default() -> ModbusProtoConfig { return ModbusProtoConfig::TCP }

/// Session defaults, command line flags take precedence
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct SetupConfig {
    #[serde(default="timeout_secs_default")]
    pub timeout_secs: u64,
    #[serde(default="retries_default")]
    pub retries: u32,
    #[serde(default="settle_delay_ms_default")]
    pub settle_delay_ms: u64, /* pause before reopening the serial line */
    #[serde(default="tcp_port_default")]
    pub tcp_port: u16,
    #[serde(default="baud_rate_default")]
    pub baud_rate: u32,
    #[serde(default="unit_id_default")]
    pub unit_id: u8,
    #[serde(default="gateway_proto_default")]
    pub gateway_proto: ModbusProtoConfig,
}

impl Default for SetupConfig {
    fn default() -> Self {
        SetupConfig {
            timeout_secs: timeout_secs_default(),
            retries: retries_default(),
            settle_delay_ms: settle_delay_ms_default(),
            tcp_port: tcp_port_default(),
            baud_rate: baud_rate_default(),
            unit_id: unit_id_default(),
            gateway_proto: gateway_proto_default(),
        }
    }
}

impl SetupConfig {
    pub fn from_str(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: SetupConfig = serde_yml::from_str(contents)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        /* 0 is the broadcast address, no meter answers on it */
        if config.unit_id == 0 {
            return Err(ConfigError::Invalid { path: path.to_path_buf(), message: "unit_id must be between 1 and 255".to_string() });
        }
        return Ok(config);
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let io_error = |source| ConfigError::Io { path: path.to_path_buf(), source };
        let mut file = File::open(path).map_err(io_error)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents).map_err(io_error)?;
        let config = SetupConfig::from_str(&contents, path)?;
        info!("Loaded config from {}", path.display());
        return Ok(config);
    }

    /// An explicit path has to exist, otherwise the default locations are
    /// tried and the built in defaults used when there is no file.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return SetupConfig::from_file(path);
        }
        for candidate in CONFIG_PATHS {
            let path = Path::new(candidate);
            if path.exists() {
                return SetupConfig::from_file(path);
            }
        }
        debug!("No config file found, using defaults");
        return Ok(SetupConfig::default());
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}
