use std::path::PathBuf;
use clap::{ArgGroup, Parser};

use crate::{
    config::SetupConfig,
    parameters::SUPPORTED_BAUD_RATES,
    registers::DeviceModel,
    relay::RelayState,
    transport::Endpoint,
};

fn parse_baud_rate(s: &str) -> Result<u32, String> {
    let baud_rate: u32 = s.parse().map_err(|e| format!("{e}"))?;
    if !SUPPORTED_BAUD_RATES.contains(&baud_rate) {
        return Err(format!("{baud_rate} is not one of {:?}", SUPPORTED_BAUD_RATES));
    }
    return Ok(baud_rate);
}

fn parse_model(s: &str) -> Result<DeviceModel, String> {
    s.parse()
}

fn parse_relay_state(s: &str) -> Result<RelayState, String> {
    s.parse()
}

fn parse_unit_id(s: &str) -> Result<u8, String> {
    let unit_id: u8 = s.parse().map_err(|_| format!("\"{s}\" is not a unit id, use 1 to 255"))?;
    if unit_id == 0 {
        return Err("unit id 0 is the broadcast address, use 1 to 255".to_string());
    }
    return Ok(unit_id);
}

/// Read and change settings of Eastron and Fineco energy meters over Modbus
#[derive(Debug, Parser)]
#[clap(author, version)]
#[clap(group(ArgGroup::new("link").required(true).args(["serial_port", "host"])))]
#[clap(group(ArgGroup::new("change").multiple(false).args(["set_relay", "set_baudrate", "set_unit_id", "set_serial"])))]
pub struct Options {
    /// Serial port of the RS485 adapter, e.g. /dev/ttyUSB0
    #[clap(short = 'p', long = "serial-port")]
    pub serial_port: Option<String>,

    /// Host name or address of a Modbus gateway
    #[clap(long = "host")]
    pub host: Option<String>,

    /// Baud rate of the serial line
    #[clap(short = 'b', long = "baudrate")]
    pub baudrate: Option<u32>,

    #[clap(long = "tcp-port")]
    pub tcp_port: Option<u16>,

    /// Request timeout in seconds
    #[clap(short = 't', long = "timeout")]
    pub timeout: Option<u64>,

    /// Unit id the meter currently answers on
    #[clap(short = 'u', long = "unit-id", value_parser = parse_unit_id)]
    pub unit_id: Option<u8>,

    /// Config file to read instead of config/meter-setup.yaml
    #[clap(long = "config")]
    pub config_file: Option<PathBuf>,

    #[clap(short = 'm', long = "meter-model", value_parser = parse_model)]
    pub meter_model: DeviceModel,

    /// Read everything the meter model offers
    #[clap(short = 'c', long = "curious")]
    pub curious: bool,

    /// Print the curious mode readings as JSON
    #[clap(long = "json")]
    pub json: bool,

    #[clap(long = "get-relay")]
    pub get_relay: bool,

    /// on, off, auto, 1 (on) or 0 (off)
    #[clap(long = "set-relay", value_parser = parse_relay_state)]
    pub set_relay: Option<RelayState>,

    #[clap(long = "get-baudrate")]
    pub get_baudrate: bool,

    #[clap(long = "set-baudrate", value_parser = parse_baud_rate)]
    pub set_baudrate: Option<u32>,

    #[clap(long = "get-unit-id")]
    pub get_unit_id: bool,

    #[clap(long = "set-unit-id", value_parser = parse_unit_id)]
    pub set_unit_id: Option<u8>,

    #[clap(long = "get-serial")]
    pub get_serial: bool,

    /// New serial number, decimal or with a 0x / 0b prefix
    #[clap(long = "set-serial")]
    pub set_serial: Option<String>,
}

impl Options {
    pub fn new() -> Self {
        Self::parse()
    }

    /// Lets command line flags override what the config file says
    pub fn apply_to(&self, config: &mut SetupConfig) {
        if let Some(baudrate) = self.baudrate {
            config.baud_rate = baudrate;
        }
        if let Some(port) = self.tcp_port {
            config.tcp_port = port;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(unit_id) = self.unit_id {
            config.unit_id = unit_id;
        }
    }

    /// None only when neither a serial port nor a host was given
    pub fn endpoint(&self, config: &SetupConfig) -> Option<Endpoint> {
        if let Some(path) = &self.serial_port {
            return Some(Endpoint::Serial { path: path.clone(), baud_rate: config.baud_rate });
        }
        let host = self.host.as_ref()?;
        return Some(Endpoint::Gateway {
            host: host.clone(),
            port: config.tcp_port,
            framing: config.gateway_proto.into(),
        });
    }
}
