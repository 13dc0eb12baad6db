use std::fmt;

pub mod link;

pub use link::{Endpoint, GatewayFraming, ModbusLink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// RS485 adapter attached to this machine
    Serial,
    /// Network to RS485 bridge
    Gateway,
}

/// Failure reported by the bus. `code` is the Modbus exception code when the
/// meter answered with one, `message` whatever the link could tell us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub code: Option<u8>,
    pub message: Option<String>,
    pub retryable: bool,
}

impl TransportError {
    pub fn exception(code: u8) -> Self {
        TransportError {
            code: Some(code),
            message: Some(exception_text(code).to_string()),
            retryable: false,
        }
    }

    pub fn io(err: std::io::Error) -> Self {
        TransportError { code: None, message: Some(err.to_string()), retryable: true }
    }

    pub fn timeout() -> Self {
        TransportError { code: None, message: Some("timed out".to_string()), retryable: true }
    }

    pub fn frame(message: String) -> Self {
        TransportError { code: None, message: Some(message), retryable: false }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => write!(f, "exception code {code}: {message}"),
            (Some(code), None) => write!(f, "exception code {code}"),
            (None, Some(message)) => f.write_str(message),
            (None, None) => f.write_str("unknown bus error"),
        }
    }
}

impl std::error::Error for TransportError {}

fn exception_text(code: u8) -> &'static str {
    match code {
        0x01 => "illegal function",
        0x02 => "illegal data address",
        0x03 => "illegal data value",
        0x04 => "slave device failure",
        0x05 => "acknowledge",
        0x06 => "slave device busy",
        0x08 => "memory parity error",
        0x0A => "gateway path unavailable",
        0x0B => "gateway target device failed to respond",
        _ => "unknown exception",
    }
}

/// The field bus client. One request is in flight at a time, callers hold
/// the transport mutably for the whole request.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn read_holding_registers(&mut self, address: u16, count: u16, unit_id: u8) -> Result<Vec<u16>, TransportError>;

    async fn read_input_registers(&mut self, address: u16, count: u16, unit_id: u8) -> Result<Vec<u16>, TransportError>;

    async fn write_multiple_registers(&mut self, address: u16, values: &[u16], unit_id: u8) -> Result<(), TransportError>;

    async fn close(&mut self);

    /// Close and open again at another baud rate. Only serial links can do this.
    async fn reopen(&mut self, baud_rate: u32) -> Result<(), TransportError>;

    fn link_kind(&self) -> LinkKind;
}
