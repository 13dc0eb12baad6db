//! Commissioning tool for Eastron and Fineco energy meters.
//!
//! Reads measurements and changes the bus settings (baud rate, unit id),
//! the serial number and the relay of a meter over Modbus, either through
//! a local RS485 adapter or a Modbus gateway.

pub mod codec;
pub mod registers;
pub mod transport;
pub mod meter;
pub mod relay;
pub mod parameters;
pub mod voltage;
pub mod error;
pub mod config;
pub mod cli;

pub use error::MeterError;
pub use meter::{MeterClient, Payload, Reading, Value};
pub use registers::{catalog, DeviceModel, RegisterName, VendorFamily};
pub use transport::{Endpoint, ModbusLink, Transport, TransportError};
pub use config::SetupConfig;
