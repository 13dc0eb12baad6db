use thiserror::Error;

use crate::{codec::EncodingError, config::ConfigError, registers::{DeviceModel, RegisterName}, transport::TransportError};

/// Everything that aborts a command. Confirmation mismatches after a write
/// are not errors, they are logged as warnings by the configurators.
#[derive(Error, Debug)]
pub enum MeterError {
    #[error("Malformed payload for {register}: {source}")]
    Encoding {
        register: RegisterName,
        #[source]
        source: EncodingError,
    },
    #[error("Missing payload for {register}")]
    MissingPayload { register: RegisterName },
    #[error("{operation} is not supported for meter model {model}")]
    UnsupportedOperation { model: DeviceModel, operation: String },
    #[error("Unexpected value \"{observed}\" in {register}, the meter model is not supported or its firmware changed")]
    ProtocolMismatch { register: RegisterName, observed: String },
    #[error("Bus error while requesting {register}: {source}")]
    Transport {
        register: RegisterName,
        #[source]
        source: TransportError,
    },
    #[error("Voltage of {voltage:.1} V is out of range for 115/230 V +/- 10%, did you configure the right meter model (selected {model})?")]
    ImplausibleVoltage { model: DeviceModel, voltage: f32 },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl MeterError {
    pub fn unsupported(model: DeviceModel, operation: impl Into<String>) -> Self {
        MeterError::UnsupportedOperation { model, operation: operation.into() }
    }
}
