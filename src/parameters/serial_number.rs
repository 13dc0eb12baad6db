use log::{info, warn};

use crate::{
    codec::EncodingError,
    error::MeterError,
    meter::{MeterClient, Payload, Reading, Value},
    registers::{RegisterName, VendorFamily},
    transport::Transport,
};

#[derive(Debug, Clone, PartialEq)]
pub struct SerialNumbers {
    pub integer: Reading,
    pub binary: Reading,
    pub hex: Reading,
}

impl SerialNumbers {
    pub fn as_integer(&self) -> Option<u32> {
        match self.integer.value {
            Some(Value::Integer(serial)) => Some(serial),
            _ => None,
        }
    }
}

/// Serial numbers read before the write and after it
#[derive(Debug, Clone, PartialEq)]
pub struct SerialNumberChange {
    pub before: SerialNumbers,
    pub after: SerialNumbers,
}

fn log_serial_numbers(serials: &SerialNumbers) {
    for reading in [&serials.integer, &serials.binary, &serials.hex] {
        if let Some(value) = &reading.value {
            info!("The meter has serial number: {value} {}", reading.info_text);
        }
    }
}

/// Accepts "1234", "0x4d2" and "0b10011010010"
pub fn parse_serial_number(input: &str) -> Result<u32, EncodingError> {
    let input = input.trim();
    let parsed = if let Some(hex) = input.strip_prefix("0x") {
        u64::from_str_radix(hex, 16)
    } else if let Some(bin) = input.strip_prefix("0b") {
        u64::from_str_radix(bin, 2)
    } else {
        input.parse::<u64>()
    };
    let value = parsed.map_err(|e| EncodingError::Incompatible(format!("\"{input}\" ({e})"), "serial number".to_string()))?;
    return u32::try_from(value).map_err(|_| EncodingError::OutOfRange { value, bits: 32 });
}

pub async fn read_serial_numbers<T: Transport>(client: &mut MeterClient<T>) -> Result<SerialNumbers, MeterError> {
    let integer = client.read(RegisterName::SerialNumber).await?;
    let binary = client.read(RegisterName::SerialNumberBinary).await?;
    let hex = client.read(RegisterName::SerialNumberHex).await?;
    return Ok(SerialNumbers { integer, binary, hex });
}

/// Only Fineco meters accept a new serial number
pub async fn set_serial_number<T: Transport>(client: &mut MeterClient<T>, input: &str) -> Result<SerialNumberChange, MeterError> {
    if client.model().family() != VendorFamily::Fineco {
        return Err(MeterError::unsupported(client.model(), "changing the serial number"));
    }
    let serial = parse_serial_number(input)
        .map_err(|source| MeterError::Encoding { register: RegisterName::SetSerialNumber, source })?;

    let before = read_serial_numbers(client).await?;
    log_serial_numbers(&before);

    info!("Setting the serial number to: {input} / {serial} (int)");
    client.write(RegisterName::SetSerialNumber, Payload::Integer(serial as u64)).await?;

    let after = read_serial_numbers(client).await?;
    log_serial_numbers(&after);
    if after.as_integer() != Some(serial) {
        warn!("The meter reports serial number {:?} after setting {serial}", after.integer.value);
    }
    return Ok(SerialNumberChange { before, after });
}
