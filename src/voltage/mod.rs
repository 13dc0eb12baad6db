use log::info;

use crate::{
    error::MeterError,
    meter::{MeterClient, Value},
    registers::RegisterName,
    transport::Transport,
};

pub const NOMINAL_VOLTAGES: [f32; 2] = [115.0, 230.0];
/* 0.1 means +/- 10% */
pub const TOLERANCE: f32 = 0.1;

/// True when the voltage is within the tolerance of any nominal voltage,
/// bounds included
pub fn is_plausible(voltage: f32) -> bool {
    NOMINAL_VOLTAGES
        .iter()
        .any(|nominal| voltage >= nominal * (1.0 - TOLERANCE) && voltage <= nominal * (1.0 + TOLERANCE))
}

/// Reads the L1 voltage and fails if it does not look like a mains voltage.
/// A wrong meter model usually shows up here first.
pub async fn check_voltage<T: Transport>(client: &mut MeterClient<T>) -> Result<f32, MeterError> {
    info!("Trying to get voltage from meter model {} with unit id {}", client.model(), client.unit_id());
    let voltage = match client.read_value(RegisterName::L1Voltage).await? {
        Value::Float(v) => v,
        other => return Err(MeterError::ProtocolMismatch { register: RegisterName::L1Voltage, observed: other.to_string() }),
    };

    if !is_plausible(voltage) {
        return Err(MeterError::ImplausibleVoltage { model: client.model(), voltage });
    }
    info!("Voltage is {:.1} V which seems ok!", voltage);
    return Ok(voltage);
}
