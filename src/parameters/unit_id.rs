use log::{info, warn};

use crate::{
    error::MeterError,
    meter::{MeterClient, Payload},
    registers::RegisterName,
    transport::Transport,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitIdOutcome {
    /// The meter answers on the new address and reports it
    Confirmed(u8),
    /// The meter answered on the new address with another id
    Unconfirmed { requested: u8, observed: u8 },
}

async fn query_unit_id<T: Transport>(client: &mut MeterClient<T>, address: u8) -> Result<u8, MeterError> {
    let reading = client.request_at(RegisterName::UnitId, address, None).await?;
    let value = match reading.value {
        Some(v) => v,
        None => return Err(MeterError::unsupported(client.model(), "reading the unit id")),
    };
    match value.as_integer().and_then(|id| u8::try_from(id).ok()) {
        Some(id) => Ok(id),
        None => Err(MeterError::ProtocolMismatch { register: RegisterName::UnitId, observed: value.to_string() }),
    }
}

pub async fn read_unit_id<T: Transport>(client: &mut MeterClient<T>) -> Result<u8, MeterError> {
    let address = client.unit_id();
    let unit_id = query_unit_id(client, address).await?;
    info!("The meter reports unit id: {unit_id}");
    return Ok(unit_id);
}

/// Writes a new bus address and queries the meter on it once.
///
/// There is no check whether another device already uses the new address.
/// On success the client talks to the new address from now on.
pub async fn set_unit_id<T: Transport>(client: &mut MeterClient<T>, unit_id: u8) -> Result<UnitIdOutcome, MeterError> {
    if unit_id == 0 {
        return Err(MeterError::unsupported(client.model(), "unit id 0"));
    }
    read_unit_id(client).await?;

    info!("Setting the unit id to: {unit_id}");
    client.write(RegisterName::SetUnitId, Payload::Integer(unit_id as u64)).await?;

    let observed = query_unit_id(client, unit_id).await?;
    info!("The meter reports unit id: {observed}");
    if observed != unit_id {
        warn!("The new unit id {observed} does not match what we set ({unit_id}), the meter may need a power cycle");
        return Ok(UnitIdOutcome::Unconfirmed { requested: unit_id, observed });
    }
    client.set_unit_id(unit_id);
    return Ok(UnitIdOutcome::Confirmed(unit_id));
}
