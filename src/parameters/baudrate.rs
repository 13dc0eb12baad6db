use std::time::Duration;
use log::{info, warn};

use crate::{
    error::MeterError,
    meter::{MeterClient, Payload},
    registers::{RegisterName, VendorFamily},
    transport::{LinkKind, Transport},
};

pub const SUPPORTED_BAUD_RATES: [u32; 6] = [1200, 2400, 4800, 9600, 19200, 38400];

/* Eastron meters store an index instead of the rate */
const EASTRON_BAUD_RATES: [u32; 6] = [2400, 4800, 9600, 19200, 38400, 1200];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaudRateOutcome {
    /// The meter answered at the new rate and reports it
    Confirmed(u32),
    /// The meter answered at the new rate but reports a different one
    Unconfirmed { requested: u32, observed: u32 },
    /// Gateway link, the gateway has to be reconfigured by hand
    GatewayReconfigurationRequired(u32),
}

pub async fn read_baud_rate<T: Transport>(client: &mut MeterClient<T>) -> Result<u32, MeterError> {
    let value = client.read_value(RegisterName::BaudRate).await?;
    let mismatch = || MeterError::ProtocolMismatch { register: RegisterName::BaudRate, observed: value.to_string() };
    let raw = value.as_integer().ok_or_else(mismatch)?;

    let baud_rate = match client.model().family() {
        VendorFamily::Eastron => *EASTRON_BAUD_RATES.get(raw as usize).ok_or_else(mismatch)?,
        VendorFamily::Fineco => raw,
    };
    info!("The meter reports a baudrate of: {baud_rate}");
    return Ok(baud_rate);
}

fn raw_value(family: VendorFamily, baud_rate: u32) -> Option<u64> {
    match family {
        VendorFamily::Eastron => EASTRON_BAUD_RATES.iter().position(|b| *b == baud_rate).map(|i| i as u64),
        VendorFamily::Fineco => SUPPORTED_BAUD_RATES.contains(&baud_rate).then_some(baud_rate as u64),
    }
}

/// Writes a new baud rate. On a serial link the session is closed, reopened
/// at the new rate after `settle_delay` and the rate is read back.
pub async fn set_baud_rate<T: Transport>(client: &mut MeterClient<T>, baud_rate: u32, settle_delay: Duration) -> Result<BaudRateOutcome, MeterError> {
    let model = client.model();
    let raw = raw_value(model.family(), baud_rate)
        .ok_or_else(|| MeterError::unsupported(model, format!("baud rate {baud_rate}")))?;

    let current = read_baud_rate(client).await?;
    if current == baud_rate {
        info!("Baud rate is already {baud_rate}");
    }

    info!("OBS remember to put the meter into \"set\" mode!");
    info!("Setting the baudrate to {baud_rate}");
    /* Eastron encodes the index as float, Fineco takes the rate as is */
    client.write(RegisterName::SetBaudRate, Payload::Integer(raw)).await?;

    if client.link_kind() == LinkKind::Gateway {
        warn!("Not connected to the meter directly, so the new setting can not be validated. \
               Please update the configuration of your modbus gateway to {baud_rate} baud.");
        return Ok(BaudRateOutcome::GatewayReconfigurationRequired(baud_rate));
    }

    info!("Checking that we can now communicate with the meter using the new baudrate");
    client.close().await;
    tokio::time::sleep(settle_delay).await;
    client.transport_mut()
        .reopen(baud_rate)
        .await
        .map_err(|source| MeterError::Transport { register: RegisterName::SetBaudRate, source })?;

    let observed = read_baud_rate(client).await?;
    if observed != baud_rate {
        warn!("The meter reports {observed} baud after setting {baud_rate}");
        return Ok(BaudRateOutcome::Unconfirmed { requested: baud_rate, observed });
    }
    return Ok(BaudRateOutcome::Confirmed(observed));
}
