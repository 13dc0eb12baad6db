/*
    Relay control of the Fineco meters. A state change has to carry a key
    computed from the serial number of the meter, the recipe is the one from
    the manufacturer's example code.
*/

use std::{fmt, str::FromStr};
use log::{info, warn};

use crate::{
    error::MeterError,
    meter::{MeterClient, Payload, Value},
    registers::{RegisterName, VendorFamily},
    transport::Transport,
};

/* what the meter reports in the relay state register */
const REPORTED_ON: &str = "0101010101010101";
const REPORTED_OFF: &str = "1010101010101010";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    On,
    Off,
    Auto,
}

impl RelayState {
    /// Code written next to the key to request this state
    pub fn code(&self) -> u16 {
        match self {
            RelayState::On => 21845,
            RelayState::Off => 43690,
            RelayState::Auto => 34952,
        }
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayState::On => f.write_str("on"),
            RelayState::Off => f.write_str("off"),
            RelayState::Auto => f.write_str("auto"),
        }
    }
}

impl FromStr for RelayState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" | "1" => Ok(RelayState::On),
            "off" | "0" => Ok(RelayState::Off),
            "auto" => Ok(RelayState::Auto),
            _ => Err(format!("relay state \"{s}\" is not one of on, off, auto, 0, 1")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The relay already was in the requested state, nothing was written
    Unchanged(RelayState),
    Changed(RelayState),
    /// Written, but the meter still reports another state
    Unconfirmed { requested: RelayState, observed: RelayState },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayInfo {
    pub state: RelayState,
    pub serial_number: u32,
    pub key: u16,
}

pub fn generate_key(serial_number: u32) -> u16 {
    let mut tmp = serial_number >> 24;
    tmp += serial_number >> 8;
    tmp &= 0x1234;
    return tmp as u16;
}

fn ensure_relay_support<T: Transport>(client: &MeterClient<T>) -> Result<(), MeterError> {
    if client.model().family() != VendorFamily::Fineco {
        return Err(MeterError::unsupported(client.model(), "reading and setting the relay state"));
    }
    Ok(())
}

pub async fn read_state<T: Transport>(client: &mut MeterClient<T>) -> Result<RelayState, MeterError> {
    ensure_relay_support(client)?;
    let value = client.read_value(RegisterName::RelayState).await?;
    match value {
        Value::Text(ref s) if s == REPORTED_ON => Ok(RelayState::On),
        Value::Text(ref s) if s == REPORTED_OFF => Ok(RelayState::Off),
        other => Err(MeterError::ProtocolMismatch { register: RegisterName::RelayState, observed: other.to_string() }),
    }
}

async fn read_serial_number<T: Transport>(client: &mut MeterClient<T>) -> Result<u32, MeterError> {
    match client.read_value(RegisterName::SerialNumber).await? {
        Value::Integer(serial) => Ok(serial),
        other => Err(MeterError::ProtocolMismatch { register: RegisterName::SerialNumber, observed: other.to_string() }),
    }
}

/// Reads state and serial number and derives the key, writes nothing
pub async fn inspect<T: Transport>(client: &mut MeterClient<T>) -> Result<RelayInfo, MeterError> {
    let state = read_state(client).await?;
    info!("Current relay state is: {state}");
    let serial_number = read_serial_number(client).await?;
    info!("The meter has serial number: {serial_number}");
    let key = generate_key(serial_number);
    info!("Calculated key based on s/n: {key}");
    return Ok(RelayInfo { state, serial_number, key });
}

pub async fn set_state<T: Transport>(client: &mut MeterClient<T>, requested: RelayState) -> Result<RelayOutcome, MeterError> {
    let current = read_state(client).await?;
    if current == requested {
        info!("Relay state is already: {current}");
        return Ok(RelayOutcome::Unchanged(current));
    }
    info!("Current relay state is: {current}");

    let serial_number = read_serial_number(client).await?;
    let key = generate_key(serial_number);
    info!("Calculated key {key} from serial number {serial_number}");

    info!("Setting relay state to: {requested}");
    client.write(RegisterName::SetRelayState, Payload::Words(vec![key, requested.code()])).await?;

    let observed = read_state(client).await?;
    info!("Current relay state is: {observed}");
    if observed != requested {
        warn!("The relay state was not changed as expected, requested {requested} but the meter reports {observed}");
        return Ok(RelayOutcome::Unconfirmed { requested, observed });
    }
    return Ok(RelayOutcome::Changed(observed));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::DeviceModel;
    use crate::transport::mock::{Device, MockTransport, Space};

    const ON: u16 = 0x5555;
    const OFF: u16 = 0xAAAA;

    /* The meter switches when the key matches its serial number */
    fn switching_meter(device: &mut Device, address: u16, values: &[u16]) {
        if address == 0x566 && values.len() == 2 && values[0] == generate_key(0x12345678) {
            let reported = match values[1] {
                21845 => ON,
                43690 => OFF,
                _ => return,
            };
            device.set(Space::Input, 0x566, &[reported]);
        }
    }

    fn em115(state: u16) -> MeterClient<MockTransport> {
        let mut mock = MockTransport::new(1)
            .with(Space::Input, 0x566, &[state])
            .with(Space::Input, 0xFF00, &[0x1234, 0x5678]);
        mock.on_write = Some(switching_meter);
        MeterClient::new(DeviceModel::EM115, 1, mock)
    }

    #[test]
    fn test_generate_key() {
        /* (0x12 + 0x123456) & 0x1234 */
        assert_eq!(generate_key(0x12345678), 0x1230);
        assert_eq!(generate_key(0), 0);
        assert_eq!(generate_key(u32::MAX), ((0xff + 0xffffff) & 0x1234) as u16);
    }

    #[test]
    fn test_parse_state() {
        assert_eq!("1".parse::<RelayState>(), Ok(RelayState::On));
        assert_eq!("0".parse::<RelayState>(), Ok(RelayState::Off));
        assert_eq!("auto".parse::<RelayState>(), Ok(RelayState::Auto));
        assert!("toggle".parse::<RelayState>().is_err());
    }

    #[tokio::test]
    async fn test_switch_on_writes_key_and_code() {
        let mut client = em115(OFF);
        let outcome = set_state(&mut client, RelayState::On).await.unwrap();
        assert_eq!(outcome, RelayOutcome::Changed(RelayState::On));
        assert_eq!(client.transport().writes(), vec![(0x566, vec![0x1230, 21845], 1)]);
    }

    #[tokio::test]
    async fn test_same_state_writes_nothing() {
        let mut client = em115(ON);
        let outcome = set_state(&mut client, RelayState::On).await.unwrap();
        assert_eq!(outcome, RelayOutcome::Unchanged(RelayState::On));
        assert!(client.transport().writes().is_empty());
    }

    #[tokio::test]
    async fn test_auto_cannot_be_confirmed() {
        let mut client = em115(ON);
        let outcome = set_state(&mut client, RelayState::Auto).await.unwrap();
        assert_eq!(outcome, RelayOutcome::Unconfirmed { requested: RelayState::Auto, observed: RelayState::On });
        assert_eq!(client.transport().writes(), vec![(0x566, vec![0x1230, 34952], 1)]);
    }

    #[tokio::test]
    async fn test_unknown_state_pattern() {
        let mut client = em115(0x0001);
        let err = set_state(&mut client, RelayState::Off).await.unwrap_err();
        match err {
            MeterError::ProtocolMismatch { register, observed } => {
                assert_eq!(register, RegisterName::RelayState);
                assert_eq!(observed, "0000000000000001");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(client.transport().writes().is_empty());
    }

    #[tokio::test]
    async fn test_eastron_meters_have_no_relay() {
        let mut client = MeterClient::new(DeviceModel::SDM630, 1, MockTransport::new(1));
        let err = set_state(&mut client, RelayState::On).await.unwrap_err();
        assert!(matches!(err, MeterError::UnsupportedOperation { model: DeviceModel::SDM630, .. }));
        assert!(client.transport().calls.is_empty());
    }

    #[tokio::test]
    async fn test_inspect() {
        let mut client = em115(OFF);
        let info = inspect(&mut client).await.unwrap();
        assert_eq!(info, RelayInfo { state: RelayState::Off, serial_number: 305419896, key: 0x1230 });
        assert!(client.transport().writes().is_empty());
    }
}
