use std::fmt;
use log::debug;
use serde::Serialize;

use crate::{
    codec,
    error::MeterError,
    registers::{catalog, DeviceModel, Encoding, Lookup, OperationKind, RegisterDescriptor, RegisterName},
    transport::{LinkKind, Transport},
};

pub const NOT_SUPPORTED: &str = "Not supported for this model";

/// Registers read in curious mode, in this order
pub const SURVEY_REGISTERS: [RegisterName; 15] = [
    RegisterName::TotalEnergy,
    RegisterName::ImportEnergy,
    RegisterName::Power,
    RegisterName::L1Current,
    RegisterName::L2Current,
    RegisterName::L3Current,
    RegisterName::L1Voltage,
    RegisterName::L2Voltage,
    RegisterName::L3Voltage,
    RegisterName::PowerFactor,
    RegisterName::Frequency,
    RegisterName::SerialNumber,
    RegisterName::SerialNumberBinary,
    RegisterName::SerialNumberHex,
    RegisterName::RelayState,
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Float(f32),
    Integer(u32),
    Text(String),
}

impl Value {
    /// Integer view of a numeric value, floats are truncated like the
    /// Eastron configuration registers expect
    pub fn as_integer(&self) -> Option<u32> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Float(f) if f.is_finite() && *f >= 0.0 && *f <= u32::MAX as f32 => Some(f.trunc() as u32),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Float(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Text(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub value: Option<Value>,
    pub info_text: String,
}

impl Reading {
    pub fn not_supported() -> Self {
        Reading { value: None, info_text: NOT_SUPPORTED.to_string() }
    }

    pub fn is_supported(&self) -> bool {
        !(self.value.is_none() && self.info_text == NOT_SUPPORTED)
    }
}

/// Data to write. How it ends up on the wire depends on the register
/// encoding: floats and integers are encoded, word lists go out verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Float(f64),
    Integer(u64),
    Words(Vec<u16>),
}

fn encode_payload(descriptor: &RegisterDescriptor, payload: &Payload) -> Result<Vec<u16>, codec::EncodingError> {
    let words = match (descriptor.encoding, payload) {
        (Encoding::Float32, Payload::Float(v)) => codec::encode_float32(*v)?.to_vec(),
        (Encoding::Float32, Payload::Integer(v)) => codec::encode_float32(*v as f64)?.to_vec(),
        (Encoding::UInt32, Payload::Integer(v)) => codec::encode_uint32(*v)?.to_vec(),
        (Encoding::UInt16 | Encoding::None, Payload::Integer(v)) => {
            let word = u16::try_from(*v).map_err(|_| codec::EncodingError::OutOfRange { value: *v, bits: 16 })?;
            vec![word]
        }
        (_, Payload::Words(words)) => words.clone(),
        (encoding, payload) => {
            return Err(codec::EncodingError::Incompatible(format!("{:?}", payload), format!("{:?}", encoding)));
        }
    };

    if words.len() != descriptor.word_count as usize {
        return Err(codec::EncodingError::WordCount { expected: descriptor.word_count as usize, got: words.len() });
    }
    return Ok(words);
}

fn decode_words(encoding: Encoding, words: &[u16]) -> Result<Option<Value>, codec::EncodingError> {
    let value = match encoding {
        Encoding::Float32 => Value::Float(codec::decode_float32(words)?),
        Encoding::UInt32 => Value::Integer(codec::decode_uint32(words)?),
        Encoding::UInt16 => Value::Integer(codec::decode_uint16(words)? as u32),
        Encoding::BinaryDump => Value::Text(codec::decode_binary(words)?),
        Encoding::HexDump => Value::Text(codec::decode_hex(words)?),
        Encoding::None => return Ok(None),
    };
    return Ok(Some(value));
}

/// One meter on the bus. Owns the transport for the whole session.
pub struct MeterClient<T: Transport> {
    model: DeviceModel,
    unit_id: u8,
    transport: T,
}

impl<T: Transport> MeterClient<T> {
    pub fn new(model: DeviceModel, unit_id: u8, transport: T) -> Self {
        MeterClient { model, unit_id, transport }
    }

    pub fn model(&self) -> DeviceModel {
        self.model
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    pub fn set_unit_id(&mut self, unit_id: u8) {
        self.unit_id = unit_id;
    }

    pub fn link_kind(&self) -> LinkKind {
        self.transport.link_kind()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn supports(&self, name: RegisterName) -> bool {
        catalog().supports(self.model, name)
    }

    pub async fn read(&mut self, name: RegisterName) -> Result<Reading, MeterError> {
        let unit_id = self.unit_id;
        self.request_at(name, unit_id, None).await
    }

    pub async fn write(&mut self, name: RegisterName, payload: Payload) -> Result<Reading, MeterError> {
        let unit_id = self.unit_id;
        self.request_at(name, unit_id, Some(payload)).await
    }

    pub async fn request(&mut self, name: RegisterName, payload: Option<Payload>) -> Result<Reading, MeterError> {
        let unit_id = self.unit_id;
        self.request_at(name, unit_id, payload).await
    }

    /// Like [`MeterClient::request`], addressed to another unit id
    pub async fn request_at(&mut self, name: RegisterName, unit_id: u8, payload: Option<Payload>) -> Result<Reading, MeterError> {
        let descriptor = match catalog().lookup(self.model, name) {
            Lookup::Found(d) => d,
            Lookup::NotSupported => {
                debug!("{} has no register {}", self.model, name);
                return Ok(Reading::not_supported());
            }
        };

        let transport_error = |source| MeterError::Transport { register: name, source };
        let words = match descriptor.operation {
            OperationKind::ReadHolding => self.transport
                .read_holding_registers(descriptor.address, descriptor.word_count, unit_id)
                .await
                .map_err(transport_error)?,
            OperationKind::ReadInput => self.transport
                .read_input_registers(descriptor.address, descriptor.word_count, unit_id)
                .await
                .map_err(transport_error)?,
            OperationKind::WriteMultiple => {
                let payload = payload.ok_or(MeterError::MissingPayload { register: name })?;
                let values = encode_payload(&descriptor, &payload)
                    .map_err(|source| MeterError::Encoding { register: name, source })?;
                debug!("Writing {:?} to {} at {:#x} on unit {}", values, name, descriptor.address, unit_id);
                self.transport
                    .write_multiple_registers(descriptor.address, &values, unit_id)
                    .await
                    .map_err(transport_error)?;
                Vec::new()
            }
        };

        let value = if words.is_empty() {
            None
        } else {
            decode_words(descriptor.encoding, &words).map_err(|source| MeterError::Encoding { register: name, source })?
        };

        return Ok(Reading { value, info_text: descriptor.unit.to_string() });
    }

    /// Reads a register that must carry a value, unsupported registers fail
    pub async fn read_value(&mut self, name: RegisterName) -> Result<Value, MeterError> {
        let reading = self.read(name).await?;
        match reading.value {
            Some(v) => Ok(v),
            None if !reading.is_supported() => Err(MeterError::unsupported(self.model, format!("reading {name}"))),
            None => Err(MeterError::ProtocolMismatch { register: name, observed: "no data".to_string() }),
        }
    }

    pub async fn close(&mut self) {
        self.transport.close().await;
    }
}

/// Curious mode: every register of [`SURVEY_REGISTERS`], unsupported ones included
pub async fn survey<T: Transport>(client: &mut MeterClient<T>) -> Result<Vec<(RegisterName, Reading)>, MeterError> {
    let mut result = Vec::new();
    for name in SURVEY_REGISTERS {
        let reading = client.read(name).await?;
        result.push((name, reading));
    }
    return Ok(result);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{Call, MockTransport, Space};
    use crate::transport::TransportError;

    fn sdm120() -> MeterClient<MockTransport> {
        let mock = MockTransport::new(1)
            .with(Space::Input, 0x0, &[0x4366, 0x0000])
            .with(Space::Holding, 0xFC00, &[0x1234, 0x5678]);
        MeterClient::new(DeviceModel::SDM120, 1, mock)
    }

    #[tokio::test]
    async fn test_read_float_register() {
        let mut client = sdm120();
        let reading = client.read(RegisterName::L1Voltage).await.unwrap();
        assert_eq!(reading, Reading { value: Some(Value::Float(230.0)), info_text: "V".to_string() });
        assert_eq!(client.transport().calls, vec![Call::Read { space: Space::Input, address: 0, count: 2, unit_id: 1 }]);
    }

    #[tokio::test]
    async fn test_serial_number_encodings() {
        let mut client = sdm120();
        assert_eq!(client.read(RegisterName::SerialNumber).await.unwrap().value, Some(Value::Integer(305419896)));
        assert_eq!(
            client.read(RegisterName::SerialNumberBinary).await.unwrap().value,
            Some(Value::Text("00010010001101000101011001111000".to_string()))
        );
        assert_eq!(client.read(RegisterName::SerialNumberHex).await.unwrap().value, Some(Value::Text("12345678".to_string())));
    }

    #[tokio::test]
    async fn test_unsupported_register_is_not_an_error() {
        let mut client = sdm120();
        let reading = client.read(RegisterName::L3Voltage).await.unwrap();
        assert_eq!(reading.value, None);
        assert_eq!(reading.info_text, NOT_SUPPORTED);
        assert!(!reading.is_supported());
        /* nothing went out on the bus */
        assert!(client.transport().calls.is_empty());
    }

    #[tokio::test]
    async fn test_write_without_payload() {
        let mut client = sdm120();
        let err = client.request(RegisterName::SetUnitId, None).await.unwrap_err();
        assert!(matches!(err, MeterError::MissingPayload { register: RegisterName::SetUnitId }));
        assert!(client.transport().writes().is_empty());
    }

    #[tokio::test]
    async fn test_write_encodes_per_register() {
        let mut client = sdm120();
        let reading = client.write(RegisterName::SetUnitId, Payload::Integer(7)).await.unwrap();
        assert_eq!(reading.value, None);
        /* 7.0 as float32 */
        assert_eq!(client.transport().writes(), vec![(0x14, vec![0x40e0, 0x0000], 1)]);

        let mut fineco = MeterClient::new(DeviceModel::EM115, 1, MockTransport::new(1));
        fineco.write(RegisterName::SetBaudRate, Payload::Integer(9600)).await.unwrap();
        fineco.write(RegisterName::SetSerialNumber, Payload::Integer(0x12345678)).await.unwrap();
        assert_eq!(fineco.transport().writes(), vec![(0x525, vec![9600], 1), (0xFF00, vec![0x1234, 0x5678], 1)]);
    }

    #[tokio::test]
    async fn test_write_checks_word_count() {
        let mut client = MeterClient::new(DeviceModel::EM737, 1, MockTransport::new(1));
        let err = client.write(RegisterName::SetRelayState, Payload::Words(vec![1])).await.unwrap_err();
        assert!(matches!(err, MeterError::Encoding { register: RegisterName::SetRelayState, .. }));
        let err = client.write(RegisterName::SetBaudRate, Payload::Integer(70000)).await.unwrap_err();
        assert!(matches!(err, MeterError::Encoding { .. }));
        assert!(client.transport().writes().is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_names_register() {
        let mut client = sdm120();
        let err = client.read(RegisterName::Frequency).await.unwrap_err();
        match err {
            MeterError::Transport { register, source } => {
                assert_eq!(register, RegisterName::Frequency);
                assert_eq!(source, TransportError::exception(2));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_request_at_other_unit() {
        let mut client = sdm120();
        client.request_at(RegisterName::L1Voltage, 9, None).await.unwrap_err();
        assert_eq!(client.transport().calls, vec![Call::Read { space: Space::Input, address: 0, count: 2, unit_id: 9 }]);
    }

    #[tokio::test]
    async fn test_survey_skips_nothing() {
        let mock = MockTransport::new(1)
            .with(Space::Input, 0x0, &[0x4366, 0x0000])
            .with(Space::Input, 0x6, &[0x3f80, 0x0000])
            .with(Space::Input, 0x34, &[0x4348, 0x0000])
            .with(Space::Input, 0x156, &[0x4120, 0x0000])
            .with(Space::Input, 0x48, &[0x4120, 0x0000])
            .with(Space::Input, 0x3E, &[0x3f80, 0x0000])
            .with(Space::Input, 0x46, &[0x4248, 0x0000])
            .with(Space::Holding, 0xFC00, &[0x0000, 0x0042]);
        let mut client = MeterClient::new(DeviceModel::SDM230, 1, mock);
        let readings = survey(&mut client).await.unwrap();
        assert_eq!(readings.len(), SURVEY_REGISTERS.len());
        let supported: Vec<RegisterName> = readings.iter().filter(|(_, r)| r.is_supported()).map(|(n, _)| *n).collect();
        assert!(!supported.contains(&RegisterName::L2Current));
        assert!(!supported.contains(&RegisterName::RelayState));
        assert_eq!(readings[10].1.value, Some(Value::Float(50.0)));
    }

    #[test]
    fn test_value_as_integer() {
        assert_eq!(Value::Float(2.0).as_integer(), Some(2));
        assert_eq!(Value::Float(2.9).as_integer(), Some(2));
        assert_eq!(Value::Float(-1.0).as_integer(), None);
        assert_eq!(Value::Integer(9600).as_integer(), Some(9600));
        assert_eq!(Value::Text("0101".to_string()).as_integer(), None);
    }
}
