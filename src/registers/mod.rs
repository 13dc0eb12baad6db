use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use lazy_static::lazy_static;

pub mod tables;

/// The meter models this tool knows the register layout of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceModel {
    EM115,
    EM737,
    SDM72,
    SDM120,
    SDM230,
    SDM630,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorFamily {
    Eastron,
    Fineco,
}

impl DeviceModel {
    pub const ALL: [DeviceModel; 6] = [
        DeviceModel::EM115,
        DeviceModel::EM737,
        DeviceModel::SDM72,
        DeviceModel::SDM120,
        DeviceModel::SDM230,
        DeviceModel::SDM630,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceModel::EM115 => "EM115",
            DeviceModel::EM737 => "EM737",
            DeviceModel::SDM72 => "SDM72",
            DeviceModel::SDM120 => "SDM120",
            DeviceModel::SDM230 => "SDM230",
            DeviceModel::SDM630 => "SDM630",
        }
    }

    /// Family is derived from the model prefix: "EM" is Fineco, "SDM" is Eastron
    pub fn family(&self) -> VendorFamily {
        if self.as_str().starts_with("EM") {
            return VendorFamily::Fineco;
        }
        return VendorFamily::Eastron;
    }
}

impl fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceModel::ALL
            .iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown meter model {s}"))
    }
}

/// Logical register names shared by every model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterName {
    TotalEnergy,
    ImportEnergy,
    ExportEnergy,
    Power,
    L1Current,
    L2Current,
    L3Current,
    L1Voltage,
    L2Voltage,
    L3Voltage,
    PowerFactor,
    Frequency,
    SerialNumber,
    SerialNumberBinary,
    SerialNumberHex,
    SetSerialNumber,
    RelayState,
    SetRelayState,
    BaudRate,
    SetBaudRate,
    UnitId,
    SetUnitId,
}

impl RegisterName {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegisterName::TotalEnergy => "total_energy",
            RegisterName::ImportEnergy => "import_energy",
            RegisterName::ExportEnergy => "export_energy",
            RegisterName::Power => "power",
            RegisterName::L1Current => "l1_current",
            RegisterName::L2Current => "l2_current",
            RegisterName::L3Current => "l3_current",
            RegisterName::L1Voltage => "l1_voltage",
            RegisterName::L2Voltage => "l2_voltage",
            RegisterName::L3Voltage => "l3_voltage",
            RegisterName::PowerFactor => "power_factor",
            RegisterName::Frequency => "frequency",
            RegisterName::SerialNumber => "serial_number",
            RegisterName::SerialNumberBinary => "serial_number_bin",
            RegisterName::SerialNumberHex => "serial_number_hex",
            RegisterName::SetSerialNumber => "set_serial_number",
            RegisterName::RelayState => "relay_state",
            RegisterName::SetRelayState => "set_relay_state",
            RegisterName::BaudRate => "baudrate",
            RegisterName::SetBaudRate => "set_baudrate",
            RegisterName::UnitId => "unit_id",
            RegisterName::SetUnitId => "set_unit_id",
        }
    }
}

impl fmt::Display for RegisterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    ReadHolding,
    ReadInput,
    WriteMultiple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Float32,
    UInt32,
    UInt16,
    BinaryDump,
    HexDump,
    /* payload words are passed through untouched */
    None,
}

impl Encoding {
    /// Word count implied by the encoding, `None` for the dump and raw encodings
    pub fn fixed_word_count(&self) -> Option<u16> {
        match self {
            Encoding::Float32 | Encoding::UInt32 => Some(2),
            Encoding::UInt16 => Some(1),
            Encoding::BinaryDump | Encoding::HexDump | Encoding::None => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterDescriptor {
    pub operation: OperationKind,
    pub address: u16,
    pub word_count: u16,
    pub encoding: Encoding,
    pub unit: &'static str,
}

impl RegisterDescriptor {
    pub const fn new(operation: OperationKind, address: u16, word_count: u16, encoding: Encoding, unit: &'static str) -> Self {
        Self { operation, address, word_count, encoding, unit }
    }

    pub fn is_consistent(&self) -> bool {
        if self.word_count == 0 {
            return false;
        }
        match self.encoding.fixed_word_count() {
            Some(count) => count == self.word_count,
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Found(RegisterDescriptor),
    NotSupported,
}

pub struct RegisterCatalog {
    entries: HashMap<(DeviceModel, RegisterName), RegisterDescriptor>,
}

impl RegisterCatalog {
    fn build() -> Self {
        let mut entries = HashMap::new();
        for model in DeviceModel::ALL {
            for (name, descriptor) in tables::model_table(model) {
                entries.insert((model, *name), *descriptor);
            }
        }
        return RegisterCatalog { entries };
    }

    pub fn lookup(&self, model: DeviceModel, name: RegisterName) -> Lookup {
        match self.entries.get(&(model, name)) {
            Some(descriptor) => Lookup::Found(*descriptor),
            None => Lookup::NotSupported,
        }
    }

    pub fn supports(&self, model: DeviceModel, name: RegisterName) -> bool {
        return self.entries.contains_key(&(model, name));
    }

    /// Checks the static tables: unique names per model and word counts
    /// matching each encoding. Returns a description of every violation.
    pub fn validate() -> Result<(), Vec<String>> {
        let mut problems = Vec::new();
        for model in DeviceModel::ALL {
            let mut seen = HashSet::new();
            for (name, descriptor) in tables::model_table(model) {
                if !seen.insert(*name) {
                    problems.push(format!("{model}: {name} is listed twice"));
                }
                if !descriptor.is_consistent() {
                    problems.push(format!("{model}: {name} has {} words for {:?}", descriptor.word_count, descriptor.encoding));
                }
            }
        }
        if problems.is_empty() {
            return Ok(());
        }
        return Err(problems);
    }
}

lazy_static! {
    static ref CATALOG: RegisterCatalog = RegisterCatalog::build();
}

pub fn catalog() -> &'static RegisterCatalog {
    return &CATALOG;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn found(model: DeviceModel, name: RegisterName) -> RegisterDescriptor {
        match catalog().lookup(model, name) {
            Lookup::Found(d) => d,
            Lookup::NotSupported => panic!("{model} should support {name}"),
        }
    }

    #[test]
    fn test_tables_are_valid() {
        assert_eq!(RegisterCatalog::validate(), Ok(()));
    }

    #[test]
    fn test_family() {
        assert_eq!(DeviceModel::EM115.family(), VendorFamily::Fineco);
        assert_eq!(DeviceModel::EM737.family(), VendorFamily::Fineco);
        assert_eq!(DeviceModel::SDM72.family(), VendorFamily::Eastron);
        assert_eq!(DeviceModel::SDM630.family(), VendorFamily::Eastron);
    }

    #[test]
    fn test_model_from_str() {
        assert_eq!("sdm120".parse::<DeviceModel>(), Ok(DeviceModel::SDM120));
        assert_eq!("EM737".parse::<DeviceModel>(), Ok(DeviceModel::EM737));
        assert!("SDM999".parse::<DeviceModel>().is_err());
    }

    #[test]
    fn test_eastron_voltage_and_serial() {
        let v = found(DeviceModel::SDM120, RegisterName::L1Voltage);
        assert_eq!(v, RegisterDescriptor::new(OperationKind::ReadInput, 0x0, 2, Encoding::Float32, "V"));
        let s = found(DeviceModel::SDM630, RegisterName::SerialNumber);
        assert_eq!(s, RegisterDescriptor::new(OperationKind::ReadHolding, 0xFC00, 2, Encoding::UInt32, "(integer)"));
        let b = found(DeviceModel::SDM72, RegisterName::BaudRate);
        assert_eq!(b, RegisterDescriptor::new(OperationKind::ReadHolding, 0x1C, 2, Encoding::Float32, "(integer)"));
    }

    #[test]
    fn test_fineco_layout() {
        assert_eq!(found(DeviceModel::EM115, RegisterName::TotalEnergy).address, 0x16A);
        assert_eq!(found(DeviceModel::EM737, RegisterName::TotalEnergy).address, 0x700);
        let relay = found(DeviceModel::EM737, RegisterName::RelayState);
        assert_eq!(relay, RegisterDescriptor::new(OperationKind::ReadInput, 0x566, 1, Encoding::BinaryDump, "(01..=on, 10..=off)"));
        let set_relay = found(DeviceModel::EM115, RegisterName::SetRelayState);
        assert_eq!(set_relay, RegisterDescriptor::new(OperationKind::WriteMultiple, 0x566, 2, Encoding::None, ""));
        /* the unit id lives in different register spaces on the two models */
        assert_eq!(found(DeviceModel::EM115, RegisterName::UnitId).operation, OperationKind::ReadInput);
        assert_eq!(found(DeviceModel::EM737, RegisterName::UnitId).operation, OperationKind::ReadHolding);
    }

    #[test]
    fn test_single_phase_models_lack_phases() {
        for model in [DeviceModel::SDM120, DeviceModel::SDM230] {
            assert_eq!(catalog().lookup(model, RegisterName::L2Voltage), Lookup::NotSupported);
            assert_eq!(catalog().lookup(model, RegisterName::L3Current), Lookup::NotSupported);
        }
        assert!(catalog().supports(DeviceModel::SDM72, RegisterName::L3Voltage));
    }

    #[test]
    fn test_write_capabilities() {
        for model in DeviceModel::ALL {
            let fineco = model.family() == VendorFamily::Fineco;
            assert!(catalog().supports(model, RegisterName::SetUnitId));
            assert!(catalog().supports(model, RegisterName::SetBaudRate));
            assert_eq!(catalog().supports(model, RegisterName::SetSerialNumber), fineco);
            assert_eq!(catalog().supports(model, RegisterName::RelayState), fineco);
            assert_eq!(catalog().supports(model, RegisterName::SetRelayState), fineco);
        }
    }
}
