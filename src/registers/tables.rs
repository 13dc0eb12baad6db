/*
    Register maps taken from the vendor documentation of each meter.
    Addresses are protocol addresses (zero based), not the 3xxxx/4xxxx
    numbers printed in the manuals.
*/

use super::{DeviceModel, Encoding, OperationKind, RegisterDescriptor, RegisterName};

type Entry = (RegisterName, RegisterDescriptor);

const fn input_f32(address: u16, unit: &'static str) -> RegisterDescriptor {
    RegisterDescriptor::new(OperationKind::ReadInput, address, 2, Encoding::Float32, unit)
}

const fn read(operation: OperationKind, address: u16, word_count: u16, encoding: Encoding, unit: &'static str) -> RegisterDescriptor {
    RegisterDescriptor::new(operation, address, word_count, encoding, unit)
}

const fn write(address: u16, word_count: u16, encoding: Encoding) -> RegisterDescriptor {
    RegisterDescriptor::new(OperationKind::WriteMultiple, address, word_count, encoding, "")
}

use Encoding::*;
use OperationKind::*;
use RegisterName::*;

/* SDM72 and SDM630 */
const EASTRON_THREE_PHASE: &[Entry] = &[
    (TotalEnergy, input_f32(0x156, "kWh")),
    (ImportEnergy, input_f32(0x48, "kWh")),
    (ExportEnergy, input_f32(0x4A, "kWh")),
    (Power, input_f32(0x34, "W")),
    (L1Current, input_f32(0x6, "A")),
    (L2Current, input_f32(0x8, "A")),
    (L3Current, input_f32(0xA, "A")),
    (L1Voltage, input_f32(0x0, "V")),
    (L2Voltage, input_f32(0x2, "V")),
    (L3Voltage, input_f32(0x4, "V")),
    (PowerFactor, input_f32(0x3E, "")),
    (Frequency, input_f32(0x46, "Hz")),
    (SerialNumber, read(ReadHolding, 0xFC00, 2, UInt32, "(integer)")),
    (SerialNumberBinary, read(ReadHolding, 0xFC00, 2, BinaryDump, "(binary)")),
    (SerialNumberHex, read(ReadHolding, 0xFC00, 2, HexDump, "(hex)")),
    (BaudRate, read(ReadHolding, 0x1C, 2, Float32, "(integer)")),
    (SetBaudRate, write(0x1C, 2, Float32)),
    (UnitId, read(ReadHolding, 0x14, 2, Float32, "(modbus id/address)")),
    (SetUnitId, write(0x14, 2, Float32)),
];

/* SDM120 and SDM230 */
const EASTRON_SINGLE_PHASE: &[Entry] = &[
    (TotalEnergy, input_f32(0x156, "kWh")),
    (ImportEnergy, input_f32(0x48, "kWh")),
    (ExportEnergy, input_f32(0x4A, "kWh")),
    (Power, input_f32(0x34, "W")),
    (L1Current, input_f32(0x6, "A")),
    (L1Voltage, input_f32(0x0, "V")),
    (PowerFactor, input_f32(0x3E, "")),
    (Frequency, input_f32(0x46, "Hz")),
    (SerialNumber, read(ReadHolding, 0xFC00, 2, UInt32, "(integer)")),
    (SerialNumberBinary, read(ReadHolding, 0xFC00, 2, BinaryDump, "(binary)")),
    (SerialNumberHex, read(ReadHolding, 0xFC00, 2, HexDump, "(hex)")),
    (BaudRate, read(ReadHolding, 0x1C, 2, Float32, "(integer)")),
    (SetBaudRate, write(0x1C, 2, Float32)),
    (UnitId, read(ReadHolding, 0x14, 2, Float32, "(modbus id/address)")),
    (SetUnitId, write(0x14, 2, Float32)),
];

/* The EM115 is single phase but its map names L2/L3 at address 0 */
const EM115: &[Entry] = &[
    (TotalEnergy, input_f32(0x16A, "kWh")),
    (ImportEnergy, input_f32(0x160, "kWh")),
    (ExportEnergy, input_f32(0x166, "kWh")),
    (Power, input_f32(0x8, "W")),
    (L1Current, input_f32(0x6, "A")),
    (L2Current, input_f32(0x0, "A")),
    (L3Current, input_f32(0x0, "A")),
    (L1Voltage, input_f32(0x2, "V")),
    (L2Voltage, input_f32(0x0, "V")),
    (L3Voltage, input_f32(0x0, "V")),
    (PowerFactor, input_f32(0xE, "")),
    (Frequency, input_f32(0x4, "Hz")),
    (SerialNumber, read(ReadInput, 0xFF00, 2, UInt32, "(integer)")),
    (SerialNumberBinary, read(ReadInput, 0xFF00, 2, BinaryDump, "(binary)")),
    (SerialNumberHex, read(ReadInput, 0xFF00, 2, HexDump, "(hex)")),
    (SetSerialNumber, write(0xFF00, 2, UInt32)),
    (RelayState, read(ReadInput, 0x566, 1, BinaryDump, "(01..=on, 10..=off)")),
    (SetRelayState, write(0x566, 2, None)),
    (BaudRate, read(ReadInput, 0x525, 1, UInt16, "(integer)")),
    (SetBaudRate, write(0x525, 1, None)),
    (UnitId, read(ReadInput, 0x524, 1, UInt16, "(modbus id/address)")),
    (SetUnitId, write(0x524, 1, None)),
];

const EM737: &[Entry] = &[
    (TotalEnergy, input_f32(0x700, "kWh")),
    (ImportEnergy, input_f32(0x800, "kWh")),
    (ExportEnergy, input_f32(0x900, "kWh")),
    (Power, input_f32(0x26, "W")),
    (L1Current, input_f32(0x16, "A")),
    (L2Current, input_f32(0x18, "A")),
    (L3Current, input_f32(0x1A, "A")),
    (L1Voltage, input_f32(0x10, "V")),
    (L2Voltage, input_f32(0x12, "V")),
    (L3Voltage, input_f32(0x14, "V")),
    (PowerFactor, input_f32(0x3E, "")),
    (Frequency, input_f32(0x40, "Hz")),
    (SerialNumber, read(ReadInput, 0xFF00, 2, UInt32, "(integer)")),
    (SerialNumberBinary, read(ReadInput, 0xFF00, 2, BinaryDump, "(binary)")),
    (SerialNumberHex, read(ReadInput, 0xFF00, 2, HexDump, "(hex)")),
    (SetSerialNumber, write(0xFF00, 2, UInt32)),
    (RelayState, read(ReadInput, 0x566, 1, BinaryDump, "(01..=on, 10..=off)")),
    (SetRelayState, write(0x566, 2, None)),
    (BaudRate, read(ReadInput, 0x525, 1, UInt16, "(integer)")),
    (SetBaudRate, write(0x525, 1, None)),
    (UnitId, read(ReadHolding, 0x524, 1, UInt16, "(modbus id/address)")),
    (SetUnitId, write(0x524, 1, None)),
];

pub fn model_table(model: DeviceModel) -> &'static [Entry] {
    match model {
        DeviceModel::SDM72 | DeviceModel::SDM630 => EASTRON_THREE_PHASE,
        DeviceModel::SDM120 | DeviceModel::SDM230 => EASTRON_SINGLE_PHASE,
        DeviceModel::EM115 => EM115,
        DeviceModel::EM737 => EM737,
    }
}
