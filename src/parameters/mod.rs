pub mod baudrate;
pub mod serial_number;
pub mod unit_id;

pub use baudrate::{read_baud_rate, set_baud_rate, BaudRateOutcome, SUPPORTED_BAUD_RATES};
pub use serial_number::{parse_serial_number, read_serial_numbers, set_serial_number, SerialNumberChange, SerialNumbers};
pub use unit_id::{read_unit_id, set_unit_id, UnitIdOutcome};
