use crate::constants::limits;
use crate::exception::ExceptionCode;
use crate::server::handler::RequestHandler;
use crate::server::types::{WriteCoils, WriteRegisters};
use crate::types::{AddressRange, Indexed};

/// Sizes of the four address spaces of a [`Database`]. Each space is an
/// independent namespace addressed from zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// number of coils
    pub coils: u16,
    /// number of discrete inputs
    pub discrete_inputs: u16,
    /// number of holding registers
    pub holding_registers: u16,
    /// number of input registers
    pub input_registers: u16,
}

impl DatabaseConfig {
    /// configuration where all four spaces have the same size
    pub fn uniform(count: u16) -> Self {
        Self {
            coils: count,
            discrete_inputs: count,
            holding_registers: count,
            input_registers: count,
        }
    }
}

/// In-memory data store with the four Modbus address spaces, sized at
/// creation.
///
/// Every operation validates the addressed range against the configured
/// size before touching the store: a count that exceeds the protocol
/// maximum yields `IllegalDataValue` and a range that extends beyond the
/// space yields `IllegalDataAddress`. Multi-value writes are atomic:
/// either every addressed cell is updated or none is.
pub struct Database {
    coils: Vec<bool>,
    discrete_inputs: Vec<bool>,
    holding_registers: Vec<u16>,
    input_registers: Vec<u16>,
}

impl Database {
    /// create a database with all cells initialized to zero / off
    pub fn new(config: DatabaseConfig) -> Self {
        Self {
            coils: vec![false; config.coils as usize],
            discrete_inputs: vec![false; config.discrete_inputs as usize],
            holding_registers: vec![0; config.holding_registers as usize],
            input_registers: vec![0; config.input_registers as usize],
        }
    }

    /// set a coil directly, e.g. to seed the store before serving
    pub fn set_coil(&mut self, address: u16, value: bool) -> Result<(), ExceptionCode> {
        Self::set(&mut self.coils, address, value)
    }

    /// set a discrete input. Discrete inputs are read-only over the wire,
    /// so this is the only way they change.
    pub fn set_discrete_input(&mut self, address: u16, value: bool) -> Result<(), ExceptionCode> {
        Self::set(&mut self.discrete_inputs, address, value)
    }

    /// set a holding register directly
    pub fn set_holding_register(&mut self, address: u16, value: u16) -> Result<(), ExceptionCode> {
        Self::set(&mut self.holding_registers, address, value)
    }

    /// set an input register. Input registers are read-only over the wire,
    /// so this is the only way they change.
    pub fn set_input_register(&mut self, address: u16, value: u16) -> Result<(), ExceptionCode> {
        Self::set(&mut self.input_registers, address, value)
    }

    fn set<T>(slice: &mut [T], address: u16, value: T) -> Result<(), ExceptionCode> {
        match slice.get_mut(address as usize) {
            Some(x) => {
                *x = value;
                Ok(())
            }
            None => Err(ExceptionCode::IllegalDataAddress),
        }
    }

    /// validate the count against the protocol maximum and the range against
    /// the size of the space, in that order
    fn checked_range<'a, T>(
        slice: &'a [T],
        range: AddressRange,
        max_count: u16,
    ) -> Result<&'a [T], ExceptionCode> {
        if range.count > max_count {
            return Err(ExceptionCode::IllegalDataValue);
        }
        slice
            .get(range.to_std_range())
            .ok_or(ExceptionCode::IllegalDataAddress)
    }
}

impl RequestHandler for Database {
    fn read_coils(&self, range: AddressRange) -> Result<&[bool], ExceptionCode> {
        Self::checked_range(&self.coils, range, limits::MAX_READ_COILS_COUNT)
    }

    fn read_discrete_inputs(&self, range: AddressRange) -> Result<&[bool], ExceptionCode> {
        Self::checked_range(&self.discrete_inputs, range, limits::MAX_READ_COILS_COUNT)
    }

    fn read_holding_registers(&self, range: AddressRange) -> Result<&[u16], ExceptionCode> {
        Self::checked_range(&self.holding_registers, range, limits::MAX_READ_REGISTERS_COUNT)
    }

    fn read_input_registers(&self, range: AddressRange) -> Result<&[u16], ExceptionCode> {
        Self::checked_range(&self.input_registers, range, limits::MAX_READ_REGISTERS_COUNT)
    }

    fn write_single_coil(&mut self, value: Indexed<bool>) -> Result<(), ExceptionCode> {
        Self::set(&mut self.coils, value.index, value.value)
    }

    fn write_single_register(&mut self, value: Indexed<u16>) -> Result<(), ExceptionCode> {
        Self::set(&mut self.holding_registers, value.index, value.value)
    }

    fn write_multiple_coils(&mut self, values: WriteCoils) -> Result<(), ExceptionCode> {
        // validate the whole range before mutating anything so that the
        // write is atomic
        Self::checked_range(&self.coils, values.range, limits::MAX_WRITE_COILS_COUNT)?;
        for bit in values.iterator {
            match self.coils.get_mut(bit.index as usize) {
                Some(x) => *x = bit.value,
                None => return Err(ExceptionCode::ServerDeviceFailure),
            }
        }
        Ok(())
    }

    fn write_multiple_registers(&mut self, values: WriteRegisters) -> Result<(), ExceptionCode> {
        Self::checked_range(
            &self.holding_registers,
            values.range,
            limits::MAX_WRITE_REGISTERS_COUNT,
        )?;
        for register in values.iterator {
            match self.holding_registers.get_mut(register.index as usize) {
                Some(x) => *x = register.value,
                None => return Err(ExceptionCode::ServerDeviceFailure),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::cursor::ReadCursor;
    use crate::types::{BitIterator, RegisterIterator};

    fn database() -> Database {
        Database::new(DatabaseConfig::uniform(10))
    }

    fn range(start: u16, count: u16) -> AddressRange {
        AddressRange::try_from(start, count).unwrap()
    }

    fn packed_bits(values: &[bool]) -> Vec<u8> {
        let mut bytes = vec![0u8; (values.len() + 7) / 8];
        for (i, value) in values.iter().enumerate() {
            if *value {
                bytes[i / 8] |= 1 << (i % 8);
            }
        }
        bytes
    }

    fn packed_registers(values: &[u16]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(2 * values.len());
        for value in values {
            bytes.extend_from_slice(&value.to_be_bytes());
        }
        bytes
    }

    #[test]
    fn written_register_reads_back_unchanged() {
        let mut db = database();
        db.write_single_register(Indexed::new(0, 12345)).unwrap();
        assert_eq!(db.read_holding_registers(range(0, 1)).unwrap(), &[12345]);
    }

    #[test]
    fn written_coil_reads_back_unchanged() {
        let mut db = database();
        db.write_single_coil(Indexed::new(0, true)).unwrap();
        assert_eq!(db.read_coils(range(0, 1)).unwrap(), &[true]);
    }

    #[test]
    fn reads_are_idempotent() {
        let mut db = database();
        db.write_single_register(Indexed::new(3, 0xCAFE)).unwrap();
        let first: Vec<u16> = db.read_holding_registers(range(0, 10)).unwrap().to_vec();
        let second: Vec<u16> = db.read_holding_registers(range(0, 10)).unwrap().to_vec();
        assert_eq!(first, second);
    }

    #[test]
    fn read_beyond_the_space_fails_with_illegal_data_address() {
        let db = database();
        assert_eq!(
            db.read_holding_registers(range(5, 6)),
            Err(ExceptionCode::IllegalDataAddress)
        );
        assert_eq!(
            db.read_coils(range(10, 1)),
            Err(ExceptionCode::IllegalDataAddress)
        );
    }

    #[test]
    fn read_count_beyond_protocol_maximum_fails_with_illegal_data_value() {
        let db = database();
        assert_eq!(
            db.read_holding_registers(range(0, 126)),
            Err(ExceptionCode::IllegalDataValue)
        );
        assert_eq!(
            db.read_coils(range(0, 2001)),
            Err(ExceptionCode::IllegalDataValue)
        );
    }

    #[test]
    fn single_write_beyond_the_space_fails_with_illegal_data_address() {
        let mut db = database();
        assert_eq!(
            db.write_single_register(Indexed::new(10, 1)),
            Err(ExceptionCode::IllegalDataAddress)
        );
        assert_eq!(
            db.write_single_coil(Indexed::new(10, true)),
            Err(ExceptionCode::IllegalDataAddress)
        );
    }

    #[test]
    fn multi_register_write_reads_back_unchanged() {
        let mut db = database();
        let values = [0x0102u16, 0x0304, 0x0506];
        let bytes = packed_registers(&values);
        let mut cursor = ReadCursor::new(&bytes);
        let write_range = range(2, 3);
        let iterator = RegisterIterator::parse_all(write_range, &mut cursor).unwrap();

        db.write_multiple_registers(WriteRegisters::new(write_range, iterator))
            .unwrap();
        assert_eq!(db.read_holding_registers(write_range).unwrap(), &values);
    }

    #[test]
    fn multi_coil_write_reads_back_unchanged() {
        let mut db = database();
        let values = [true, false, true, true];
        let bytes = packed_bits(&values);
        let mut cursor = ReadCursor::new(&bytes);
        let write_range = range(4, 4);
        let iterator = BitIterator::parse_all(write_range, &mut cursor).unwrap();

        db.write_multiple_coils(WriteCoils::new(write_range, iterator))
            .unwrap();
        assert_eq!(db.read_coils(write_range).unwrap(), &values);
    }

    #[test]
    fn multi_write_count_beyond_protocol_maximum_fails_with_illegal_data_value() {
        let mut db = database();
        let values = vec![0u16; 124]; // write maximum is 123 registers
        let bytes = packed_registers(&values);
        let mut cursor = ReadCursor::new(&bytes);
        let write_range = range(0, 124);
        let iterator = RegisterIterator::parse_all(write_range, &mut cursor).unwrap();

        assert_eq!(
            db.write_multiple_registers(WriteRegisters::new(write_range, iterator)),
            Err(ExceptionCode::IllegalDataValue)
        );
    }

    #[test]
    fn out_of_range_multi_write_never_partially_mutates_the_store() {
        let mut db = database();
        let values = [1u16, 2, 3, 4, 5, 6];
        let bytes = packed_registers(&values);
        let mut cursor = ReadCursor::new(&bytes);
        // 5..11 extends one register beyond the 10-register space
        let write_range = range(5, 6);
        let iterator = RegisterIterator::parse_all(write_range, &mut cursor).unwrap();

        assert_eq!(
            db.write_multiple_registers(WriteRegisters::new(write_range, iterator)),
            Err(ExceptionCode::IllegalDataAddress)
        );
        assert_eq!(
            db.read_holding_registers(range(0, 10)).unwrap(),
            &[0u16; 10]
        );
    }

    #[test]
    fn seeded_input_spaces_are_readable() {
        let mut db = database();
        db.set_input_register(0, 0xCAFE).unwrap();
        db.set_discrete_input(1, true).unwrap();

        assert_eq!(
            db.read_input_registers(range(0, 2)).unwrap(),
            &[0xCAFE, 0x0000]
        );
        assert_eq!(
            db.read_discrete_inputs(range(0, 2)).unwrap(),
            &[false, true]
        );
        assert_eq!(
            db.set_input_register(10, 1),
            Err(ExceptionCode::IllegalDataAddress)
        );
    }
}
