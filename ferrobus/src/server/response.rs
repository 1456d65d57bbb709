use crate::common::bits::{num_bytes_for_bits, pack_bits};
use crate::common::cursor::WriteCursor;
use crate::common::serialize::byte_count;
use crate::common::traits::Serialize;
use crate::error::RequestError;

/// Response body of a read coils / read discrete inputs request, borrowing
/// the values from the handler
pub(crate) struct BitWriter<'a> {
    bits: &'a [bool],
}

impl<'a> BitWriter<'a> {
    pub(crate) fn new(bits: &'a [bool]) -> Self {
        Self { bits }
    }
}

impl Serialize for BitWriter<'_> {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        cursor.write_u8(byte_count(num_bytes_for_bits(self.bits.len() as u16))?)?;
        pack_bits(cursor, self.bits.iter().copied())?;
        Ok(())
    }
}

/// Response body of a read holding / input registers request, borrowing
/// the values from the handler
pub(crate) struct RegisterWriter<'a> {
    registers: &'a [u16],
}

impl<'a> RegisterWriter<'a> {
    pub(crate) fn new(registers: &'a [u16]) -> Self {
        Self { registers }
    }
}

impl Serialize for RegisterWriter<'_> {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        cursor.write_u8(byte_count(2 * self.registers.len())?)?;
        for register in self.registers {
            cursor.write_u16_be(*register)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serialize_to_vec(msg: &dyn Serialize) -> Vec<u8> {
        let mut buffer = [0u8; 256];
        let mut cursor = WriteCursor::new(&mut buffer);
        msg.serialize(&mut cursor).unwrap();
        let length = cursor.position();
        buffer[..length].to_vec()
    }

    #[test]
    fn bit_responses_pack_eight_values_per_byte() {
        let bits = [true, false, true, true, false, false, false, false, true];
        assert_eq!(serialize_to_vec(&BitWriter::new(&bits)), &[0x02, 0x0D, 0x01]);
    }

    #[test]
    fn register_responses_carry_two_bytes_per_value() {
        let registers = [0xCAFE, 0x0001];
        assert_eq!(
            serialize_to_vec(&RegisterWriter::new(&registers)),
            &[0x04, 0xCA, 0xFE, 0x00, 0x01]
        );
    }
}
