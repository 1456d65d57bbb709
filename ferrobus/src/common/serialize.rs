use crate::common::bits::{num_bytes_for_bits, pack_bits};
use crate::common::cursor::{ReadCursor, WriteCursor};
use crate::common::traits::{Parse, Serialize};
use crate::error::{InternalError, RequestError};
use crate::exception::ExceptionCode;
use crate::types::{coil_from_u16, coil_to_u16, AddressRange, Indexed, WriteMultiple};

impl Serialize for AddressRange {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        cursor.write_u16_be(self.start)?;
        cursor.write_u16_be(self.count)?;
        Ok(())
    }
}

impl Parse for AddressRange {
    fn parse(cursor: &mut ReadCursor) -> Result<Self, RequestError> {
        AddressRange::parse(cursor)
    }
}

impl Serialize for Indexed<bool> {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        cursor.write_u16_be(self.index)?;
        cursor.write_u16_be(coil_to_u16(self.value))?;
        Ok(())
    }
}

impl Parse for Indexed<bool> {
    fn parse(cursor: &mut ReadCursor) -> Result<Self, RequestError> {
        let index = cursor.read_u16_be()?;
        let value = coil_from_u16(cursor.read_u16_be()?)?;
        Ok(Indexed::new(index, value))
    }
}

impl Serialize for Indexed<u16> {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        cursor.write_u16_be(self.index)?;
        cursor.write_u16_be(self.value)?;
        Ok(())
    }
}

impl Parse for Indexed<u16> {
    fn parse(cursor: &mut ReadCursor) -> Result<Self, RequestError> {
        Ok(Indexed::new(cursor.read_u16_be()?, cursor.read_u16_be()?))
    }
}

impl Serialize for ExceptionCode {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        cursor.write_u8((*self).into())?;
        Ok(())
    }
}

pub(crate) fn byte_count(count: usize) -> Result<u8, InternalError> {
    u8::try_from(count).map_err(|_| InternalError::BadByteCount(count))
}

impl Serialize for WriteMultiple<bool> {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        self.range.serialize(cursor)?;
        cursor.write_u8(byte_count(num_bytes_for_bits(self.range.count))?)?;
        pack_bits(cursor, self.values.iter().copied())?;
        Ok(())
    }
}

impl Serialize for WriteMultiple<u16> {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        self.range.serialize(cursor)?;
        cursor.write_u8(byte_count(2 * self.values.len())?)?;
        for value in &self.values {
            cursor.write_u16_be(*value)?;
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
    fn serializes_address_range() {
        let range = AddressRange::try_from(0x0102, 0x0304).unwrap();
        assert_eq!(serialize_to_vec(&range), &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn serializes_single_coil_with_on_off_encoding() {
        assert_eq!(
            serialize_to_vec(&Indexed::new(0x0001, true)),
            &[0x00, 0x01, 0xFF, 0x00]
        );
        assert_eq!(
            serialize_to_vec(&Indexed::new(0x0001, false)),
            &[0x00, 0x01, 0x00, 0x00]
        );
    }

    #[test]
    fn serializes_multiple_coils_packed_into_bytes() {
        let request = WriteMultiple::from(1, vec![true, false, true, true]).unwrap();
        assert_eq!(
            serialize_to_vec(&request),
            &[0x00, 0x01, 0x00, 0x04, 0x01, 0x0D]
        );
    }

    #[test]
    fn serializes_multiple_registers() {
        let request = WriteMultiple::<u16>::from(1, vec![0xCAFE, 0xBBDD]).unwrap();
        assert_eq!(
            serialize_to_vec(&request),
            &[0x00, 0x01, 0x00, 0x02, 0x04, 0xCA, 0xFE, 0xBB, 0xDD]
        );
    }

    #[test]
    fn parses_single_coil_rejecting_bad_state() {
        let mut cursor = ReadCursor::new(&[0x00, 0x01, 0xFF, 0x00]);
        assert_eq!(
            Indexed::<bool>::parse(&mut cursor).unwrap(),
            Indexed::new(1, true)
        );

        let mut cursor = ReadCursor::new(&[0x00, 0x01, 0xAB, 0xCD]);
        assert_eq!(
            Indexed::<bool>::parse(&mut cursor),
            Err(RequestError::BadResponse(
                crate::error::AduParseError::UnknownCoilState(0xABCD)
            ))
        );
    }
}
