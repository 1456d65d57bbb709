use crate::common::bits::num_bytes_for_bits;
use crate::common::cursor::ReadCursor;
use crate::error::{AduParseError, InvalidRequest, RequestError};

/// Modbus unit identifier, a type-safe wrapper around `u8`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct UnitId {
    /// underlying raw value
    pub value: u8,
}

impl UnitId {
    /// Create a new UnitId
    pub fn new(value: u8) -> Self {
        Self { value }
    }
}

/// Create the default UnitId of `0xFF`, conventionally used when the
/// sub-device addressing of a gateway is not needed
impl Default for UnitId {
    fn default() -> Self {
        Self { value: 0xFF }
    }
}

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#04X}", self.value)
    }
}

/// Start and count tuple used when making various requests.
/// Cannot be constructed with an invalid start/count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressRange {
    /// Starting address of the range
    pub start: u16,
    /// Count of elements in the range
    pub count: u16,
}

impl AddressRange {
    /// Create a new address range, validating that the count is non-zero and
    /// that `start + count` does not overflow the u16 address space
    pub fn try_from(start: u16, count: u16) -> Result<Self, InvalidRequest> {
        if count == 0 {
            return Err(InvalidRequest::CountOfZero);
        }

        let max_start = u16::MAX - (count - 1);
        if start > max_start {
            return Err(InvalidRequest::AddressOverflow(start, count));
        }

        Ok(Self { start, count })
    }

    /// Convert to a `std::ops::Range` suitable for slice indexing
    pub fn to_std_range(self) -> std::ops::Range<usize> {
        let start = self.start as usize;
        start..start + (self.count as usize)
    }

    pub(crate) fn parse(cursor: &mut ReadCursor) -> Result<Self, RequestError> {
        let start = cursor.read_u16_be()?;
        let count = cursor.read_u16_be()?;
        Ok(Self::try_from(start, count)?)
    }

    pub(crate) fn of_read_bits(self) -> Result<ReadBitsRange, InvalidRequest> {
        Ok(ReadBitsRange {
            inner: self.limited_count(crate::constants::limits::MAX_READ_COILS_COUNT)?,
        })
    }

    pub(crate) fn of_read_registers(self) -> Result<ReadRegistersRange, InvalidRequest> {
        Ok(ReadRegistersRange {
            inner: self.limited_count(crate::constants::limits::MAX_READ_REGISTERS_COUNT)?,
        })
    }

    fn limited_count(self, limit: u16) -> Result<Self, InvalidRequest> {
        if self.count > limit {
            return Err(InvalidRequest::CountTooLargeForType(self.count, limit));
        }
        Ok(self)
    }
}

impl std::fmt::Display for AddressRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "start: {:#06X} qty: {}", self.start, self.count)
    }
}

/// Specialized wrapper around an `AddressRange` only valid for
/// ReadCoils / ReadDiscreteInputs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ReadBitsRange {
    pub(crate) inner: AddressRange,
}

impl ReadBitsRange {
    pub(crate) fn get(self) -> AddressRange {
        self.inner
    }
}

/// Specialized wrapper around an `AddressRange` only valid for
/// ReadHoldingRegisters / ReadInputRegisters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ReadRegistersRange {
    pub(crate) inner: AddressRange,
}

impl ReadRegistersRange {
    pub(crate) fn get(self) -> AddressRange {
        self.inner
    }
}

/// Value and its address
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Indexed<T> {
    /// Address of the value
    pub index: u16,
    /// Associated value
    pub value: T,
}

impl<T> Indexed<T> {
    /// Create a new indexed value
    pub fn new(index: u16, value: T) -> Self {
        Indexed { index, value }
    }
}

impl<T> From<(u16, T)> for Indexed<T>
where
    T: Copy,
{
    fn from(tuple: (u16, T)) -> Self {
        let (index, value) = tuple;
        Self::new(index, value)
    }
}

impl std::fmt::Display for Indexed<bool> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "idx: {:#06X} value: {}", self.index, self.value as i32)
    }
}

impl std::fmt::Display for Indexed<u16> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "idx: {:#06X} value: {:#06X}", self.index, self.value)
    }
}

/// Collection of values and a starting address used when writing multiple
/// coils or registers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteMultiple<T> {
    /// address range of the values
    pub(crate) range: AddressRange,
    /// values to write
    pub(crate) values: Vec<T>,
}

impl<T> WriteMultiple<T> {
    /// Create a validated collection of values starting at the provided address
    pub fn from(start: u16, values: Vec<T>) -> Result<Self, InvalidRequest> {
        let count = match u16::try_from(values.len()) {
            Ok(count) => count,
            Err(_) => return Err(InvalidRequest::CountTooBigForU16(values.len())),
        };
        let range = AddressRange::try_from(start, count)?;
        Ok(Self { range, values })
    }

    /// The range of addresses covered by the values
    pub fn range(&self) -> AddressRange {
        self.range
    }

    pub(crate) fn limited_to(self, max: u16) -> Result<Self, InvalidRequest> {
        if self.range.count > max {
            return Err(InvalidRequest::CountTooLargeForType(self.range.count, max));
        }
        Ok(self)
    }
}

/// Zero-copy type used to iterate over a collection of bits
#[derive(Clone, Copy, Debug)]
pub struct BitIterator<'a> {
    bytes: &'a [u8],
    range: AddressRange,
    pos: u16,
}

impl<'a> BitIterator<'a> {
    pub(crate) fn parse_all(
        range: AddressRange,
        cursor: &mut ReadCursor<'a>,
    ) -> Result<Self, RequestError> {
        let bytes = cursor.read_bytes(num_bytes_for_bits(range.count))?;
        cursor.expect_empty()?;
        Ok(Self {
            bytes,
            range,
            pos: 0,
        })
    }
}

impl Iterator for BitIterator<'_> {
    type Item = Indexed<bool>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos == self.range.count {
            return None;
        }
        let byte = self.pos / 8;
        let bit = (self.pos % 8) as u8;

        match self.bytes.get(byte as usize) {
            Some(value) => {
                let bit = (*value & (1 << bit)) != 0;
                let address = self.range.start + self.pos;
                self.pos += 1;
                Some(Indexed::new(address, bit))
            }
            None => None,
        }
    }

    // implementing this allows collect to optimize the vector capacity
    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.range.count - self.pos) as usize;
        (remaining, Some(remaining))
    }
}

/// Zero-copy type used to iterate over a collection of registers
#[derive(Clone, Copy, Debug)]
pub struct RegisterIterator<'a> {
    bytes: &'a [u8],
    range: AddressRange,
    pos: u16,
}

impl<'a> RegisterIterator<'a> {
    pub(crate) fn parse_all(
        range: AddressRange,
        cursor: &mut ReadCursor<'a>,
    ) -> Result<Self, RequestError> {
        let bytes = cursor.read_bytes(2 * (range.count as usize))?;
        cursor.expect_empty()?;
        Ok(Self {
            bytes,
            range,
            pos: 0,
        })
    }
}

impl Iterator for RegisterIterator<'_> {
    type Item = Indexed<u16>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos == self.range.count {
            return None;
        }

        let pos = 2 * (self.pos as usize);
        match self.bytes.get(pos..pos + 2) {
            Some([high, low]) => {
                let value = ((*high as u16) << 8) | *low as u16;
                let index = self.pos + self.range.start;
                self.pos += 1;
                Some(Indexed::new(index, value))
            }
            _ => None,
        }
    }

    // implementing this allows collect to optimize the vector capacity
    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.range.count - self.pos) as usize;
        (remaining, Some(remaining))
    }
}

pub(crate) fn coil_from_u16(value: u16) -> Result<bool, AduParseError> {
    match value {
        crate::constants::coil::ON => Ok(true),
        crate::constants::coil::OFF => Ok(false),
        _ => Err(AduParseError::UnknownCoilState(value)),
    }
}

pub(crate) fn coil_to_u16(value: bool) -> u16 {
    if value {
        crate::constants::coil::ON
    } else {
        crate::constants::coil::OFF
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::*;

    #[test]
    fn address_start_max_count_of_one_is_allowed() {
        AddressRange::try_from(u16::MAX, 1).unwrap();
    }

    #[test]
    fn address_maximum_range_is_ok() {
        AddressRange::try_from(0, 0xFFFF).unwrap();
    }

    #[test]
    fn address_count_zero_fails_validation() {
        assert_eq!(AddressRange::try_from(0, 0), Err(InvalidRequest::CountOfZero));
    }

    #[test]
    fn start_max_count_of_two_overflows() {
        assert_eq!(
            AddressRange::try_from(u16::MAX, 2),
            Err(InvalidRequest::AddressOverflow(u16::MAX, 2))
        );
    }

    #[test]
    fn read_bits_range_rejects_count_beyond_protocol_maximum() {
        assert_eq!(
            AddressRange::try_from(0, 2001).unwrap().of_read_bits(),
            Err(InvalidRequest::CountTooLargeForType(2001, 2000))
        );
    }

    #[test]
    fn read_registers_range_rejects_count_beyond_protocol_maximum() {
        assert_eq!(
            AddressRange::try_from(0, 126).unwrap().of_read_registers(),
            Err(InvalidRequest::CountTooLargeForType(126, 125))
        );
    }

    #[test]
    fn write_multiple_rejects_empty_values() {
        assert_eq!(
            WriteMultiple::<u16>::from(0, vec![]),
            Err(InvalidRequest::CountOfZero)
        );
    }

    #[test]
    fn write_multiple_rejects_address_overflow() {
        assert_eq!(
            WriteMultiple::from(u16::MAX, vec![true, false]),
            Err(InvalidRequest::AddressOverflow(u16::MAX, 2))
        );
    }

    #[test]
    fn correctly_iterates_over_low_order_bits() {
        let mut cursor = ReadCursor::new(&[0x03]);
        let iterator =
            BitIterator::parse_all(AddressRange::try_from(1, 3).unwrap(), &mut cursor).unwrap();
        assert_eq!(iterator.size_hint(), (3, Some(3)));
        let values: Vec<Indexed<bool>> = iterator.collect();
        assert_eq!(
            values,
            vec![
                Indexed::new(1, true),
                Indexed::new(2, true),
                Indexed::new(3, false)
            ]
        );
    }

    #[test]
    fn correctly_iterates_over_registers() {
        let mut cursor = ReadCursor::new(&[0xFF, 0xFF, 0x01, 0xCC]);
        let iterator =
            RegisterIterator::parse_all(AddressRange::try_from(1, 2).unwrap(), &mut cursor)
                .unwrap();

        assert_eq!(iterator.size_hint(), (2, Some(2)));
        let values: Vec<Indexed<u16>> = iterator.collect();
        assert_eq!(values, vec![Indexed::new(1, 0xFFFF), Indexed::new(2, 0x01CC)]);
    }

    #[test]
    fn coil_state_round_trips_and_rejects_garbage() {
        assert_eq!(coil_from_u16(coil_to_u16(true)), Ok(true));
        assert_eq!(coil_from_u16(coil_to_u16(false)), Ok(false));
        assert_eq!(
            coil_from_u16(0x1234),
            Err(AduParseError::UnknownCoilState(0x1234))
        );
    }
}
