use crate::common::cursor::ReadCursor;
use crate::common::frame::FrameHeader;
use crate::common::function::FunctionCode;
use crate::common::traits::{Parse, Serialize};
use crate::decode::DecodeLevel;
use crate::error::RequestError;
use crate::exception::ExceptionCode;
use crate::server::handler::{RequestHandler, ServerHandlerType};
use crate::server::response::{BitWriter, RegisterWriter};
use crate::server::types::{WriteCoils, WriteRegisters};
use crate::tcp::frame::MbapFormatter;
use crate::types::{
    AddressRange, BitIterator, Indexed, ReadBitsRange, ReadRegistersRange, RegisterIterator,
};

/// A request PDU decoded by the server. The write-multiple variants borrow
/// the values from the frame payload.
#[derive(Debug)]
pub(crate) enum Request<'a> {
    ReadCoils(ReadBitsRange),
    ReadDiscreteInputs(ReadBitsRange),
    ReadHoldingRegisters(ReadRegistersRange),
    ReadInputRegisters(ReadRegistersRange),
    WriteSingleCoil(Indexed<bool>),
    WriteSingleRegister(Indexed<u16>),
    WriteMultipleCoils(WriteCoils<'a>),
    WriteMultipleRegisters(WriteRegisters<'a>),
}

impl<'a> Request<'a> {
    pub(crate) fn get_function(&self) -> FunctionCode {
        match self {
            Request::ReadCoils(_) => FunctionCode::ReadCoils,
            Request::ReadDiscreteInputs(_) => FunctionCode::ReadDiscreteInputs,
            Request::ReadHoldingRegisters(_) => FunctionCode::ReadHoldingRegisters,
            Request::ReadInputRegisters(_) => FunctionCode::ReadInputRegisters,
            Request::WriteSingleCoil(_) => FunctionCode::WriteSingleCoil,
            Request::WriteSingleRegister(_) => FunctionCode::WriteSingleRegister,
            Request::WriteMultipleCoils(_) => FunctionCode::WriteMultipleCoils,
            Request::WriteMultipleRegisters(_) => FunctionCode::WriteMultipleRegisters,
        }
    }

    pub(crate) fn parse(
        function: FunctionCode,
        cursor: &mut ReadCursor<'a>,
    ) -> Result<Self, RequestError> {
        match function {
            FunctionCode::ReadCoils => {
                let x = Request::ReadCoils(AddressRange::parse(cursor)?.of_read_bits()?);
                cursor.expect_empty()?;
                Ok(x)
            }
            FunctionCode::ReadDiscreteInputs => {
                let x = Request::ReadDiscreteInputs(AddressRange::parse(cursor)?.of_read_bits()?);
                cursor.expect_empty()?;
                Ok(x)
            }
            FunctionCode::ReadHoldingRegisters => {
                let x =
                    Request::ReadHoldingRegisters(AddressRange::parse(cursor)?.of_read_registers()?);
                cursor.expect_empty()?;
                Ok(x)
            }
            FunctionCode::ReadInputRegisters => {
                let x =
                    Request::ReadInputRegisters(AddressRange::parse(cursor)?.of_read_registers()?);
                cursor.expect_empty()?;
                Ok(x)
            }
            FunctionCode::WriteSingleCoil => {
                let x = Request::WriteSingleCoil(Indexed::<bool>::parse(cursor)?);
                cursor.expect_empty()?;
                Ok(x)
            }
            FunctionCode::WriteSingleRegister => {
                let x = Request::WriteSingleRegister(Indexed::<u16>::parse(cursor)?);
                cursor.expect_empty()?;
                Ok(x)
            }
            FunctionCode::WriteMultipleCoils => {
                let range = AddressRange::parse(cursor)?;
                // don't care about the byte count, validated b/c all bytes are consumed
                cursor.read_u8()?;
                Ok(Request::WriteMultipleCoils(WriteCoils::new(
                    range,
                    BitIterator::parse_all(range, cursor)?,
                )))
            }
            FunctionCode::WriteMultipleRegisters => {
                let range = AddressRange::parse(cursor)?;
                // don't care about the byte count, validated b/c all bytes are consumed
                cursor.read_u8()?;
                Ok(Request::WriteMultipleRegisters(WriteRegisters::new(
                    range,
                    RegisterIterator::parse_all(range, cursor)?,
                )))
            }
        }
    }

    /// Dispatch the request to the handler and serialize either a normal
    /// response or an exception response, preserving the original header
    pub(crate) fn get_reply<'b, T: RequestHandler>(
        &self,
        header: FrameHeader,
        handler: &ServerHandlerType<T>,
        writer: &'b mut MbapFormatter,
        decode: DecodeLevel,
    ) -> Result<&'b [u8], RequestError> {
        let function = self.get_function();
        match self {
            Request::ReadCoils(range) => {
                let guard = handler.read().unwrap();
                let result = guard.read_coils(range.get()).map(BitWriter::new);
                write_result(function, header, writer, result, decode)
            }
            Request::ReadDiscreteInputs(range) => {
                let guard = handler.read().unwrap();
                let result = guard.read_discrete_inputs(range.get()).map(BitWriter::new);
                write_result(function, header, writer, result, decode)
            }
            Request::ReadHoldingRegisters(range) => {
                let guard = handler.read().unwrap();
                let result = guard
                    .read_holding_registers(range.get())
                    .map(RegisterWriter::new);
                write_result(function, header, writer, result, decode)
            }
            Request::ReadInputRegisters(range) => {
                let guard = handler.read().unwrap();
                let result = guard
                    .read_input_registers(range.get())
                    .map(RegisterWriter::new);
                write_result(function, header, writer, result, decode)
            }
            Request::WriteSingleCoil(request) => {
                let result = handler
                    .write()
                    .unwrap()
                    .write_single_coil(*request)
                    .map(|_| *request);
                write_result(function, header, writer, result, decode)
            }
            Request::WriteSingleRegister(request) => {
                let result = handler
                    .write()
                    .unwrap()
                    .write_single_register(*request)
                    .map(|_| *request);
                write_result(function, header, writer, result, decode)
            }
            Request::WriteMultipleCoils(items) => {
                let result = handler
                    .write()
                    .unwrap()
                    .write_multiple_coils(*items)
                    .map(|_| items.range);
                write_result(function, header, writer, result, decode)
            }
            Request::WriteMultipleRegisters(items) => {
                let result = handler
                    .write()
                    .unwrap()
                    .write_multiple_registers(*items)
                    .map(|_| items.range);
                write_result(function, header, writer, result, decode)
            }
        }
    }
}

fn write_result<'b, T>(
    function: FunctionCode,
    header: FrameHeader,
    writer: &'b mut MbapFormatter,
    result: Result<T, ExceptionCode>,
    decode: DecodeLevel,
) -> Result<&'b [u8], RequestError>
where
    T: Serialize,
{
    match result {
        Ok(response) => writer.format(header, function.get_value(), &response, decode.adu),
        Err(ex) => {
            if decode.pdu.enabled() {
                tracing::warn!("PDU TX - Modbus exception {:?} ({:#04X})", ex, u8::from(ex));
            }
            writer.format(header, function.as_error(), &ex, decode.adu)
        }
    }
}

#[cfg(test)]
mod tests {
    mod coils {
        use super::super::*;
        use crate::error::AduParseError;

        #[test]
        fn fails_when_too_few_bytes_for_coil_byte_count() {
            let mut cursor = ReadCursor::new(&[0x00, 0x01, 0x00, 0x08, 0x00]);
            let err = Request::parse(FunctionCode::WriteMultipleCoils, &mut cursor)
                .err()
                .unwrap();
            assert_eq!(err, AduParseError::InsufficientBytes.into());
        }

        #[test]
        fn fails_when_specified_byte_count_not_present() {
            let mut cursor = ReadCursor::new(&[0x00, 0x01, 0x00, 0x08, 0x01]);
            let err = Request::parse(FunctionCode::WriteMultipleCoils, &mut cursor)
                .err()
                .unwrap();
            assert_eq!(err, AduParseError::InsufficientBytes.into());
        }

        #[test]
        fn fails_when_too_many_bytes_present() {
            let mut cursor = ReadCursor::new(&[0x00, 0x01, 0x00, 0x08, 0x01, 0xFF, 0xFF]);
            let err = Request::parse(FunctionCode::WriteMultipleCoils, &mut cursor)
                .err()
                .unwrap();
            assert_eq!(err, AduParseError::TrailingBytes(1).into());
        }

        #[test]
        fn fails_when_count_is_zero() {
            let mut cursor = ReadCursor::new(&[0x00, 0x01, 0x00, 0x00, 0x00]);
            let err = Request::parse(FunctionCode::WriteMultipleCoils, &mut cursor)
                .err()
                .unwrap();
            assert_eq!(err, crate::error::InvalidRequest::CountOfZero.into());
        }

        #[test]
        fn can_parse_coils() {
            let mut cursor = ReadCursor::new(&[0x00, 0x01, 0x00, 0x03, 0x01, 0x05]);
            let coils = match Request::parse(FunctionCode::WriteMultipleCoils, &mut cursor).unwrap()
            {
                Request::WriteMultipleCoils(write) => write,
                _ => panic!("bad match"),
            };

            assert_eq!(coils.range, AddressRange::try_from(1, 3).unwrap());
            assert_eq!(
                coils.iterator.collect::<Vec<Indexed<bool>>>(),
                vec![
                    Indexed::new(1, true),
                    Indexed::new(2, false),
                    Indexed::new(3, true)
                ]
            )
        }
    }

    mod registers {
        use super::super::*;
        use crate::error::AduParseError;

        #[test]
        fn fails_when_too_few_bytes_for_register_byte_count() {
            let mut cursor = ReadCursor::new(&[0x00, 0x01, 0x00, 0x01, 0x00]);
            let err = Request::parse(FunctionCode::WriteMultipleRegisters, &mut cursor)
                .err()
                .unwrap();
            assert_eq!(err, AduParseError::InsufficientBytes.into());
        }

        #[test]
        fn fails_when_specified_byte_count_not_present() {
            let mut cursor = ReadCursor::new(&[0x00, 0x01, 0x00, 0x01, 0x02, 0xFF]);
            let err = Request::parse(FunctionCode::WriteMultipleRegisters, &mut cursor)
                .err()
                .unwrap();
            assert_eq!(err, AduParseError::InsufficientBytes.into());
        }

        #[test]
        fn fails_when_too_many_bytes_present() {
            let mut cursor = ReadCursor::new(&[0x00, 0x01, 0x00, 0x01, 0x02, 0xFF, 0xFF, 0xFF]);
            let err = Request::parse(FunctionCode::WriteMultipleRegisters, &mut cursor)
                .err()
                .unwrap();
            assert_eq!(err, AduParseError::TrailingBytes(1).into());
        }

        #[test]
        fn can_parse_registers() {
            let mut cursor =
                ReadCursor::new(&[0x00, 0x01, 0x00, 0x02, 0x04, 0xCA, 0xFE, 0xBB, 0xDD]);
            let registers =
                match Request::parse(FunctionCode::WriteMultipleRegisters, &mut cursor).unwrap() {
                    Request::WriteMultipleRegisters(write) => write,
                    _ => panic!("bad match"),
                };

            assert_eq!(registers.range, AddressRange::try_from(1, 2).unwrap());
            assert_eq!(
                registers.iterator.collect::<Vec<Indexed<u16>>>(),
                vec![Indexed::new(1, 0xCAFE), Indexed::new(2, 0xBBDD)]
            )
        }
    }

    mod reads {
        use super::super::*;
        use crate::error::InvalidRequest;

        #[test]
        fn can_parse_read_holding_registers() {
            let mut cursor = ReadCursor::new(&[0x00, 0x07, 0x00, 0x02]);
            let range = match Request::parse(FunctionCode::ReadHoldingRegisters, &mut cursor)
                .unwrap()
            {
                Request::ReadHoldingRegisters(range) => range,
                _ => panic!("bad match"),
            };
            assert_eq!(range.get(), AddressRange::try_from(7, 2).unwrap());
        }

        #[test]
        fn fails_when_count_exceeds_protocol_maximum() {
            let mut cursor = ReadCursor::new(&[0x00, 0x00, 0x00, 0x7E]);
            let err = Request::parse(FunctionCode::ReadHoldingRegisters, &mut cursor)
                .err()
                .unwrap();
            assert_eq!(err, InvalidRequest::CountTooLargeForType(126, 125).into());
        }
    }
}
