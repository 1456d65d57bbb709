use std::time::Duration;

use tokio::sync::oneshot;

use crate::client::requests::read_bits::ReadBits;
use crate::client::requests::read_registers::ReadRegisters;
use crate::client::requests::write_multiple::MultipleWrite;
use crate::client::requests::write_single::SingleWrite;
use crate::common::cursor::{ReadCursor, WriteCursor};
use crate::common::function::FunctionCode;
use crate::common::traits::Serialize;
use crate::error::{AduParseError, RequestError};
use crate::exception::ExceptionCode;
use crate::types::UnitId;

/// All of the information the channel task needs to process a request
pub(crate) struct Request {
    pub(crate) id: UnitId,
    pub(crate) timeout: Duration,
    pub(crate) details: RequestDetails,
}

impl Request {
    pub(crate) fn new(id: UnitId, timeout: Duration, details: RequestDetails) -> Self {
        Self {
            id,
            timeout,
            details,
        }
    }

    pub(crate) fn fail(self, err: RequestError) {
        self.details.fail(err)
    }

    /// Complete the request from a response PDU, validating the echoed
    /// function code and decoding exception responses
    pub(crate) fn handle_response(self, payload: &[u8]) {
        let function = self.details.function();
        let mut cursor = ReadCursor::new(payload);

        let received = match cursor.read_u8() {
            Ok(value) => value,
            Err(err) => return self.details.fail(err.into()),
        };

        if received == function.get_value() {
            return self.details.process_response(&mut cursor);
        }

        let err = if received == function.as_error() {
            match cursor.read_u8() {
                Ok(code) => RequestError::Exception(ExceptionCode::from(code)),
                Err(err) => err.into(),
            }
        } else {
            AduParseError::UnknownResponseFunction(
                received,
                function.get_value(),
                function.as_error(),
            )
            .into()
        };

        self.details.fail(err)
    }
}

/// Request bodies paired with the promise that completes the caller
pub(crate) enum RequestDetails {
    ReadCoils(ReadBits),
    ReadDiscreteInputs(ReadBits),
    ReadHoldingRegisters(ReadRegisters),
    ReadInputRegisters(ReadRegisters),
    WriteSingleCoil(SingleWrite<bool>),
    WriteSingleRegister(SingleWrite<u16>),
    WriteMultipleCoils(MultipleWrite<bool>),
    WriteMultipleRegisters(MultipleWrite<u16>),
}

impl RequestDetails {
    pub(crate) fn function(&self) -> FunctionCode {
        match self {
            RequestDetails::ReadCoils(_) => FunctionCode::ReadCoils,
            RequestDetails::ReadDiscreteInputs(_) => FunctionCode::ReadDiscreteInputs,
            RequestDetails::ReadHoldingRegisters(_) => FunctionCode::ReadHoldingRegisters,
            RequestDetails::ReadInputRegisters(_) => FunctionCode::ReadInputRegisters,
            RequestDetails::WriteSingleCoil(_) => FunctionCode::WriteSingleCoil,
            RequestDetails::WriteSingleRegister(_) => FunctionCode::WriteSingleRegister,
            RequestDetails::WriteMultipleCoils(_) => FunctionCode::WriteMultipleCoils,
            RequestDetails::WriteMultipleRegisters(_) => FunctionCode::WriteMultipleRegisters,
        }
    }

    pub(crate) fn fail(self, err: RequestError) {
        match self {
            RequestDetails::ReadCoils(x) => x.failure(err),
            RequestDetails::ReadDiscreteInputs(x) => x.failure(err),
            RequestDetails::ReadHoldingRegisters(x) => x.failure(err),
            RequestDetails::ReadInputRegisters(x) => x.failure(err),
            RequestDetails::WriteSingleCoil(x) => x.failure(err),
            RequestDetails::WriteSingleRegister(x) => x.failure(err),
            RequestDetails::WriteMultipleCoils(x) => x.failure(err),
            RequestDetails::WriteMultipleRegisters(x) => x.failure(err),
        }
    }

    fn process_response(self, cursor: &mut ReadCursor) {
        match self {
            RequestDetails::ReadCoils(x) => x.handle_response(cursor),
            RequestDetails::ReadDiscreteInputs(x) => x.handle_response(cursor),
            RequestDetails::ReadHoldingRegisters(x) => x.handle_response(cursor),
            RequestDetails::ReadInputRegisters(x) => x.handle_response(cursor),
            RequestDetails::WriteSingleCoil(x) => x.handle_response(cursor),
            RequestDetails::WriteSingleRegister(x) => x.handle_response(cursor),
            RequestDetails::WriteMultipleCoils(x) => x.handle_response(cursor),
            RequestDetails::WriteMultipleRegisters(x) => x.handle_response(cursor),
        }
    }
}

impl Serialize for RequestDetails {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        match self {
            RequestDetails::ReadCoils(x) => x.serialize(cursor),
            RequestDetails::ReadDiscreteInputs(x) => x.serialize(cursor),
            RequestDetails::ReadHoldingRegisters(x) => x.serialize(cursor),
            RequestDetails::ReadInputRegisters(x) => x.serialize(cursor),
            RequestDetails::WriteSingleCoil(x) => x.serialize(cursor),
            RequestDetails::WriteSingleRegister(x) => x.serialize(cursor),
            RequestDetails::WriteMultipleCoils(x) => x.serialize(cursor),
            RequestDetails::WriteMultipleRegisters(x) => x.serialize(cursor),
        }
    }
}

/// How a completed request is delivered back to the caller
pub(crate) enum Promise<T> {
    Channel(oneshot::Sender<Result<T, RequestError>>),
}

impl<T> Promise<T> {
    pub(crate) fn failure(self, err: RequestError) {
        self.complete(Err(err))
    }

    pub(crate) fn complete(self, result: Result<T, RequestError>) {
        match self {
            Promise::Channel(sender) => {
                sender.send(result).ok();
            }
        }
    }
}
