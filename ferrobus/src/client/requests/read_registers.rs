use crate::client::message::Promise;
use crate::common::cursor::{ReadCursor, WriteCursor};
use crate::common::traits::Serialize;
use crate::error::RequestError;
use crate::types::{AddressRange, Indexed, ReadRegistersRange, RegisterIterator};

/// Read holding registers or read input registers
pub(crate) struct ReadRegisters {
    request: ReadRegistersRange,
    promise: Promise<Vec<Indexed<u16>>>,
}

impl ReadRegisters {
    pub(crate) fn new(request: ReadRegistersRange, promise: Promise<Vec<Indexed<u16>>>) -> Self {
        Self { request, promise }
    }

    pub(crate) fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        self.request.get().serialize(cursor)
    }

    pub(crate) fn failure(self, err: RequestError) {
        self.promise.failure(err)
    }

    pub(crate) fn handle_response(self, cursor: &mut ReadCursor) {
        let result = Self::parse_response(self.request.get(), cursor);
        self.promise.complete(result)
    }

    fn parse_response(
        range: AddressRange,
        cursor: &mut ReadCursor,
    ) -> Result<Vec<Indexed<u16>>, RequestError> {
        // the byte count is implied by the quantity in the request
        cursor.read_u8()?;
        Ok(RegisterIterator::parse_all(range, cursor)?.collect())
    }
}
