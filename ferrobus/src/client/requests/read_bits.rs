use crate::client::message::Promise;
use crate::common::cursor::{ReadCursor, WriteCursor};
use crate::common::traits::Serialize;
use crate::error::RequestError;
use crate::types::{AddressRange, BitIterator, Indexed, ReadBitsRange};

/// Read coils or read discrete inputs
pub(crate) struct ReadBits {
    request: ReadBitsRange,
    promise: Promise<Vec<Indexed<bool>>>,
}

impl ReadBits {
    pub(crate) fn new(request: ReadBitsRange, promise: Promise<Vec<Indexed<bool>>>) -> Self {
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
    ) -> Result<Vec<Indexed<bool>>, RequestError> {
        // the byte count is implied by the quantity in the request
        cursor.read_u8()?;
        Ok(BitIterator::parse_all(range, cursor)?.collect())
    }
}
