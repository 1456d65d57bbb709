use crate::client::message::Promise;
use crate::common::cursor::{ReadCursor, WriteCursor};
use crate::common::traits::Serialize;
use crate::error::{AduParseError, RequestError};
use crate::types::{AddressRange, WriteMultiple};

/// Write multiple coils or write multiple registers. The response echoes
/// the address range of the request.
pub(crate) struct MultipleWrite<T> {
    request: WriteMultiple<T>,
    promise: Promise<AddressRange>,
}

impl<T> MultipleWrite<T>
where
    WriteMultiple<T>: Serialize,
{
    pub(crate) fn new(request: WriteMultiple<T>, promise: Promise<AddressRange>) -> Self {
        Self { request, promise }
    }

    pub(crate) fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        self.request.serialize(cursor)
    }

    pub(crate) fn failure(self, err: RequestError) {
        self.promise.failure(err)
    }

    pub(crate) fn handle_response(self, cursor: &mut ReadCursor) {
        let result = Self::parse_response(self.request.range(), cursor);
        self.promise.complete(result)
    }

    fn parse_response(
        range: AddressRange,
        cursor: &mut ReadCursor,
    ) -> Result<AddressRange, RequestError> {
        let echo = AddressRange::parse(cursor)?;
        cursor.expect_empty()?;
        if echo != range {
            return Err(AduParseError::ReplyEchoMismatch.into());
        }
        Ok(echo)
    }
}
