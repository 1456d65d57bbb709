use crate::client::message::Promise;
use crate::common::cursor::{ReadCursor, WriteCursor};
use crate::common::traits::{Parse, Serialize};
use crate::error::{AduParseError, RequestError};
use crate::types::Indexed;

/// Write single coil or write single register. The response is an echo of
/// the request.
pub(crate) struct SingleWrite<T> {
    request: Indexed<T>,
    promise: Promise<Indexed<T>>,
}

impl<T> SingleWrite<T>
where
    T: PartialEq + Copy,
    Indexed<T>: Serialize + Parse,
{
    pub(crate) fn new(request: Indexed<T>, promise: Promise<Indexed<T>>) -> Self {
        Self { request, promise }
    }

    pub(crate) fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
        self.request.serialize(cursor)
    }

    pub(crate) fn failure(self, err: RequestError) {
        self.promise.failure(err)
    }

    pub(crate) fn handle_response(self, cursor: &mut ReadCursor) {
        let result = Self::parse_response(self.request, cursor);
        self.promise.complete(result)
    }

    fn parse_response(
        request: Indexed<T>,
        cursor: &mut ReadCursor,
    ) -> Result<Indexed<T>, RequestError> {
        let response = Indexed::<T>::parse(cursor)?;
        cursor.expect_empty()?;
        if response != request {
            return Err(AduParseError::ReplyEchoMismatch.into());
        }
        Ok(response)
    }
}
