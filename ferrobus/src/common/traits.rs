use crate::common::cursor::{ReadCursor, WriteCursor};
use crate::error::RequestError;

/// Types that can write themselves to the body of a PDU
pub(crate) trait Serialize {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError>;
}

/// Types that can read themselves from the body of a PDU
pub(crate) trait Parse: Sized {
    fn parse(cursor: &mut ReadCursor) -> Result<Self, RequestError>;
}
