use crate::exception::ExceptionCode;

/// The error type returned by all fallible operations in the library
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestError {
    /// An error that indicates a bug in the library itself
    Internal(InternalError),
    /// No connection to the server currently exists
    NoConnection,
    /// The connection was lost while the request was in-flight
    ConnectionClosed,
    /// The task processing requests has been shut down
    Shutdown,
    /// Timeout occurred before receiving a response from the server
    ResponseTimeout,
    /// An I/O error occurred on the underlying stream
    Io(std::io::ErrorKind),
    /// A frame-level parsing error occurred
    BadFrame(FrameParseError),
    /// A request parameter failed validation
    BadRequest(InvalidRequest),
    /// An error occurred while parsing a response
    BadResponse(AduParseError),
    /// The server responded with a Modbus exception
    Exception(ExceptionCode),
}

impl std::error::Error for RequestError {}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RequestError::Internal(err) => write!(f, "internal error: {err}"),
            RequestError::NoConnection => f.write_str("no connection exists to the Modbus server"),
            RequestError::ConnectionClosed => {
                f.write_str("the connection was closed while the request was pending")
            }
            RequestError::Shutdown => {
                f.write_str("the task processing requests has been shut down")
            }
            RequestError::ResponseTimeout => {
                f.write_str("timeout occurred before receiving a response from the server")
            }
            RequestError::Io(kind) => write!(f, "I/O error: {kind:?}"),
            RequestError::BadFrame(err) => write!(f, "bad frame: {err}"),
            RequestError::BadRequest(err) => write!(f, "bad request: {err}"),
            RequestError::BadResponse(err) => write!(f, "bad response: {err}"),
            RequestError::Exception(ex) => write!(f, "Modbus exception: {ex}"),
        }
    }
}

impl From<std::io::Error> for RequestError {
    fn from(err: std::io::Error) -> Self {
        RequestError::Io(err.kind())
    }
}

impl From<InternalError> for RequestError {
    fn from(err: InternalError) -> Self {
        RequestError::Internal(err)
    }
}

impl From<FrameParseError> for RequestError {
    fn from(err: FrameParseError) -> Self {
        RequestError::BadFrame(err)
    }
}

impl From<InvalidRequest> for RequestError {
    fn from(err: InvalidRequest) -> Self {
        RequestError::BadRequest(err)
    }
}

impl From<AduParseError> for RequestError {
    fn from(err: AduParseError) -> Self {
        RequestError::BadResponse(err)
    }
}

impl From<ExceptionCode> for RequestError {
    fn from(ex: ExceptionCode) -> Self {
        RequestError::Exception(ex)
    }
}

/// Errors that indicate bugs in the library, e.g. bad buffer sizing or
/// duplicate transaction id allocation. These should never occur in practice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InternalError {
    /// Attempted to write more bytes than space remaining in the buffer
    InsufficientWriteSpace(usize, usize), // written vs. remaining
    /// The calculated ADU size exceeds what is allowed by the specification
    AduTooBig(usize),
    /// Attempted to read more bytes than present in the buffer
    InsufficientBytesForRead(usize, usize), // requested vs. remaining
    /// A cursor seek operation exceeded the bounds of the underlying buffer
    BadSeekOperation,
    /// A byte count field would exceed the maximum value of a u8
    BadByteCount(usize),
    /// A transaction id was allocated while another transaction with the
    /// same id was still pending on the connection
    DuplicateTransaction(u16),
}

impl std::error::Error for InternalError {}

impl std::fmt::Display for InternalError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            InternalError::InsufficientWriteSpace(written, remaining) => write!(
                f,
                "attempted to write {written} bytes with {remaining} bytes remaining"
            ),
            InternalError::AduTooBig(size) => write!(
                f,
                "ADU length of {size} exceeds the maximum allowed length"
            ),
            InternalError::InsufficientBytesForRead(requested, remaining) => write!(
                f,
                "attempted to read {requested} bytes with only {remaining} remaining"
            ),
            InternalError::BadSeekOperation => {
                f.write_str("cursor seek operation exceeded the bounds of the underlying buffer")
            }
            InternalError::BadByteCount(count) => {
                write!(f, "byte count would exceed the maximum size of a u8: {count}")
            }
            InternalError::DuplicateTransaction(tx_id) => write!(
                f,
                "transaction id {tx_id:#06X} is already pending on this connection"
            ),
        }
    }
}

/// Errors that occur while parsing a frame off a stream
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameParseError {
    /// The MBAP header contains a length field of zero
    MbapLengthZero,
    /// The MBAP header contains a length field that exceeds the maximum allowed size
    MbapLengthTooBig(usize, usize), // actual size and the maximum size
    /// The MBAP header contains a non-Modbus protocol id
    UnknownProtocolId(u16),
}

impl std::error::Error for FrameParseError {}

impl std::fmt::Display for FrameParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FrameParseError::MbapLengthZero => {
                f.write_str("received frame with the MBAP length field set to zero")
            }
            FrameParseError::MbapLengthTooBig(size, max) => write!(
                f,
                "received frame with MBAP length ({size}) that exceeds the maximum allowed size ({max})"
            ),
            FrameParseError::UnknownProtocolId(id) => {
                write!(f, "received frame with non-Modbus protocol id: {id:#06X}")
            }
        }
    }
}

/// Errors that occur while parsing requests and responses
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AduParseError {
    /// The ADU is too short to be valid
    InsufficientBytes,
    /// The ADU contains extra trailing bytes
    TrailingBytes(usize),
    /// A parameter expected to be echoed in the reply did not match
    ReplyEchoMismatch,
    /// An unknown response function code was received
    UnknownResponseFunction(u8, u8, u8), // actual, expected, expected error
    /// A coil state field contains a value other than 0x0000 or 0xFF00
    UnknownCoilState(u16),
}

impl std::error::Error for AduParseError {}

impl std::fmt::Display for AduParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            AduParseError::InsufficientBytes => f.write_str("ADU is too short to be valid"),
            AduParseError::TrailingBytes(remaining) => {
                write!(f, "ADU contains {remaining} extra trailing bytes")
            }
            AduParseError::ReplyEchoMismatch => {
                f.write_str("a parameter expected to be echoed in the reply did not match")
            }
            AduParseError::UnknownResponseFunction(actual, expected, error) => write!(
                f,
                "received unknown response function code: {actual}. Expected {expected} or {error}"
            ),
            AduParseError::UnknownCoilState(value) => write!(
                f,
                "received coil state with unspecified value: {value:#06X}"
            ),
        }
    }
}

/// Errors that result from bad request parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidRequest {
    /// The request contains a count of zero
    CountOfZero,
    /// The count of objects cannot be represented as a u16
    CountTooBigForU16(usize),
    /// Start and count would overflow the u16 address space
    AddressOverflow(u16, u16), // start and count
    /// The count exceeds the maximum allowed count for this request type
    CountTooLargeForType(u16, u16), // count and maximum
}

impl std::error::Error for InvalidRequest {}

impl std::fmt::Display for InvalidRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            InvalidRequest::CountOfZero => f.write_str("request contains a count of zero"),
            InvalidRequest::CountTooBigForU16(count) => write!(
                f,
                "the count of objects exceeds the maximum value of u16: {count}"
            ),
            InvalidRequest::AddressOverflow(start, count) => write!(
                f,
                "start == {start} and count == {count} would overflow the representation of u16"
            ),
            InvalidRequest::CountTooLargeForType(count, max) => write!(
                f,
                "the request count of {count} exceeds the maximum allowed count of {max} for this type"
            ),
        }
    }
}
