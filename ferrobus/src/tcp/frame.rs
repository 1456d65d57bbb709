use crate::common::buffer::ReadBuffer;
use crate::common::frame::{constants as frame_constants, Frame, FrameHeader, TxId};
use crate::common::phys::PhysLayer;
use crate::common::traits::Serialize;
use crate::decode::{AduDecodeLevel, DecodeLevel};
use crate::error::{FrameParseError, InternalError, RequestError};
use crate::types::UnitId;

pub(crate) mod constants {
    pub(crate) const HEADER_LENGTH: usize = 7;
    pub(crate) const MAX_FRAME_LENGTH: usize =
        HEADER_LENGTH + crate::common::frame::constants::MAX_ADU_LENGTH;
    // the length field includes the 1-byte unit id, so it can never be zero
    pub(crate) const MAX_LENGTH_FIELD: usize =
        crate::common::frame::constants::MAX_ADU_LENGTH + 1;
}

#[derive(Clone, Copy)]
struct MbapHeader {
    tx_id: TxId,
    adu_length: usize,
    unit_id: UnitId,
}

#[derive(Clone, Copy)]
enum ParseState {
    Begin,
    Header(MbapHeader),
}

/// Incremental parser that reassembles MBAP frames from a byte stream.
/// Partial input is reported as "need more bytes", never as an error.
pub(crate) struct MbapParser {
    state: ParseState,
}

impl MbapParser {
    pub(crate) fn new() -> Self {
        Self {
            state: ParseState::Begin,
        }
    }

    fn parse_header(cursor: &mut ReadBuffer) -> Result<MbapHeader, RequestError> {
        let tx_id = TxId::new(cursor.read_u16_be()?);
        let protocol_id = cursor.read_u16_be()?;
        let length = cursor.read_u16_be()? as usize;
        let unit_id = UnitId::new(cursor.read_u8()?);

        if protocol_id != 0 {
            return Err(FrameParseError::UnknownProtocolId(protocol_id).into());
        }

        if length > constants::MAX_LENGTH_FIELD {
            return Err(
                FrameParseError::MbapLengthTooBig(length, constants::MAX_LENGTH_FIELD).into(),
            );
        }

        // must be > 0 b/c the 1-byte unit identifier counts towards the length
        if length == 0 {
            return Err(FrameParseError::MbapLengthZero.into());
        }

        Ok(MbapHeader {
            tx_id,
            adu_length: length - 1,
            unit_id,
        })
    }

    fn parse_body(header: &MbapHeader, cursor: &mut ReadBuffer) -> Result<Frame, RequestError> {
        let mut frame = Frame::new(FrameHeader::new(header.unit_id, header.tx_id));
        frame.set(cursor.read(header.adu_length)?);
        Ok(frame)
    }

    /// Ok(None) means that more bytes are required to complete parsing.
    /// Advancing the underlying buffer implies the bytes are consumed.
    pub(crate) fn parse(
        &mut self,
        cursor: &mut ReadBuffer,
        decode_level: AduDecodeLevel,
    ) -> Result<Option<Frame>, RequestError> {
        match self.state {
            ParseState::Header(header) => {
                if cursor.len() < header.adu_length {
                    return Ok(None);
                }

                let frame = Self::parse_body(&header, cursor)?;
                self.state = ParseState::Begin;

                if decode_level.enabled() {
                    tracing::info!(
                        "MBAP RX - {}",
                        MbapDisplay::new(decode_level, frame.header, frame.payload())
                    );
                }

                Ok(Some(frame))
            }
            ParseState::Begin => {
                if cursor.len() < constants::HEADER_LENGTH {
                    return Ok(None);
                }

                self.state = ParseState::Header(Self::parse_header(cursor)?);
                self.parse(cursor, decode_level)
            }
        }
    }
}

/// Encodes a PDU with an MBAP header into an internal buffer, returning a
/// borrowed slice of the complete frame
pub(crate) struct MbapFormatter {
    buffer: [u8; constants::MAX_FRAME_LENGTH],
}

impl MbapFormatter {
    pub(crate) fn new() -> Self {
        Self {
            buffer: [0; constants::MAX_FRAME_LENGTH],
        }
    }

    pub(crate) fn format(
        &mut self,
        header: FrameHeader,
        function: u8,
        msg: &dyn Serialize,
        decode_level: AduDecodeLevel,
    ) -> Result<&[u8], RequestError> {
        let mut cursor = crate::common::cursor::WriteCursor::new(self.buffer.as_mut());
        cursor.write_u16_be(header.tx_id.to_u16())?;
        cursor.write_u16_be(0)?; // protocol id
        cursor.seek_from_current(2)?; // the length is written afterwards
        cursor.write_u8(header.unit_id.value)?;

        let adu_length: usize = {
            let start = cursor.position();
            cursor.write_u8(function)?;
            msg.serialize(&mut cursor)?;
            cursor.position() - start
        };

        if adu_length > frame_constants::MAX_ADU_LENGTH {
            return Err(InternalError::AduTooBig(adu_length).into());
        }

        // write the resulting length field, which includes the unit id
        cursor.seek_from_start(4)?;
        cursor.write_u16_be((adu_length + 1) as u16)?;

        let total_length = constants::HEADER_LENGTH + adu_length;

        if decode_level.enabled() {
            tracing::info!(
                "MBAP TX - {}",
                MbapDisplay::new(
                    decode_level,
                    header,
                    &self.buffer[constants::HEADER_LENGTH..total_length]
                )
            );
        }

        Ok(&self.buffer[..total_length])
    }
}

struct MbapDisplay<'a> {
    level: AduDecodeLevel,
    header: FrameHeader,
    payload: &'a [u8],
}

impl<'a> MbapDisplay<'a> {
    fn new(level: AduDecodeLevel, header: FrameHeader, payload: &'a [u8]) -> Self {
        MbapDisplay {
            level,
            header,
            payload,
        }
    }
}

impl std::fmt::Display for MbapDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "tx_id: {} unit: {} (len = {})",
            self.header.tx_id,
            self.header.unit_id,
            self.payload.len()
        )?;
        if self.level.payload_enabled() {
            crate::common::phys::format_bytes(f, self.payload)?;
        }
        Ok(())
    }
}

/// Reads complete frames off a stream, buffering partial input
pub(crate) struct FramedReader {
    parser: MbapParser,
    buffer: ReadBuffer,
}

impl FramedReader {
    pub(crate) fn new() -> Self {
        Self {
            parser: MbapParser::new(),
            buffer: ReadBuffer::new(constants::MAX_FRAME_LENGTH),
        }
    }

    pub(crate) async fn next_frame(
        &mut self,
        io: &mut PhysLayer,
        decode_level: DecodeLevel,
    ) -> Result<Frame, RequestError> {
        loop {
            match self.parser.parse(&mut self.buffer, decode_level.adu)? {
                Some(frame) => return Ok(frame),
                None => {
                    self.buffer.read_some(io, decode_level.physical).await?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::block_on;
    use tokio_test::io::Builder;

    use super::*;
    use crate::common::cursor::WriteCursor;

    //                            |   tx id  |  proto id |  length  | unit |  payload   |
    const SIMPLE_FRAME: &[u8] = &[0x00, 0x07, 0x00, 0x00, 0x00, 0x03, 0x2A, 0x03, 0x04];

    struct MockBody {
        a: u8,
    }

    impl Serialize for MockBody {
        fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError> {
            cursor.write_u8(self.a)?;
            Ok(())
        }
    }

    fn assert_equals_simple_frame(frame: &Frame) {
        assert_eq!(frame.header.tx_id, TxId::new(0x0007));
        assert_eq!(frame.header.unit_id, UnitId::new(0x2A));
        assert_eq!(frame.payload(), &[0x03, 0x04]);
    }

    fn test_segmented_parse(split_at: usize) {
        let (f1, f2) = SIMPLE_FRAME.split_at(split_at);
        let mut io = PhysLayer::new_mock(Builder::new().read(f1).read(f2).build());
        let mut reader = FramedReader::new();
        let frame = block_on(reader.next_frame(&mut io, DecodeLevel::nothing())).unwrap();

        assert_equals_simple_frame(&frame);
    }

    fn test_error(input: &[u8]) -> RequestError {
        let mut io = PhysLayer::new_mock(Builder::new().read(input).build());
        let mut reader = FramedReader::new();
        block_on(reader.next_frame(&mut io, DecodeLevel::nothing()))
            .err()
            .unwrap()
    }

    #[test]
    fn correctly_formats_frame() {
        let mut formatter = MbapFormatter::new();
        let header = FrameHeader::new(UnitId::new(42), TxId::new(7));
        let msg = MockBody { a: 0x04 };
        let output = formatter
            .format(header, 0x03, &msg, AduDecodeLevel::Nothing)
            .unwrap();

        assert_eq!(output, SIMPLE_FRAME)
    }

    #[test]
    fn formatted_frames_round_trip_through_the_parser() {
        let mut formatter = MbapFormatter::new();
        let header = FrameHeader::new(UnitId::new(42), TxId::new(7));
        let msg = MockBody { a: 0x04 };
        let bytes = formatter
            .format(header, 0x03, &msg, AduDecodeLevel::Nothing)
            .unwrap()
            .to_vec();

        let mut io = PhysLayer::new_mock(Builder::new().read(&bytes).build());
        let mut reader = FramedReader::new();
        let frame = block_on(reader.next_frame(&mut io, DecodeLevel::nothing())).unwrap();

        assert_equals_simple_frame(&frame);
    }

    #[test]
    fn can_parse_frame_from_stream() {
        let mut io = PhysLayer::new_mock(Builder::new().read(SIMPLE_FRAME).build());
        let mut reader = FramedReader::new();
        let frame = block_on(reader.next_frame(&mut io, DecodeLevel::nothing())).unwrap();

        assert_equals_simple_frame(&frame);
    }

    #[test]
    fn can_parse_maximum_size_frame() {
        // maximum ADU length is 253, so the max MBAP length value is 254 which is 0xFE
        let header = &[0x00, 0x07, 0x00, 0x00, 0x00, 0xFE, 0x2A];
        let payload = &[0xCC; 253];

        let mut io = PhysLayer::new_mock(Builder::new().read(header).read(payload).build());
        let mut reader = FramedReader::new();
        let frame = block_on(reader.next_frame(&mut io, DecodeLevel::nothing())).unwrap();

        assert_eq!(frame.payload(), payload.as_ref());
    }

    #[test]
    fn can_parse_two_frames_from_a_single_read() {
        let mut bytes = SIMPLE_FRAME.to_vec();
        bytes.extend_from_slice(SIMPLE_FRAME);

        let mut io = PhysLayer::new_mock(Builder::new().read(&bytes).build());
        let mut reader = FramedReader::new();
        let first = block_on(reader.next_frame(&mut io, DecodeLevel::nothing())).unwrap();
        let second = block_on(reader.next_frame(&mut io, DecodeLevel::nothing())).unwrap();

        assert_equals_simple_frame(&first);
        assert_equals_simple_frame(&second);
    }

    #[test]
    fn can_parse_frame_if_segmented_in_header() {
        test_segmented_parse(4);
    }

    #[test]
    fn can_parse_frame_if_segmented_in_payload() {
        test_segmented_parse(8);
    }

    #[test]
    fn errors_on_bad_protocol_id() {
        let frame = &[0x00, 0x07, 0xCA, 0xFE, 0x00, 0x01, 0x2A];
        assert_eq!(
            test_error(frame),
            RequestError::BadFrame(FrameParseError::UnknownProtocolId(0xCAFE))
        );
    }

    #[test]
    fn errors_on_length_of_zero() {
        let frame = &[0x00, 0x07, 0x00, 0x00, 0x00, 0x00, 0x2A];
        assert_eq!(
            test_error(frame),
            RequestError::BadFrame(FrameParseError::MbapLengthZero)
        );
    }

    #[test]
    fn errors_when_mbap_length_too_big() {
        let frame = &[0x00, 0x07, 0x00, 0x00, 0x00, 0xFF, 0x2A];
        assert_eq!(
            test_error(frame),
            RequestError::BadFrame(FrameParseError::MbapLengthTooBig(
                0xFF,
                constants::MAX_LENGTH_FIELD
            ))
        );
    }
}
