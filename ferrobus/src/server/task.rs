use crate::common::cursor::ReadCursor;
use crate::common::frame::Frame;
use crate::common::function::FunctionCode;
use crate::common::phys::PhysLayer;
use crate::decode::DecodeLevel;
use crate::error::{InvalidRequest, RequestError};
use crate::exception::ExceptionCode;
use crate::server::handler::{RequestHandler, ServerHandlerMap};
use crate::server::request::Request;
use crate::tcp::frame::{FramedReader, MbapFormatter};

/// Serves a single accepted connection: frames are processed in arrival
/// order and responses are written back in the same order. Any I/O or
/// framing error terminates the session without affecting the rest of the
/// server.
pub(crate) struct SessionTask<T: RequestHandler> {
    io: PhysLayer,
    handlers: ServerHandlerMap<T>,
    reader: FramedReader,
    writer: MbapFormatter,
    shutdown: tokio::sync::mpsc::Receiver<()>,
    decode: DecodeLevel,
}

impl<T: RequestHandler> SessionTask<T> {
    pub(crate) fn new(
        io: PhysLayer,
        handlers: ServerHandlerMap<T>,
        shutdown: tokio::sync::mpsc::Receiver<()>,
        decode: DecodeLevel,
    ) -> Self {
        Self {
            io,
            handlers,
            reader: FramedReader::new(),
            writer: MbapFormatter::new(),
            shutdown,
            decode,
        }
    }

    pub(crate) async fn run(&mut self) -> Result<(), RequestError> {
        loop {
            self.run_one().await?;
        }
    }

    async fn run_one(&mut self) -> Result<(), RequestError> {
        tokio::select! {
            // fires on an eviction message or when the tracker drops the sender
            _ = self.shutdown.recv() => {
                Err(RequestError::Shutdown)
            }
            frame = self.reader.next_frame(&mut self.io, self.decode) => {
                let frame = frame?;
                self.handle_frame(frame).await
            }
        }
    }

    async fn handle_frame(&mut self, frame: Frame) -> Result<(), RequestError> {
        let mut cursor = ReadCursor::new(frame.payload());

        // a frame without a function code is a protocol violation that
        // terminates the session
        let value = match cursor.read_u8() {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!("received frame without a function code");
                return Err(err.into());
            }
        };

        let function = match FunctionCode::get(value) {
            Some(x) => x,
            None => {
                tracing::warn!("received unsupported function code: {:#04X}", value);
                let reply = self.writer.format(
                    frame.header,
                    value | 0x80,
                    &ExceptionCode::IllegalFunction,
                    self.decode.adu,
                )?;
                self.io.write(reply, self.decode.physical).await?;
                return Ok(());
            }
        };

        if self.decode.pdu.enabled() {
            tracing::info!("PDU RX - {} tx_id: {}", function, frame.header.tx_id);
        }

        let handler = match self.handlers.get(frame.header.unit_id) {
            Some(handler) => handler.clone(),
            None => {
                tracing::warn!(
                    "received frame for unmapped unit id: {}",
                    frame.header.unit_id
                );
                return Ok(());
            }
        };

        let request = match Request::parse(function, &mut cursor) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!("error parsing {}: {}", function, err);
                let ex = reply_exception(err);
                let reply =
                    self.writer
                        .format(frame.header, function.as_error(), &ex, self.decode.adu)?;
                self.io.write(reply, self.decode.physical).await?;
                return Ok(());
            }
        };

        let reply = request.get_reply(frame.header, &handler, &mut self.writer, self.decode)?;
        self.io.write(reply, self.decode.physical).await?;
        Ok(())
    }
}

/// Exception code used to answer a request body that could not be parsed
fn reply_exception(err: RequestError) -> ExceptionCode {
    match err {
        RequestError::BadRequest(InvalidRequest::AddressOverflow(_, _)) => {
            ExceptionCode::IllegalDataAddress
        }
        RequestError::Exception(ex) => ex,
        _ => ExceptionCode::IllegalDataValue,
    }
}
