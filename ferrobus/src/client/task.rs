use std::time::Duration;

use tokio::time::Instant;

use crate::channel::Receiver;
use crate::client::message::Request;
use crate::client::tracker::TransactionTracker;
use crate::common::frame::{FrameHeader, TxId};
use crate::common::phys::PhysLayer;
use crate::decode::DecodeLevel;
use crate::error::{AduParseError, RequestError};
use crate::shutdown::Shutdown;
use crate::tcp::frame::{FramedReader, MbapFormatter};

/// Requests are executed over a connection until one of the following occurs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SessionError {
    /// the stream errors
    IoError(std::io::ErrorKind),
    /// unrecoverable framing issue
    BadFrame,
    /// the stream reached EOF
    Closed,
    /// the mpsc is closed (dropped) on the sender side
    Shutdown,
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SessionError::IoError(kind) => write!(f, "I/O error: {kind}"),
            SessionError::BadFrame => write!(f, "parser encountered a bad frame"),
            SessionError::Closed => write!(f, "stream closed by the peer"),
            SessionError::Shutdown => write!(f, "shutdown was requested"),
        }
    }
}

impl From<Shutdown> for SessionError {
    fn from(_: Shutdown) -> Self {
        SessionError::Shutdown
    }
}

impl SessionError {
    fn from_request_err(err: RequestError) -> Option<Self> {
        match err {
            RequestError::Io(x) => Some(SessionError::IoError(x)),
            RequestError::BadFrame(_) => Some(SessionError::BadFrame),
            RequestError::ConnectionClosed => Some(SessionError::Closed),
            // all other errors don't kill the loop
            _ => None,
        }
    }
}

/// Writes requests as they arrive and pairs responses with pending
/// transactions by transaction id, so multiple requests may be in-flight
/// on the connection at once
pub(crate) struct ClientLoop {
    rx: Receiver<Request>,
    writer: MbapFormatter,
    reader: FramedReader,
    tracker: TransactionTracker,
    tx_id: TxId,
    decode: DecodeLevel,
}

impl ClientLoop {
    pub(crate) fn new(rx: Receiver<Request>, decode: DecodeLevel) -> Self {
        Self {
            rx,
            writer: MbapFormatter::new(),
            reader: FramedReader::new(),
            tracker: TransactionTracker::new(),
            tx_id: TxId::default(),
            decode,
        }
    }

    pub(crate) async fn run(&mut self, io: &mut PhysLayer) -> SessionError {
        loop {
            if let Err(err) = self.poll(io).await {
                let reason = match err {
                    SessionError::Shutdown => RequestError::Shutdown,
                    _ => RequestError::ConnectionClosed,
                };
                self.tracker.fail_all(reason);
                tracing::warn!("ending session: {}", err);
                return err;
            }
        }
    }

    async fn poll(&mut self, io: &mut PhysLayer) -> Result<(), SessionError> {
        let deadline = self.tracker.next_deadline();

        tokio::select! {
            frame = self.reader.next_frame(io, self.decode) => {
                match frame {
                    Ok(frame) => {
                        self.handle_response(frame);
                        Ok(())
                    }
                    Err(err) => match SessionError::from_request_err(err) {
                        Some(err) => Err(err),
                        None => Ok(()),
                    }
                }
            }
            request = self.rx.recv() => {
                let request = request?;
                self.start_request(io, request).await
            }
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                self.tracker.expire(Instant::now());
                Ok(())
            }
        }
    }

    /// Allocate a transaction id, skipping any id that is still pending
    /// on this connection
    fn next_tx_id(&mut self) -> TxId {
        let mut tx_id = self.tx_id.next();
        while self.tracker.is_pending(tx_id) {
            tx_id = self.tx_id.next();
        }
        tx_id
    }

    async fn start_request(
        &mut self,
        io: &mut PhysLayer,
        request: Request,
    ) -> Result<(), SessionError> {
        let tx_id = self.next_tx_id();
        let function = request.details.function();

        let bytes = match self.writer.format(
            FrameHeader::new(request.id, tx_id),
            function.get_value(),
            &request.details,
            self.decode.adu,
        ) {
            Ok(bytes) => bytes,
            Err(err) => {
                // serialization failures are local to the request
                request.fail(err);
                return Ok(());
            }
        };

        if self.decode.pdu.enabled() {
            tracing::info!("PDU TX - {} tx_id: {}", function, tx_id);
        }

        if let Err(err) = io.write(bytes, self.decode.physical).await {
            let kind = err.kind();
            request.fail(RequestError::Io(kind));
            return Err(SessionError::IoError(kind));
        }

        let deadline = Instant::now() + request.timeout;
        self.tracker.register(tx_id, deadline, request);
        Ok(())
    }

    fn handle_response(&mut self, frame: crate::common::frame::Frame) {
        match self.tracker.resolve(frame.header.tx_id) {
            Some(request) => {
                if request.id != frame.header.unit_id {
                    tracing::warn!(
                        "response unit id {} does not match request unit id {}",
                        frame.header.unit_id,
                        request.id
                    );
                    request.fail(AduParseError::ReplyEchoMismatch.into());
                    return;
                }
                request.handle_response(frame.payload());
            }
            None => {
                tracing::warn!(
                    "dropping response with unmatched transaction id: {}",
                    frame.header.tx_id
                );
            }
        }
    }

    /// Answer requests with NoConnection while waiting out the reconnect delay
    pub(crate) async fn fail_requests_for(&mut self, duration: Duration) -> Result<(), Shutdown> {
        let deadline = Instant::now() + duration;
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    return Ok(());
                }
                request = self.rx.recv() => {
                    request?.fail(RequestError::NoConnection);
                }
            }
        }
    }
}
