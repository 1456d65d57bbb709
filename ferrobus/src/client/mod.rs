use std::net::SocketAddr;
use std::time::Duration;

use crate::decode::DecodeLevel;
use crate::types::UnitId;

/// persistent communication channel such as a TCP connection
pub mod channel;

pub use channel::{strategy, Channel, ReconnectStrategy};

pub(crate) mod message;
pub(crate) mod requests;
pub(crate) mod task;
pub(crate) mod tracker;

/// Parameters common to every request: the unit id of the target device and
/// the response timeout
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestParam {
    /// unit id of the request
    pub id: UnitId,
    /// response timeout of the request
    pub response_timeout: Duration,
}

impl RequestParam {
    /// create a new `RequestParam` from its fields
    pub fn new(id: UnitId, response_timeout: Duration) -> Self {
        Self {
            id,
            response_timeout,
        }
    }
}

/// Spawns a channel task onto the runtime that maintains a TCP connection and
/// processes requests from an mpsc request queue. The task completes when the
/// returned channel handle and all of its clones are dropped.
///
/// The task writes each request as it is received and pairs responses with
/// in-flight requests by transaction id, so multiple requests may be pipelined
/// on the same connection.
///
/// * `addr` - Socket address of the remote server
/// * `max_queued_requests` - The maximum size of the request queue
/// * `retry` - A boxed trait object that controls the delay between failed connection attempts
/// * `decode` - Decode log level
pub fn spawn_tcp_client_task(
    addr: SocketAddr,
    max_queued_requests: usize,
    retry: Box<dyn ReconnectStrategy + Send>,
    decode: DecodeLevel,
) -> Channel {
    Channel::spawn(addr, max_queued_requests, retry, decode)
}
