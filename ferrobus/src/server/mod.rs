use std::net::SocketAddr;

use tracing::Instrument;

use crate::decode::DecodeLevel;
use crate::tcp::server::ServerTask;

mod database;
mod handler;
mod types;

pub(crate) mod request;
pub(crate) mod response;
pub(crate) mod task;

pub use database::*;
pub use handler::*;
pub use types::*;

/// A handle to the server async task. The task is shut down when the handle
/// is dropped.
#[derive(Debug)]
pub struct ServerHandle {
    _tx: tokio::sync::mpsc::Sender<()>,
}

impl ServerHandle {
    pub(crate) fn new(tx: tokio::sync::mpsc::Sender<()>) -> Self {
        ServerHandle { _tx: tx }
    }
}

/// Spawns a TCP server task onto the runtime. This method can only be called
/// from within the runtime context.
///
/// Each accepted connection is served by its own task, so a protocol
/// violation or I/O error terminates only that connection while the server
/// continues accepting others.
///
/// * `max_sessions` - Maximum number of concurrent sessions. The oldest session is evicted when the limit is reached
/// * `addr` - A socket address to bind to
/// * `handlers` - A map of handlers keyed by unit id
/// * `decode` - Decode log level
pub async fn spawn_tcp_server_task<T: RequestHandler>(
    max_sessions: usize,
    addr: SocketAddr,
    handlers: ServerHandlerMap<T>,
    decode: DecodeLevel,
) -> Result<ServerHandle, std::io::Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let (tx, rx) = tokio::sync::mpsc::channel(1);
    let task = async move {
        ServerTask::new(max_sessions, listener, handlers, decode)
            .run(rx)
            .await
    };
    tokio::spawn(task.instrument(tracing::info_span!("Modbus-Server-TCP", "listen" = ?addr)));

    Ok(ServerHandle::new(tx))
}
