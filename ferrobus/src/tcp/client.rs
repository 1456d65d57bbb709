use std::net::SocketAddr;

use crate::client::channel::ReconnectStrategy;
use crate::client::task::{ClientLoop, SessionError};
use crate::common::phys::PhysLayer;
use crate::shutdown::Shutdown;

/// Maintains a TCP connection to the server, running the client loop over
/// each established connection and reconnecting with the configured strategy
pub(crate) struct TcpChannelTask {
    addr: SocketAddr,
    connect_retry: Box<dyn ReconnectStrategy + Send>,
    client_loop: ClientLoop,
}

impl TcpChannelTask {
    pub(crate) fn new(
        addr: SocketAddr,
        connect_retry: Box<dyn ReconnectStrategy + Send>,
        client_loop: ClientLoop,
    ) -> Self {
        Self {
            addr,
            connect_retry,
            client_loop,
        }
    }

    pub(crate) async fn run(&mut self) {
        while self.run_one_connection().await.is_ok() {}
        tracing::info!("shutting down");
    }

    async fn run_one_connection(&mut self) -> Result<(), Shutdown> {
        match tokio::net::TcpStream::connect(self.addr).await {
            Ok(socket) => {
                tracing::info!("connected to: {}", self.addr);
                self.connect_retry.reset();
                let mut phys = PhysLayer::new_tcp(socket);
                match self.client_loop.run(&mut phys).await {
                    SessionError::Shutdown => Err(Shutdown),
                    err => {
                        tracing::warn!("connection lost: {}", err);
                        Ok(())
                    }
                }
            }
            Err(err) => {
                let delay = self.connect_retry.next_delay();
                tracing::warn!(
                    "failed to connect to {}: {} - waiting {:?} before next attempt",
                    self.addr,
                    err,
                    delay
                );
                self.client_loop.fail_requests_for(delay).await
            }
        }
    }
}
