use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::net::TcpListener;
use tracing::Instrument;

use crate::common::phys::PhysLayer;
use crate::decode::DecodeLevel;
use crate::server::task::SessionTask;
use crate::server::{RequestHandler, ServerHandlerMap};

/// Tracks the open sessions so that the oldest one can be evicted when the
/// configured maximum is exceeded
struct SessionTracker {
    max: usize,
    id: u64,
    sessions: BTreeMap<u64, tokio::sync::mpsc::Sender<()>>,
}

type SessionTrackerWrapper = Arc<Mutex<SessionTracker>>;

impl SessionTracker {
    fn new(max: usize) -> SessionTracker {
        Self {
            max,
            id: 0,
            sessions: BTreeMap::new(),
        }
    }

    fn wrapped(max: usize) -> SessionTrackerWrapper {
        Arc::new(Mutex::new(Self::new(max)))
    }

    fn get_next_id(&mut self) -> u64 {
        let ret = self.id;
        self.id += 1;
        ret
    }

    fn add(&mut self, sender: tokio::sync::mpsc::Sender<()>) -> u64 {
        if !self.sessions.is_empty() && self.sessions.len() >= self.max {
            if let Some(id) = self.sessions.keys().next().copied() {
                tracing::warn!("exceeded max connections, closing oldest session: {}", id);
                // when the record drops and there are no more senders,
                // the other end will stop the task
                self.sessions.remove(&id);
            }
        }

        let id = self.get_next_id();
        self.sessions.insert(id, sender);
        id
    }

    fn remove(&mut self, id: u64) {
        self.sessions.remove(&id);
    }
}

/// Accept loop of the TCP server. Spawns one [`SessionTask`] per accepted
/// connection.
pub(crate) struct ServerTask<T: RequestHandler> {
    listener: TcpListener,
    handlers: ServerHandlerMap<T>,
    tracker: SessionTrackerWrapper,
    decode: DecodeLevel,
}

impl<T: RequestHandler> ServerTask<T> {
    pub(crate) fn new(
        max_sessions: usize,
        listener: TcpListener,
        handlers: ServerHandlerMap<T>,
        decode: DecodeLevel,
    ) -> Self {
        Self {
            listener,
            handlers,
            tracker: SessionTracker::wrapped(max_sessions),
            decode,
        }
    }

    pub(crate) async fn run(&mut self, mut shutdown: tokio::sync::mpsc::Receiver<()>) {
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("server shutdown");
                    return;
                }
                result = self.listener.accept() => {
                    match result {
                        Err(err) => {
                            tracing::error!("error accepting connection: {}", err);
                            return;
                        }
                        Ok((socket, addr)) => {
                            self.handle(socket, addr).await
                        }
                    }
                }
            }
        }
    }

    async fn handle(&self, socket: tokio::net::TcpStream, addr: SocketAddr) {
        let handlers = self.handlers.clone();
        let tracker = self.tracker.clone();
        let decode = self.decode;
        let (tx, rx) = tokio::sync::mpsc::channel(1);

        let id = self.tracker.lock().unwrap().add(tx);
        tracing::info!("accepted connection {} from: {}", id, addr);

        let session = async move {
            SessionTask::new(PhysLayer::new_tcp(socket), handlers, rx, decode)
                .run()
                .await
                .ok();
            tracing::info!("shutdown session: {}", id);
            tracker.lock().unwrap().remove(id);
        };
        tokio::spawn(session.instrument(tracing::info_span!("Session", "remote" = ?addr)));
    }
}
