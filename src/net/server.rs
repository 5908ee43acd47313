//! Listening socket plus the per-channel handler registry.

use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::error::Result;
use crate::net::{Event, Worker};

type Handler = Box<dyn Fn(Event) + Send + Sync>;

/// Per-channel handler table shared by all workers of one server.
pub(crate) struct Registry {
    handlers: RwLock<HashMap<String, Handler>>,
}

impl Registry {
    fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    fn register(&self, channel: &str, handler: Handler) {
        // Last registration wins; there is no fan-out on one channel.
        self.handlers.write().insert(channel.to_string(), handler);
    }

    /// Look the frame up by channel and invoke its handler on the calling
    /// (worker) thread. Unregistered channels are silently dropped, which
    /// keeps new channels on one side non-breaking for the other.
    pub(crate) fn dispatch(&self, event: Event) {
        let handlers = self.handlers.read();
        match handlers.get(event.channel()) {
            Some(handler) => handler(event),
            None => trace!(channel = event.channel(), "no handler; frame dropped"),
        }
    }
}

/// Accepts inbound connections and routes frames to registered callbacks.
///
/// One dedicated [`Worker`] thread is started per accepted connection.
pub struct EventServer {
    listener: TcpListener,
    registry: Arc<Registry>,
    workers: Mutex<Vec<Worker>>,
    accepting: AtomicBool,
}

impl EventServer {
    /// Bind the listening socket. Port 0 picks an ephemeral port; use
    /// [`EventServer::local_addr`] to learn the bound address.
    pub fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        Ok(Self {
            listener,
            registry: Arc::new(Registry::new()),
            workers: Mutex::new(Vec::new()),
            accepting: AtomicBool::new(true),
        })
    }

    /// The address the server is listening on.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Register the handler for a channel. Exactly one handler per channel;
    /// registering again replaces the previous one.
    pub fn on<F>(&self, channel: &str, handler: F)
    where
        F: Fn(Event) + Send + Sync + 'static,
    {
        self.registry.register(channel, Box::new(handler));
    }

    /// Block until one inbound connection is accepted, then start its worker
    /// thread and return the worker handle.
    pub fn wait_for_connection(&self) -> Result<Worker> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "server destroyed",
            )
            .into());
        }
        let (stream, peer) = self.listener.accept()?;
        debug!(%peer, "connection accepted");
        let worker = Worker::spawn(stream, Arc::clone(&self.registry))?;
        self.workers.lock().push(worker.clone());
        Ok(worker)
    }

    /// Stop accepting new connections and signal all live workers to close.
    /// Workers observe the forced close and exit their read loops.
    pub fn destroy(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        let mut workers = self.workers.lock();
        for worker in workers.iter() {
            worker.close();
        }
        workers.clear();
    }
}

impl Drop for EventServer {
    fn drop(&mut self) {
        self.destroy();
    }
}
