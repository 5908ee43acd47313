//! One live connection: blocking read loop, immediate flushed writes.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::net::server::Registry;
use crate::net::Event;
use crate::protocol::{self, channel, Frame};

/// Handle to one live connection.
///
/// Cheap to clone; all clones refer to the same socket. Created when a
/// connection is accepted, closed when the socket closes (by either side) or
/// errors. The read loop runs on a dedicated thread; [`Worker::send`] may be
/// called from any thread.
#[derive(Clone)]
pub struct Worker {
    inner: Arc<Inner>,
}

struct Inner {
    peer: SocketAddr,
    /// Write half. Sends are discrete, flushed writes; the protocol has no
    /// buffering-based backpressure.
    writer: Mutex<TcpStream>,
    /// Socket handle kept for shutdown.
    stream: TcpStream,
    closed: AtomicBool,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("peer", &self.inner.peer)
            .field("closed", &self.inner.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl Worker {
    /// Wrap an accepted stream and spawn its reader thread.
    ///
    /// On entering the open state the worker synthesizes a local `$CONNECT`
    /// frame for the registry and sends a `$CONNECT` frame (null payload) to
    /// the peer. The handshake is asymmetric: the peer is not required to
    /// reply before the connection counts as established locally.
    pub(crate) fn spawn(stream: TcpStream, registry: Arc<Registry>) -> io::Result<Worker> {
        let peer = stream.peer_addr()?;
        let writer = stream.try_clone()?;
        let reader = stream.try_clone()?;
        let worker = Worker {
            inner: Arc::new(Inner {
                peer,
                writer: Mutex::new(writer),
                stream,
                closed: AtomicBool::new(false),
            }),
        };

        let loop_worker = worker.clone();
        std::thread::Builder::new()
            .name(format!("conn-worker-{peer}"))
            .spawn(move || read_loop(loop_worker, reader, registry))
            .expect("failed to spawn connection worker thread");

        Ok(worker)
    }

    /// Peer address of this connection.
    pub fn peer(&self) -> SocketAddr {
        self.inner.peer
    }

    /// Whether the connection has been closed (by either side).
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Send one frame: a single encoded line, flushed immediately.
    ///
    /// Sending on a closed worker is a no-op, not an error, so teardown never
    /// races against in-flight replies. Write failures mark the worker closed
    /// and are swallowed.
    pub fn send(&self, channel: &str, payload: Option<&str>) {
        if self.is_closed() {
            return;
        }
        let line = protocol::encode(channel, payload);
        let mut writer = self.inner.writer.lock();
        let result = writer
            .write_all(line.as_bytes())
            .and_then(|()| writer.flush());
        if let Err(err) = result {
            debug!(peer = %self.inner.peer, %err, "send failed; marking worker closed");
            self.inner.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Request the connection to close. The reader thread observes EOF (or an
    /// error) and exits its loop. Safe to call repeatedly.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.inner.stream.shutdown(Shutdown::Both);
    }

    /// Best-effort release of the socket. Never errors; secondary failures
    /// during teardown are swallowed.
    fn release(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        let _ = self.inner.stream.shutdown(Shutdown::Both);
    }

    fn synthesize(&self, channel: &str, payload: Option<String>) -> Event {
        Event {
            frame: Frame {
                channel: channel.to_string(),
                payload,
            },
            worker: self.clone(),
        }
    }
}

/// Whether an I/O error means the peer is simply gone.
fn is_disconnect(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
    )
}

/// The worker's main loop: block on one line at a time and dispatch.
///
/// Exit paths mirror the failure taxonomy: clean EOF and socket-level errors
/// synthesize exactly one `$DISCONNECT`; a malformed line or any other read
/// failure synthesizes `$ISSUE` and drops this connection only. The loop
/// never throws across the thread boundary.
fn read_loop(worker: Worker, stream: TcpStream, registry: Arc<Registry>) {
    // Greet the peer before running local handlers so the peer always sees
    // $CONNECT as the first frame, ahead of any handler-produced reply.
    worker.send(channel::CONNECT, None);
    registry.dispatch(worker.synthesize(channel::CONNECT, None));

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => {
                trace!(peer = %worker.peer(), "peer closed the connection");
                registry.dispatch(worker.synthesize(channel::DISCONNECT, None));
                break;
            }
            Ok(_) => match protocol::decode(&line) {
                Ok(frame) => registry.dispatch(Event {
                    frame,
                    worker: worker.clone(),
                }),
                Err(err) => {
                    registry.dispatch(worker.synthesize(channel::ISSUE, Some(err.to_string())));
                    break;
                }
            },
            Err(err) if is_disconnect(err.kind()) || worker.is_closed() => {
                registry.dispatch(worker.synthesize(channel::DISCONNECT, None));
                break;
            }
            Err(err) => {
                registry.dispatch(worker.synthesize(channel::ISSUE, Some(err.to_string())));
                break;
            }
        }
    }

    worker.release();
}
