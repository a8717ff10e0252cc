//! TCP Server
//!
//! Accepts connections and dispatches them to worker threads.
//!
//! ```text
//!  acceptor (non-blocking, polls shutdown flag)
//!      │ bounded crossbeam channel
//!      ▼
//!  worker 1 .. worker N ──► Connection::handle ──► Engine::execute
//! ```

use std::collections::HashMap;
use std::io::{BufWriter, ErrorKind};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver};
use parking_lot::Mutex;

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{Result, ResultExt};
use crate::protocol::{write_frame, Frame};

use super::connection::Connection;

/// How long the acceptor sleeps when no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Stops a running [`Server`] from another thread
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Streams of live connections, so shutdown can close them
type Registry = Arc<Mutex<HashMap<u64, TcpStream>>>;

/// TCP server for segdb
pub struct Server {
    config: Config,
    engine: Arc<Engine>,
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,

    /// Accepted connections not yet finished (queued or being served)
    active: Arc<AtomicUsize>,
    registry: Registry,
    next_id: AtomicU64,
}

impl Server {
    /// Bind the listen address from `config`
    pub fn bind(config: Config, engine: Arc<Engine>) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)
            .with_context(|| format!("failed to bind {}", config.listen_addr))?;
        listener.set_nonblocking(true)?;

        Ok(Self {
            config,
            engine,
            listener,
            shutdown: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicUsize::new(0)),
            registry: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
        }
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Serve until shut down (blocking)
    ///
    /// On shutdown the acceptor stops, open connections are closed and all
    /// workers are joined before returning.
    pub fn run(&self) -> Result<()> {
        let worker_count = self.config.worker_threads.max(1);
        let max_connections = self.config.max_connections.max(1);
        let (sender, receiver) = channel::bounded::<(u64, TcpStream)>(max_connections);

        tracing::info!(
            addr = %self.local_addr()?,
            workers = worker_count,
            max_connections,
            "server listening"
        );

        let mut workers = Vec::with_capacity(worker_count);
        for n in 0..worker_count {
            let worker = Worker {
                receiver: receiver.clone(),
                engine: Arc::clone(&self.engine),
                active: Arc::clone(&self.active),
                registry: Arc::clone(&self.registry),
                read_timeout_ms: self.config.read_timeout_ms,
                write_timeout_ms: self.config.write_timeout_ms,
            };
            let handle = thread::Builder::new()
                .name(format!("segdb-worker-{}", n))
                .spawn(move || worker.run())
                .context("failed to spawn worker thread")?;
            workers.push(handle);
        }
        drop(receiver);

        while !self.shutdown.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if self.active.load(Ordering::SeqCst) >= max_connections {
                        tracing::warn!(%peer, "connection limit reached, refusing client");
                        refuse(stream);
                        continue;
                    }
                    match self.register(stream) {
                        Ok((id, stream)) => {
                            if sender.send((id, stream)).is_err() {
                                self.release(id);
                                break;
                            }
                        }
                        Err(e) => tracing::warn!(%peer, "failed to set up connection: {}", e),
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::warn!("accept failed: {}", e);
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        tracing::info!("shutting down server");
        drop(sender);
        for stream in self.registry.lock().values() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        for worker in workers {
            if worker.join().is_err() {
                tracing::error!("worker thread panicked");
            }
        }
        tracing::info!("server stopped");
        Ok(())
    }

    /// Count the connection and keep a handle to it for shutdown
    fn register(&self, stream: TcpStream) -> Result<(u64, TcpStream)> {
        stream.set_nonblocking(false)?;
        let tracked = stream.try_clone()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.active.fetch_add(1, Ordering::SeqCst);
        self.registry.lock().insert(id, tracked);
        Ok((id, stream))
    }

    fn release(&self, id: u64) {
        self.registry.lock().remove(&id);
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Answer a client over the connection limit with an error frame and close
fn refuse(stream: TcpStream) {
    let _ = stream.set_nonblocking(false);
    let mut writer = BufWriter::new(&stream);
    let _ = write_frame(&mut writer, &Frame::error("too many connections"));
    drop(writer);
    let _ = stream.shutdown(Shutdown::Both);
}

struct Worker {
    receiver: Receiver<(u64, TcpStream)>,
    engine: Arc<Engine>,
    active: Arc<AtomicUsize>,
    registry: Registry,
    read_timeout_ms: u64,
    write_timeout_ms: u64,
}

impl Worker {
    fn run(self) {
        for (id, stream) in self.receiver.iter() {
            if let Err(e) = self.serve(stream) {
                tracing::warn!(connection = id, "connection ended with error: {}", e.chain());
            }
            self.registry.lock().remove(&id);
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn serve(&self, stream: TcpStream) -> Result<()> {
        let mut connection = Connection::new(stream, Arc::clone(&self.engine))?;
        connection.set_timeouts(self.read_timeout_ms, self.write_timeout_ms)?;
        connection.handle()
    }
}
