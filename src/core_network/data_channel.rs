//! One-shot passive data endpoint.
//!
//! A channel is born with a pool-assigned port, binds it on `open`, and
//! accepts exactly one inbound connection in a background task. The task
//! then waits for either the transfer routine (`sink`) or the kill
//! signal; whichever wins, the channel releases its resources and hands
//! the port back to the pool. A closed channel reads its port as 0.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_rustls::TlsAcceptor;

use super::port_pool::{PortPool, PortPoolError};

/// The accepted data connection as handed to a transfer routine, plain
/// or TLS-wrapped.
pub trait DataStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> DataStream for T {}

/// Transfer routine run over the accepted connection. The channel closes
/// itself once the routine returns, success or not.
pub type SinkFn = Box<
    dyn FnOnce(Box<dyn DataStream>) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>
        + Send,
>;

struct Shared {
    pool: Arc<PortPool>,
    port: AtomicU16,
    encrypted: AtomicBool,
}

impl Shared {
    /// Returns the port to the pool exactly once; later calls are no-ops.
    fn release(&self) {
        let port = self.port.swap(0, Ordering::SeqCst);
        if port != 0 {
            self.pool.release(port);
        }
    }
}

pub struct DataChannel {
    shared: Arc<Shared>,
    acceptor: Option<TlsAcceptor>,
    sink_tx: Option<mpsc::Sender<SinkFn>>,
    sink_rx: Option<mpsc::Receiver<SinkFn>>,
    kill_tx: mpsc::Sender<()>,
    kill_rx: Option<mpsc::Receiver<()>>,
    opened: bool,
}

impl DataChannel {
    /// Assigns a port from the pool. Call `open` before `sink` or the
    /// advertised port is not accepting yet.
    pub fn new(
        pool: Arc<PortPool>,
        acceptor: Option<TlsAcceptor>,
        encrypted: bool,
    ) -> Result<Self, PortPoolError> {
        let port = pool.assign()?;
        debug!("data channel allotted port {}", port);

        let (sink_tx, sink_rx) = mpsc::channel(1);
        let (kill_tx, kill_rx) = mpsc::channel(4);

        Ok(Self {
            shared: Arc::new(Shared {
                pool,
                port: AtomicU16::new(port),
                encrypted: AtomicBool::new(encrypted),
            }),
            acceptor,
            sink_tx: Some(sink_tx),
            sink_rx: Some(sink_rx),
            kill_tx,
            kill_rx: Some(kill_rx),
            opened: false,
        })
    }

    pub fn port(&self) -> u16 {
        self.shared.port.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.port() == 0
    }

    pub fn encrypted(&self) -> bool {
        self.shared.encrypted.load(Ordering::SeqCst)
    }

    pub fn set_encrypted(&self, encrypted: bool) {
        self.shared.encrypted.store(encrypted, Ordering::SeqCst);
    }

    /// Port in the `hi,lo` form used inside a `227` reply.
    pub fn to_pasv_string_port(&self) -> String {
        let port = self.port();
        format!("{},{}", port >> 8, port & 0xff)
    }

    /// Binds the listener on the assigned port and spawns the task that
    /// accepts the single data connection. Must be called exactly once.
    pub async fn open(&mut self) -> std::io::Result<()> {
        if self.opened {
            return Err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "data channel already opened",
            ));
        }
        self.opened = true;

        let listener = TcpListener::bind(("0.0.0.0", self.port())).await?;

        let shared = Arc::clone(&self.shared);
        let acceptor = self.acceptor.clone();
        let sink_rx = self.sink_rx.take().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "data channel sink slot missing")
        })?;
        let kill_rx = self.kill_rx.take().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "data channel kill slot missing")
        })?;

        tokio::spawn(run_channel(listener, shared, acceptor, sink_rx, kill_rx));
        Ok(())
    }

    /// Hands the transfer routine to the background task. If the task is
    /// already gone (accept failure) the routine is dropped and the
    /// client simply observes the data connection closing.
    pub async fn sink(&mut self, f: SinkFn) {
        let Some(tx) = self.sink_tx.take() else {
            warn!("sink called twice on a data channel");
            return;
        };
        if tx.send(f).await.is_err() {
            warn!("data channel task exited before the sink handover");
        }
    }

    /// Signals the background task to stop and returns the port it held.
    /// Safe to call at any point and from any task.
    pub fn close(&mut self) -> u16 {
        let port = self.port();
        let _ = self.kill_tx.try_send(());
        self.shared.release();
        port
    }
}

/// Waits for an explicit kill. A dropped sender is not a kill: the other
/// rendezvous branch decides the outcome then.
async fn wait_kill(kill_rx: &mut mpsc::Receiver<()>) {
    if kill_rx.recv().await.is_none() {
        std::future::pending::<()>().await;
    }
}

async fn run_channel(
    listener: TcpListener,
    shared: Arc<Shared>,
    acceptor: Option<TlsAcceptor>,
    mut sink_rx: mpsc::Receiver<SinkFn>,
    mut kill_rx: mpsc::Receiver<()>,
) {
    let stream = tokio::select! {
        accepted = listener.accept() => match accepted {
            Ok((stream, peer)) => {
                debug!("data connection accepted from {}", peer);
                stream
            }
            Err(e) => {
                warn!("data channel accept error: {}", e);
                shared.release();
                return;
            }
        },
        _ = wait_kill(&mut kill_rx) => {
            debug!("data channel killed before accept");
            shared.release();
            return;
        }
    };

    // One connection only; stop listening before the transfer runs.
    drop(listener);

    tokio::select! {
        sink = sink_rx.recv() => {
            let Some(sink) = sink else {
                shared.release();
                return;
            };
            if let Err(e) = run_sink(stream, &shared, acceptor, sink).await {
                warn!("data channel transfer failed: {}", e);
            }
            shared.release();
        }
        _ = wait_kill(&mut kill_rx) => {
            debug!("data channel killed before transfer");
            shared.release();
        }
    }
}

async fn run_sink(
    stream: TcpStream,
    shared: &Shared,
    acceptor: Option<TlsAcceptor>,
    sink: SinkFn,
) -> anyhow::Result<()> {
    if shared.encrypted.load(Ordering::SeqCst) {
        let Some(acceptor) = acceptor else {
            anyhow::bail!("cannot encrypt data connection without a certificate");
        };
        let tls_stream = acceptor.accept(stream).await?;
        sink(Box::new(tls_stream)).await
    } else {
        sink(Box::new(stream)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::time::{sleep, timeout, Duration};

    #[tokio::test]
    async fn delivers_one_transfer_and_recycles_the_port() {
        let pool = Arc::new(PortPool::new(47200, 47210));
        let mut dc = DataChannel::new(Arc::clone(&pool), None, false).unwrap();
        let port = dc.port();
        assert_eq!(port, 47200);
        dc.open().await.unwrap();

        let mut client = TcpStream::connect(("127.0.0.1", port)).await.unwrap();

        let (done_tx, done_rx) = tokio::sync::oneshot::channel();
        dc.sink(Box::new(move |mut stream| {
            Box::pin(async move {
                stream.write_all(b"payload").await?;
                stream.shutdown().await?;
                let _ = done_tx.send(());
                Ok(())
            })
        }))
        .await;

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"payload");

        timeout(Duration::from_secs(1), done_rx).await.unwrap().unwrap();
        sleep(Duration::from_millis(50)).await;

        // Self-closed after the transfer: the port is free again.
        assert_eq!(pool.assign().unwrap(), port);
    }

    #[tokio::test]
    async fn close_before_accept_frees_the_port() {
        let pool = Arc::new(PortPool::new(47210, 47220));
        let mut dc = DataChannel::new(Arc::clone(&pool), None, false).unwrap();
        dc.open().await.unwrap();

        let port = dc.close();
        assert_eq!(port, 47210);
        assert!(dc.is_closed());

        sleep(Duration::from_millis(50)).await;
        assert_eq!(pool.assign().unwrap(), port);
    }

    #[tokio::test]
    async fn pasv_string_splits_the_port() {
        let pool = Arc::new(PortPool::new(47221, 47222));
        let mut dc = DataChannel::new(pool, None, false).unwrap();
        assert_eq!(dc.to_pasv_string_port(), "184,117");
        dc.close();
    }

    #[tokio::test]
    async fn encryption_without_certificate_aborts_the_transfer() {
        let pool = Arc::new(PortPool::new(47230, 47240));
        let mut dc = DataChannel::new(Arc::clone(&pool), None, true).unwrap();
        assert!(dc.encrypted());
        let port = dc.port();
        dc.open().await.unwrap();

        let mut client = TcpStream::connect(("127.0.0.1", port)).await.unwrap();

        dc.sink(Box::new(|mut stream| {
            Box::pin(async move {
                stream.write_all(b"should never arrive").await?;
                Ok(())
            })
        }))
        .await;

        // The channel drops the connection without running the routine.
        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert!(received.is_empty());

        sleep(Duration::from_millis(50)).await;
        assert_eq!(pool.assign().unwrap(), port);
    }
}
