//! Control-channel stream that may be plain now and TLS later without
//! the caller noticing.
//!
//! Reader and writer are kept behind separate locks: the command loop
//! waits on the reader while a data-channel transfer task writes its
//! `150`/`226` statements through the writer. The buffered reader around
//! the plain socket is discarded on upgrade; any bytes a client pipelined
//! ahead of the handshake are dropped with it.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;

use crate::core_tls::TlsError;

enum ControlReader {
    Plain(BufReader<OwnedReadHalf>),
    Secure(BufReader<ReadHalf<TlsStream<TcpStream>>>),
}

enum ControlWriter {
    Plain(OwnedWriteHalf),
    Secure(WriteHalf<TlsStream<TcpStream>>),
}

pub struct SecurableConn {
    reader: Mutex<Option<ControlReader>>,
    writer: Mutex<Option<ControlWriter>>,
    acceptor: Option<TlsAcceptor>,
    secure: AtomicBool,
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
}

impl SecurableConn {
    pub fn new_plain(stream: TcpStream, acceptor: Option<TlsAcceptor>) -> std::io::Result<Self> {
        let local_addr = stream.local_addr()?;
        let peer_addr = stream.peer_addr()?;
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: Mutex::new(Some(ControlReader::Plain(BufReader::new(read_half)))),
            writer: Mutex::new(Some(ControlWriter::Plain(write_half))),
            acceptor,
            secure: AtomicBool::new(false),
            local_addr,
            peer_addr,
        })
    }

    /// For connections that arrived on the implicit TLS port.
    pub fn new_secure(
        stream: TlsStream<TcpStream>,
        acceptor: Option<TlsAcceptor>,
    ) -> std::io::Result<Self> {
        let local_addr = stream.get_ref().0.local_addr()?;
        let peer_addr = stream.get_ref().0.peer_addr()?;
        let (read_half, write_half) = tokio::io::split(stream);

        Ok(Self {
            reader: Mutex::new(Some(ControlReader::Secure(BufReader::new(read_half)))),
            writer: Mutex::new(Some(ControlWriter::Secure(write_half))),
            acceptor,
            secure: AtomicBool::new(true),
            local_addr,
            peer_addr,
        })
    }

    pub fn is_secure(&self) -> bool {
        self.secure.load(Ordering::SeqCst)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Reads one command line, stripping the trailing CRLF. `None` means
    /// the peer closed the control connection.
    pub async fn read_command(&self) -> std::io::Result<Option<String>> {
        let mut guard = self.reader.lock().await;
        let reader = guard
            .as_mut()
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotConnected))?;

        let mut line = String::new();
        let n = match reader {
            ControlReader::Plain(r) => r.read_line(&mut line).await?,
            ControlReader::Secure(r) => r.read_line(&mut line).await?,
        };
        if n == 0 {
            return Ok(None);
        }

        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }

    /// Writes one reply line, appending CRLF when missing.
    pub async fn send_statement(&self, statement: &str) -> std::io::Result<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotConnected))?;

        let mut line = statement.to_string();
        if !line.ends_with("\r\n") {
            line.push_str("\r\n");
        }
        debug!("sending statement: {}", statement);

        match writer {
            ControlWriter::Plain(w) => {
                w.write_all(line.as_bytes()).await?;
                w.flush().await
            }
            ControlWriter::Secure(w) => {
                w.write_all(line.as_bytes()).await?;
                w.flush().await
            }
        }
    }

    /// Upgrades the plain control stream to TLS in place. The buffered
    /// halves are torn down, the raw socket is reunited and run through
    /// the server-side handshake, and fresh halves are built around the
    /// TLS stream.
    pub async fn switch_to_tls(&self) -> Result<(), TlsError> {
        let acceptor = self
            .acceptor
            .clone()
            .ok_or(TlsError::TlsNotConfigured)?;

        let mut reader_guard = self.reader.lock().await;
        let mut writer_guard = self.writer.lock().await;

        match (reader_guard.take(), writer_guard.take()) {
            (Some(ControlReader::Plain(buf_reader)), Some(ControlWriter::Plain(write_half))) => {
                let stream = buf_reader
                    .into_inner()
                    .reunite(write_half)
                    .map_err(|e| TlsError::TlsHandshakeError(e.to_string()))?;

                let tls_stream = acceptor
                    .accept(stream)
                    .await
                    .map_err(|e| TlsError::TlsHandshakeError(e.to_string()))?;

                let (read_half, write_half) = tokio::io::split(tls_stream);
                *reader_guard = Some(ControlReader::Secure(BufReader::new(read_half)));
                *writer_guard = Some(ControlWriter::Secure(write_half));
                self.secure.store(true, Ordering::SeqCst);

                debug!("control connection with {} upgraded to TLS", self.peer_addr);
                Ok(())
            }
            (reader, writer) => {
                *reader_guard = reader;
                *writer_guard = writer;
                Err(TlsError::TlsConfigError(
                    "control stream is not a plain connection".to_string(),
                ))
            }
        }
    }

    /// Idempotent. Shuts the write side down first so a TLS peer sees a
    /// proper close.
    pub async fn close(&self) {
        let mut writer_guard = self.writer.lock().await;
        if let Some(mut writer) = writer_guard.take() {
            let result = match &mut writer {
                ControlWriter::Plain(w) => w.shutdown().await,
                ControlWriter::Secure(w) => w.shutdown().await,
            };
            if let Err(e) = result {
                warn!("error shutting down control connection: {}", e);
            }
        }
        drop(writer_guard);

        self.reader.lock().await.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn loopback_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (client, server)
    }

    #[tokio::test]
    async fn round_trips_statements_and_commands() {
        let (client, server) = loopback_pair().await;
        let conn = SecurableConn::new_plain(server, None).unwrap();
        assert!(!conn.is_secure());

        conn.send_statement("220 ready").await.unwrap();

        let mut client_reader = BufReader::new(client);
        let mut line = String::new();
        client_reader.read_line(&mut line).await.unwrap();
        assert_eq!(line, "220 ready\r\n");

        client_reader
            .get_mut()
            .write_all(b"NOOP\r\n")
            .await
            .unwrap();
        assert_eq!(conn.read_command().await.unwrap(), Some("NOOP".to_string()));
    }

    #[tokio::test]
    async fn eof_reads_as_none() {
        let (client, server) = loopback_pair().await;
        let conn = SecurableConn::new_plain(server, None).unwrap();

        drop(client);
        assert_eq!(conn.read_command().await.unwrap(), None);
    }

    #[tokio::test]
    async fn switch_without_certificate_is_rejected() {
        let (_client, server) = loopback_pair().await;
        let conn = SecurableConn::new_plain(server, None).unwrap();

        match conn.switch_to_tls().await {
            Err(TlsError::TlsNotConfigured) => {}
            other => panic!("expected TlsNotConfigured, got {:?}", other.err()),
        }
        // The failed upgrade must leave the plain stream usable.
        conn.send_statement("200 still here").await.unwrap();
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (_client, server) = loopback_pair().await;
        let conn = SecurableConn::new_plain(server, None).unwrap();

        conn.close().await;
        conn.close().await;
        assert!(conn.send_statement("200 nope").await.is_err());
    }
}
