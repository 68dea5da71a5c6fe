//! Accepts control connections on the plain and implicit-TLS command
//! ports and runs one session task per connection. Live sessions are
//! tracked in a map keyed by remote address and removed when their
//! command loop returns.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio_rustls::TlsAcceptor;

use crate::config::{Config, DISABLED_PORT};
use crate::core_auth::AuthenticatorFn;
use crate::core_fs::localfs::PhysicalFs;
use crate::core_fs::FileProvider;
use crate::core_network::{PortPool, SecurableConn};
use crate::core_tls;
use crate::session::{Session, SessionContext};

type SessionMap = Arc<Mutex<HashMap<String, Arc<SecurableConn>>>>;

pub struct Server {
    command_port: i32,
    tls_port: i32,
    ctx: Arc<SessionContext>,
    provider: Box<dyn FileProvider>,
    sessions: SessionMap,
    alive: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    command_addr: Option<SocketAddr>,
    tls_addr: Option<SocketAddr>,
}

impl Server {
    pub fn new(
        config: &Config,
        acceptor: Option<TlsAcceptor>,
        authenticator: AuthenticatorFn,
        provider: Box<dyn FileProvider>,
    ) -> Result<Self> {
        if config.server.tls_port != DISABLED_PORT && acceptor.is_none() {
            anyhow::bail!("cannot open an implicit TLS port without a certificate");
        }

        let pasv_address = if config.server.pasv_address.is_empty() {
            None
        } else {
            Some(
                config
                    .server
                    .pasv_address
                    .parse()
                    .with_context(|| format!("invalid pasv_address: {}", config.server.pasv_address))?,
            )
        };

        let ctx = Arc::new(SessionContext {
            acceptor,
            pool: Arc::new(PortPool::new(
                config.server.pasv_min_port,
                config.server.pasv_max_port,
            )),
            authenticator,
            idle_timeout: Duration::from_secs(config.server.idle_timeout_secs),
            pasv_address,
            download_buffer_size: config.server.download_buffer_size.unwrap_or(256 * 1024),
            upload_buffer_size: config.server.upload_buffer_size.unwrap_or(1024 * 1024),
        });

        Ok(Self {
            command_port: config.server.listen_port,
            tls_port: config.server.tls_port,
            ctx,
            provider,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            alive: Arc::new(AtomicBool::new(true)),
            shutdown: Arc::new(Notify::new()),
            command_addr: None,
            tls_addr: None,
        })
    }

    /// Binds the configured command ports and spawns their accept loops.
    pub async fn listen(&mut self) -> Result<()> {
        if self.command_port == DISABLED_PORT && self.tls_port == DISABLED_PORT {
            anyhow::bail!("both command ports are disabled");
        }

        if self.command_port != DISABLED_PORT {
            let listener = TcpListener::bind(("0.0.0.0", self.command_port as u16))
                .await
                .with_context(|| format!("failed to bind command port {}", self.command_port))?;
            let addr = listener.local_addr()?;
            self.command_addr = Some(addr);
            info!("command port opened on {}", addr);

            tokio::spawn(accept_loop(
                listener,
                None,
                Arc::clone(&self.ctx),
                Arc::clone(&self.sessions),
                self.provider.clone_provider(),
                Arc::clone(&self.alive),
                Arc::clone(&self.shutdown),
            ));
        }

        if self.tls_port != DISABLED_PORT {
            let implicit_acceptor = self
                .ctx
                .acceptor
                .clone()
                .context("implicit TLS port requires a certificate")?;
            let listener = TcpListener::bind(("0.0.0.0", self.tls_port as u16))
                .await
                .with_context(|| format!("failed to bind TLS command port {}", self.tls_port))?;
            let addr = listener.local_addr()?;
            self.tls_addr = Some(addr);
            info!("TLS command port opened on {}", addr);

            tokio::spawn(accept_loop(
                listener,
                Some(implicit_acceptor),
                Arc::clone(&self.ctx),
                Arc::clone(&self.sessions),
                self.provider.clone_provider(),
                Arc::clone(&self.alive),
                Arc::clone(&self.shutdown),
            ));
        }

        Ok(())
    }

    pub fn command_addr(&self) -> Option<SocketAddr> {
        self.command_addr
    }

    pub fn tls_addr(&self) -> Option<SocketAddr> {
        self.tls_addr
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Stops the accept loops. Sessions already running are left to
    /// finish on their own.
    pub fn shutdown(&self) {
        info!("server shutting down");
        self.alive.store(false, Ordering::SeqCst);
        self.shutdown.notify_waiters();
    }
}

async fn accept_loop(
    listener: TcpListener,
    implicit_acceptor: Option<TlsAcceptor>,
    ctx: Arc<SessionContext>,
    sessions: SessionMap,
    provider: Box<dyn FileProvider>,
    alive: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
) {
    loop {
        let stream = tokio::select! {
            _ = shutdown.notified() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    if !alive.load(Ordering::SeqCst) {
                        break;
                    }
                    info!("accepted control connection from {}", peer);
                    stream
                }
                Err(e) => {
                    error!("error accepting control connection: {}", e);
                    break;
                }
            }
        };

        tokio::spawn(handle_client(
            stream,
            implicit_acceptor.clone(),
            Arc::clone(&ctx),
            Arc::clone(&sessions),
            provider.clone_provider(),
        ));
    }
}

async fn handle_client(
    stream: TcpStream,
    implicit_acceptor: Option<TlsAcceptor>,
    ctx: Arc<SessionContext>,
    sessions: SessionMap,
    provider: Box<dyn FileProvider>,
) {
    let peer = match stream.peer_addr() {
        Ok(peer) => peer,
        Err(e) => {
            warn!("could not resolve peer address: {}", e);
            return;
        }
    };

    let conn = match &implicit_acceptor {
        Some(acceptor) => match acceptor.accept(stream).await {
            Ok(tls_stream) => SecurableConn::new_secure(tls_stream, ctx.acceptor.clone()),
            Err(e) => {
                warn!("implicit TLS handshake with {} failed: {}", peer, e);
                return;
            }
        },
        None => SecurableConn::new_plain(stream, ctx.acceptor.clone()),
    };
    let conn = match conn {
        Ok(conn) => Arc::new(conn),
        Err(e) => {
            warn!("could not set up control connection for {}: {}", peer, e);
            return;
        }
    };

    let key = peer.to_string();
    sessions
        .lock()
        .unwrap()
        .insert(key.clone(), Arc::clone(&conn));

    let mut session = Session::new(conn, ctx, provider);
    if let Err(e) = session.handle().await {
        warn!("session for {} ended with error: {}", peer, e);
    }
    session.close().await;

    sessions.lock().unwrap().remove(&key);
    info!("session for {} terminated", peer);
}

/// Wires configuration into a running server and blocks until ctrl-c.
pub async fn run(config: Config) -> Result<()> {
    let acceptor = if config.tls.enabled {
        Some(core_tls::build_acceptor(&config.tls)?)
    } else {
        None
    };

    let authenticator = if config.server.passwd_file.is_empty() {
        warn!("no passwd file configured, accepting any credentials");
        crate::core_auth::allow_all_authenticator()
    } else {
        crate::core_auth::passwd_authenticator(&config.server.passwd_file)?
    };

    let provider = PhysicalFs::new(&config.server.root_dir)
        .await
        .with_context(|| format!("cannot serve root directory {}", config.server.root_dir))?;

    let mut server = Server::new(&config, acceptor, authenticator, Box::new(provider))?;
    server.listen().await?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for shutdown signal")?;
    server.shutdown();
    Ok(())
}
