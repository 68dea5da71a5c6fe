//! Per-connection FTP command loop.
//!
//! A session owns one securable control connection, at most one data
//! channel, one identity and a private clone of the file provider. The
//! loop is strictly sequential: every reply to command N is written
//! before command N+1 is read, which is what lets handlers mutate the
//! data channel and the REST offset without further locking.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{debug, info, warn};
use tokio::time::{timeout, Instant};
use tokio_rustls::TlsAcceptor;

use crate::core_auth::{AuthenticatorFn, Identity};
use crate::core_fs::FileProvider;
use crate::core_ftpcommand as cmd;
use crate::core_ftpcommand::ftpcommand::FtpCommand;
use crate::core_network::{DataChannel, PortPool, SecurableConn};

/// Server-wide state shared by every session.
pub struct SessionContext {
    pub acceptor: Option<TlsAcceptor>,
    pub pool: Arc<PortPool>,
    pub authenticator: AuthenticatorFn,
    pub idle_timeout: Duration,
    /// Address advertised in PASV replies; `None` auto-discovers.
    pub pasv_address: Option<Ipv4Addr>,
    pub download_buffer_size: usize,
    pub upload_buffer_size: usize,
}

pub struct Session {
    pub(crate) conn: Arc<SecurableConn>,
    pub(crate) ctx: Arc<SessionContext>,
    pub(crate) last_activity: Instant,
    pub(crate) identity: Identity,
    pub(crate) data_channel: Option<DataChannel>,
    pub(crate) provider: Box<dyn FileProvider>,
    pub(crate) data_encryption: bool,
    pub(crate) last_rest: u64,
}

impl Session {
    pub fn new(
        conn: Arc<SecurableConn>,
        ctx: Arc<SessionContext>,
        provider: Box<dyn FileProvider>,
    ) -> Self {
        Self {
            conn,
            ctx,
            last_activity: Instant::now(),
            identity: Identity::new("", false),
            data_channel: None,
            provider,
            data_encryption: false,
            last_rest: 0,
        }
    }

    /// Runs the command loop until QUIT, EOF, idle timeout or a control
    /// I/O failure. EOF and idle timeout are not errors.
    pub async fn handle(&mut self) -> Result<()> {
        debug!("session started for {}", self.conn.peer_addr());
        self.send_statement("220 ferroftpd FTP Server welcomes you!")
            .await?;

        loop {
            let line = match timeout(self.ctx.idle_timeout, self.conn.read_command()).await {
                Err(_) => {
                    info!(
                        "session for {} idle for more than {:?}, dropping",
                        self.conn.peer_addr(),
                        self.ctx.idle_timeout
                    );
                    return Ok(());
                }
                Ok(Err(e)) => return Err(e.into()),
                Ok(Ok(None)) => {
                    debug!("control connection with {} closed", self.conn.peer_addr());
                    return Ok(());
                }
                Ok(Ok(Some(line))) => line,
            };

            let tokens: Vec<String> = line.split_whitespace().map(str::to_string).collect();
            if tokens.is_empty() {
                continue;
            }

            self.last_activity = Instant::now();
            info!("received {} from {}", tokens[0], self.conn.peer_addr());

            let terminate = match FtpCommand::from_str(&tokens[0]) {
                Some(command) => self.run_command(command, &tokens).await?,
                None => {
                    self.send_statement("502 not implemented").await?;
                    false
                }
            };

            if terminate {
                return Ok(());
            }
        }
    }

    /// Closes the control connection and whatever data channel is live.
    pub async fn close(&mut self) {
        debug!(
            "closing session for {} (last activity {:?} ago)",
            self.conn.peer_addr(),
            self.last_activity.elapsed()
        );
        self.conn.close().await;
        if let Some(mut dc) = self.data_channel.take() {
            if !dc.is_closed() {
                dc.close();
            }
        }
    }

    async fn run_command(
        &mut self,
        command: FtpCommand,
        tokens: &[String],
    ) -> std::io::Result<bool> {
        use FtpCommand::*;

        match command {
            USER | PASS => {
                CmdList::new(self, tokens, command)
                    .reset_rest()
                    .execute()
                    .await
            }
            SYST | FEAT | QUIT | NOOP | AUTH => {
                CmdList::new(self, tokens, command)
                    .reset_user()
                    .reset_rest()
                    .execute()
                    .await
            }
            PWD | TYPE | PASV | EPSV | CWD | CDUP | SIZE | MKD | RMD | DELE | PROT => {
                CmdList::new(self, tokens, command)
                    .require_auth()
                    .reset_user()
                    .reset_rest()
                    .execute()
                    .await
            }
            LIST | NLST | REST => {
                CmdList::new(self, tokens, command)
                    .require_auth()
                    .require_pasv()
                    .reset_user()
                    .reset_rest()
                    .execute()
                    .await
            }
            RETR => {
                CmdList::new(self, tokens, command)
                    .require_auth()
                    .reset_user()
                    .require_pasv()
                    .execute()
                    .await
            }
            STOR => {
                CmdList::new(self, tokens, command)
                    .require_auth()
                    .reset_user()
                    .reset_rest()
                    .require_pasv()
                    .execute()
                    .await
            }
        }
    }

    pub(crate) async fn send_statement(&self, statement: &str) -> std::io::Result<()> {
        self.conn.send_statement(statement).await
    }

    /// Closes any previous data channel, allocates a fresh one and binds
    /// its listener. The advertised port is accepting once this returns.
    pub(crate) async fn open_passive_channel(&mut self) -> Result<(), String> {
        if let Some(mut previous) = self.data_channel.take() {
            debug!("closing unused data channel on port {}", previous.port());
            previous.close();
        }

        let mut channel = DataChannel::new(
            Arc::clone(&self.ctx.pool),
            self.ctx.acceptor.clone(),
            self.data_encryption,
        )
        .map_err(|e| format!("550 Could not allocate passive port: {}", e))?;

        if let Err(e) = channel.open().await {
            warn!("could not open passive port {}: {}", channel.port(), e);
            channel.close();
            return Err(format!("550 Could not open passive port: {}", e));
        }

        self.data_channel = Some(channel);
        Ok(())
    }

    /// The IPv4 address advertised in a 227 reply: the configured
    /// address, else the source address of a routed socket, else the
    /// control connection's own local address.
    pub(crate) fn local_pasv_ip(&self) -> std::io::Result<Ipv4Addr> {
        if let Some(address) = self.ctx.pasv_address {
            return Ok(address);
        }

        let probe = std::net::UdpSocket::bind("0.0.0.0:0")?;
        if probe.connect(("8.8.8.8", 80)).is_ok() {
            if let Ok(std::net::SocketAddr::V4(addr)) = probe.local_addr() {
                if !addr.ip().is_loopback() {
                    return Ok(*addr.ip());
                }
            }
        }

        match self.conn.local_addr() {
            std::net::SocketAddr::V4(addr) => Ok(*addr.ip()),
            std::net::SocketAddr::V6(_) => Err(std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                "no valid IPv4 address found",
            )),
        }
    }
}

enum Step {
    RequireAuth,
    RequirePasv,
    ResetRest,
    ResetUser,
}

/// Builder applying the per-command checks and resets in chain order
/// before the handler runs. A failed check sends its reply and blocks
/// the handler; resets apply regardless.
struct CmdList<'a> {
    ses: &'a mut Session,
    tokens: &'a [String],
    command: FtpCommand,
    steps: Vec<Step>,
}

impl<'a> CmdList<'a> {
    fn new(ses: &'a mut Session, tokens: &'a [String], command: FtpCommand) -> Self {
        Self {
            ses,
            tokens,
            command,
            steps: Vec::new(),
        }
    }

    fn require_auth(mut self) -> Self {
        self.steps.push(Step::RequireAuth);
        self
    }

    fn require_pasv(mut self) -> Self {
        self.steps.push(Step::RequirePasv);
        self
    }

    fn reset_rest(mut self) -> Self {
        self.steps.push(Step::ResetRest);
        self
    }

    fn reset_user(mut self) -> Self {
        self.steps.push(Step::ResetUser);
        self
    }

    async fn execute(self) -> std::io::Result<bool> {
        let CmdList {
            ses,
            tokens,
            command,
            steps,
        } = self;

        let mut blocked = false;
        for step in steps {
            match step {
                Step::RequireAuth => {
                    if !blocked && !ses.identity.authenticated() {
                        ses.send_statement("530 Please login with USER and PASS.")
                            .await?;
                        blocked = true;
                    }
                }
                Step::RequirePasv => {
                    let missing = ses
                        .data_channel
                        .as_ref()
                        .map_or(true, |dc| dc.is_closed());
                    if !blocked && missing {
                        ses.send_statement("425 Use PASV or EPSV first").await?;
                        blocked = true;
                    }
                }
                Step::ResetRest => ses.last_rest = 0,
                Step::ResetUser => {
                    if !ses.identity.authenticated() {
                        ses.identity.set_username("");
                    }
                }
            }
        }

        if blocked {
            return Ok(false);
        }

        dispatch(ses, command, tokens).await
    }
}

async fn dispatch(
    ses: &mut Session,
    command: FtpCommand,
    tokens: &[String],
) -> std::io::Result<bool> {
    match command {
        FtpCommand::USER => cmd::user::handle_user_command(ses, tokens).await,
        FtpCommand::PASS => cmd::pass::handle_pass_command(ses, tokens).await,
        FtpCommand::PWD => cmd::pwd::handle_pwd_command(ses, tokens).await,
        FtpCommand::TYPE => cmd::type_::handle_type_command(ses, tokens).await,
        FtpCommand::PASV => cmd::pasv::handle_pasv_command(ses, tokens).await,
        FtpCommand::EPSV => cmd::epsv::handle_epsv_command(ses, tokens).await,
        FtpCommand::LIST => cmd::list::handle_list_command(ses, tokens).await,
        FtpCommand::SYST => cmd::syst::handle_syst_command(ses, tokens).await,
        FtpCommand::CWD => cmd::cwd::handle_cwd_command(ses, tokens).await,
        FtpCommand::CDUP => cmd::cdup::handle_cdup_command(ses, tokens).await,
        FtpCommand::SIZE => cmd::size::handle_size_command(ses, tokens).await,
        FtpCommand::RETR => cmd::retr::handle_retr_command(ses, tokens).await,
        FtpCommand::STOR => cmd::stor::handle_stor_command(ses, tokens).await,
        FtpCommand::DELE => cmd::dele::handle_dele_command(ses, tokens).await,
        FtpCommand::FEAT => cmd::feat::handle_feat_command(ses, tokens).await,
        FtpCommand::QUIT => cmd::quit::handle_quit_command(ses, tokens).await,
        FtpCommand::NOOP => cmd::noop::handle_noop_command(ses, tokens).await,
        FtpCommand::MKD => cmd::mkd::handle_mkd_command(ses, tokens).await,
        FtpCommand::RMD => cmd::rmd::handle_rmd_command(ses, tokens).await,
        FtpCommand::REST => cmd::rest::handle_rest_command(ses, tokens).await,
        FtpCommand::NLST => cmd::nlst::handle_nlst_command(ses, tokens).await,
        FtpCommand::AUTH => cmd::auth::handle_auth_command(ses, tokens).await,
        FtpCommand::PROT => cmd::prot::handle_prot_command(ses, tokens).await,
    }
}
