use log::warn;

use crate::session::Session;

/// Explicit TLS upgrade of the control channel. Only available when a
/// certificate is configured and the stream is still plain; the 234
/// reply goes out before the handshake so the client knows to start it.
pub async fn handle_auth_command(ses: &mut Session, tokens: &[String]) -> std::io::Result<bool> {
    if ses.ctx.acceptor.is_none() || ses.conn.is_secure() {
        ses.send_statement("502 not supported").await?;
        return Ok(false);
    }

    if tokens.len() < 2 {
        ses.send_statement("550 must specify protocol!").await?;
        return Ok(false);
    }

    if tokens[1] != "TLS" {
        ses.send_statement(&format!("503 {} is not supported", tokens[1]))
            .await?;
        return Ok(false);
    }

    ses.send_statement("234 Using authentication type TLS")
        .await?;

    if let Err(e) = ses.conn.switch_to_tls().await {
        warn!("control-channel TLS upgrade failed: {}", e);
        ses.send_statement(&format!("550 error initializing TLS: {}", e))
            .await?;
    }
    Ok(false)
}
