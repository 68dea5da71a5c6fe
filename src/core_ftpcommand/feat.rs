use crate::core_ftpcommand::ftpcommand::COMMANDS;
use crate::session::Session;

/// Multi-line feature listing. AUTH is advertised only while an upgrade
/// is still possible: a certificate is configured and the control stream
/// is not yet secure.
pub async fn handle_feat_command(ses: &mut Session, _tokens: &[String]) -> std::io::Result<bool> {
    let mut reply = String::from("211-Features:\r\n");

    for command in COMMANDS {
        reply.push_str(&format!(" {}\r\n", command));
    }

    if ses.ctx.acceptor.is_some() && !ses.conn.is_secure() {
        reply.push_str(" AUTH\r\n");
    }

    reply.push_str("211 End");
    ses.send_statement(&reply).await?;
    Ok(false)
}
