use log::info;

use crate::core_fs::FileProvider;
use crate::session::Session;

/// The authenticator predicate is invoked exactly once per PASS. A
/// rejection clears the whole identity, so the next attempt has to start
/// over with USER.
pub async fn handle_pass_command(ses: &mut Session, tokens: &[String]) -> std::io::Result<bool> {
    if tokens.len() < 2 {
        ses.send_statement("501 password needed!").await?;
        return Ok(false);
    }

    let password = &tokens[1];
    if !(ses.ctx.authenticator)(ses.identity.username(), password) {
        info!("login rejected for {}", ses.identity.username());
        ses.identity.set_authenticated(false);
        ses.identity.set_username("");
        ses.send_statement("530 Password Rejected").await?;
        return Ok(false);
    }

    ses.identity.set_authenticated(true);
    ses.provider.set_identity(ses.identity.clone());
    info!("user {} logged in", ses.identity.username());
    ses.send_statement(&format!("230 User {} logged in.", ses.identity.username()))
        .await?;
    Ok(false)
}
