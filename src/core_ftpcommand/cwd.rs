use log::debug;

use crate::core_fs::FileProvider;
use crate::core_ftpcommand::utils::clean;
use crate::session::Session;

pub async fn handle_cwd_command(ses: &mut Session, tokens: &[String]) -> std::io::Result<bool> {
    if tokens.len() < 2 {
        ses.send_statement("550 Failed to change directory").await?;
        return Ok(false);
    }

    let path = clean(&tokens[1..].join(" "));
    debug!("changing directory to {}", path);

    if ses.provider.change_directory(&path).await.is_err() {
        ses.send_statement("550 Failed to change directory").await?;
        return Ok(false);
    }

    ses.send_statement("250 Directory successfully changed")
        .await?;
    Ok(false)
}
