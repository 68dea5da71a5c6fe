use log::warn;

use crate::core_fs::{File, FileProvider};
use crate::core_ftpcommand::utils::clean;
use crate::session::Session;

pub async fn handle_size_command(ses: &mut Session, tokens: &[String]) -> std::io::Result<bool> {
    if tokens.len() < 2 {
        ses.send_statement("501 object needed!").await?;
        return Ok(false);
    }

    let path = clean(&tokens[1..].join(" "));
    match ses.provider.get(&path).await {
        Ok(file) => {
            ses.send_statement(&format!("213 {}", file.size())).await?;
        }
        Err(e) => {
            warn!("SIZE failed for {}: {}", path, e);
            ses.send_statement(&format!("550 Could not get file: {}.", e))
                .await?;
        }
    }
    Ok(false)
}
