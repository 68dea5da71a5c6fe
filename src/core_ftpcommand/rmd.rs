use log::warn;

use crate::core_fs::FileProvider;
use crate::session::Session;

pub async fn handle_rmd_command(ses: &mut Session, tokens: &[String]) -> std::io::Result<bool> {
    if tokens.len() < 2 {
        ses.send_statement("501 folder name needed").await?;
        return Ok(false);
    }

    let path = tokens[1..].join(" ");
    if let Err(e) = ses.provider.remove_directory(&path).await {
        warn!("RMD failed for {}: {}", path, e);
        ses.send_statement(&format!("550 cannot delete folder {} ({})", tokens[1], e))
            .await?;
        return Ok(false);
    }

    ses.send_statement("250 folder deleted successfully").await?;
    Ok(false)
}
