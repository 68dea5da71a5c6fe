use log::warn;

use crate::core_fs::{File, FileProvider};
use crate::session::Session;

pub async fn handle_dele_command(ses: &mut Session, tokens: &[String]) -> std::io::Result<bool> {
    if tokens.len() < 2 {
        ses.send_statement("501 file name needed").await?;
        return Ok(false);
    }

    let path = tokens[1..].join(" ");
    let file = match ses.provider.get(&path).await {
        Ok(file) => file,
        Err(e) => {
            ses.send_statement(&format!("550 cannot delete file {} ({})", tokens[1], e))
                .await?;
            return Ok(false);
        }
    };

    if let Err(e) = file.delete().await {
        warn!("DELE failed for {}: {}", path, e);
        ses.send_statement(&format!("550 cannot delete file {} ({})", tokens[1], e))
            .await?;
        return Ok(false);
    }

    ses.send_statement("200 file delete successfully").await?;
    Ok(false)
}
