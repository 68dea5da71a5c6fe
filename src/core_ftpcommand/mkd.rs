use log::warn;

use crate::core_fs::{File, FileProvider};
use crate::session::Session;

pub async fn handle_mkd_command(ses: &mut Session, tokens: &[String]) -> std::io::Result<bool> {
    if tokens.len() < 2 {
        ses.send_statement("501 folder name needed").await?;
        return Ok(false);
    }

    let path = tokens[1..].join(" ");
    if let Err(e) = ses.provider.create_directory(&path).await {
        warn!("MKD failed for {}: {}", path, e);
        ses.send_statement(&format!("550 cannot create folder {} ({})", path, e))
            .await?;
        return Ok(false);
    }

    let created = match ses.provider.get(&path).await {
        Ok(dir) => dir,
        Err(e) => {
            ses.send_statement(&format!("550 cannot create folder {} ({})", path, e))
                .await?;
            return Ok(false);
        }
    };

    ses.send_statement(&format!("257 \"{}\" directory created", created.full_path()))
        .await?;
    Ok(false)
}
