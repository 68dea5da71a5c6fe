use std::sync::Arc;

use log::{info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::core_fs::{File, FileProvider};
use crate::core_ftpcommand::utils::clean;
use crate::session::Session;

/// Streams a file to the client over the pending data channel, starting
/// at the stored REST offset. The offset is consumed here: whatever
/// happens next starts at zero again.
pub async fn handle_retr_command(ses: &mut Session, tokens: &[String]) -> std::io::Result<bool> {
    let rest = ses.last_rest;
    ses.last_rest = 0;

    if tokens.len() < 2 {
        ses.send_statement("501 object needed!").await?;
        return Ok(false);
    }

    let path = clean(&tokens[1..].join(" "));
    let file = match ses.provider.get(&path).await {
        Ok(file) => file,
        Err(e) => {
            warn!("RETR could not resolve {}: {}", path, e);
            ses.send_statement(&format!("550 Could not get file: {}.", e))
                .await?;
            return Ok(false);
        }
    };

    let Some(mut channel) = ses.data_channel.take() else {
        ses.send_statement("425 Use PASV or EPSV first").await?;
        return Ok(false);
    };

    let conn = Arc::clone(&ses.conn);
    let chunk_size = ses.ctx.download_buffer_size;

    channel
        .sink(Box::new(move |mut stream| {
            Box::pin(async move {
                let mut source = match file.read(rest).await {
                    Ok(source) => source,
                    Err(e) => {
                        warn!("RETR could not open {}: {}", file.full_path(), e);
                        let _ = conn
                            .send_statement(&format!("550 Could not get file: {}.", e))
                            .await;
                        return Err(e.into());
                    }
                };

                conn.send_statement(&format!(
                    "150 Opening BINARY mode data connection for {}.",
                    file.name()
                ))
                .await
                .ok();
                info!("sending {} ({} bytes)", file.full_path(), file.size());

                let mut buf = vec![0u8; chunk_size];
                loop {
                    let n = source.read(&mut buf).await?;
                    if n == 0 {
                        break;
                    }
                    stream.write_all(&buf[..n]).await?;
                }
                stream.shutdown().await?;

                conn.send_statement("226 File send OK.").await.ok();
                Ok(())
            })
        }))
        .await;

    Ok(false)
}
