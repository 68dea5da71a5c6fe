use std::sync::Arc;

use log::{info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::core_fs::{File, FileProvider};
use crate::session::Session;

/// Creates (or overwrites) the target and drains the data channel into
/// it until the client closes its side.
pub async fn handle_stor_command(ses: &mut Session, tokens: &[String]) -> std::io::Result<bool> {
    if tokens.len() < 2 {
        ses.send_statement("501 object needed!").await?;
        return Ok(false);
    }

    let name = tokens[1..].join(" ");
    let file = match ses.provider.new_entry(&name, false).await {
        Ok(file) => file,
        Err(e) => {
            warn!("STOR could not create {}: {}", name, e);
            ses.send_statement(&format!("550 Could not create file: {}.", e))
                .await?;
            return Ok(false);
        }
    };

    let Some(mut channel) = ses.data_channel.take() else {
        ses.send_statement("425 Use PASV or EPSV first").await?;
        return Ok(false);
    };

    let conn = Arc::clone(&ses.conn);
    let chunk_size = ses.ctx.upload_buffer_size;

    channel
        .sink(Box::new(move |mut stream| {
            Box::pin(async move {
                let mut target = match file.write().await {
                    Ok(target) => target,
                    Err(e) => {
                        warn!("STOR could not open {}: {}", file.full_path(), e);
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
                info!("receiving {}", file.full_path());

                let mut buf = vec![0u8; chunk_size];
                loop {
                    let n = stream.read(&mut buf).await?;
                    if n == 0 {
                        break;
                    }
                    target.write_all(&buf[..n]).await?;
                }
                target.flush().await?;

                conn.send_statement("226 File received OK.").await.ok();
                Ok(())
            })
        }))
        .await;

    Ok(false)
}
