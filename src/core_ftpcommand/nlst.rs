use std::sync::Arc;

use tokio::io::AsyncWriteExt;

use crate::core_fs::File;
use crate::core_ftpcommand::list::collect_files;
use crate::session::Session;

/// Like LIST, but emits bare names only, one per line.
pub async fn handle_nlst_command(ses: &mut Session, tokens: &[String]) -> std::io::Result<bool> {
    let files = match collect_files(ses, tokens).await? {
        Some(files) => files,
        None => return Ok(false),
    };

    let mut listing = String::new();
    for file in &files {
        listing.push_str(&format!("{}\r\n", file.name()));
    }

    let Some(mut channel) = ses.data_channel.take() else {
        ses.send_statement("425 Use PASV or EPSV first").await?;
        return Ok(false);
    };
    let conn = Arc::clone(&ses.conn);

    channel
        .sink(Box::new(move |mut stream| {
            Box::pin(async move {
                conn.send_statement("150 Here comes the directory listing.")
                    .await
                    .ok();

                if let Err(e) = stream.write_all(listing.as_bytes()).await {
                    let _ = conn
                        .send_statement(&format!("550 Directory listing error: {}", e))
                        .await;
                    return Err(e.into());
                }
                stream.shutdown().await?;

                conn.send_statement("226 Directory send OK.").await.ok();
                Ok(())
            })
        }))
        .await;

    Ok(false)
}
