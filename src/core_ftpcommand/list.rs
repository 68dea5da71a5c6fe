use std::sync::Arc;

use chrono::{Duration, Local};
use log::debug;
use tokio::io::AsyncWriteExt;

use crate::core_fs::{File, FileProvider};
use crate::session::Session;

/// Sends a long-form directory listing over the data channel. An
/// argument temporarily changes into the named directory and restores
/// the previous one afterwards.
pub async fn handle_list_command(ses: &mut Session, tokens: &[String]) -> std::io::Result<bool> {
    let files = match collect_files(ses, tokens).await? {
        Some(files) => files,
        None => return Ok(false),
    };
    debug!("listing {} entries", files.len());

    let listing = compose_listing(&files);

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

/// Lists the requested directory, restoring the current one when an
/// explicit path was given. `None` means a 451 reply was already sent.
pub(crate) async fn collect_files(
    ses: &mut Session,
    tokens: &[String],
) -> std::io::Result<Option<Vec<Box<dyn File>>>> {
    let previous = ses.provider.current_directory();

    if tokens.len() > 1 {
        if let Err(e) = ses.provider.change_directory(&tokens[1]).await {
            ses.send_statement(&format!("451 cannot retrieve directory list: {}", e))
                .await?;
            return Ok(None);
        }
    }

    let listed = ses.provider.list().await;

    if tokens.len() > 1 {
        if let Err(e) = ses.provider.change_directory(&previous).await {
            ses.send_statement(&format!("451 cannot retrieve directory list: {}", e))
                .await?;
            return Ok(None);
        }
    }

    match listed {
        Ok(files) => Ok(Some(files)),
        Err(e) => {
            ses.send_statement(&format!("451 cannot retrieve directory list: {}", e))
                .await?;
            Ok(None)
        }
    }
}

fn compose_listing(files: &[Box<dyn File>]) -> String {
    let mut out = String::new();

    // Synthetic entries for the current and parent directory.
    for name in [".", ".."] {
        out.push_str(&format!(
            "{}   1 {:<10} {:<10} {:>10} Jan  02  2006 {}\r\n",
            "drwxrwxrwx", "group", "user", 0, name
        ));
    }

    for file in files {
        out.push_str(&format_list_entry(file.as_ref()));
    }

    out
}

/// One listing line. Entries older than about half a year show the year
/// instead of the time of day.
fn format_list_entry(file: &dyn File) -> String {
    let modified = file.mod_time();
    let date = if Local::now().signed_duration_since(modified) > Duration::days(180) {
        modified.format("%b %e  %Y").to_string()
    } else {
        modified.format("%b %e %H:%M").to_string()
    };

    format!(
        "{}   1 {:<10} {:<10} {:>10} {} {}\r\n",
        file.mode(),
        "group",
        "user",
        file.size(),
        date,
        file.name()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_fs::localfs::PhysicalFile;
    use chrono::TimeZone;

    #[test]
    fn recent_entries_show_the_time() {
        let file = PhysicalFile::new("fresh.txt", "/srv", false, 42, Local::now(), 0o644);
        let line = format_list_entry(&file);

        assert!(line.starts_with("-rw-r--r--   1 group      user       "));
        assert!(line.contains("        42 "));
        assert!(line.ends_with("fresh.txt\r\n"));
        assert!(line.contains(':'), "recent entry should show HH:MM: {line}");
    }

    #[test]
    fn old_entries_show_the_year() {
        let old = Local.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap();
        let file = PhysicalFile::new("ancient.txt", "/srv", false, 7, old, 0o644);
        let line = format_list_entry(&file);

        assert!(line.contains("Jan  2  2006"), "unexpected line: {line}");
        assert!(!line.contains("15:04"));
    }

    #[test]
    fn listing_is_prefixed_with_synthetic_entries() {
        let listing = compose_listing(&[]);
        let lines: Vec<&str> = listing.split("\r\n").collect();

        assert!(lines[0].starts_with("drwxrwxrwx   1 group      user"));
        assert!(lines[0].ends_with(" Jan  02  2006 ."));
        assert!(lines[1].ends_with(" Jan  02  2006 .."));
    }
}
