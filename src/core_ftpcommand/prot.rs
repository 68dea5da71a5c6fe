use crate::session::Session;

/// PROT P/C selects data-channel encryption. Requires the control
/// channel to be secure already; applies to the pending data channel as
/// well as every one opened later.
pub async fn handle_prot_command(ses: &mut Session, tokens: &[String]) -> std::io::Result<bool> {
    if !ses.conn.is_secure() {
        ses.send_statement("502 not supported").await?;
        return Ok(false);
    }

    if tokens.len() < 2 {
        ses.send_statement("550 must specify protection level!")
            .await?;
        return Ok(false);
    }

    let level = tokens[1].to_uppercase();
    match level.as_str() {
        "P" => {
            ses.data_encryption = true;
            if let Some(channel) = ses.data_channel.as_ref() {
                channel.set_encrypted(true);
            }
            ses.send_statement("200 data channel TLS encryption enabled")
                .await?;
        }
        "C" => {
            ses.data_encryption = false;
            if let Some(channel) = ses.data_channel.as_ref() {
                channel.set_encrypted(false);
            }
            ses.send_statement("200 data channel TLS encryption disabled")
                .await?;
        }
        _ => {
            ses.send_statement(&format!("550 {} is not supported", level))
                .await?;
        }
    }
    Ok(false)
}
