use crate::session::Session;

/// Stores the restart offset consumed by the next RETR. The pipeline has
/// already zeroed the previous offset by the time this runs.
pub async fn handle_rest_command(ses: &mut Session, tokens: &[String]) -> std::io::Result<bool> {
    if tokens.len() < 2 {
        ses.send_statement("501 size needed").await?;
        return Ok(false);
    }

    match tokens[1].parse::<u64>() {
        Ok(offset) => {
            ses.last_rest = offset;
            ses.send_statement("350 start position moved successfully")
                .await?;
        }
        Err(e) => {
            ses.send_statement(&format!("550 syntax error ({})", e))
                .await?;
        }
    }
    Ok(false)
}
