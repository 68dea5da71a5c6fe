use crate::session::Session;

pub async fn handle_epsv_command(ses: &mut Session, _tokens: &[String]) -> std::io::Result<bool> {
    if let Err(reply) = ses.open_passive_channel().await {
        ses.send_statement(&reply).await?;
        return Ok(false);
    }

    let port = match ses.data_channel.as_ref() {
        Some(channel) => channel.port(),
        None => return Ok(false),
    };

    ses.send_statement(&format!("229 Entering Extended Passive Mode (|||{}|)", port))
        .await?;
    Ok(false)
}
