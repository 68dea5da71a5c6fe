use log::debug;

use crate::session::Session;

/// Allocates and opens a fresh passive data channel, then advertises it
/// in the `(a,b,c,d,hi,lo)` form. The reply is only sent once the
/// listener is bound and accepting.
pub async fn handle_pasv_command(ses: &mut Session, _tokens: &[String]) -> std::io::Result<bool> {
    let ip = match ses.local_pasv_ip() {
        Ok(ip) => ip,
        Err(e) => {
            ses.send_statement(&format!("550 Could not get local IP: {}", e))
                .await?;
            return Ok(false);
        }
    };
    debug!("advertising passive address {}", ip);

    if let Err(reply) = ses.open_passive_channel().await {
        ses.send_statement(&reply).await?;
        return Ok(false);
    }

    let port_part = match ses.data_channel.as_ref() {
        Some(channel) => channel.to_pasv_string_port(),
        None => return Ok(false),
    };

    let address_part = ip.to_string().replace('.', ",");
    ses.send_statement(&format!(
        "227 Entering Passive Mode ({},{})",
        address_part, port_part
    ))
    .await?;
    Ok(false)
}
