use crate::session::Session;

pub async fn handle_syst_command(ses: &mut Session, _tokens: &[String]) -> std::io::Result<bool> {
    ses.send_statement("215 UNIX Type: L8").await?;
    Ok(false)
}
