use crate::session::Session;

pub async fn handle_noop_command(ses: &mut Session, _tokens: &[String]) -> std::io::Result<bool> {
    ses.send_statement("200 NOOP ok.").await?;
    Ok(false)
}
