use crate::session::Session;

pub async fn handle_quit_command(ses: &mut Session, _tokens: &[String]) -> std::io::Result<bool> {
    ses.send_statement("221 Goodbye.").await?;
    Ok(true)
}
