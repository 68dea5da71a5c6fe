use crate::core_fs::FileProvider;
use crate::session::Session;

pub async fn handle_pwd_command(ses: &mut Session, _tokens: &[String]) -> std::io::Result<bool> {
    let current = ses.provider.current_directory();
    ses.send_statement(&format!("257 \"{}\"", current)).await?;
    Ok(false)
}
