use crate::core_ftpcommand::cwd::handle_cwd_command;
use crate::session::Session;

pub async fn handle_cdup_command(ses: &mut Session, _tokens: &[String]) -> std::io::Result<bool> {
    let up = vec!["CWD".to_string(), "..".to_string()];
    handle_cwd_command(ses, &up).await
}
