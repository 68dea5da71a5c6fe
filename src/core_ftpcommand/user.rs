use crate::session::Session;

pub async fn handle_user_command(ses: &mut Session, tokens: &[String]) -> std::io::Result<bool> {
    if tokens.len() < 2 {
        ses.send_statement("501 user needed!").await?;
        return Ok(false);
    }

    ses.identity.set_username(tokens[1].clone());
    ses.send_statement(&format!(
        "331 Password required for {}.",
        ses.identity.username()
    ))
    .await?;
    Ok(false)
}
