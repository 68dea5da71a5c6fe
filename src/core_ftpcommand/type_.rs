use crate::session::Session;

/// Only TYPE I and TYPE A are accepted. ASCII mode is echoed but every
/// transfer stays binary; no CRLF translation happens.
pub async fn handle_type_command(ses: &mut Session, tokens: &[String]) -> std::io::Result<bool> {
    if tokens.len() < 2 {
        ses.send_statement("501 type needed!").await?;
        return Ok(false);
    }

    let requested = &tokens[1];
    if !requested.eq_ignore_ascii_case("i") && !requested.eq_ignore_ascii_case("a") {
        ses.send_statement(&format!(
            "504 Type I and A are the only one supported. {} is not supported at this time",
            requested
        ))
        .await?;
        return Ok(false);
    }

    ses.send_statement(&format!("200 Type set to {}", requested.to_uppercase()))
        .await?;
    Ok(false)
}
