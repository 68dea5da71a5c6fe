#[derive(Clone, Copy, Eq, Hash, PartialEq, Debug)]
pub enum FtpCommand {
    USER,
    PASS,
    PWD,
    TYPE,
    PASV,
    EPSV,
    LIST,
    SYST,
    CWD,
    CDUP,
    SIZE,
    RETR,
    STOR,
    DELE,
    FEAT,
    QUIT,
    NOOP,
    MKD,
    RMD,
    REST,
    NLST,
    AUTH,
    PROT,
}

/// Command words advertised by FEAT. AUTH is appended there only when a
/// certificate is configured; PROT is never advertised.
pub const COMMANDS: &[&str] = &[
    "USER", "PASS", "PWD", "TYPE", "PASV", "EPSV", "LIST", "SYST", "CWD", "CDUP", "SIZE", "RETR",
    "STOR", "DELE", "FEAT", "QUIT", "NOOP", "MKD", "RMD", "REST", "NLST",
];

impl FtpCommand {
    /// Command matching is case-sensitive ASCII: `user` is not USER.
    pub fn from_str(cmd: &str) -> Option<FtpCommand> {
        match cmd {
            "USER" => Some(FtpCommand::USER),
            "PASS" => Some(FtpCommand::PASS),
            "PWD" => Some(FtpCommand::PWD),
            "TYPE" => Some(FtpCommand::TYPE),
            "PASV" => Some(FtpCommand::PASV),
            "EPSV" => Some(FtpCommand::EPSV),
            "LIST" => Some(FtpCommand::LIST),
            "SYST" => Some(FtpCommand::SYST),
            "CWD" => Some(FtpCommand::CWD),
            "CDUP" => Some(FtpCommand::CDUP),
            "SIZE" => Some(FtpCommand::SIZE),
            "RETR" => Some(FtpCommand::RETR),
            "STOR" => Some(FtpCommand::STOR),
            "DELE" => Some(FtpCommand::DELE),
            "FEAT" => Some(FtpCommand::FEAT),
            "QUIT" => Some(FtpCommand::QUIT),
            "NOOP" => Some(FtpCommand::NOOP),
            "MKD" => Some(FtpCommand::MKD),
            "RMD" => Some(FtpCommand::RMD),
            "REST" => Some(FtpCommand::REST),
            "NLST" => Some(FtpCommand::NLST),
            "AUTH" => Some(FtpCommand::AUTH),
            "PROT" => Some(FtpCommand::PROT),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_is_case_sensitive() {
        assert_eq!(FtpCommand::from_str("USER"), Some(FtpCommand::USER));
        assert_eq!(FtpCommand::from_str("user"), None);
        assert_eq!(FtpCommand::from_str("XYZZY"), None);
    }
}
