use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core_tls::TlsConfig;

/// A command port set to `-1` disables that side of the server.
pub const DISABLED_PORT: i32 = -1;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Plain FTP command port. `-1` disables the plain listener.
    pub listen_port: i32,
    /// Implicit TLS command port (conventionally 990). `-1` disables it.
    pub tls_port: i32,
    /// Lower bound of the passive port range (inclusive).
    pub pasv_min_port: u16,
    /// Upper bound of the passive port range (exclusive).
    pub pasv_max_port: u16,
    /// Address advertised in PASV replies. Empty means auto-discover.
    pub pasv_address: String,
    /// Directory served as the virtual root `/`.
    pub root_dir: String,
    /// Sessions idle longer than this are dropped.
    pub idle_timeout_secs: u64,
    pub upload_buffer_size: Option<usize>,
    pub download_buffer_size: Option<usize>,
    /// Path to a `user:bcrypt-hash` passwd file. Empty accepts any login.
    pub passwd_file: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub tls: TlsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_port: 21,
            tls_port: DISABLED_PORT,
            pasv_min_port: 50000,
            pasv_max_port: 50100,
            pasv_address: String::new(),
            root_dir: String::from("/srv/ftp"),
            idle_timeout_secs: 900,
            upload_buffer_size: Some(1024 * 1024),
            download_buffer_size: Some(256 * 1024),
            passwd_file: String::new(),
        }
    }
}

impl Config {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path))?;
        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse configuration file: {}", path))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: Config = toml::from_str(
            r#"
            [server]
            listen_port = 2121
            root_dir = "/tmp/ftp"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.listen_port, 2121);
        assert_eq!(config.server.tls_port, DISABLED_PORT);
        assert_eq!(config.server.pasv_min_port, 50000);
        assert_eq!(config.server.download_buffer_size, Some(256 * 1024));
        assert!(!config.tls.enabled);
    }
}
