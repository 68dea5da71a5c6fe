use std::path::Path;
use std::sync::Arc;

use tokio_rustls::{rustls, TlsAcceptor};

use crate::core_tls::error::TlsError;
use crate::core_tls::tls_config::TlsConfig;

/// Loads the PEM certificate chain and private key into a shareable
/// acceptor. Accepts PKCS#8 keys, falling back to RSA keys. A missing
/// or unreadable file surfaces through the same error as a malformed
/// one, with the path in the message.
pub fn build_acceptor(config: &TlsConfig) -> Result<TlsAcceptor, TlsError> {
    if !config.enabled {
        return Err(TlsError::TlsNotConfigured);
    }

    let cert_bytes = read_pem(&config.cert_file).map_err(TlsError::CertificateLoadError)?;
    let key_bytes = read_pem(&config.key_file).map_err(TlsError::PrivateKeyLoadError)?;

    let cert_chain: Vec<rustls::Certificate> = rustls_pemfile::certs(&mut &cert_bytes[..])
        .map_err(|e| TlsError::CertificateLoadError(e.to_string()))?
        .into_iter()
        .map(rustls::Certificate)
        .collect();
    if cert_chain.is_empty() {
        return Err(TlsError::CertificateLoadError(
            "No certificate found".to_string(),
        ));
    }

    let private_key = load_private_key(&key_bytes)?;

    let server_config = rustls::ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(cert_chain, private_key)
        .map_err(|e| TlsError::TlsConfigError(e.to_string()))?;

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

fn read_pem(path: &Path) -> Result<Vec<u8>, String> {
    std::fs::read(path).map_err(|e| format!("{}: {}", path.display(), e))
}

fn load_private_key(key_bytes: &[u8]) -> Result<rustls::PrivateKey, TlsError> {
    let mut keys = rustls_pemfile::pkcs8_private_keys(&mut &key_bytes[..])
        .map_err(|e| TlsError::PrivateKeyLoadError(e.to_string()))?;
    if keys.is_empty() {
        keys = rustls_pemfile::rsa_private_keys(&mut &key_bytes[..])
            .map_err(|e| TlsError::PrivateKeyLoadError(e.to_string()))?;
    }

    match keys.pop() {
        Some(key) => Ok(rustls::PrivateKey(key)),
        None => Err(TlsError::PrivateKeyLoadError(
            "No private key found".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn disabled_config_is_not_an_acceptor() {
        let config = TlsConfig::default();
        assert!(matches!(
            build_acceptor(&config),
            Err(TlsError::TlsNotConfigured)
        ));
    }

    #[test]
    fn missing_certificate_is_reported_with_its_path() {
        let config = TlsConfig {
            enabled: true,
            cert_file: PathBuf::from("/nonexistent/cert.pem"),
            key_file: PathBuf::from("/nonexistent/key.pem"),
        };
        match build_acceptor(&config) {
            Err(TlsError::CertificateLoadError(message)) => {
                assert!(message.contains("/nonexistent/cert.pem"), "{message}");
            }
            other => panic!("expected CertificateLoadError, got {:?}", other.err()),
        }
    }

    #[test]
    fn missing_key_is_reported_with_its_path() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("cert.pem");
        std::fs::write(&cert, "not a certificate").unwrap();

        let config = TlsConfig {
            enabled: true,
            cert_file: cert,
            key_file: dir.path().join("absent-key.pem"),
        };
        assert!(matches!(
            build_acceptor(&config),
            Err(TlsError::PrivateKeyLoadError(_))
        ));
    }

    #[test]
    fn garbage_pem_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");
        std::fs::write(&cert, "not a certificate").unwrap();
        std::fs::write(&key, "not a key").unwrap();

        let config = TlsConfig {
            enabled: true,
            cert_file: cert,
            key_file: key,
        };
        assert!(build_acceptor(&config).is_err());
    }
}
