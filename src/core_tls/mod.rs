pub mod acceptor;
pub mod error;
pub mod tls_config;

pub use acceptor::build_acceptor;
pub use error::TlsError;
pub use tls_config::TlsConfig;
