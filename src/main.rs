use anyhow::Result;
use env_logger::{Builder, Env};
use log::info;
use std::io::Write;
use structopt::StructOpt;

use ferroftpd::config::Config;
use ferroftpd::core_cli::Cli;
use ferroftpd::server;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Cli::from_args();

    // Initialize the logger with a custom format
    let default_filter = if args.verbose { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(default_filter))
        .format(|buf, record| {
            let timestamp = buf.timestamp();
            writeln!(
                buf,
                "[{}] [{}] {}",
                timestamp,
                record.level(),
                record.args()
            )
        })
        .init();

    // Determine the default config path based on the OS
    let default_config_path = if cfg!(target_os = "windows") {
        "C:\\ferroftpd\\etc\\ferroftpd.conf"
    } else {
        "/etc/ferroftpd.conf"
    };

    // Load configuration from the TOML file
    let config_path = if args.config.is_empty() {
        default_config_path
    } else {
        args.config.as_str()
    };
    let mut config = Config::load_from_file(config_path)?;

    // CLI overrides
    if let Some(listen_port) = args.listen_port {
        config.server.listen_port = listen_port;
    }
    if let Some(root_dir) = args.root_dir {
        config.server.root_dir = root_dir;
    }

    info!("starting ferroftpd with config {}", config_path);
    log_config(&config);

    server::run(config).await
}

fn log_config(config: &Config) {
    info!("  Listen Port: {}", config.server.listen_port);
    info!("  TLS Port: {}", config.server.tls_port);
    info!(
        "  Passive Range: [{}, {})",
        config.server.pasv_min_port, config.server.pasv_max_port
    );
    info!("  Root Directory: {}", config.server.root_dir);
    info!("  Idle Timeout: {}s", config.server.idle_timeout_secs);
    info!("  TLS Enabled: {}", config.tls.enabled);
}
