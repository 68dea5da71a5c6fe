use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "ferroftpd", about = "An FTP(S) server written in Rust.")]
pub struct Cli {
    /// Path to the configuration file
    #[structopt(short, long, default_value = "")]
    pub config: String,

    /// Plain command port override (-1 disables the plain listener)
    #[structopt(long)]
    pub listen_port: Option<i32>,

    /// Served root directory override
    #[structopt(long)]
    pub root_dir: Option<String>,

    /// Enable verbose logging
    #[structopt(short, long)]
    pub verbose: bool,
}
