use clap::Parser;

/// Forwarding HTTP proxy with an in-memory response cache.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", default_value = "./config.toml")]
    pub config: String,
    /// Port to listen on, overrides the config file
    #[arg(value_name = "PORT")]
    pub port: Option<u16>,
}
