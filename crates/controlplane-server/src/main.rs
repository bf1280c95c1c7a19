//! Control plane entry point: parses CLI arguments and hands off to
//! [`controlplane_server::run`].

use clap::Parser;
use controlplane_server::CliOverrides;

#[derive(Debug, Parser)]
#[command(name = "controlplane-server", about = "Event-store control plane")]
struct Cli {
    /// Optional YAML configuration overlay.
    #[arg(long)]
    config: Option<String>,
    /// Overrides the configured listen port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    controlplane_server::run(CliOverrides { config_path: cli.config, port: cli.port }).await
}
