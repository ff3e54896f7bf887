#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use anyhow::Result;
use clap::Parser;
use mosaic_gateway::server;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mosaic-gateway", about = "Edge-side microfrontend router")]
struct Cli {
    /// Path to gateway config file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    listen: String,

    /// Admin API listen address (for health/metrics)
    #[arg(long, default_value = "0.0.0.0:9091")]
    admin_listen: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(server::bootstrap::run(server::bootstrap::BootstrapArgs {
        config_path: cli.config,
        listen: cli.listen,
        admin_listen: cli.admin_listen,
    }))
}
