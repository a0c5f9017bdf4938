use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use replicated_kv::{
    cli::{Cli, Command, NodeArgs},
    console,
    server::Server,
};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Node(args) => run_node(args).await?,
        Command::Client(args) => console::run(args).await?,
    }

    Ok(())
}

async fn run_node(args: NodeArgs) -> Result<()> {
    let listener = TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("failed to listen on {}", args.listen))?;
    let server = Server::new(listener, args.to_config())?;
    let addr = server.local_addr()?;
    info!("node listening on {}", addr);

    if let Err(err) = server.run_until_ctrl_c().await {
        warn!("node exited with error: {err:?}");
        return Err(err);
    }
    Ok(())
}
