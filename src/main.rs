use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::info;
use tokio::sync::watch;

use serialgate::config;
use serialgate::gateway::Gateway;
use serialgate::server;

#[derive(Parser, Debug)]
#[command(
    name = "serialgate",
    about = "Serial instrument polling gateway with an HTTP read/command API"
)]
struct Args {
    /// Server bind address
    #[arg(long, default_value = "127.0.0.1:5500")]
    bind: String,

    /// Config file path
    #[arg(long, default_value = "config.toml")]
    conf: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let (registry, settings) = config::load(&args.conf)
        .with_context(|| format!("invalid configuration in '{}'", args.conf.display()))?;
    let gateway = Arc::new(Gateway::new(registry, settings));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let supervisors = gateway.spawn_supervisors(shutdown_rx);

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("cannot bind '{}'", args.bind))?;
    info!("API server listening on {}", args.bind);

    axum::serve(listener, server::router(Arc::clone(&gateway)))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("shutting down");
    let _ = shutdown_tx.send(true);
    for task in supervisors {
        let _ = task.await;
    }
    Ok(())
}
