use clap::Parser;
use registry_core::{Chain, ChainStore};
use registry_mempool::{clock::SystemClock, timer::TokioScheduler, Mempool};
use registry_node::{config::Args, router, StarRegistry};
use registry_storage::SledStore;
use std::{net::SocketAddr, sync::Arc};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let store = Arc::new(SledStore::open(&args.data_dir)?);
    let chain = Chain::new(store.clone());
    chain.ensure_genesis()?;

    let mempool = Mempool::new(
        args.mempool_config(),
        Arc::new(SystemClock),
        Arc::new(TokioScheduler::try_current()?),
    );
    let registry = StarRegistry::new(chain, mempool.clone());
    let app = router(registry);

    let addr: SocketAddr = args.listen.parse()?;
    info!("registry-node listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await?;

    mempool.clear();
    store.close()?;
    Ok(())
}
