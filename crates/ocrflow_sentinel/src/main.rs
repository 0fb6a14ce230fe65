//! Watch-folder orchestrator binary: one dedicated OS thread runs the
//! scheduler tick loop (spec.md §5, deliberately synchronous so the tick
//! always runs to completion); the observability HTTP server runs
//! concurrently on a tokio runtime.
//!
//! Usage:
//!     ocrflow-sentinel --verbose

use clap::Parser;
use ocrflow_logging::{init_logging, LogConfig};
use ocrflow_protocol::Config;
use ocrflow_sentinel::clock::SystemClock;
use ocrflow_sentinel::observability;
use ocrflow_sentinel::scheduler::Scheduler;
use ocrflow_sentinel::shared::Shared;
use ocrflow_sentinel::stage_client::{HttpStageClient, StageClient};
use ocrflow_sentinel::store::JobStore;
use std::sync::Arc;
use std::thread;

#[derive(Parser, Debug)]
#[command(name = "ocrflow-sentinel", about = "Watch-folder orchestrator for comic archive OCR")]
struct Args {
    /// Verbose (debug-level) console logging.
    #[arg(long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::from_env();

    init_logging(LogConfig {
        app_name: "ocrflow-sentinel",
        data_dir: &config.data_dir,
        verbose: args.verbose,
    })?;

    tracing::info!(data_dir = %config.data_dir.display(), "starting ocrflow-sentinel");

    let shared = Shared::new(config.runtime_slice());
    let stage_client: Arc<dyn StageClient> = Arc::new(HttpStageClient::new());
    let clock = Arc::new(SystemClock);

    let mut scheduler = Scheduler::new(config.clone(), stage_client, clock, Arc::clone(&shared))?;
    scheduler.recover();

    let layout = scheduler.layout().clone();
    let poll_interval = config.poll_interval();

    // The scheduler thread runs for the life of the process; we don't join
    // it, since the only shutdown trigger we honor is ctrl-c on the HTTP
    // server's runtime.
    let _scheduler_handle = thread::Builder::new().name("scheduler".into()).spawn(move || loop {
        scheduler.tick();
        thread::sleep(poll_interval);
    })?;

    let store = Arc::new(JobStore::new(layout));
    let bind_addr = config.control_bind_addr.clone();

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async move {
        let app = observability::router(shared, store);
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
        tracing::info!(addr = %bind_addr, "observability server listening");
        axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
        Ok::<(), anyhow::Error>(())
    })?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
