mod api;
mod config;
mod detector;
mod error;
mod ingest;
mod orchestrator;
mod report;
mod scorer;
mod state;
mod types;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::error::Result;
use crate::ingest::load_records;
use crate::orchestrator::CancelFlag;
use crate::report::{log_report, write_report};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let cancel = CancelFlag::new();

    // Ctrl-C stops the batch between groups; groups already running finish.
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, finishing running groups");
            signal_cancel.cancel();
        }
    });

    let state = ApiState::new(&cfg, cancel.clone());

    // --- Batch analysis of INPUT_PATH ---
    let records = load_records(&cfg.input_path)?;
    let report = state.run_batch(records).await?;
    log_report(&report);

    if let Some(path) = &cfg.output_path {
        write_report(&report, path)?;
    }

    if !cfg.serve_api || cancel.is_cancelled() {
        return Ok(());
    }

    // --- HTTP API over the stored results ---
    let app = router(state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
