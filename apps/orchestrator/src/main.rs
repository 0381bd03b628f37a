use clap::Parser;
use dotenvy::dotenv;
use gradecore_common::init_tracing;
use gradecore_orchestrator::prelude::*;
use gradecore_orchestrator::{routes, services::reaper};
use tracing::info;

fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing("gradecore_orchestrator");

    let config = OrchestratorConfig::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_stack_size(4 * 1024 * 1024)
        .build()?;

    runtime.block_on(async move {
        let port = config.port;
        let state = AppState::new(&config).await?;

        reaper::spawn(state.clone());

        let app = routes::build(state);
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;

        info!(port, "orchestrator listening");
        axum::serve(listener, app).await?;

        Ok::<(), anyhow::Error>(())
    })
}
