// [apps/worker/src/main.rs]
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dotenvy::dotenv;
use gradecore_cache::FileCache;
use gradecore_common::init_tracing;
use gradecore_db::DbClient;
use gradecore_models::WorkerCapability;
use gradecore_worker_lib::prelude::*;
use gradecore_worker_client::WorkerClient;
use tracing::info;

fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing("gradecore_worker");

    let config = WorkerConfig::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_stack_size(4 * 1024 * 1024)
        .build()?;

    runtime.block_on(async move {
        let kinds = config.parsed_kinds()?;

        let cache = FileCache::open(&config.blob_store_root, &config.cache_metadata_url).await?;
        let db = DbClient::connect(&config.database_url).await?;
        let client = WorkerClient::new(&config.orchestrator_url, &config.worker_auth_token);

        let capability = WorkerCapability {
            shard: config.shard,
            kinds: kinds.clone(),
            max_memory_bytes: config.max_memory_bytes,
        };
        client.register(&capability).await?;
        info!(shard = config.shard, ?kinds, "worker registered with orchestrator");

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_writer = shutdown.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("received shutdown signal");
            shutdown_writer.store(true, Ordering::Relaxed);
        });

        let engine = WorkerEngine::new(
            client,
            cache,
            db,
            config.shard,
            kinds,
            Duration::from_secs(config.poll_backoff_seconds),
            Duration::from_secs(config.heartbeat_interval_seconds),
        );

        engine.run(shutdown).await;

        Ok::<(), anyhow::Error>(())
    })
}
