pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use crate::core::{config::Settings, state::AppState, telemetry};
use crate::services::sync::{FileStorage, HttpTransport, SyncDocument, SyncManager, SyncStatus};
use crate::tasks::sync_agent::{self, AgentTiming};

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let db_pool = db::connect_with_retry(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let state = AppState::new(settings, db_pool);

    if let Err(err) = core::bootstrap::ensure_first_admin(&state).await {
        tracing::error!(error = %err, "Failed to ensure first admin");
    }
    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "Quizbank API listening"
    );

    axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await?;

    Ok(())
}

/// Client side: keeps a local study bundle in sync with a quizbank server.
///
/// With `export <file>` or `import <file>` the bundle is transferred through
/// a sync document on disk instead and the agent exits.
pub async fn run_sync_agent() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;

    let sync = settings.sync();
    let store = Arc::new(FileStorage::new(&sync.data_path));
    let transport = Arc::new(HttpTransport::from_settings(sync)?);
    let manager = Arc::new(SyncManager::new(store, transport));

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => {}
        [command, path] if command == "export" => {
            let document = manager.export_local().await?;
            tokio::fs::write(path, serde_json::to_vec_pretty(&document)?).await?;
            tracing::info!(path = %path, "Sync document exported");
            return Ok(());
        }
        [command, path] if command == "import" => {
            let raw = tokio::fs::read(path).await?;
            let document = SyncDocument::from_slice(&raw)?;
            let report = manager.import_local(&document).await?;
            tracing::info!(
                path = %path,
                added = report.added(),
                skipped = report.skipped(),
                errors = report.errors.len(),
                "Sync document imported"
            );
            return Ok(());
        }
        _ => anyhow::bail!("usage: sync_agent [export <file> | import <file>]"),
    }

    let device_id = manager.device_id().await?;
    let last_sync = manager.last_sync_time().await?;
    let history = manager.history().await?;
    let recent_failures =
        history.iter().filter(|outcome| outcome.status == SyncStatus::Failed).count();
    tracing::info!(
        server = %sync.server_url,
        device_id = %device_id,
        data_path = %sync.data_path,
        last_sync = last_sync.as_deref().unwrap_or("never"),
        last_status = ?history.latest().map(|outcome| outcome.status),
        recorded_runs = history.len(),
        recent_failures,
        "Quizbank sync agent started"
    );

    sync_agent::run(manager, AgentTiming::from_settings(sync)).await
}
