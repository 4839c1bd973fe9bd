use anyhow::Result;
use axum::Router;
use chrono::Utc;
use export_trajectory_controller::{
    api::{self, AppState},
    config::EngineConfig,
    domain::TickInputs,
    engine::Engine,
    store::FileStore,
    telemetry::{init_tracing, shutdown_signal},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// Minimal reference tick driver. The real ingestion/actuation transport is
/// out of scope (§1); this loop exists so the crate is a runnable program,
/// in the same shape as the teacher's periodic controller task.
async fn run_tick_loop(engine: Arc<Engine<FileStore>>, last_command: Arc<RwLock<Option<export_trajectory_controller::domain::Command>>>) {
    let tick_seconds = engine.config().tick_seconds;
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(tick_seconds));
    loop {
        interval.tick().await;
        let inputs = sample_inputs();
        match engine.tick(inputs, Utc::now()).await {
            Ok(command) => {
                *last_command.write().await = Some(command);
            }
            Err(err) => {
                error!(%err, "tick failed");
            }
        }
    }
}

/// Placeholder for the out-of-scope ingestion collaborator. A real
/// deployment wires this to the inverter/meter telemetry transport.
fn sample_inputs() -> TickInputs {
    TickInputs {
        daily_export_wh: 0.0,
        grid_power_w: 0.0,
        generation_w: 0.0,
        battery_soc_pct: 50.0,
        battery_power_w: 0.0,
        inverter_mode: 3,
        enabled: false,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = EngineConfig::load().unwrap_or_else(|err| {
        warn!(%err, "failed to load configuration, falling back to defaults");
        EngineConfig::default()
    });

    let store = FileStore::new(&config.store.data_dir);
    let host = config.server.host.clone();
    let port = config.server.port;
    let engine = Arc::new(Engine::new(config, store));
    let last_command = Arc::new(RwLock::new(None));

    let state = AppState {
        engine: engine.clone(),
        last_command: last_command.clone(),
    };

    let mut app: Router = api::router(state);

    #[cfg(feature = "swagger")]
    {
        app = api::with_swagger(app);
    }

    #[cfg(feature = "metrics")]
    {
        app = api::with_metrics(app);
    }

    let addr = format!("{host}:{port}");
    info!(%addr, "starting export trajectory controller");

    tokio::spawn(run_tick_loop(engine, last_command));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    warn!("shutdown complete");
    Ok(())
}
