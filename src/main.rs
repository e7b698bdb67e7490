use sprout::actuators::interface::RelayFactory;
use sprout::api::run_web_server;
use sprout::config::{run_options::get_args, Config};
use sprout::db::{Database, DatabaseTrait};
use sprout::time::{RealTimeProvider, TimeProvider};
use sprout::utils::start_log;
use sprout::watering::ds::AppState;
use sprout::watering::launcher::Launcher;
use sprout::weather::fetch::run_weather_job;
use std::{error::Error, sync::Arc};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    start_log(None);

    info!("Starting application...");

    let args = get_args();
    let cfg = Config::load(&args).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults.");
        Config::default()
    });

    let db: Arc<dyn DatabaseTrait> = Arc::new(Database::new(&cfg.database.name)?);
    let factory = Arc::new(RelayFactory::new(&cfg.relay)?);
    let time_provider: Arc<dyn TimeProvider> = Arc::new(RealTimeProvider);

    let launcher = Arc::new(Launcher::new(db.clone(), factory, time_provider.clone(), cfg.watering)?);
    launcher.recover().await?;

    let app_state = AppState::new(db.clone(), launcher.clone(), time_provider.clone(), cfg.weather.clone());

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    tokio::spawn(run_weather_job(db.clone(), cfg.weather.clone(), time_provider.clone(), shutdown_rx.clone()));

    let launcher_clone = launcher.clone();
    tokio::spawn(async move {
        _ = tokio::signal::ctrl_c().await;
        info!("Shutdown requested.");
        _ = shutdown_tx.send(true);
        launcher_clone.shutdown().await;
    });

    let addr = cfg.web_server.address.parse()?;
    run_web_server(app_state, addr, shutdown_rx).await?;
    Ok(())
}
