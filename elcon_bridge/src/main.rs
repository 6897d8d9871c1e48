use can::CanLink;
use config::{AppConfig, Role};
use error::BridgeError;
use tokio::{
    signal::unix::{signal, SignalKind},
    sync::watch,
};

mod bms;
mod can;
mod charger;
mod config;
mod error;
mod macros;

const CONFIG_FILE: &str = "elcon.toml";

#[tokio::main]
async fn main() -> Result<(), BridgeError> {
    #[cfg(feature = "tracing")]
    console_subscriber::ConsoleLayer::builder()
        // set how long the console will retain data from completed tasks
        .retention(std::time::Duration::from_secs(60))
        .server_addr(([0, 0, 0, 0], 5556))
        .init();

    #[cfg(feature = "logging-verbose")]
    simple_logger::init_with_level(log::Level::Trace)?;
    #[cfg(not(feature = "logging-verbose"))]
    simple_logger::init_with_level(log::Level::Debug)?;

    let config_file = std::env::args()
        .nth(1)
        .unwrap_or_else(|| CONFIG_FILE.to_owned());
    let config = AppConfig::load(&config_file)?;
    log::info!("Loaded {config_file}: {:?} on {}", config.charger.role, config.can.interface);

    let (link, can_handle) = CanLink::open(&config.can.interface)?;
    let (quit_tx, quit_rx) = watch::channel(false);

    let mut ctrl_c = signal(SignalKind::interrupt()).map_err(BridgeError::Signal)?;
    tokio::spawn(async move {
        ctrl_c.recv().await;
        log::info!("Interrupt, shutting down");
        log_error!("Quit", quit_tx.send(true));
    });

    let result = match config.charger.role {
        Role::Bms => bms::run(link, config.bms_settings()?, quit_rx).await,
        Role::Charger => charger::run(link, config.charger_settings()?, quit_rx).await,
    };
    can_handle.abort();
    result
}
