use crate::{
    can::{classify, to_can_frame, CanLink},
    error::BridgeError,
};
use elcon_tc::{ChargerAddress, CommandFrame, Frame, StatusFrame};
use std::time::Duration;
use tokio::{
    sync::watch,
    time::{interval, MissedTickBehavior},
};

#[derive(Debug, Clone, Copy)]
pub struct BmsSettings {
    pub address: ChargerAddress,
    pub command: CommandFrame,
    pub interval: Duration,
}

fn log_status(address: ChargerAddress, status: &StatusFrame) {
    if status.status_flags.fault() {
        log::warn!("Charger {address}: {status}");
    } else {
        log::info!("Charger {address}: {status}");
    }
}

/// Keeps the charger commanded: one command per interval, status frames
/// from the charger are logged.
pub async fn run(
    mut link: CanLink,
    settings: BmsSettings,
    mut quit: watch::Receiver<bool>,
) -> Result<(), BridgeError> {
    // out of range setpoints fail here, before anything is sent
    let payload = settings.command.encode()?;
    let id = settings.address.command_id();
    log::info!("Commanding charger {}: {}", settings.address, settings.command);

    let mut ticker = interval(settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = quit.changed() => break,
            _ = ticker.tick() => link.send(to_can_frame(id, &payload)?).await?,
            rx = link.rx.recv() => {
                let Some(frame) = rx else {
                    return Err(BridgeError::LinkClosed);
                };
                match classify(&frame, settings.address) {
                    Ok(Frame::Status(status)) => log_status(settings.address, &status),
                    // our own commands
                    Ok(Frame::Command(_)) => (),
                    Err(e) => log::warn!("Dropped {:08x}: {e}", frame.id()),
                }
            }
        }
    }
    log::info!("Stopped commanding charger {}", settings.address);
    Ok(())
}
