//! Charger side of the bus, for bench tests against a virtual CAN interface.
//!
//! Follows the charger's rules: output only while commands keep arriving,
//! zero output and the communication flag once they stop.
use crate::{
    can::{classify, to_can_frame, CanLink},
    error::BridgeError,
};
use elcon_tc::{
    ChargerAddress, CommandFrame, Frame, LivenessConfig, LivenessController, LivenessState,
    StatusFlags, StatusFrame,
};
use std::time::Duration;
use tokio::{
    sync::watch,
    time::{interval, Instant, MissedTickBehavior},
};

#[derive(Debug, Clone, Copy)]
pub struct ChargerSettings {
    pub address: ChargerAddress,
    pub liveness: LivenessConfig,
    pub report_interval: Duration,
}

/// Status the charger reports for the current liveness state and the last
/// accepted command.
pub fn status_report(state: LivenessState, setpoint: &CommandFrame) -> StatusFrame {
    match state {
        LivenessState::Commanding { .. } if !setpoint.battery_protection_enabled => {
            StatusFrame::new(
                setpoint.max_charging_voltage,
                setpoint.max_charging_current,
                StatusFlags::default(),
            )
        }
        LivenessState::Commanding { .. } => StatusFrame::default(),
        LivenessState::TimedOut { .. } => StatusFrame::new(
            0.0,
            0.0,
            StatusFlags {
                communication: true,
                ..Default::default()
            },
        ),
    }
}

pub async fn run(
    mut link: CanLink,
    settings: ChargerSettings,
    mut quit: watch::Receiver<bool>,
) -> Result<(), BridgeError> {
    log::info!("Simulating charger {}", settings.address);
    let (liveness, mut events) = LivenessController::spawn(settings.liveness);
    let mut report = interval(settings.report_interval);
    report.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut setpoint = CommandFrame::default();

    let result = loop {
        tokio::select! {
            _ = quit.changed() => break Ok(()),
            rx = link.rx.recv() => {
                let Some(frame) = rx else {
                    break Err(BridgeError::LinkClosed);
                };
                match classify(&frame, settings.address) {
                    Ok(Frame::Command(command)) => {
                        liveness.accept(&command, Instant::now()).await;
                        setpoint = command;
                    }
                    // our own reports
                    Ok(Frame::Status(_)) => (),
                    Err(e) => log::warn!("Dropped {:08x}: {e}", frame.id()),
                }
            }
            Some(event) = events.recv() => log::info!("Charger {}: {event}", settings.address),
            _ = report.tick() => {
                let status = status_report(liveness.state().await, &setpoint);
                log::debug!("Charger {}: {status}", settings.address);
                let frame = to_can_frame(settings.address.status_id(), &status.encode()?)?;
                if let Err(e) = link.send(frame).await {
                    break Err(e);
                }
            }
        }
    };
    liveness.shutdown().await;
    result
}
