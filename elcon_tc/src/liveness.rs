//! Command liveness watchdog.
//!
//! The charger stops its output when it has not seen a valid command for
//! [`LIVENESS_WINDOW`] and starts again on the next one. [`Liveness`] is that
//! rule as a plain state machine over caller supplied instants.
//! [`LivenessController`] drives it from tokio: frame arrivals come in through
//! [`LivenessController::accept`] while a background task checks the deadline
//! every [`LivenessConfig::check_interval`].
use crate::{error::DecodeError, message::CommandFrame};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, oneshot, Mutex},
    task::JoinHandle,
    time::{interval, Instant, MissedTickBehavior},
};

/// Maximum silence before the charger stops.
pub const LIVENESS_WINDOW: Duration = Duration::from_secs(5);
pub const CHECK_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessConfig {
    pub window: Duration,
    pub check_interval: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            window: LIVENESS_WINDOW,
            check_interval: CHECK_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessState {
    /// A command arrived within the window
    Commanding { last_command: Instant },
    /// No command within the window, or none ever
    TimedOut { last_command: Option<Instant> },
}

impl Default for LivenessState {
    fn default() -> Self {
        Self::TimedOut { last_command: None }
    }
}

impl LivenessState {
    pub fn is_commanding(&self) -> bool {
        matches!(self, Self::Commanding { .. })
    }
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
    pub fn last_command(&self) -> Option<Instant> {
        match self {
            Self::Commanding { last_command } => Some(*last_command),
            Self::TimedOut { last_command } => *last_command,
        }
    }
}

impl std::fmt::Display for LivenessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Commanding { .. } => write!(f, "Commanding"),
            Self::TimedOut { .. } => write!(f, "TimedOut"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessEvent {
    StartCharging,
    StopCharging,
}

impl std::fmt::Display for LivenessEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StartCharging => write!(f, "start charging"),
            Self::StopCharging => write!(f, "stop charging"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Liveness {
    state: LivenessState,
    window: Duration,
}

impl Liveness {
    pub fn new(window: Duration) -> Self {
        Self {
            state: LivenessState::default(),
            window,
        }
    }

    pub fn state(&self) -> LivenessState {
        self.state
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Instant the current commanding episode expires
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            LivenessState::Commanding { last_command } => Some(last_command + self.window),
            LivenessState::TimedOut { .. } => None,
        }
    }

    /// A valid command arrived at `at`. Re-arms the deadline.
    pub fn command_received(&mut self, at: Instant) -> Option<LivenessEvent> {
        let event = match self.state {
            LivenessState::TimedOut { .. } => Some(LivenessEvent::StartCharging),
            LivenessState::Commanding { .. } => None,
        };
        self.state = LivenessState::Commanding { last_command: at };
        event
    }

    /// Deadline check. Emits `StopCharging` once per silence.
    pub fn poll(&mut self, now: Instant) -> Option<LivenessEvent> {
        match self.state {
            LivenessState::Commanding { last_command }
                if now.saturating_duration_since(last_command) >= self.window =>
            {
                self.state = LivenessState::TimedOut {
                    last_command: Some(last_command),
                };
                Some(LivenessEvent::StopCharging)
            }
            _ => None,
        }
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new(LIVENESS_WINDOW)
    }
}

pub type EventTx = mpsc::UnboundedSender<LivenessEvent>;
pub type EventRx = mpsc::UnboundedReceiver<LivenessEvent>;

/// Shared [`Liveness`] plus the task that checks its deadline.
///
/// Transitions and the events they emit happen under one lock, so the event
/// stream is in transition order.
pub struct LivenessController {
    liveness: Arc<Mutex<Liveness>>,
    events: EventTx,
    quit: Option<oneshot::Sender<()>>,
    watchdog: Option<JoinHandle<()>>,
}

impl LivenessController {
    pub fn spawn(config: LivenessConfig) -> (Self, EventRx) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (quit, quit_rx) = oneshot::channel();
        let liveness = Arc::new(Mutex::new(Liveness::new(config.window)));
        let watchdog = tokio::spawn(watchdog(
            liveness.clone(),
            events.clone(),
            config.check_interval,
            quit_rx,
        ));
        log::debug!(
            "Liveness watchdog started, window {:?} check {:?}",
            config.window,
            config.check_interval
        );
        (
            Self {
                liveness,
                events,
                quit: Some(quit),
                watchdog: Some(watchdog),
            },
            events_rx,
        )
    }

    /// Any decoded command counts, whatever its setpoints.
    pub async fn accept(&self, frame: &CommandFrame, at: Instant) -> LivenessState {
        let mut liveness = self.liveness.lock().await;
        log::trace!("Command {frame}");
        if let Some(event) = liveness.command_received(at) {
            emit(&self.events, event);
        }
        liveness.state()
    }

    /// Decodes and accepts. A payload that fails to decode leaves the
    /// watchdog untouched.
    pub async fn accept_bytes(&self, data: &[u8], at: Instant) -> Result<CommandFrame, DecodeError> {
        let frame = CommandFrame::decode(data)?;
        self.accept(&frame, at).await;
        Ok(frame)
    }

    pub async fn state(&self) -> LivenessState {
        self.liveness.lock().await.state()
    }

    pub async fn last_command(&self) -> Option<Instant> {
        self.state().await.last_command()
    }

    /// Stops the watchdog and waits for it. Nothing is emitted afterwards.
    pub async fn shutdown(mut self) {
        if let Some(quit) = self.quit.take() {
            let _ = quit.send(());
        }
        if let Some(handle) = self.watchdog.take() {
            if let Err(e) = handle.await {
                log::error!("Liveness watchdog ended badly {e:?}");
            }
        }
        log::debug!("Liveness watchdog stopped");
    }
}

impl Drop for LivenessController {
    fn drop(&mut self) {
        if let Some(handle) = self.watchdog.take() {
            handle.abort();
        }
    }
}

async fn watchdog(
    liveness: Arc<Mutex<Liveness>>,
    events: EventTx,
    period: Duration,
    mut quit: oneshot::Receiver<()>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = &mut quit => break,
            _ = ticker.tick() => {
                let mut liveness = liveness.lock().await;
                if let Some(event) = liveness.poll(Instant::now()) {
                    log::warn!("No command for {:?}", liveness.window());
                    emit(&events, event);
                }
            }
        }
    }
}

#[inline]
fn emit(events: &EventTx, event: LivenessEvent) {
    log::info!("Liveness: {event}");
    if events.send(event).is_err() {
        log::debug!("Liveness event {event} dropped, no listener");
    }
}
