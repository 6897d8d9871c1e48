use crate::{bms::BmsSettings, charger::ChargerSettings, error::BridgeError};
use elcon_tc::{ChargerAddress, CommandFrame, LivenessConfig};
use serde::Deserialize;
use std::{fs, path::Path, time::Duration};

#[derive(Debug, Deserialize, Clone)]
pub struct CanConfig {
    pub interface: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Sends commands to a charger
    Bms,
    /// Answers commands like a charger would
    Charger,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChargerConfig {
    pub address: u8,
    pub role: Role,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LivenessSection {
    pub window_ms: u64,
    pub check_interval_ms: u64,
}

impl Default for LivenessSection {
    fn default() -> Self {
        let defaults = LivenessConfig::default();
        Self {
            window_ms: defaults.window.as_millis() as u64,
            check_interval_ms: defaults.check_interval.as_millis() as u64,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CommandConfig {
    pub voltage: f32,
    pub current: f32,
    pub battery_protection: bool,
    pub interval_ms: u64,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            voltage: 0.0,
            current: 0.0,
            battery_protection: false,
            interval_ms: elcon_tc::COMMAND_PERIOD.as_millis() as u64,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimulatorConfig {
    pub report_interval_ms: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            report_interval_ms: elcon_tc::STATUS_PERIOD.as_millis() as u64,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub can: CanConfig,
    pub charger: ChargerConfig,
    #[serde(default)]
    pub liveness: LivenessSection,
    #[serde(default)]
    pub command: CommandConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BridgeError> {
        let path = path.as_ref();
        let toml_str =
            fs::read_to_string(path).map_err(|e| BridgeError::FileAccess(path.into(), e))?;
        Self::from_toml(&toml_str)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, BridgeError> {
        let config: AppConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), BridgeError> {
        // tokio intervals panic on a zero period
        let periods = [
            ("liveness.window_ms", self.liveness.window_ms),
            ("liveness.check_interval_ms", self.liveness.check_interval_ms),
            ("command.interval_ms", self.command.interval_ms),
            ("simulator.report_interval_ms", self.simulator.report_interval_ms),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, ms)| *ms == 0) {
            return Err(BridgeError::InvalidConfig(format!("{name} must be > 0")));
        }
        if self.liveness.check_interval_ms >= self.liveness.window_ms {
            return Err(BridgeError::InvalidConfig(
                "liveness.check_interval_ms must be below liveness.window_ms".into(),
            ));
        }
        if self.can.interface.is_empty() {
            return Err(BridgeError::InvalidConfig("can.interface is empty".into()));
        }
        self.address()?;
        self.command_frame().encode()?;
        Ok(())
    }

    pub fn address(&self) -> Result<ChargerAddress, BridgeError> {
        Ok(ChargerAddress::try_from(self.charger.address)?)
    }

    pub fn liveness(&self) -> LivenessConfig {
        LivenessConfig {
            window: Duration::from_millis(self.liveness.window_ms),
            check_interval: Duration::from_millis(self.liveness.check_interval_ms),
        }
    }

    pub fn command_frame(&self) -> CommandFrame {
        CommandFrame::new(
            self.command.voltage,
            self.command.current,
            self.command.battery_protection,
        )
    }

    pub fn charger_settings(&self) -> Result<ChargerSettings, BridgeError> {
        Ok(ChargerSettings {
            address: self.address()?,
            liveness: self.liveness(),
            report_interval: Duration::from_millis(self.simulator.report_interval_ms),
        })
    }

    pub fn bms_settings(&self) -> Result<BmsSettings, BridgeError> {
        Ok(BmsSettings {
            address: self.address()?,
            command: self.command_frame(),
            interval: Duration::from_millis(self.command.interval_ms),
        })
    }
}
