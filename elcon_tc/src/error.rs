use thiserror::Error;

/// Scaled field named in an [`EncodeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    MaxChargingVoltage,
    MaxChargingCurrent,
    OutputVoltage,
    OutputCurrent,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use Field::*;
        match self {
            MaxChargingVoltage => write!(f, "max_charging_voltage"),
            MaxChargingCurrent => write!(f, "max_charging_current"),
            OutputVoltage => write!(f, "output_voltage"),
            OutputCurrent => write!(f, "output_current"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Short frame: {got} bytes, need {needed}")]
    ShortBuffer { needed: usize, got: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum EncodeError {
    /// Value does not fit the signed 16 bit x10 wire field.
    #[error("{field} = {value} does not fit the x10 i16 wire field")]
    OutOfRange { field: Field, value: f32 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ElconError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("Unknown frame kind for CAN id {0:#010x}")]
    UnknownFrameKind(u32),
    #[error("Unknown charger address {0:#04x}")]
    UnknownChargerAddress(u8),
}
