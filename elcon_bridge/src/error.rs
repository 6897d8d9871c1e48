use elcon_tc::{DecodeError, ElconError, EncodeError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Config file {0:?} access failed {1}")]
    FileAccess(PathBuf, #[source] std::io::Error),
    #[error("Toml parse failed {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Can bus open failed {0:?}")]
    CanOpen(tokio_socketcan::Error),
    #[error("can send failed {0:?}")]
    CanBusWrite(tokio_socketcan::Error),
    #[error("can IO send failed {0:?}")]
    CanBusWriteIo(std::io::Error),
    #[error("Bad CAN frame for id {0:#x}")]
    FrameConstruction(u32),
    #[error("CAN link closed")]
    LinkClosed,
    #[error(transparent)]
    Protocol(#[from] ElconError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error("Logger init failed {0}")]
    Logger(#[from] log::SetLoggerError),
    #[error("Signal handler failed {0}")]
    Signal(std::io::Error),
}
