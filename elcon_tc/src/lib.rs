//! Notes from:
//! Elcon / TC Charger 1430 ALG-CAN protocol (CAN 2.0B, J1939 style 29 bit ids)
//!
//! The charger expects a command from the BMS every second. If it does not
//! receive a valid command for 5 seconds it stops charging (green blinking
//! LED) and starts again on the next valid command (red blinking LED). The
//! charger reports its status every second.
pub mod error;
pub mod ids;
pub mod liveness;
pub mod message;

pub use error::{DecodeError, ElconError, EncodeError, Field};
pub use ids::*;
pub use liveness::{
    EventRx, Liveness, LivenessConfig, LivenessController, LivenessEvent, LivenessState,
    CHECK_INTERVAL, LIVENESS_WINDOW,
};
pub use message::{decode, CommandFrame, Frame, StatusFlags, StatusFrame, FRAME_LEN, MIN_FRAME_LEN};
