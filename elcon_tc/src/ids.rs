//! CAN identifiers and bus constants.
//!
//! Both messages use 29 bit J1939 style identifiers. The charger's address
//! sits in the destination byte of the command id and in the source byte of
//! the status id:
//!
//! | Message | Id (charger 0xE5) | Direction |
//! |---|---|---|
//! | Command | `0x1806E5F4` | BMS -> charger |
//! | Status | `0x18FF50E5` | charger -> BMS |
use crate::error::ElconError;
use std::time::Duration;

/// 1.8kW and 3.3kW chargers
pub const BITRATE: u32 = 250_000;
/// 6.6kW chargers
pub const BITRATE_6K6: u32 = 500_000;

/// Command id with the charger address byte cleared. 0xF4 is the BMS.
pub const COMMAND_BASE_ID: u32 = 0x1806_00F4;
/// Status id with the charger address byte cleared.
pub const STATUS_BASE_ID: u32 = 0x18FF_5000;

/// Rate at which the charger expects a command.
pub const COMMAND_PERIOD: Duration = Duration::from_secs(1);
/// Rate at which the charger reports its status.
pub const STATUS_PERIOD: Duration = Duration::from_secs(1);

/// Up to four chargers can share one bus.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChargerAddress {
    #[default]
    E5 = 0xE5,
    E7 = 0xE7,
    E8 = 0xE8,
    E9 = 0xE9,
}

impl ChargerAddress {
    pub const ALL: [ChargerAddress; 4] = [Self::E5, Self::E7, Self::E8, Self::E9];

    pub fn command_id(self) -> u32 {
        COMMAND_BASE_ID | (u32::from(self as u8) << 8)
    }
    pub fn status_id(self) -> u32 {
        STATUS_BASE_ID | u32::from(self as u8)
    }
}

impl TryFrom<u8> for ChargerAddress {
    type Error = ElconError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|addr| *addr as u8 == value)
            .ok_or(ElconError::UnknownChargerAddress(value))
    }
}

impl std::fmt::Display for ChargerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02X}", *self as u8)
    }
}

/// Which layout an 8 byte payload carries. The payload itself has no
/// discriminator, so the kind always comes from the CAN id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Command,
    Status,
}

impl FrameKind {
    pub fn from_id(id: u32, address: ChargerAddress) -> Result<Self, ElconError> {
        match id {
            id if id == address.command_id() => Ok(FrameKind::Command),
            id if id == address.status_id() => Ok(FrameKind::Status),
            unknown => Err(ElconError::UnknownFrameKind(unknown)),
        }
    }
    pub fn id(self, address: ChargerAddress) -> u32 {
        match self {
            FrameKind::Command => address.command_id(),
            FrameKind::Status => address.status_id(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_charger_ids() {
        let addr = ChargerAddress::default();
        assert_eq!(addr.command_id(), 0x1806E5F4);
        assert_eq!(addr.status_id(), 0x18FF50E5);
    }

    #[test]
    fn ids_per_address() {
        let ids: Vec<(u32, u32)> = ChargerAddress::ALL
            .iter()
            .map(|a| (a.command_id(), a.status_id()))
            .collect();
        assert_eq!(
            ids,
            vec![
                (0x1806E5F4, 0x18FF50E5),
                (0x1806E7F4, 0x18FF50E7),
                (0x1806E8F4, 0x18FF50E8),
                (0x1806E9F4, 0x18FF50E9),
            ]
        );
        // all fit a 29 bit extended id
        assert!(ids.iter().all(|(c, s)| *c <= 0x1FFF_FFFF && *s <= 0x1FFF_FFFF));
    }

    #[test]
    fn frame_kind_from_id() {
        let addr = ChargerAddress::E8;
        assert_eq!(FrameKind::from_id(0x1806E8F4, addr), Ok(FrameKind::Command));
        assert_eq!(FrameKind::from_id(0x18FF50E8, addr), Ok(FrameKind::Status));
        // another charger on the same bus
        assert_eq!(
            FrameKind::from_id(0x18FF50E5, addr),
            Err(ElconError::UnknownFrameKind(0x18FF50E5))
        );
        assert_eq!(FrameKind::Status.id(addr), 0x18FF50E8);
    }

    #[test]
    fn address_from_u8() {
        assert_eq!(ChargerAddress::try_from(0xE9), Ok(ChargerAddress::E9));
        assert_eq!(
            ChargerAddress::try_from(0xE6),
            Err(ElconError::UnknownChargerAddress(0xE6))
        );
        assert_eq!(ChargerAddress::E7.to_string(), "E7");
    }
}
