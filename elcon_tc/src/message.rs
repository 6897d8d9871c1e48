//! Command (Message1) and status (Message2) frames.
//!
//! Both frames carry two big-endian `i16` values scaled x10 followed by one
//! byte of flags. Bytes 5..8 are reserved and always sent as zero.
//!
//! Example: 98V 16A is 980 = 0x03D4 and 160 = 0x00A0, so the command payload
//! is `03 D4 00 A0 00 00 00 00`.
use crate::{
    error::{DecodeError, EncodeError, Field},
    ids::FrameKind,
};

/// Payload length on the bus.
pub const FRAME_LEN: usize = 8;
/// Bytes that carry data. Shorter payloads cannot be decoded.
pub const MIN_FRAME_LEN: usize = 5;

const SCALE: f64 = 10.0;

/// Command sent to the charger, BMS -> charger.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct CommandFrame {
    /// Upper limit for the charger output voltage, 0.1V resolution
    pub max_charging_voltage: f32,
    /// Upper limit for the charger output current, 0.1A resolution
    pub max_charging_current: f32,
    /// 0 = charger on, 1 = battery protection, charger output off
    pub battery_protection_enabled: bool,
}

impl CommandFrame {
    pub fn new(
        max_charging_voltage: f32,
        max_charging_current: f32,
        battery_protection_enabled: bool,
    ) -> Self {
        Self {
            max_charging_voltage,
            max_charging_current,
            battery_protection_enabled,
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let data = data_sanity(data)?;
        Ok(Self {
            max_charging_voltage: from_fixed([data[0], data[1]]),
            max_charging_current: from_fixed([data[2], data[3]]),
            battery_protection_enabled: data[4] != 0,
        })
    }

    pub fn encode(&self) -> Result<[u8; FRAME_LEN], EncodeError> {
        let mut data = [0u8; FRAME_LEN];
        data[0..2].copy_from_slice(&to_fixed(
            Field::MaxChargingVoltage,
            self.max_charging_voltage,
        )?);
        data[2..4].copy_from_slice(&to_fixed(
            Field::MaxChargingCurrent,
            self.max_charging_current,
        )?);
        data[4] = self.battery_protection_enabled.into();
        Ok(data)
    }
}

impl TryFrom<&[u8]> for CommandFrame {
    type Error = DecodeError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        Self::decode(data)
    }
}

impl std::fmt::Display for CommandFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "max {:.1}V {:.1}A protection: {}",
            self.max_charging_voltage, self.max_charging_current, self.battery_protection_enabled
        )
    }
}

/// Status byte of the charger, 0 = normal, 1 = fault.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatusFlags {
    /// bit 0 - hardware failure
    pub hardware_failure: bool,
    /// bit 1 - over temperature protection
    pub temperature_of_charger: bool,
    /// bit 2 - incorrect input voltage
    pub input_voltage: bool,
    /// bit 3 - battery disconnected or reversed
    pub starting_state: bool,
    /// bit 4 - communication receive timeout
    pub communication: bool,
}

impl StatusFlags {
    /// Flag names in bit order, bit 0 first.
    pub const NAMES: [&'static str; 5] = [
        "hardware_failure",
        "temperature_of_charger",
        "input_voltage",
        "starting_state",
        "communication",
    ];

    fn bits(&self) -> [bool; 5] {
        [
            self.hardware_failure,
            self.temperature_of_charger,
            self.input_voltage,
            self.starting_state,
            self.communication,
        ]
    }

    fn bit_mut(&mut self, position: usize) -> Option<&mut bool> {
        match position {
            0 => Some(&mut self.hardware_failure),
            1 => Some(&mut self.temperature_of_charger),
            2 => Some(&mut self.input_voltage),
            3 => Some(&mut self.starting_state),
            4 => Some(&mut self.communication),
            _ => None,
        }
    }

    /// Any flag raised
    pub fn fault(&self) -> bool {
        self.bits().into_iter().any(|b| b)
    }

    /// `(name, value)` pairs in bit order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, bool)> {
        Self::NAMES.into_iter().zip(self.bits())
    }

    pub fn get(&self, name: &str) -> Option<bool> {
        self.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    /// Returns false if `name` is not one of [`StatusFlags::NAMES`].
    pub fn set(&mut self, name: &str, value: bool) -> bool {
        let position = Self::NAMES.iter().position(|n| *n == name);
        match position.and_then(|p| self.bit_mut(p)) {
            Some(bit) => {
                *bit = value;
                true
            }
            None => false,
        }
    }
}

impl From<u8> for StatusFlags {
    fn from(value: u8) -> Self {
        Self {
            hardware_failure: get_bit(value, 0),
            temperature_of_charger: get_bit(value, 1),
            input_voltage: get_bit(value, 2),
            starting_state: get_bit(value, 3),
            communication: get_bit(value, 4),
        }
    }
}

impl From<StatusFlags> for u8 {
    fn from(flags: StatusFlags) -> u8 {
        let mut result = 0u8;
        result |= (flags.communication as u8) << 4;
        result |= (flags.starting_state as u8) << 3;
        result |= (flags.input_voltage as u8) << 2;
        result |= (flags.temperature_of_charger as u8) << 1;
        result |= flags.hardware_failure as u8;
        result
    }
}

/// Builds flags from a partial name map, absent names stay false.
impl<'a> FromIterator<(&'a str, bool)> for StatusFlags {
    fn from_iter<I: IntoIterator<Item = (&'a str, bool)>>(iter: I) -> Self {
        let mut flags = StatusFlags::default();
        for (name, value) in iter {
            if !flags.set(name, value) {
                log::warn!("Ignoring unknown status flag {name}");
            }
        }
        flags
    }
}

impl std::fmt::Display for StatusFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (idx, (name, value)) in self.iter().enumerate() {
            if idx > 0 {
                write!(f, " ")?;
            }
            write!(f, "{name}:{}", value as u8)?;
        }
        Ok(())
    }
}

/// Status reported by the charger, charger -> BMS.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct StatusFrame {
    /// 0.1V resolution
    pub output_voltage: f32,
    /// 0.1A resolution
    pub output_current: f32,
    pub status_flags: StatusFlags,
}

impl StatusFrame {
    pub fn new(output_voltage: f32, output_current: f32, status_flags: StatusFlags) -> Self {
        Self {
            output_voltage,
            output_current,
            status_flags,
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        let data = data_sanity(data)?;
        Ok(Self {
            output_voltage: from_fixed([data[0], data[1]]),
            output_current: from_fixed([data[2], data[3]]),
            status_flags: data[4].into(),
        })
    }

    pub fn encode(&self) -> Result<[u8; FRAME_LEN], EncodeError> {
        let mut data = [0u8; FRAME_LEN];
        data[0..2].copy_from_slice(&to_fixed(Field::OutputVoltage, self.output_voltage)?);
        data[2..4].copy_from_slice(&to_fixed(Field::OutputCurrent, self.output_current)?);
        data[4] = self.status_flags.into();
        Ok(data)
    }

    pub fn power(&self) -> f32 {
        self.output_voltage * self.output_current
    }
}

impl TryFrom<&[u8]> for StatusFrame {
    type Error = DecodeError;

    fn try_from(data: &[u8]) -> Result<Self, Self::Error> {
        Self::decode(data)
    }
}

impl std::fmt::Display for StatusFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "output {:.1}V {:.1}A ({:.0}W) {}",
            self.output_voltage,
            self.output_current,
            self.power(),
            self.status_flags
        )
    }
}

/// Either frame, tagged by the kind given alongside the payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Frame {
    Command(CommandFrame),
    Status(StatusFrame),
}

impl Frame {
    pub fn kind(&self) -> FrameKind {
        match self {
            Frame::Command(_) => FrameKind::Command,
            Frame::Status(_) => FrameKind::Status,
        }
    }
    pub fn encode(&self) -> Result<[u8; FRAME_LEN], EncodeError> {
        match self {
            Frame::Command(c) => c.encode(),
            Frame::Status(s) => s.encode(),
        }
    }
}

impl From<CommandFrame> for Frame {
    fn from(frame: CommandFrame) -> Self {
        Frame::Command(frame)
    }
}

impl From<StatusFrame> for Frame {
    fn from(frame: StatusFrame) -> Self {
        Frame::Status(frame)
    }
}

pub fn decode(kind: FrameKind, data: &[u8]) -> Result<Frame, DecodeError> {
    match kind {
        FrameKind::Command => CommandFrame::decode(data).map(Frame::Command),
        FrameKind::Status => StatusFrame::decode(data).map(Frame::Status),
    }
}

/// Scales by 10 and truncates toward zero. A product within one f32 epsilon
/// of an integer is that integer, so 2.3 goes out as 23 rather than 22.
fn to_fixed(field: Field, value: f32) -> Result<[u8; 2], EncodeError> {
    let scaled = f64::from(value) * SCALE;
    let nearest = scaled.round();
    let fixed = if (scaled - nearest).abs() <= nearest.abs() * f64::from(f32::EPSILON) {
        nearest
    } else {
        scaled.trunc()
    };
    if !fixed.is_finite() || fixed < f64::from(i16::MIN) || fixed > f64::from(i16::MAX) {
        return Err(EncodeError::OutOfRange { field, value });
    }
    Ok((fixed as i16).to_be_bytes())
}

#[inline]
fn from_fixed(raw: [u8; 2]) -> f32 {
    i16::from_be_bytes(raw) as f32 / SCALE as f32
}

#[inline]
fn get_bit(byte: u8, position: u8) -> bool {
    (byte & (1 << position)) != 0
}

#[inline]
fn data_sanity(data: &[u8]) -> Result<&[u8], DecodeError> {
    if data.len() < MIN_FRAME_LEN {
        return Err(DecodeError::ShortBuffer {
            needed: MIN_FRAME_LEN,
            got: data.len(),
        });
    }
    Ok(data)
}

#[cfg(test)]
mod test {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn command_worked_example() {
        let frame = CommandFrame::new(98.0, 16.0, false);
        assert_eq!(
            frame.encode().unwrap(),
            [0x03, 0xD4, 0x00, 0xA0, 0x00, 0x00, 0x00, 0x00]
        );
        let decoded = CommandFrame::decode(&[0x03, 0xD4, 0x00, 0xA0, 0x01, 0x00, 0x00, 0x00]);
        assert_eq!(decoded, Ok(CommandFrame::new(98.0, 16.0, true)));
    }

    #[test]
    fn command_protection_byte() {
        let frame = CommandFrame::decode(&[0, 0, 0, 0, 0x7f, 0, 0, 0]).unwrap();
        assert!(frame.battery_protection_enabled);
        let data = frame.encode().unwrap();
        assert_eq!(data[4], 0x01);
    }

    #[test]
    fn reserved_bytes_ignored_and_zeroed() {
        let frame = CommandFrame::decode(&[0x00, 0x64, 0x00, 0x0A, 0x00, 0xAA, 0xBB, 0xCC]).unwrap();
        assert_eq!(frame, CommandFrame::new(10.0, 1.0, false));
        assert_eq!(frame.encode().unwrap()[5..], [0, 0, 0]);

        let status = StatusFrame::decode(&[0x00, 0x64, 0x00, 0x0A, 0xE0, 0xAA, 0xBB, 0xCC]).unwrap();
        assert!(!status.status_flags.fault());
        assert_eq!(status.encode().unwrap()[4..], [0, 0, 0, 0]);
    }

    #[test]
    fn five_byte_payload_accepted() {
        assert_eq!(
            CommandFrame::decode(&[0x03, 0xD4, 0x00, 0xA0, 0x00]),
            Ok(CommandFrame::new(98.0, 16.0, false))
        );
    }

    #[test]
    fn short_buffer() {
        assert_eq!(
            CommandFrame::decode(&[0x03, 0xD4, 0x00, 0xA0]),
            Err(DecodeError::ShortBuffer { needed: 5, got: 4 })
        );
        assert_eq!(
            decode(FrameKind::Status, &[]),
            Err(DecodeError::ShortBuffer { needed: 5, got: 0 })
        );
    }

    #[test]
    fn negative_values() {
        // -12.5A = -125 = 0xFF83
        let data = StatusFrame::new(0.0, -12.5, StatusFlags::default()).encode().unwrap();
        assert_eq!(data[2..4], [0xFF, 0x83]);
        let frame = StatusFrame::decode(&data).unwrap();
        assert_eq!(frame.output_current, -12.5);
    }

    #[test]
    fn truncates_toward_zero() {
        let data = CommandFrame::new(98.06, -1.25, false).encode().unwrap();
        assert_eq!(i16::from_be_bytes([data[0], data[1]]), 980);
        assert_eq!(i16::from_be_bytes([data[2], data[3]]), -12);
        // representation error is not truncated away
        let data = CommandFrame::new(2.3, 0.7, false).encode().unwrap();
        assert_eq!(i16::from_be_bytes([data[0], data[1]]), 23);
        assert_eq!(i16::from_be_bytes([data[2], data[3]]), 7);
    }

    #[test]
    fn out_of_range() {
        assert_eq!(
            CommandFrame::new(3276.8, 0.0, false).encode(),
            Err(EncodeError::OutOfRange {
                field: Field::MaxChargingVoltage,
                value: 3276.8
            })
        );
        assert!(CommandFrame::new(3276.7, -3276.8, false).encode().is_ok());
        assert!(matches!(
            StatusFrame::new(0.0, -3300.0, StatusFlags::default()).encode(),
            Err(EncodeError::OutOfRange {
                field: Field::OutputCurrent,
                ..
            })
        ));
        assert!(CommandFrame::new(f32::NAN, 0.0, false).encode().is_err());
        assert!(CommandFrame::new(0.0, f32::INFINITY, false).encode().is_err());
    }

    #[test]
    fn status_bit_order() {
        let status = StatusFrame::decode(&[0, 0, 0, 0, 0b0000_0001, 0, 0, 0]).unwrap();
        assert_eq!(
            status.status_flags,
            StatusFlags {
                hardware_failure: true,
                ..Default::default()
            }
        );
        let status = StatusFrame::decode(&[0, 0, 0, 0, 0b0001_0000, 0, 0, 0]).unwrap();
        assert_eq!(
            status.status_flags,
            StatusFlags {
                communication: true,
                ..Default::default()
            }
        );
        for (position, name) in StatusFlags::NAMES.iter().enumerate() {
            let flags = StatusFlags::from(1u8 << position);
            assert_eq!(flags.iter().filter(|(_, v)| *v).count(), 1);
            assert_eq!(flags.get(name), Some(true));
            assert_eq!(u8::from(flags), 1u8 << position);
        }
    }

    #[test]
    fn status_flags_by_name() {
        let flags: StatusFlags = [("input_voltage", true), ("bogus", true)].into_iter().collect();
        assert_eq!(u8::from(flags), 0b0000_0100);
        assert_eq!(flags.get("hardware_failure"), Some(false));
        assert_eq!(flags.get("bogus"), None);

        let mut flags = StatusFlags::default();
        assert!(flags.set("starting_state", true));
        assert!(!flags.set("nope", true));
        assert!(flags.fault());
        assert_eq!(
            flags.to_string(),
            "hardware_failure:0 temperature_of_charger:0 input_voltage:0 starting_state:1 communication:0"
        );
    }

    #[test]
    fn frame_dispatch() {
        let data = [0x03, 0xD4, 0x00, 0xA0, 0x03, 0x00, 0x00, 0x00];
        let status = decode(FrameKind::Status, &data).unwrap();
        assert_eq!(status.kind(), FrameKind::Status);
        assert!(matches!(status, Frame::Status(s) if s.status_flags.temperature_of_charger));
        let command = decode(FrameKind::Command, &data).unwrap();
        assert!(matches!(command, Frame::Command(c) if c.battery_protection_enabled));
        // canonical status bytes come back unchanged
        assert_eq!(status.encode().unwrap(), data);
    }

    fn tenths() -> impl Strategy<Value = f32> {
        any::<i16>().prop_map(|raw| raw as f32 / 10.0)
    }

    proptest! {
        #[test]
        fn command_round_trip(v in tenths(), a in tenths(), p in any::<bool>()) {
            let frame = CommandFrame::new(v, a, p);
            prop_assert_eq!(CommandFrame::decode(&frame.encode().unwrap()), Ok(frame));
        }

        #[test]
        fn status_round_trip(v in tenths(), a in tenths(), bits in 0u8..32) {
            let frame = StatusFrame::new(v, a, bits.into());
            prop_assert_eq!(StatusFrame::decode(&frame.encode().unwrap()), Ok(frame));
        }

        #[test]
        fn canonical_bytes_round_trip(head in any::<[u8; 4]>(), flag in 0u8..32) {
            let data = [head[0], head[1], head[2], head[3], flag, 0, 0, 0];
            prop_assert_eq!(StatusFrame::decode(&data).unwrap().encode(), Ok(data));
        }
    }
}
