//! ProtoThrottle status packets
//!
//! A throttle broadcasts its complete state (command `'S'`) several times a
//! second. The 9 data bytes are:
//!
//! | byte | meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | address high byte; bit 7 set = short address         |
//! | 1    | address low byte                                     |
//! | 2    | bit 7 = forward, bits 6-0 = speed (0 idle, 1 e-stop) |
//! | 3    | functions F24-F28 (bits 0-4)                         |
//! | 4    | functions F16-F23                                    |
//! | 5    | functions F8-F15                                     |
//! | 6    | functions F0-F7                                      |
//! | 7-8  | unused by the bridge                                 |

use bitfield::bitfield;

use crate::core::{Direction, FunctionSet, LocoAddress};
use crate::error::Result;
use crate::packet::Packet;
use crate::wire::{BROADCAST_ADDRESS, CMD_THROTTLE, THROTTLE_DATA_LEN};

/// Highest speed step carried on the wire
pub const MAX_SPEED_STEP: u8 = 126;

bitfield! {
    /// Byte 0 of a throttle packet
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct AddressHigh(u8);
    impl Debug;
    // set for short addresses
    pub short, set_short: 7;
}

bitfield! {
    /// Byte 2 of a throttle packet
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct SpeedByte(u8);
    impl Debug;
    pub u8, raw_speed, set_raw_speed: 6, 0;
    pub forward, set_forward: 7;
}

/// Speed as requested by the throttle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Speed {
    /// Emergency stop
    EmergencyStop,
    /// Speed step 0-126; 0 is idle
    Step(u8),
}

impl Speed {
    /// Interpret the 7-bit wire value
    pub fn from_raw(raw: u8) -> Self {
        match raw & 0x7F {
            0 => Speed::Step(0),
            1 => Speed::EmergencyStop,
            n => Speed::Step(n - 1),
        }
    }

    /// 7-bit wire value
    pub fn to_raw(self) -> u8 {
        match self {
            Speed::EmergencyStop => 1,
            Speed::Step(0) => 0,
            Speed::Step(n) => n.min(MAX_SPEED_STEP) + 1,
        }
    }

    /// Speed step, 0 while stopped
    pub fn step(self) -> u8 {
        match self {
            Speed::EmergencyStop => 0,
            Speed::Step(n) => n,
        }
    }

    /// Check for an emergency stop
    pub fn is_estop(self) -> bool {
        matches!(self, Speed::EmergencyStop)
    }
}

/// Fraction of full speed handed to the host throttle
pub fn speed_fraction(step: u8) -> f32 {
    step.min(MAX_SPEED_STEP) as f32 / MAX_SPEED_STEP as f32
}

/// Decoded state of one throttle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThrottleUpdate {
    /// Selected locomotive
    pub address: LocoAddress,
    /// Requested speed
    pub speed: Speed,
    /// Requested direction
    pub direction: Direction,
    /// F0-F28
    pub functions: FunctionSet,
}

impl ThrottleUpdate {
    /// Decode a throttle packet
    ///
    /// Returns `Ok(None)` for traffic that is not a throttle status packet.
    /// An error means the packet looked like a throttle packet but carried
    /// an address the host cannot represent.
    pub fn from_packet(packet: &Packet) -> Result<Option<Self>> {
        if packet.command != CMD_THROTTLE || packet.data.len() != THROTTLE_DATA_LEN {
            return Ok(None);
        }
        Self::from_data(&packet.data).map(Some)
    }

    fn from_data(data: &[u8]) -> Result<Self> {
        let high = AddressHigh(data[0]);
        let address = if high.short() {
            LocoAddress::short((data[1] & 0x7F) as u16)?
        } else {
            LocoAddress::long(u16::from_be_bytes([data[0], data[1]]))?
        };

        let speed_byte = SpeedByte(data[2]);

        let functions = FunctionSet::from_bits(u32::from_le_bytes([
            data[6],
            data[5],
            data[4],
            data[3] & 0x1F,
        ]));

        Ok(ThrottleUpdate {
            address,
            speed: Speed::from_raw(speed_byte.raw_speed()),
            direction: Direction::from_forward(speed_byte.forward()),
            functions,
        })
    }

    /// Build the packet a throttle at bus address `source` would send
    pub fn to_packet(&self, source: u8) -> Packet {
        let mut data = [0u8; THROTTLE_DATA_LEN];

        if self.address.is_long() {
            data[..2].copy_from_slice(&self.address.number().to_be_bytes());
        } else {
            let mut high = AddressHigh(0);
            high.set_short(true);
            data[0] = high.0;
            data[1] = self.address.number() as u8;
        }

        let mut speed_byte = SpeedByte(0);
        speed_byte.set_raw_speed(self.speed.to_raw());
        speed_byte.set_forward(self.direction.is_forward());
        data[2] = speed_byte.0;

        let [f0_7, f8_15, f16_23, f24_28] = self.functions.bits().to_le_bytes();
        data[3] = f24_28;
        data[4] = f16_23;
        data[5] = f8_15;
        data[6] = f0_7;

        Packet::new(BROADCAST_ADDRESS, source, CMD_THROTTLE, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::CMD_TIME;

    fn throttle_packet(data: [u8; 9]) -> Packet {
        Packet::new(BROADCAST_ADDRESS, 0xD5, CMD_THROTTLE, data)
    }

    #[test]
    fn test_speed_from_raw() {
        assert_eq!(Speed::from_raw(0), Speed::Step(0));
        assert_eq!(Speed::from_raw(1), Speed::EmergencyStop);
        assert_eq!(Speed::from_raw(2), Speed::Step(1));
        assert_eq!(Speed::from_raw(64), Speed::Step(63));
        assert_eq!(Speed::from_raw(127), Speed::Step(126));
        assert_eq!(Speed::EmergencyStop.step(), 0);
    }

    #[test]
    fn test_speed_fraction() {
        assert_eq!(speed_fraction(63), 0.5);
        assert_eq!(speed_fraction(0), 0.0);
        assert_eq!(speed_fraction(126), 1.0);
    }

    #[test]
    fn test_decode_long_address() -> Result<()> {
        let packet = throttle_packet([0x04, 0xD2, 0xC0, 0, 0, 0, 0, 0, 0]);
        let update = ThrottleUpdate::from_packet(&packet)?.expect("throttle packet");
        assert_eq!(update.address, LocoAddress::long(1234)?);
        assert_eq!(update.speed, Speed::Step(63));
        assert_eq!(update.direction, Direction::Forward);
        Ok(())
    }

    #[test]
    fn test_decode_short_address() -> Result<()> {
        let packet = throttle_packet([0x80, 0x8C, 0x01, 0, 0, 0, 0, 0, 0]);
        let update = ThrottleUpdate::from_packet(&packet)?.expect("throttle packet");
        assert_eq!(update.address, LocoAddress::short(12)?);
        assert_eq!(update.speed, Speed::EmergencyStop);
        assert_eq!(update.direction, Direction::Reverse);
        Ok(())
    }

    #[test]
    fn test_decode_functions() -> Result<()> {
        let packet = throttle_packet([0x80, 0x03, 0x00, 0xF1, 0x02, 0x80, 0x09, 0, 0]);
        let update = ThrottleUpdate::from_packet(&packet)?.expect("throttle packet");
        let on: Vec<u8> = update
            .functions
            .iter()
            .filter_map(|(i, on)| on.then_some(i))
            .collect();
        // bits 5-7 of byte 3 are not functions
        assert_eq!(on, vec![0, 3, 15, 17, 24, 28]);
        Ok(())
    }

    #[test]
    fn test_filter_non_throttle() -> Result<()> {
        let wrong_command = Packet::new(BROADCAST_ADDRESS, 0xD5, CMD_TIME, [0u8; 9]);
        assert_eq!(ThrottleUpdate::from_packet(&wrong_command)?, None);

        let wrong_length = Packet::new(BROADCAST_ADDRESS, 0xD5, CMD_THROTTLE, [0u8; 8]);
        assert_eq!(ThrottleUpdate::from_packet(&wrong_length)?, None);
        Ok(())
    }

    #[test]
    fn test_long_address_out_of_range() {
        // 0x7FFF = 32767
        let packet = throttle_packet([0x7F, 0xFF, 0, 0, 0, 0, 0, 0, 0]);
        assert!(ThrottleUpdate::from_packet(&packet).is_err());
    }

    #[test]
    fn test_to_packet_matches_wire_layout() -> Result<()> {
        let mut functions = FunctionSet::new();
        functions.set(3, true)?;
        functions.set(26, true)?;
        let update = ThrottleUpdate {
            address: LocoAddress::long(45)?,
            speed: Speed::Step(10),
            direction: Direction::Forward,
            functions,
        };
        let packet = update.to_packet(0xD3);
        assert_eq!(packet.source, 0xD3);
        assert_eq!(packet.data, vec![0x00, 0x2D, 0x8B, 0x04, 0, 0, 0x08, 0, 0]);
        assert_eq!(ThrottleUpdate::from_packet(&packet)?, Some(update));
        Ok(())
    }
}
