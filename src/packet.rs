//! MRBus packet framing
//!
//! Frame layout:
//!
//! | offset | field            |
//! |--------|------------------|
//! | 0      | destination      |
//! | 1      | source           |
//! | 2      | length (frame)   |
//! | 3      | CRC low byte     |
//! | 4      | CRC high byte    |
//! | 5      | command          |
//! | 6..    | data             |

use crate::crc;
use crate::error::{BridgeError, Result};
use crate::wire::{BROADCAST_ADDRESS, HEADER_LEN, MAX_FRAME_LEN};

/// A single packet on the bus
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Packet {
    /// Destination bus address (0xFF = broadcast)
    pub destination: u8,
    /// Source bus address
    pub source: u8,
    /// ASCII opcode
    pub command: u8,
    /// Bytes following the command
    pub data: Vec<u8>,
}

impl Packet {
    /// Create a new packet
    pub fn new(destination: u8, source: u8, command: u8, data: impl Into<Vec<u8>>) -> Self {
        Packet {
            destination,
            source,
            command,
            data: data.into(),
        }
    }

    /// Create a packet addressed to every device on the bus
    pub fn broadcast(source: u8, command: u8, data: impl Into<Vec<u8>>) -> Self {
        Self::new(BROADCAST_ADDRESS, source, command, data)
    }

    /// Check if the packet is a broadcast
    pub fn is_broadcast(&self) -> bool {
        self.destination == BROADCAST_ADDRESS
    }

    /// Total serialized length
    pub fn frame_len(&self) -> usize {
        HEADER_LEN + self.data.len()
    }

    /// Serialize to a frame with the checksum filled in
    pub fn encode(&self) -> Result<Vec<u8>> {
        let length = self.frame_len();
        if length > MAX_FRAME_LEN {
            return Err(BridgeError::FrameTooLong(length));
        }

        let mut frame = Vec::with_capacity(length);
        frame.extend_from_slice(&[
            self.destination,
            self.source,
            length as u8,
            0,
            0,
            self.command,
        ]);
        frame.extend_from_slice(&self.data);

        let checksum = crc::calculate(&frame);
        frame[3] = (checksum & 0xFF) as u8;
        frame[4] = (checksum >> 8) as u8;

        Ok(frame)
    }

    /// Decode a frame without checking its length byte or checksum
    ///
    /// This matches what bus throttles expect from the host bridge: anything
    /// with a complete header is accepted and filtering is left to the
    /// consumer.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(BridgeError::insufficient_data(format!(
                "Expected at least {} bytes for a frame, got {}",
                HEADER_LEN,
                bytes.len()
            )));
        }

        Ok(Packet {
            destination: bytes[0],
            source: bytes[1],
            command: bytes[5],
            data: bytes[HEADER_LEN..].to_vec(),
        })
    }

    /// Decode a frame, rejecting bad length bytes and checksums
    pub fn decode_verified(bytes: &[u8]) -> Result<Self> {
        let packet = Self::decode(bytes)?;

        let declared = bytes[2] as usize;
        if declared != bytes.len() {
            return Err(BridgeError::LengthMismatch {
                declared,
                actual: bytes.len(),
            });
        }

        let expected = crc::calculate(bytes);
        let actual = embedded_checksum(bytes);
        if expected != actual {
            return Err(BridgeError::ChecksumMismatch { expected, actual });
        }

        Ok(packet)
    }
}

impl std::fmt::Display for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "packet({:02X}h->{:02X}h) ", self.source, self.destination)?;
        if self.command.is_ascii_graphic() {
            write!(f, "({:02X}h '{}')", self.command, self.command as char)?;
        } else {
            write!(f, "({:02X}h    )", self.command)?;
        }
        write!(f, " {:2}:{:02X?}", self.data.len(), self.data)
    }
}

/// Check a raw frame's length byte and checksum
pub fn verify(bytes: &[u8]) -> bool {
    bytes.len() >= HEADER_LEN
        && bytes[2] as usize == bytes.len()
        && crc::calculate(bytes) == embedded_checksum(bytes)
}

fn embedded_checksum(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[3], bytes[4]])
}
