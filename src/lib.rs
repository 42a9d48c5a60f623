//! # MRBus Bridge
//!
//! Packet codec and throttle bridge for MRBus, the wireless bus used by Iowa
//! Scaled Engineering ProtoThrottles and fast-clock slaves.
//!
//! The crate sits between the bus and a host control system:
//!
//! - Framing and the MRBus CRC16 checksum
//! - Decoding of ProtoThrottle status packets (address, speed, direction, F0-F28)
//! - Translation of throttle state into the minimal set of host throttle commands
//! - Heartbeat and fast-clock time broadcasts
//!
//! The radio link, the host throttles and the host clock are supplied by the
//! caller through the traits in [`transport`].
//!
//! ## Features
//!
//! - `serde`: Enable serialization/deserialization support
//!
//! ## Example
//!
//! ```
//! use mrbus_bridge::{Packet, ThrottleUpdate};
//!
//! let frame = [0xFF, 0xD5, 0x0F, 0x00, 0x00, 0x53, 0x80, 0x03, 0xC0, 0, 0, 0, 0x01, 0, 0];
//! let packet = Packet::decode(&frame)?;
//! let update = ThrottleUpdate::from_packet(&packet)?.expect("throttle packet");
//! assert_eq!(update.address.number(), 3);
//! assert_eq!(update.speed.step(), 63);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod bridge;
pub mod broadcast;
pub mod config;
pub mod core;
pub mod crc;
pub mod error;
pub mod packet;
pub mod state;
pub mod throttle;
pub mod transport;

pub use bridge::{Bridge, BridgeBuilder, BridgeStats, Outcome};
pub use config::BridgeConfig;
pub use crate::core::{Direction, FunctionSet, LocoAddress};
pub use error::{BridgeError, Result, TransportError};
pub use packet::Packet;
pub use state::{ThrottleCommand, ThrottleState, ThrottleStateMachine};
pub use throttle::{Speed, ThrottleUpdate};
pub use transport::{BusTransport, LocoThrottle, ThrottleController, Timebase, TimebaseSnapshot};

/// MRBus wire constants
pub mod wire {
    /// Destination address received by every device
    pub const BROADCAST_ADDRESS: u8 = 0xFF;

    /// Bytes before the data: dest, src, len, crc low, crc high, command
    pub const HEADER_LEN: usize = 6;

    /// Largest frame the length byte can describe
    pub const MAX_FRAME_LEN: usize = 255;

    /// Throttle status ('S')
    pub const CMD_THROTTLE: u8 = 0x53;

    /// Version / heartbeat ('v')
    pub const CMD_VERSION: u8 = 0x76;

    /// Fast-clock time ('T')
    pub const CMD_TIME: u8 = 0x54;

    /// Data bytes in a throttle status packet
    pub const THROTTLE_DATA_LEN: usize = 9;
}
