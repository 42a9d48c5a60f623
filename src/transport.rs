//! Interfaces to the systems the bridge sits between
//!
//! The bridge never talks to hardware or to the host control system
//! directly. The host supplies implementations of these traits:
//!
//! - [`BusTransport`]: the radio/serial link to the bus
//! - [`ThrottleController`] / [`LocoThrottle`]: the host's throttle objects
//! - [`Timebase`]: the host's fast clock
//!
//! Inbound bus data is pushed into the bridge by the host calling
//! [`Bridge::on_data_received`](crate::bridge::Bridge::on_data_received).

use std::time::Duration;

use crate::core::{Direction, LocoAddress};
use crate::error::{Result, TransportError};

/// Outbound side of the radio/serial link
pub trait BusTransport {
    /// Broadcast a complete frame to every device in range
    fn send_broadcast(&mut self, frame: &[u8]) -> std::result::Result<(), TransportError>;

    /// Bound how long a single send may take
    fn set_send_timeout(&mut self, timeout: Duration);
}

/// Host throttle for one locomotive
pub trait LocoThrottle {
    /// Set speed as a fraction of full speed, 0.0-1.0
    fn set_speed(&mut self, fraction: f32);

    /// Stop immediately
    fn set_emergency_stop(&mut self);

    fn set_direction(&mut self, direction: Direction);

    /// Turn function `index` (0-28) on or off
    fn set_function(&mut self, index: u8, on: bool);

    fn function(&self, index: u8) -> bool;

    fn is_forward(&self) -> bool;
}

/// Hands out host throttles by locomotive address
pub trait ThrottleController {
    type Handle: LocoThrottle;

    /// Take control of a locomotive
    fn acquire(&mut self, address: LocoAddress) -> Result<Self::Handle>;
}

/// Fast-clock time of day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FastTime {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// Everything the time broadcast needs from the host clock at one instant
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimebaseSnapshot {
    /// Fast-clock rate multiplier
    pub rate: f64,
    /// Clock is running
    pub running: bool,
    /// Current fast time
    pub time: FastTime,
}

/// The host's fast clock
pub trait Timebase {
    /// Rate multiplier (1.0 = real time)
    fn rate(&self) -> f64;

    /// Check if the clock is running
    fn is_running(&self) -> bool;

    /// Current fast time
    fn time(&self) -> FastTime;

    /// Read all values at once
    fn snapshot(&self) -> TimebaseSnapshot {
        TimebaseSnapshot {
            rate: self.rate(),
            running: self.is_running(),
            time: self.time(),
        }
    }
}

impl Timebase for TimebaseSnapshot {
    fn rate(&self) -> f64 {
        self.rate
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn time(&self) -> FastTime {
        self.time
    }

    fn snapshot(&self) -> TimebaseSnapshot {
        *self
    }
}
