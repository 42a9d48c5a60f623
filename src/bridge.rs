//! Event handlers tying the codec, throttle state and broadcasts together

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::broadcast::{BroadcastStats, Broadcaster};
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::packet::Packet;
use crate::state::{ThrottleCommand, ThrottleState, ThrottleStateMachine};
use crate::throttle::{speed_fraction, ThrottleUpdate};
use crate::transport::{BusTransport, LocoThrottle, ThrottleController, Timebase};

/// What happened to an inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Throttle update applied; number of commands sent to the host
    Applied(usize),
    /// Not throttle traffic
    Filtered,
    /// Bad frame or rejected update; state left untouched
    Dropped,
}

/// Traffic counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BridgeStats {
    pub packets_accepted: u64,
    pub packets_filtered: u64,
    pub packets_dropped: u64,
    pub broadcast: BroadcastStats,
}

/// Bridge between the bus and the host control system
///
/// The host calls the `on_*` handlers from its own event sources. All
/// failures are logged and absorbed; none of the handlers return errors.
pub struct Bridge<T: BusTransport, C: ThrottleController> {
    config: BridgeConfig,
    transport: T,
    controller: C,
    throttles: ThrottleStateMachine,
    handles: HashMap<u8, C::Handle>,
    broadcaster: Broadcaster,
    stats: BridgeStats,
}

impl<T: BusTransport, C: ThrottleController> Bridge<T, C> {
    /// Create a bridge, validating the configuration
    pub fn new(config: BridgeConfig, mut transport: T, controller: C) -> Result<Self> {
        config.validate()?;
        transport.set_send_timeout(config.send_timeout());

        info!(
            bus_address = config.bus_address,
            clock_address = config.clock_address,
            "bridge started"
        );

        Ok(Bridge {
            broadcaster: Broadcaster::new(
                config.bus_address,
                config.clock_address,
                config.heartbeat_interval(),
            ),
            config,
            transport,
            controller,
            throttles: ThrottleStateMachine::new(),
            handles: HashMap::new(),
            stats: BridgeStats::default(),
        })
    }

    /// Handle a frame received from the bus
    pub fn on_data_received(&mut self, bytes: &[u8]) -> Outcome {
        let decoded = if self.config.verify_checksums {
            Packet::decode_verified(bytes)
        } else {
            Packet::decode(bytes)
        };

        let packet = match decoded {
            Ok(packet) => packet,
            Err(BridgeError::InsufficientData(_)) => {
                trace!(len = bytes.len(), "runt frame ignored");
                self.stats.packets_filtered += 1;
                return Outcome::Filtered;
            }
            Err(err) => {
                debug!(error = %err, "dropping corrupt frame");
                self.stats.packets_dropped += 1;
                return Outcome::Dropped;
            }
        };

        let update = match ThrottleUpdate::from_packet(&packet) {
            Ok(Some(update)) => update,
            Ok(None) => {
                trace!(%packet, "not a throttle packet");
                self.stats.packets_filtered += 1;
                return Outcome::Filtered;
            }
            Err(err) => {
                warn!(source = packet.source, error = %err, "dropping throttle packet");
                self.stats.packets_dropped += 1;
                return Outcome::Dropped;
            }
        };

        trace!(source = packet.source, loco = %update.address, "throttle update");

        let transition = self.throttles.plan(packet.source, &update);
        if let Err(err) = self.dispatch(packet.source, &transition.commands) {
            warn!(source = packet.source, error = %err, "throttle update aborted");
            self.stats.packets_dropped += 1;
            return Outcome::Dropped;
        }

        self.throttles.commit(packet.source, transition.next);
        self.stats.packets_accepted += 1;
        Outcome::Applied(transition.commands.len())
    }

    /// Periodic tick; sends a heartbeat when one is due
    pub fn on_tick(&mut self, now: Instant) -> bool {
        self.broadcaster.poll_heartbeat(now, &mut self.transport)
    }

    /// The host fast clock moved to a new minute
    pub fn on_minute_changed(&mut self, clock: &impl Timebase) -> bool {
        self.broadcaster.send_time(clock, &mut self.transport)
    }

    /// Send a heartbeat immediately
    pub fn send_heartbeat(&mut self) -> bool {
        self.broadcaster.send_heartbeat(&mut self.transport)
    }

    /// Stop all broadcasts; inbound throttle traffic is still handled
    pub fn shutdown(&mut self) {
        if !self.broadcaster.is_stopped() {
            info!("bridge broadcasts stopped");
        }
        self.broadcaster.stop();
    }

    pub fn is_shut_down(&self) -> bool {
        self.broadcaster.is_stopped()
    }

    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            broadcast: self.broadcaster.stats(),
            ..self.stats
        }
    }

    /// Last known state of the throttle at bus address `source`
    pub fn state(&self, source: u8) -> Option<&ThrottleState> {
        self.throttles.get(source)
    }

    /// Host throttle currently driven by the bus throttle at `source`
    pub fn throttle(&self, source: u8) -> Option<&C::Handle> {
        self.handles.get(&source)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    fn dispatch(&mut self, source: u8, commands: &[ThrottleCommand]) -> Result<()> {
        for &command in commands {
            match command {
                ThrottleCommand::Acquire(address) => {
                    info!(source, loco = %address, "acquiring new locomotive");
                    let handle = self.controller.acquire(address)?;
                    self.handles.insert(source, handle);
                }
                ThrottleCommand::SetFunction { index, on } => {
                    debug!(source, function = index, on, "set function");
                    self.handle_mut(source)?.set_function(index, on);
                }
                ThrottleCommand::EmergencyStop => {
                    debug!(source, "emergency stop");
                    self.handle_mut(source)?.set_emergency_stop();
                }
                ThrottleCommand::SetDirection(direction) => {
                    debug!(source, %direction, "set direction");
                    self.handle_mut(source)?.set_direction(direction);
                }
                ThrottleCommand::SetSpeed(step) => {
                    debug!(source, step, "set speed");
                    self.handle_mut(source)?.set_speed(speed_fraction(step));
                }
            }
        }
        Ok(())
    }

    fn handle_mut(&mut self, source: u8) -> Result<&mut C::Handle> {
        self.handles.get_mut(&source).ok_or_else(|| {
            BridgeError::throttle(format!("no locomotive acquired for source {:#04x}", source))
        })
    }
}

/// Builder for [`Bridge`]
pub struct BridgeBuilder {
    config: BridgeConfig,
}

impl BridgeBuilder {
    /// Create a builder with default settings
    pub fn new() -> Self {
        BridgeBuilder {
            config: BridgeConfig::default(),
        }
    }

    /// Start from an existing configuration
    pub fn with_config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_bus_address(mut self, address: u8) -> Self {
        self.config.bus_address = address;
        self
    }

    pub fn with_clock_address(mut self, address: u8) -> Self {
        self.config.clock_address = address;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.config.send_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Accept frames without checking length and checksum
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.config.verify_checksums = verify;
        self
    }

    /// Build the bridge
    pub fn build<T: BusTransport, C: ThrottleController>(
        self,
        transport: T,
        controller: C,
    ) -> Result<Bridge<T, C>> {
        Bridge::new(self.config, transport, controller)
    }
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
