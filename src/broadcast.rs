//! Heartbeat and fast-clock broadcasts
//!
//! Throttles only talk to a base station that announces itself, so the
//! bridge broadcasts a version packet at a fixed period. Clock displays and
//! throttles also follow the host fast clock through a time packet sent
//! whenever the fast minute changes.

use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::packet::Packet;
use crate::transport::{BusTransport, Timebase, TimebaseSnapshot};
use crate::wire::{CMD_TIME, CMD_VERSION};

/// Data bytes of the version packet: capability flags, version, then "JMRI"
pub const HEARTBEAT_DATA: [u8; 10] = [0x80, 0x01, 0x00, 0x00, 0x01, 0x00, b'J', b'M', b'R', b'I'];

/// Flag bit set in the time packet while the fast clock is running
pub const TIME_FLAG_RUN: u8 = 0x01;

/// Build the version/heartbeat packet
pub fn heartbeat_packet(source: u8) -> Packet {
    Packet::broadcast(source, CMD_VERSION, HEARTBEAT_DATA)
}

/// Build a time packet for the given clock state
///
/// Real-time fields and the date are left zero.
pub fn time_packet(source: u8, clock: &TimebaseSnapshot) -> Packet {
    let flags = if clock.running { TIME_FLAG_RUN } else { 0 };
    let [scale_high, scale_low] = scale_factor(clock.rate).to_be_bytes();

    let data = [
        0, // real hours
        0, // real minutes
        0, // real seconds
        flags,
        clock.time.hour,
        clock.time.minute,
        clock.time.second,
        scale_high,
        scale_low,
        0, // real year, high
        0, // real year low / month
        0, // real day of month
    ];

    Packet::broadcast(source, CMD_TIME, data)
}

/// Fast-clock rate in tenths, as carried on the wire
pub fn scale_factor(rate: f64) -> u16 {
    // `as` saturates and maps NaN to 0
    (rate * 10.0).round() as u16
}

/// Decides when the next heartbeat is due
#[derive(Debug, Clone)]
pub struct HeartbeatSchedule {
    period: Duration,
    last_sent: Option<Instant>,
    stopped: bool,
}

impl HeartbeatSchedule {
    /// Create a schedule firing every `period`
    pub fn new(period: Duration) -> Self {
        HeartbeatSchedule {
            period,
            last_sent: None,
            stopped: false,
        }
    }

    /// Period between heartbeats
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Check whether a heartbeat is due at `now`, and if so mark it sent
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.stopped {
            return false;
        }
        let due = match self.last_sent {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.period,
        };
        if due {
            self.last_sent = Some(now);
        }
        due
    }

    /// Stop the schedule; later polls never fire
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

/// Counters for broadcast traffic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BroadcastStats {
    pub heartbeats_sent: u64,
    pub time_packets_sent: u64,
    pub send_failures: u64,
}

/// Encodes heartbeat and time packets and hands them to the transport
#[derive(Debug)]
pub struct Broadcaster {
    bus_address: u8,
    clock_address: u8,
    schedule: HeartbeatSchedule,
    stats: BroadcastStats,
}

impl Broadcaster {
    /// Create a broadcaster
    ///
    /// Heartbeats go out from `bus_address`, time packets from
    /// `clock_address`.
    pub fn new(bus_address: u8, clock_address: u8, heartbeat_period: Duration) -> Self {
        Broadcaster {
            bus_address,
            clock_address,
            schedule: HeartbeatSchedule::new(heartbeat_period),
            stats: BroadcastStats::default(),
        }
    }

    /// Send a heartbeat if one is due at `now`
    pub fn poll_heartbeat<T: BusTransport>(&mut self, now: Instant, transport: &mut T) -> bool {
        if !self.schedule.poll(now) {
            return false;
        }
        self.send_heartbeat(transport)
    }

    /// Send a heartbeat now, unless stopped
    pub fn send_heartbeat<T: BusTransport>(&mut self, transport: &mut T) -> bool {
        if self.schedule.is_stopped() {
            return false;
        }
        let sent = self.send(transport, &heartbeat_packet(self.bus_address), "heartbeat");
        if sent {
            self.stats.heartbeats_sent += 1;
        }
        sent
    }

    /// Send the current fast time, unless stopped
    pub fn send_time<T: BusTransport>(&mut self, clock: &impl Timebase, transport: &mut T) -> bool {
        if self.schedule.is_stopped() {
            trace!("time broadcast after shutdown ignored");
            return false;
        }
        let snapshot = clock.snapshot();
        debug!(
            hour = snapshot.time.hour,
            minute = snapshot.time.minute,
            rate = snapshot.rate,
            running = snapshot.running,
            "broadcasting fast time"
        );
        let sent = self.send(transport, &time_packet(self.clock_address, &snapshot), "time update");
        if sent {
            self.stats.time_packets_sent += 1;
        }
        sent
    }

    /// Stop all broadcasts
    pub fn stop(&mut self) {
        self.schedule.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.schedule.is_stopped()
    }

    pub fn stats(&self) -> BroadcastStats {
        self.stats
    }

    fn send<T: BusTransport>(&mut self, transport: &mut T, packet: &Packet, what: &str) -> bool {
        let frame = match packet.encode() {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "failed to encode {}", what);
                return false;
            }
        };

        match transport.send_broadcast(&frame) {
            Ok(()) => {
                trace!(%packet, "{} sent", what);
                true
            }
            Err(err) => {
                self.stats.send_failures += 1;
                warn!(error = %err, "failed to send {}", what);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::packet::verify;
    use crate::transport::FastTime;

    #[derive(Default)]
    struct RecordingTransport {
        frames: Vec<Vec<u8>>,
        fail: bool,
    }

    impl BusTransport for RecordingTransport {
        fn send_broadcast(&mut self, frame: &[u8]) -> Result<(), TransportError> {
            if self.fail {
                return Err(TransportError::Disconnected);
            }
            self.frames.push(frame.to_vec());
            Ok(())
        }

        fn set_send_timeout(&mut self, _timeout: Duration) {}
    }

    fn clock() -> TimebaseSnapshot {
        TimebaseSnapshot {
            rate: 10.0,
            running: true,
            time: FastTime {
                hour: 13,
                minute: 45,
                second: 30,
            },
        }
    }

    #[test]
    fn test_heartbeat_frame() {
        let frame = heartbeat_packet(0xD0).encode().unwrap();
        assert_eq!(frame.len(), 16);
        assert_eq!(&frame[..6], &[0xFF, 0xD0, 0x10, 0x31, 0x0F, 0x76]);
        assert_eq!(&frame[12..], b"JMRI");
    }

    #[test]
    fn test_time_frame() {
        let frame = time_packet(0x00, &clock()).encode().unwrap();
        assert_eq!(
            frame,
            vec![
                0xFF, 0x00, 0x12, 0x73, 0x75, 0x54, 0, 0, 0, 0x01, 13, 45, 30, 0x00, 0x64, 0, 0, 0
            ]
        );
    }

    #[test]
    fn test_time_frame_stopped_clock() {
        let mut stopped = clock();
        stopped.running = false;
        stopped.rate = 1.0;
        let packet = time_packet(0x00, &stopped);
        assert_eq!(packet.data[3], 0);
        assert_eq!(&packet.data[7..9], &[0x00, 0x0A]);
    }

    #[test]
    fn test_scale_factor() {
        assert_eq!(scale_factor(1.0), 10);
        assert_eq!(scale_factor(4.25), 43);
        assert_eq!(scale_factor(60.0), 600);
        assert_eq!(scale_factor(-2.0), 0);
        assert_eq!(scale_factor(1.0e9), u16::MAX);
    }

    #[test]
    fn test_schedule_period() {
        let start = Instant::now();
        let mut schedule = HeartbeatSchedule::new(Duration::from_secs(1));
        assert!(schedule.poll(start));
        assert!(!schedule.poll(start + Duration::from_millis(500)));
        assert!(schedule.poll(start + Duration::from_millis(1000)));
        assert!(!schedule.poll(start + Duration::from_millis(1999)));
        assert!(schedule.poll(start + Duration::from_secs(5)));
    }

    #[test]
    fn test_schedule_stop() {
        let start = Instant::now();
        let mut schedule = HeartbeatSchedule::new(Duration::from_secs(1));
        schedule.stop();
        assert!(!schedule.poll(start));
        assert!(!schedule.poll(start + Duration::from_secs(10)));
    }

    #[test]
    fn test_broadcaster_sends_valid_frames() {
        let mut transport = RecordingTransport::default();
        let mut broadcaster = Broadcaster::new(0xD0, 0x00, Duration::from_secs(1));
        let now = Instant::now();

        assert!(broadcaster.poll_heartbeat(now, &mut transport));
        assert!(!broadcaster.poll_heartbeat(now, &mut transport));
        assert!(broadcaster.send_time(&clock(), &mut transport));

        assert_eq!(transport.frames.len(), 2);
        assert!(transport.frames.iter().all(|f| verify(f)));
        assert_eq!(
            broadcaster.stats(),
            BroadcastStats {
                heartbeats_sent: 1,
                time_packets_sent: 1,
                send_failures: 0
            }
        );
    }

    #[test]
    fn test_broadcaster_swallows_send_failures() {
        let mut transport = RecordingTransport {
            fail: true,
            ..Default::default()
        };
        let mut broadcaster = Broadcaster::new(0xD0, 0x00, Duration::from_secs(1));

        assert!(!broadcaster.send_heartbeat(&mut transport));
        assert!(!broadcaster.send_time(&clock(), &mut transport));
        assert_eq!(broadcaster.stats().send_failures, 2);
        assert_eq!(broadcaster.stats().heartbeats_sent, 0);
    }

    #[test]
    fn test_broadcaster_silent_after_stop() {
        let mut transport = RecordingTransport::default();
        let mut broadcaster = Broadcaster::new(0xD0, 0x00, Duration::from_secs(1));
        broadcaster.stop();

        assert!(!broadcaster.poll_heartbeat(Instant::now(), &mut transport));
        assert!(!broadcaster.send_heartbeat(&mut transport));
        assert!(!broadcaster.send_time(&clock(), &mut transport));
        assert!(transport.frames.is_empty());
    }
}
