//! A short operating session: a throttle picks up a locomotive, runs it,
//! switches functions, hits emergency stop, while the bridge keeps
//! broadcasting heartbeats and fast time.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use mrbus_bridge::packet::verify;
use mrbus_bridge::transport::FastTime;
use mrbus_bridge::{
    BridgeBuilder, BusTransport, Direction, FunctionSet, LocoAddress, LocoThrottle, Outcome,
    Packet, Speed, ThrottleController, ThrottleUpdate, TimebaseSnapshot, TransportError,
};

#[derive(Default)]
struct Radio {
    sent: Vec<Vec<u8>>,
}

impl BusTransport for Radio {
    fn send_broadcast(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        self.sent.push(frame.to_vec());
        Ok(())
    }

    fn set_send_timeout(&mut self, _timeout: Duration) {}
}

#[derive(Debug, Default)]
struct Loco {
    speed: f32,
    estop: bool,
    forward: bool,
    functions: HashMap<u8, bool>,
}

impl LocoThrottle for Loco {
    fn set_speed(&mut self, fraction: f32) {
        self.estop = false;
        self.speed = fraction;
    }

    fn set_emergency_stop(&mut self) {
        self.estop = true;
        self.speed = 0.0;
    }

    fn set_direction(&mut self, direction: Direction) {
        self.forward = direction.is_forward();
    }

    fn set_function(&mut self, index: u8, on: bool) {
        self.functions.insert(index, on);
    }

    fn function(&self, index: u8) -> bool {
        self.functions.get(&index).copied().unwrap_or(false)
    }

    fn is_forward(&self) -> bool {
        self.forward
    }
}

struct Roster;

impl ThrottleController for Roster {
    type Handle = Loco;

    fn acquire(&mut self, _address: LocoAddress) -> mrbus_bridge::Result<Loco> {
        Ok(Loco::default())
    }
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("mrbus_bridge=trace"))
        .with_test_writer()
        .try_init();
}

fn send(update: &ThrottleUpdate) -> Vec<u8> {
    update.to_packet(0xD3).encode().unwrap()
}

#[test]
fn operating_session() {
    init_logging();

    let mut bridge = BridgeBuilder::new()
        .with_heartbeat_interval(Duration::from_millis(250))
        .build(Radio::default(), Roster)
        .unwrap();

    let start = Instant::now();
    assert!(bridge.on_tick(start));

    let mut update = ThrottleUpdate {
        address: LocoAddress::long(2471).unwrap(),
        speed: Speed::Step(0),
        direction: Direction::Forward,
        functions: FunctionSet::new(),
    };
    assert!(matches!(bridge.on_data_received(&send(&update)), Outcome::Applied(_)));

    update.functions.set(0, true).unwrap();
    update.speed = Speed::from_raw(64);
    assert_eq!(bridge.on_data_received(&send(&update)), Outcome::Applied(2));
    {
        let loco = bridge.throttle(0xD3).unwrap();
        assert_eq!(loco.speed, 0.5);
        assert!(loco.function(0));
        assert!(loco.is_forward());
    }

    assert!(bridge.on_tick(start + Duration::from_millis(300)));

    update.speed = Speed::EmergencyStop;
    assert_eq!(bridge.on_data_received(&send(&update)), Outcome::Applied(1));
    assert_eq!(bridge.on_data_received(&send(&update)), Outcome::Applied(0));
    assert!(bridge.throttle(0xD3).unwrap().estop);

    let clock = TimebaseSnapshot {
        rate: 6.0,
        running: true,
        time: FastTime {
            hour: 7,
            minute: 15,
            second: 0,
        },
    };
    assert!(bridge.on_minute_changed(&clock));

    // another device's time packet is just traffic
    let foreign = Packet::broadcast(0x20, b'T', vec![0; 12]).encode().unwrap();
    assert_eq!(bridge.on_data_received(&foreign), Outcome::Filtered);

    bridge.shutdown();
    assert!(!bridge.on_tick(start + Duration::from_secs(10)));

    let sent = &bridge.transport().sent;
    assert_eq!(sent.len(), 3);
    assert!(sent.iter().all(|frame| verify(frame)));
    assert_eq!(&sent[2][13..15], &[0x00, 60]);

    let stats = bridge.stats();
    assert_eq!(stats.packets_accepted, 4);
    assert_eq!(stats.packets_filtered, 1);
    assert_eq!(stats.broadcast.heartbeats_sent, 2);
    assert_eq!(stats.broadcast.time_packets_sent, 1);
}
