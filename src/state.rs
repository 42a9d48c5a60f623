//! Per-throttle state tracking
//!
//! Throttles resend their full state on every cycle. The state machine keeps
//! the last state seen from each bus address and turns every update into
//! the smallest set of commands that brings the host throttle in line.

use std::collections::HashMap;

use crate::core::{Direction, FunctionSet, LocoAddress};
use crate::throttle::{speed_fraction, ThrottleUpdate};

/// A change to apply to the host throttle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ThrottleCommand {
    /// Take control of a (new) locomotive
    Acquire(LocoAddress),
    /// Turn a function on or off
    SetFunction { index: u8, on: bool },
    /// Emergency stop
    EmergencyStop,
    /// Change direction
    SetDirection(Direction),
    /// Change speed step (0-126)
    SetSpeed(u8),
}

impl ThrottleCommand {
    /// Speed as a fraction of full speed, for `SetSpeed`
    pub fn speed_fraction(&self) -> Option<f32> {
        match self {
            ThrottleCommand::SetSpeed(step) => Some(speed_fraction(*step)),
            _ => None,
        }
    }
}

/// Last known state of one throttle on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThrottleState {
    /// Locomotive currently controlled, if any
    pub loco: Option<LocoAddress>,
    /// Speed step 0-126
    pub speed: u8,
    /// Emergency stop in effect
    pub estop: bool,
    /// Direction last sent to the host
    pub direction: Direction,
    /// Function states last sent to the host
    pub functions: FunctionSet,
    functions_synced: bool,
    motion_synced: bool,
}

impl ThrottleState {
    /// Check whether the host throttle has been fully reconciled since the
    /// locomotive was acquired
    pub fn is_synced(&self) -> bool {
        self.functions_synced && self.motion_synced
    }
}

/// Commands produced by an update together with the state they lead to
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Commands in the order they must be applied
    pub commands: Vec<ThrottleCommand>,
    /// State once all commands have been applied
    pub next: ThrottleState,
}

impl Transition {
    /// Check if the update changed nothing
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Throttle states keyed by bus source address
#[derive(Debug, Default)]
pub struct ThrottleStateMachine {
    throttles: HashMap<u8, ThrottleState>,
}

impl ThrottleStateMachine {
    /// Create an empty state machine
    pub fn new() -> Self {
        ThrottleStateMachine {
            throttles: HashMap::new(),
        }
    }

    /// Get the state of the throttle at `source`
    pub fn get(&self, source: u8) -> Option<&ThrottleState> {
        self.throttles.get(&source)
    }

    /// Number of throttles seen so far
    pub fn throttle_count(&self) -> usize {
        self.throttles.len()
    }

    /// Bus addresses of all throttles seen so far
    pub fn sources(&self) -> impl Iterator<Item = u8> + '_ {
        self.throttles.keys().copied()
    }

    /// Work out the commands for an update without storing anything
    pub fn plan(&self, source: u8, update: &ThrottleUpdate) -> Transition {
        let mut next = self.throttles.get(&source).copied().unwrap_or_default();
        let mut commands = Vec::new();

        if next.loco != Some(update.address) {
            commands.push(ThrottleCommand::Acquire(update.address));
            next = ThrottleState {
                loco: Some(update.address),
                ..ThrottleState::default()
            };
        }

        let changed: Vec<u8> = if next.functions_synced {
            update.functions.changed_from(&next.functions).collect()
        } else {
            (0..FunctionSet::COUNT).collect()
        };
        for (index, on) in update.functions.iter() {
            if changed.contains(&index) {
                commands.push(ThrottleCommand::SetFunction { index, on });
            }
        }
        next.functions = update.functions;
        next.functions_synced = true;

        // speed and direction wait until the emergency stop is released
        let estop = update.speed.is_estop();
        if estop {
            if !next.estop {
                commands.push(ThrottleCommand::EmergencyStop);
            }
        } else {
            if update.direction != next.direction || !next.motion_synced {
                commands.push(ThrottleCommand::SetDirection(update.direction));
                next.direction = update.direction;
            }
            if update.speed.step() != next.speed || !next.motion_synced {
                commands.push(ThrottleCommand::SetSpeed(update.speed.step()));
            }
            next.motion_synced = true;
        }

        next.speed = update.speed.step();
        next.estop = estop;

        Transition { commands, next }
    }

    /// Store the state reached by a transition
    pub fn commit(&mut self, source: u8, next: ThrottleState) {
        self.throttles.insert(source, next);
    }

    /// Plan and immediately commit an update
    pub fn apply(&mut self, source: u8, update: &ThrottleUpdate) -> Vec<ThrottleCommand> {
        let Transition { commands, next } = self.plan(source, update);
        self.commit(source, next);
        commands
    }
}
