//! Core value types shared by the decoder, state machine and collaborators

use crate::error::{BridgeError, Result};

/// Locomotive address as selected on a throttle
///
/// Short addresses cover 0-127, long addresses 0-9999.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocoAddress {
    number: u16,
    long: bool,
}

impl LocoAddress {
    /// Highest short address
    pub const MAX_SHORT: u16 = 127;
    /// Highest long address
    pub const MAX_LONG: u16 = 9999;

    /// Create a short (7-bit) address
    pub fn short(number: u16) -> Result<Self> {
        if number > Self::MAX_SHORT {
            return Err(BridgeError::invalid_address(format!(
                "Short address {} out of range [0, {}]",
                number,
                Self::MAX_SHORT
            )));
        }
        Ok(LocoAddress {
            number,
            long: false,
        })
    }

    /// Create a long (14-bit) address
    pub fn long(number: u16) -> Result<Self> {
        if number > Self::MAX_LONG {
            return Err(BridgeError::invalid_address(format!(
                "Long address {} out of range [0, {}]",
                number,
                Self::MAX_LONG
            )));
        }
        Ok(LocoAddress { number, long: true })
    }

    /// Create an address of either kind
    pub fn new(number: u16, long: bool) -> Result<Self> {
        if long {
            Self::long(number)
        } else {
            Self::short(number)
        }
    }

    /// Get the numeric address
    pub fn number(&self) -> u16 {
        self.number
    }

    /// Check if this is a long address
    pub fn is_long(&self) -> bool {
        self.long
    }
}

impl std::fmt::Display for LocoAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.long {
            write!(f, "{}(L)", self.number)
        } else {
            write!(f, "{}(S)", self.number)
        }
    }
}

/// Direction of travel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// Forward
    #[default]
    Forward,
    /// Reverse
    Reverse,
}

impl Direction {
    /// Map a "forward" flag to a direction
    pub fn from_forward(forward: bool) -> Self {
        if forward {
            Direction::Forward
        } else {
            Direction::Reverse
        }
    }

    /// Check if this is the forward direction
    pub fn is_forward(&self) -> bool {
        matches!(self, Direction::Forward)
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Forward => write!(f, "FWD"),
            Direction::Reverse => write!(f, "REV"),
        }
    }
}

/// The 29 decoder functions (F0-F28) of a locomotive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FunctionSet(u32);

impl FunctionSet {
    /// Number of functions carried by a throttle packet
    pub const COUNT: u8 = 29;

    const MASK: u32 = (1 << Self::COUNT) - 1;

    /// All functions off
    pub fn new() -> Self {
        FunctionSet(0)
    }

    /// Build from a bitmask, bit `i` = function `i`; bits above F28 are dropped
    pub fn from_bits(bits: u32) -> Self {
        FunctionSet(bits & Self::MASK)
    }

    /// Get the raw bitmask
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Get the state of function `index`
    pub fn get(&self, index: u8) -> Result<bool> {
        Self::check_index(index)?;
        Ok(self.0 & (1 << index) != 0)
    }

    /// Set the state of function `index`
    pub fn set(&mut self, index: u8, on: bool) -> Result<()> {
        Self::check_index(index)?;
        if on {
            self.0 |= 1 << index;
        } else {
            self.0 &= !(1 << index);
        }
        Ok(())
    }

    /// Iterate `(index, state)` over all 29 functions
    pub fn iter(&self) -> impl Iterator<Item = (u8, bool)> + '_ {
        (0..Self::COUNT).map(move |i| (i, self.0 & (1 << i) != 0))
    }

    /// Indices whose state differs from `other`
    pub fn changed_from(&self, other: &FunctionSet) -> impl Iterator<Item = u8> {
        let diff = self.0 ^ other.0;
        (0..Self::COUNT).filter(move |i| diff & (1 << i) != 0)
    }

    fn check_index(index: u8) -> Result<()> {
        if index >= Self::COUNT {
            return Err(BridgeError::InvalidFunction(index));
        }
        Ok(())
    }
}
