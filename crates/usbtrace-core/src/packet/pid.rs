use std::fmt;

use serde::{Deserialize, Serialize};

use super::types::Direction;

/// USB packet identifier (the low nibble of the PID byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Pid {
    Reserved,
    Out,
    Ack,
    Data0,
    Ping,
    Sof,
    Nyet,
    Data2,
    Split,
    In,
    Nak,
    Data1,
    /// PRE in full-speed token context, ERR as a high-speed handshake.
    Pre,
    Setup,
    Stall,
    MData,
}

/// PID class, taken from the two least significant bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidCategory {
    Special,
    Token,
    Handshake,
    Data,
}

impl Pid {
    pub fn from_nibble(nibble: u8) -> Self {
        match nibble & 0x0F {
            0b0001 => Pid::Out,
            0b0010 => Pid::Ack,
            0b0011 => Pid::Data0,
            0b0100 => Pid::Ping,
            0b0101 => Pid::Sof,
            0b0110 => Pid::Nyet,
            0b0111 => Pid::Data2,
            0b1000 => Pid::Split,
            0b1001 => Pid::In,
            0b1010 => Pid::Nak,
            0b1011 => Pid::Data1,
            0b1100 => Pid::Pre,
            0b1101 => Pid::Setup,
            0b1110 => Pid::Stall,
            0b1111 => Pid::MData,
            _ => Pid::Reserved,
        }
    }

    /// Parses a full PID byte, returning the PID and whether the check
    /// nibble (upper four bits) is the complement of the PID nibble.
    pub fn from_byte(byte: u8) -> (Self, bool) {
        let check_valid = (byte >> 4) == (!byte & 0x0F);
        (Self::from_nibble(byte), check_valid)
    }

    pub fn nibble(self) -> u8 {
        match self {
            Pid::Reserved => 0b0000,
            Pid::Out => 0b0001,
            Pid::Ack => 0b0010,
            Pid::Data0 => 0b0011,
            Pid::Ping => 0b0100,
            Pid::Sof => 0b0101,
            Pid::Nyet => 0b0110,
            Pid::Data2 => 0b0111,
            Pid::Split => 0b1000,
            Pid::In => 0b1001,
            Pid::Nak => 0b1010,
            Pid::Data1 => 0b1011,
            Pid::Pre => 0b1100,
            Pid::Setup => 0b1101,
            Pid::Stall => 0b1110,
            Pid::MData => 0b1111,
        }
    }

    /// The on-the-wire PID byte including its check nibble.
    pub fn to_byte(self) -> u8 {
        let nibble = self.nibble();
        ((!nibble & 0x0F) << 4) | nibble
    }

    pub fn category(self) -> PidCategory {
        match self.nibble() & 0b11 {
            0b01 => PidCategory::Token,
            0b10 => PidCategory::Handshake,
            0b11 => PidCategory::Data,
            _ => PidCategory::Special,
        }
    }

    pub fn is_token(self) -> bool {
        self.category() == PidCategory::Token
    }

    pub fn is_data(self) -> bool {
        self.category() == PidCategory::Data
    }

    pub fn is_handshake(self) -> bool {
        self.category() == PidCategory::Handshake
    }

    /// Direction implied by a token PID; SOF and non-tokens carry none.
    pub fn direction(self) -> Option<Direction> {
        match self {
            Pid::Setup | Pid::Out | Pid::Ping => Some(Direction::Out),
            Pid::In => Some(Direction::In),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Pid::Reserved => "RESERVED",
            Pid::Out => "OUT",
            Pid::Ack => "ACK",
            Pid::Data0 => "DATA0",
            Pid::Ping => "PING",
            Pid::Sof => "SOF",
            Pid::Nyet => "NYET",
            Pid::Data2 => "DATA2",
            Pid::Split => "SPLIT",
            Pid::In => "IN",
            Pid::Nak => "NAK",
            Pid::Data1 => "DATA1",
            Pid::Pre => "PRE",
            Pid::Setup => "SETUP",
            Pid::Stall => "STALL",
            Pid::MData => "MDATA",
        }
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
