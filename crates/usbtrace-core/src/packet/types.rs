use std::fmt;

use serde::{Deserialize, Serialize};

use super::pid::Pid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Out,
    In,
}

impl Direction {
    /// Direction bit of a `bmRequestType` byte.
    pub fn from_request_type(request_type: u8) -> Self {
        if request_type & 0x80 != 0 {
            Direction::In
        } else {
            Direction::Out
        }
    }

    pub fn from_endpoint_address(address: u8) -> Self {
        Self::from_request_type(address)
    }

    pub fn is_in(self) -> bool {
        self == Direction::In
    }

    pub fn reverse(self) -> Self {
        match self {
            Direction::In => Direction::Out,
            Direction::Out => Direction::In,
        }
    }

    pub fn token(self) -> Pid {
        match self {
            Direction::In => Pid::In,
            Direction::Out => Pid::Out,
        }
    }

    pub fn to_endpoint_address(self, endpoint_number: u8) -> u8 {
        match self {
            Direction::In => endpoint_number | 0x80,
            Direction::Out => endpoint_number,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn endpoint_number_from_address(address: u8) -> u8 {
    address & 0x7F
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestType {
    Standard,
    Class,
    Vendor,
    Reserved,
}

impl RequestType {
    pub fn from_request_type(request_type: u8) -> Self {
        match (request_type >> 5) & 0b11 {
            0 => RequestType::Standard,
            1 => RequestType::Class,
            2 => RequestType::Vendor,
            _ => RequestType::Reserved,
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            RequestType::Standard => 0,
            RequestType::Class => 1,
            RequestType::Vendor => 2,
            RequestType::Reserved => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RequestType::Standard => "STANDARD",
            RequestType::Class => "CLASS",
            RequestType::Vendor => "VENDOR",
            RequestType::Reserved => "RESERVED",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Recipient {
    Device,
    Interface,
    Endpoint,
    Other,
    /// Values 4..=31 keep their raw number.
    Reserved(u8),
}

impl Recipient {
    pub fn from_request_type(request_type: u8) -> Self {
        match request_type & 0x1F {
            0 => Recipient::Device,
            1 => Recipient::Interface,
            2 => Recipient::Endpoint,
            3 => Recipient::Other,
            other => Recipient::Reserved(other),
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Recipient::Device => 0,
            Recipient::Interface => 1,
            Recipient::Endpoint => 2,
            Recipient::Other => 3,
            Recipient::Reserved(value) => value & 0x1F,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Recipient::Device => "DEVICE",
            Recipient::Interface => "INTERFACE",
            Recipient::Endpoint => "ENDPOINT",
            Recipient::Other => "OTHER",
            Recipient::Reserved(_) => "RESERVED",
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferType {
    Control,
    Isochronous,
    Bulk,
    Interrupt,
}

impl TransferType {
    /// Transfer type from the low two bits of an endpoint's `bmAttributes`.
    pub fn from_attributes(attributes: u8) -> Self {
        match attributes & 0b11 {
            0 => TransferType::Control,
            1 => TransferType::Isochronous,
            2 => TransferType::Bulk,
            _ => TransferType::Interrupt,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TransferType::Control => "control",
            TransferType::Isochronous => "isochronous",
            TransferType::Bulk => "bulk",
            TransferType::Interrupt => "interrupt",
        }
    }
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Render hint carried to the display boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Normal,
    Exceptional,
    Error,
}
