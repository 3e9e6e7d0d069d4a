use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{Direction, Recipient, RequestType};

pub const SETUP_PACKET_LEN: usize = 8;

pub const GET_STATUS: u8 = 0;
pub const CLEAR_FEATURE: u8 = 1;
pub const SET_FEATURE: u8 = 3;
pub const SET_ADDRESS: u8 = 5;
pub const GET_DESCRIPTOR: u8 = 6;
pub const SET_DESCRIPTOR: u8 = 7;
pub const GET_CONFIGURATION: u8 = 8;
pub const SET_CONFIGURATION: u8 = 9;
pub const GET_INTERFACE: u8 = 10;
pub const SET_INTERFACE: u8 = 11;
pub const SYNCH_FRAME: u8 = 12;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SetupError {
    #[error("setup payload must be {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("setup stage carried no data")]
    Missing,
}

/// Decoded eight-byte SETUP payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupPacket {
    pub request_direction: Direction,
    pub request_type: RequestType,
    pub recipient: Recipient,
    pub request_number: u8,
    pub value: u16,
    pub index: u16,
    pub request_length: u16,
}

impl SetupPacket {
    pub fn parse(data: &[u8]) -> Result<Self, SetupError> {
        let bytes: &[u8; SETUP_PACKET_LEN] =
            data.try_into().map_err(|_| SetupError::InvalidLength {
                expected: SETUP_PACKET_LEN,
                actual: data.len(),
            })?;
        let request_type = bytes[0];
        Ok(Self {
            request_direction: Direction::from_request_type(request_type),
            request_type: RequestType::from_request_type(request_type),
            recipient: Recipient::from_request_type(request_type),
            request_number: bytes[1],
            value: u16::from_le_bytes([bytes[2], bytes[3]]),
            index: u16::from_le_bytes([bytes[4], bytes[5]]),
            request_length: u16::from_le_bytes([bytes[6], bytes[7]]),
        })
    }

    /// Rebuilds a setup payload from the fields usbmon reports in its header.
    pub fn from_fields(request_type: u8, request_number: u8, value: u16, index: u16, length: u16) -> Self {
        Self {
            request_direction: Direction::from_request_type(request_type),
            request_type: RequestType::from_request_type(request_type),
            recipient: Recipient::from_request_type(request_type),
            request_number,
            value,
            index,
            request_length: length,
        }
    }

    pub fn request_type_byte(&self) -> u8 {
        let direction = if self.request_direction.is_in() { 0x80 } else { 0 };
        direction | (self.request_type.bits() << 5) | self.recipient.bits()
    }

    pub fn to_bytes(&self) -> [u8; SETUP_PACKET_LEN] {
        let value = self.value.to_le_bytes();
        let index = self.index.to_le_bytes();
        let length = self.request_length.to_le_bytes();
        [
            self.request_type_byte(),
            self.request_number,
            value[0],
            value[1],
            index[0],
            index[1],
            length[0],
            length[1],
        ]
    }

    pub fn request_name(&self) -> &'static str {
        if self.request_type == RequestType::Standard {
            standard_request_name(self.request_number)
        } else {
            "UNKNOWN"
        }
    }
}

pub fn standard_request_name(request_number: u8) -> &'static str {
    match request_number {
        GET_STATUS => "get status",
        CLEAR_FEATURE => "clear feature",
        2 | 4 => "reserved",
        SET_FEATURE => "set feature",
        SET_ADDRESS => "set address",
        GET_DESCRIPTOR => "get descriptor",
        SET_DESCRIPTOR => "set descriptor",
        GET_CONFIGURATION => "get configuration",
        SET_CONFIGURATION => "set configuration",
        GET_INTERFACE => "get interface",
        SET_INTERFACE => "set interface",
        SYNCH_FRAME => "synch frame",
        _ => "UNKNOWN",
    }
}

pub fn descriptor_type_name(descriptor_type: u8) -> &'static str {
    match descriptor_type {
        0 => "invalid",
        1 => "device",
        2 => "configuration",
        3 => "string",
        4 => "interface",
        5 => "endpoint",
        6 => "device qualifier",
        7 => "other speed",
        8 => "interface power",
        9 => "otg",
        10 => "debug",
        11 => "interface association",
        12 => "security",
        13 => "key",
        14 => "encryption type",
        15 => "bos",
        16 => "device capability",
        17 => "wireless endpoint",
        33 => "hid",
        34 => "hid report",
        35 => "physical description",
        _ => "unknown",
    }
}

pub fn request_type_description(request_type: RequestType) -> &'static str {
    match request_type {
        RequestType::Standard => "standard",
        RequestType::Class => "class",
        RequestType::Vendor => "vendor",
        RequestType::Reserved => "reserved",
    }
}

pub fn recipient_description(recipient: Recipient) -> &'static str {
    match recipient {
        Recipient::Device => "device",
        Recipient::Interface => "interface",
        Recipient::Endpoint => "endpoint",
        Recipient::Other => "other",
        Recipient::Reserved(_) => "reserved",
    }
}
