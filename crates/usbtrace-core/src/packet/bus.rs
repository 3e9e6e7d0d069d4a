//! Bus-level packet variants and their conversions from a raw capture.

use std::time::Duration;

use super::PacketHeader;
use super::pid::Pid;
use super::types::Style;

pub const TOKEN_PAYLOAD_LEN: usize = 2;
pub const DATA_PAYLOAD_MIN_LEN: usize = 2;
pub const DATA_PAYLOAD_MAX_LEN: usize = 1026;
pub const CRC16_LEN: usize = 2;

/// A PID byte and its payload, exactly as captured.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPacket {
    pub header: PacketHeader,
    pub pid: Pid,
    pub pid_valid: bool,
    pub sync_valid: Option<bool>,
}

impl RawPacket {
    pub fn new(timestamp: Duration, pid: Pid, payload: Vec<u8>) -> Self {
        let mut header = PacketHeader::at(timestamp);
        header.data = Some(payload);
        Self {
            header,
            pid,
            pid_valid: true,
            sync_valid: None,
        }
    }

    /// Splits a captured frame into PID byte and payload. Empty frames have
    /// no PID and yield `None`.
    pub fn from_bytes(timestamp: Duration, bytes: &[u8]) -> Option<Self> {
        let (&pid_byte, payload) = bytes.split_first()?;
        let (pid, pid_valid) = Pid::from_byte(pid_byte);
        let mut packet = Self::new(timestamp, pid, payload.to_vec());
        packet.pid_valid = pid_valid;
        if !pid_valid {
            packet.header.style = Style::Exceptional;
        }
        Some(packet)
    }

    pub fn payload(&self) -> &[u8] {
        self.header.data.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartOfFrame {
    pub header: PacketHeader,
    pub pid: Pid,
    pub frame_number: Option<u16>,
}

impl StartOfFrame {
    pub fn from_raw(raw: RawPacket) -> Self {
        let frame_number = match raw.payload() {
            [low, high] => Some(u16::from(*low) | (u16::from(*high & 0x07) << 8)),
            _ => None,
        };
        Self {
            header: raw.header,
            pid: raw.pid,
            frame_number,
        }
    }
}

/// Consecutive SOF markers folded into one record.
#[derive(Debug, Clone, PartialEq)]
pub struct StartOfFrameCollection {
    pub header: PacketHeader,
}

impl StartOfFrameCollection {
    pub fn from_frames(frames: Vec<super::Packet>) -> Option<Self> {
        let first = frames.first()?;
        let mut header = first.header().addressing();
        header.subordinate_packets = frames;
        Some(Self { header })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenPacket {
    pub header: PacketHeader,
    pub pid: Pid,
    pub crc5: u8,
}

impl TokenPacket {
    pub fn from_raw(raw: RawPacket) -> Result<Self, MalformedPacket> {
        let (first, second) = match raw.payload() {
            [first, second] => (*first, *second),
            other => {
                let reason = format!(
                    "token payload must be {TOKEN_PAYLOAD_LEN} bytes, got {}",
                    other.len()
                );
                return Err(MalformedPacket::from_raw(raw, reason));
            }
        };
        let mut header = raw.header;
        header.device_address = Some(first & 0x7F);
        header.endpoint_number = Some(((second & 0x07) << 1) | (first >> 7));
        header.direction = raw.pid.direction();
        Ok(Self {
            header,
            pid: raw.pid,
            crc5: second >> 3,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataPacket {
    pub header: PacketHeader,
    pub pid: Pid,
    pub crc16: [u8; CRC16_LEN],
}

impl DataPacket {
    pub fn from_raw(raw: RawPacket) -> Result<Self, MalformedPacket> {
        let len = raw.payload().len();
        if !(DATA_PAYLOAD_MIN_LEN..=DATA_PAYLOAD_MAX_LEN).contains(&len) {
            let reason = format!(
                "data payload must be {DATA_PAYLOAD_MIN_LEN}..={DATA_PAYLOAD_MAX_LEN} bytes, got {len}"
            );
            return Err(MalformedPacket::from_raw(raw, reason));
        }
        let mut header = raw.header;
        let mut data = header.data.take().unwrap_or_default();
        let crc = data.split_off(len - CRC16_LEN);
        header.data = Some(data);
        Ok(Self {
            header,
            pid: raw.pid,
            crc16: [crc[0], crc[1]],
        })
    }

    pub fn crc16_value(&self) -> u16 {
        u16::from_le_bytes(self.crc16)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HandshakePacket {
    pub header: PacketHeader,
    pub pid: Pid,
}

impl HandshakePacket {
    pub fn from_raw(raw: RawPacket) -> Result<Self, MalformedPacket> {
        let len = raw.payload().len();
        if len != 0 {
            return Err(MalformedPacket::from_raw(
                raw,
                format!("handshake must not carry a payload, got {len} bytes"),
            ));
        }
        Ok(Self {
            header: raw.header,
            pid: raw.pid,
        })
    }
}

/// Terminal variant for anything that failed to parse.
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedPacket {
    pub header: PacketHeader,
    pub pid: Option<Pid>,
    pub reason: String,
}

impl MalformedPacket {
    pub fn new(mut header: PacketHeader, pid: Option<Pid>, reason: impl Into<String>) -> Self {
        header.style = Style::Error;
        Self {
            header,
            pid,
            reason: reason.into(),
        }
    }

    pub fn from_raw(raw: RawPacket, reason: impl Into<String>) -> Self {
        Self::new(raw.header, Some(raw.pid), reason)
    }

    /// Wraps packets that could not be grouped; the first packet's addressing
    /// is kept and every packet is preserved as a subordinate.
    pub fn from_packets(packets: Vec<super::Packet>, reason: impl Into<String>) -> Self {
        let (mut header, pid) = match packets.first() {
            Some(first) => (first.header().addressing(), first.pid()),
            None => (PacketHeader::default(), None),
        };
        header.subordinate_packets = packets;
        Self::new(header, pid, reason)
    }
}
