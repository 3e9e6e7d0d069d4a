use std::time::Duration;

use super::error::UsbmonError;
use super::layout;
use crate::packet::types::endpoint_number_from_address;
use crate::packet::{Direction, SetupPacket, TransferType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Submission,
    Callback,
    Error,
}

/// One compatibility-mode usbmon event: header plus captured payload.
#[derive(Debug, Clone, PartialEq)]
pub struct UsbmonEvent {
    pub urb_tag: u64,
    pub kind: EventKind,
    pub transfer_type: TransferType,
    pub endpoint_address: u8,
    pub device_address: u8,
    pub bus_number: u16,
    /// Present when the header's setup flag marks the setup bytes valid.
    pub setup: Option<SetupPacket>,
    pub ts_sec: u64,
    pub ts_usec: u32,
    pub status: i32,
    pub length: u32,
    pub length_captured: u32,
    pub data: Vec<u8>,
}

impl UsbmonEvent {
    pub fn direction(&self) -> Direction {
        Direction::from_endpoint_address(self.endpoint_address)
    }

    pub fn endpoint_number(&self) -> u8 {
        endpoint_number_from_address(self.endpoint_address)
    }

    /// Capture time since the Unix epoch.
    pub fn absolute_timestamp(&self) -> Duration {
        Duration::from_secs(self.ts_sec) + Duration::from_micros(u64::from(self.ts_usec))
    }
}

pub struct UsbmonReader<'a> {
    bytes: &'a [u8],
}

impl<'a> UsbmonReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn require_len(&self, needed: usize) -> Result<(), UsbmonError> {
        if self.bytes.len() < needed {
            return Err(UsbmonError::TooShort {
                needed,
                actual: self.bytes.len(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, UsbmonError> {
        self.bytes.get(offset).copied().ok_or(UsbmonError::TooShort {
            needed: offset + 1,
            actual: self.bytes.len(),
        })
    }

    pub fn read_slice(&self, range: std::ops::Range<usize>) -> Result<&'a [u8], UsbmonError> {
        self.bytes.get(range.clone()).ok_or(UsbmonError::TooShort {
            needed: range.end,
            actual: self.bytes.len(),
        })
    }

    fn read_array<const N: usize>(&self, range: std::ops::Range<usize>) -> Result<[u8; N], UsbmonError> {
        let bytes = self.read_slice(range)?;
        bytes.try_into().map_err(|_| UsbmonError::TooShort {
            needed: N,
            actual: bytes.len(),
        })
    }

    pub fn read_u16_le(&self, range: std::ops::Range<usize>) -> Result<u16, UsbmonError> {
        self.read_array(range).map(u16::from_le_bytes)
    }

    pub fn read_u32_le(&self, range: std::ops::Range<usize>) -> Result<u32, UsbmonError> {
        self.read_array(range).map(u32::from_le_bytes)
    }

    pub fn read_i32_le(&self, range: std::ops::Range<usize>) -> Result<i32, UsbmonError> {
        self.read_array(range).map(i32::from_le_bytes)
    }

    pub fn read_u64_le(&self, range: std::ops::Range<usize>) -> Result<u64, UsbmonError> {
        self.read_array(range).map(u64::from_le_bytes)
    }
}

fn event_kind(value: u8) -> Result<EventKind, UsbmonError> {
    match value {
        layout::EVENT_SUBMISSION => Ok(EventKind::Submission),
        layout::EVENT_CALLBACK => Ok(EventKind::Callback),
        layout::EVENT_ERROR => Ok(EventKind::Error),
        value => Err(UsbmonError::UnknownEventType { value }),
    }
}

fn transfer_type(value: u8) -> Result<TransferType, UsbmonError> {
    match value {
        layout::TRANSFER_ISOCHRONOUS => Ok(TransferType::Isochronous),
        layout::TRANSFER_INTERRUPT => Ok(TransferType::Interrupt),
        layout::TRANSFER_CONTROL => Ok(TransferType::Control),
        layout::TRANSFER_BULK => Ok(TransferType::Bulk),
        value => Err(UsbmonError::UnknownTransferType { value }),
    }
}

/// Parses an event whose payload starts `header_len` bytes into `bytes`.
///
/// Payload bytes beyond what the frame holds are dropped silently; a
/// snap-length-limited capture keeps only what it could.
pub fn parse_event(bytes: &[u8], header_len: usize) -> Result<UsbmonEvent, UsbmonError> {
    let reader = UsbmonReader::new(bytes);
    reader.require_len(header_len.max(layout::HEADER_LEN))?;

    let kind = event_kind(reader.read_u8(layout::EVENT_TYPE_OFFSET)?)?;
    let transfer_type = transfer_type(reader.read_u8(layout::TRANSFER_TYPE_OFFSET)?)?;
    let length_captured = reader.read_u32_le(layout::LENGTH_CAPTURED_RANGE.clone())?;

    let setup = if reader.read_u8(layout::FLAG_SETUP_OFFSET)? == layout::SETUP_PRESENT
        && transfer_type == TransferType::Control
    {
        let raw = reader.read_slice(layout::SETUP_RANGE.clone())?;
        Some(SetupPacket::from_fields(
            raw[0],
            raw[1],
            u16::from_le_bytes([raw[2], raw[3]]),
            u16::from_le_bytes([raw[4], raw[5]]),
            u16::from_le_bytes([raw[6], raw[7]]),
        ))
    } else {
        None
    };

    let payload = &bytes[header_len..];
    let captured = payload.len().min(length_captured as usize);

    Ok(UsbmonEvent {
        urb_tag: reader.read_u64_le(layout::URB_TAG_RANGE.clone())?,
        kind,
        transfer_type,
        endpoint_address: reader.read_u8(layout::ENDPOINT_ADDRESS_OFFSET)?,
        device_address: reader.read_u8(layout::DEVICE_ADDRESS_OFFSET)?,
        bus_number: reader.read_u16_le(layout::BUS_NUMBER_RANGE.clone())?,
        setup,
        ts_sec: reader.read_u64_le(layout::TS_SEC_RANGE.clone())?,
        ts_usec: reader.read_u32_le(layout::TS_USEC_RANGE.clone())?,
        status: reader.read_i32_le(layout::STATUS_RANGE.clone())?,
        length: reader.read_u32_le(layout::LENGTH_RANGE.clone())?,
        length_captured,
        data: payload[..captured].to_vec(),
    })
}


#[cfg(test)]
mod tests {
    use super::testutil::event_bytes;
    use super::*;

    #[test]
    fn parses_control_submission() {
        let bytes = event_bytes(
            0xdead_beef,
            b'S',
            layout::TRANSFER_CONTROL,
            0x80,
            1_500_000,
            -115,
            Some([0x80, 0x06, 0x00, 0x01, 0x00, 0x00, 0x12, 0x00]),
            &[],
        );
        let event = parse_event(&bytes, layout::HEADER_LEN).unwrap();
        assert_eq!(event.urb_tag, 0xdead_beef);
        assert_eq!(event.kind, EventKind::Submission);
        assert_eq!(event.transfer_type, TransferType::Control);
        assert_eq!(event.direction(), Direction::In);
        assert_eq!(event.endpoint_number(), 0);
        assert_eq!(event.device_address, 3);
        assert_eq!(event.bus_number, 1);
        assert_eq!(event.status, -115);
        let setup = event.setup.unwrap();
        assert_eq!(setup.request_number, 6);
        assert_eq!(setup.value, 0x0100);
        assert_eq!(setup.request_length, 18);
        assert_eq!(
            event.absolute_timestamp(),
            Duration::from_secs(1_700_000_001) + Duration::from_millis(500)
        );
    }

    #[test]
    fn payload_is_limited_to_captured_length() {
        let mut bytes = event_bytes(1, b'C', layout::TRANSFER_BULK, 0x81, 0, 0, None, &[1, 2, 3, 4]);
        bytes[layout::LENGTH_CAPTURED_RANGE].copy_from_slice(&2u32.to_le_bytes());
        let event = parse_event(&bytes, layout::HEADER_LEN).unwrap();
        assert_eq!(event.data, [1, 2]);
        assert_eq!(event.length, 4);
        assert_eq!(event.setup, None);
    }

    #[test]
    fn mmapped_header_skips_padding() {
        let mut bytes = event_bytes(1, b'C', layout::TRANSFER_INTERRUPT, 0x82, 0, 0, None, &[]);
        bytes.extend_from_slice(&[0xEE; 16]);
        bytes.extend_from_slice(&[7, 8]);
        bytes[layout::LENGTH_CAPTURED_RANGE].copy_from_slice(&2u32.to_le_bytes());
        let event = parse_event(&bytes, layout::MMAPPED_HEADER_LEN).unwrap();
        assert_eq!(event.data, [7, 8]);
    }

    #[test]
    fn rejects_short_and_unknown_headers() {
        assert!(matches!(
            parse_event(&[0u8; 20], layout::HEADER_LEN),
            Err(UsbmonError::TooShort { needed: 48, actual: 20 })
        ));
        let bytes = event_bytes(1, b'X', layout::TRANSFER_BULK, 0x81, 0, 0, None, &[]);
        assert!(matches!(
            parse_event(&bytes, layout::HEADER_LEN),
            Err(UsbmonError::UnknownEventType { value: b'X' })
        ));
        let bytes = event_bytes(1, b'C', 9, 0x81, 0, 0, None, &[]);
        assert!(matches!(
            parse_event(&bytes, layout::HEADER_LEN),
            Err(UsbmonError::UnknownTransferType { value: 9 })
        ));
    }
}
