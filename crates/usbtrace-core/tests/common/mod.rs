//! Capture writers shared by the integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

pub const LINKTYPE_USB_LINUX: u32 = 189;
pub const LINKTYPE_USB_LINUX_MMAPPED: u32 = 220;
pub const LINKTYPE_USB_2_0: u32 = 288;

pub const PID_OUT: u8 = 0xE1;
pub const PID_IN: u8 = 0x69;
pub const PID_SOF: u8 = 0xA5;
pub const PID_SETUP: u8 = 0x2D;
pub const PID_DATA0: u8 = 0xC3;
pub const PID_DATA1: u8 = 0x4B;
pub const PID_ACK: u8 = 0xD2;
pub const PID_STALL: u8 = 0x1E;

/// Capture start, in microseconds since the Unix epoch.
pub const BASE_US: u64 = 1_700_000_000_000_000;

pub const DEVICE_DESCRIPTOR: [u8; 18] = [
    0x12, 0x01, 0x00, 0x02, 0xEF, 0x02, 0x01, 0x40, 0x09, 0x12, 0x34, 0x56, 0x01, 0x00, 0x01, 0x02, 0x03, 0x01,
];

/// A temp file that is removed on drop.
pub struct TempCapture {
    pub path: PathBuf,
}

impl TempCapture {
    pub fn write(name: &str, bytes: &[u8]) -> Self {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let mut path = std::env::temp_dir();
        path.push(format!("usbtrace_{name}_{}_{unique}", std::process::id()));
        fs::write(&path, bytes).unwrap();
        Self { path }
    }
}

impl Drop for TempCapture {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

pub fn pcapng(linktype: u32, frames: &[(u64, Vec<u8>)]) -> Vec<u8> {
    let mut output = Vec::new();
    output.extend_from_slice(&pcapng_block(0x0A0D0D0A, &section_header_body()));
    output.extend_from_slice(&pcapng_block(1, &interface_desc_body(linktype)));
    for (ts_us, data) in frames {
        output.extend_from_slice(&pcapng_block(6, &enhanced_packet_body(*ts_us, data)));
    }
    output
}

fn pcapng_block(block_type: u32, body: &[u8]) -> Vec<u8> {
    let total_len = (8 + body.len() + 4) as u32;
    let mut block = Vec::with_capacity(total_len as usize);
    block.extend_from_slice(&block_type.to_be_bytes());
    block.extend_from_slice(&total_len.to_be_bytes());
    block.extend_from_slice(body);
    block.extend_from_slice(&total_len.to_be_bytes());
    block
}

fn section_header_body() -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&0x1A2B3C4Du32.to_be_bytes());
    body.extend_from_slice(&1u16.to_be_bytes());
    body.extend_from_slice(&0u16.to_be_bytes());
    body.extend_from_slice(&(-1i64).to_be_bytes());
    body
}

fn interface_desc_body(linktype: u32) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&(linktype as u16).to_be_bytes());
    body.extend_from_slice(&0u16.to_be_bytes());
    body.extend_from_slice(&65535u32.to_be_bytes());
    body
}

fn enhanced_packet_body(ts_us: u64, data: &[u8]) -> Vec<u8> {
    let ts_high = ((ts_us >> 32) & 0xFFFF_FFFF) as u32;
    let ts_low = (ts_us & 0xFFFF_FFFF) as u32;
    let cap_len = data.len() as u32;
    let mut body = Vec::new();
    body.extend_from_slice(&0u32.to_be_bytes());
    body.extend_from_slice(&ts_high.to_be_bytes());
    body.extend_from_slice(&ts_low.to_be_bytes());
    body.extend_from_slice(&cap_len.to_be_bytes());
    body.extend_from_slice(&cap_len.to_be_bytes());
    body.extend_from_slice(data);
    let pad_len = (4 - (data.len() % 4)) % 4;
    body.extend(std::iter::repeat_n(0u8, pad_len));
    body
}

/// Little-endian legacy pcap; `frames` carry (seconds, fraction) pairs.
pub fn legacy_pcap(linktype: u32, nanosecond: bool, frames: &[((u32, u32), Vec<u8>)]) -> Vec<u8> {
    let magic: u32 = if nanosecond { 0xA1B2_3C4D } else { 0xA1B2_C3D4 };
    let mut output = Vec::new();
    output.extend_from_slice(&magic.to_le_bytes());
    output.extend_from_slice(&2u16.to_le_bytes());
    output.extend_from_slice(&4u16.to_le_bytes());
    output.extend_from_slice(&0i32.to_le_bytes());
    output.extend_from_slice(&0u32.to_le_bytes());
    output.extend_from_slice(&65535u32.to_le_bytes());
    output.extend_from_slice(&linktype.to_le_bytes());
    for ((sec, frac), data) in frames {
        output.extend_from_slice(&sec.to_le_bytes());
        output.extend_from_slice(&frac.to_le_bytes());
        output.extend_from_slice(&(data.len() as u32).to_le_bytes());
        output.extend_from_slice(&(data.len() as u32).to_le_bytes());
        output.extend_from_slice(data);
    }
    output
}

pub fn token(pid: u8, address: u8, endpoint: u8) -> Vec<u8> {
    vec![pid, address | ((endpoint & 1) << 7), endpoint >> 1]
}

/// Data packet with a placeholder CRC16; CRCs are never verified.
pub fn data(pid: u8, payload: &[u8]) -> Vec<u8> {
    let mut bytes = vec![pid];
    bytes.extend_from_slice(payload);
    bytes.extend_from_slice(&[0xAA, 0x55]);
    bytes
}

pub fn setup_bytes(request_type: u8, request: u8, value: u16, index: u16, length: u16) -> [u8; 8] {
    let mut bytes = [0u8; 8];
    bytes[0] = request_type;
    bytes[1] = request;
    bytes[2..4].copy_from_slice(&value.to_le_bytes());
    bytes[4..6].copy_from_slice(&index.to_le_bytes());
    bytes[6..8].copy_from_slice(&length.to_le_bytes());
    bytes
}

/// Bus-level GET_DESCRIPTOR(Device) on address 0, one frame per packet,
/// 10 µs apart starting at `BASE_US`.
pub fn get_device_descriptor_frames() -> Vec<(u64, Vec<u8>)> {
    let packets = vec![
        token(PID_SETUP, 0, 0),
        data(PID_DATA0, &setup_bytes(0x80, 6, 0x0100, 0, 18)),
        vec![PID_ACK],
        token(PID_IN, 0, 0),
        data(PID_DATA1, &DEVICE_DESCRIPTOR[..8]),
        vec![PID_ACK],
        token(PID_IN, 0, 0),
        data(PID_DATA0, &DEVICE_DESCRIPTOR[8..16]),
        vec![PID_ACK],
        token(PID_IN, 0, 0),
        data(PID_DATA1, &DEVICE_DESCRIPTOR[16..]),
        vec![PID_ACK],
        token(PID_OUT, 0, 0),
        data(PID_DATA1, &[]),
        vec![PID_ACK],
    ];
    packets
        .into_iter()
        .enumerate()
        .map(|(n, packet)| (BASE_US + n as u64 * 10, packet))
        .collect()
}

/// One usbmon compatibility-mode event for device 3 on bus 1.
pub struct UsbmonEvent {
    pub urb_tag: u64,
    pub kind: u8,
    pub transfer_type: u8,
    pub endpoint_address: u8,
    pub micros: u64,
    pub status: i32,
    pub length: u32,
    pub setup: Option<[u8; 8]>,
    pub payload: Vec<u8>,
}

impl UsbmonEvent {
    pub fn to_bytes(&self, header_len: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; header_len];
        bytes[0..8].copy_from_slice(&self.urb_tag.to_le_bytes());
        bytes[8] = self.kind;
        bytes[9] = self.transfer_type;
        bytes[10] = self.endpoint_address;
        bytes[11] = 3;
        bytes[12..14].copy_from_slice(&1u16.to_le_bytes());
        bytes[14] = if self.setup.is_some() { 0 } else { b'-' };
        bytes[15] = if self.payload.is_empty() { b'<' } else { 0 };
        let sec = BASE_US / 1_000_000 + self.micros / 1_000_000;
        bytes[16..24].copy_from_slice(&sec.to_le_bytes());
        bytes[24..28].copy_from_slice(&((self.micros % 1_000_000) as u32).to_le_bytes());
        bytes[28..32].copy_from_slice(&self.status.to_le_bytes());
        bytes[32..36].copy_from_slice(&self.length.to_le_bytes());
        bytes[36..40].copy_from_slice(&(self.payload.len() as u32).to_le_bytes());
        if let Some(setup) = self.setup {
            bytes[40..48].copy_from_slice(&setup);
        }
        bytes.extend_from_slice(&self.payload);
        bytes
    }
}

/// Submission and callback for GET_DESCRIPTOR(Device) on device 3.
pub fn usbmon_get_descriptor(status: i32) -> Vec<UsbmonEvent> {
    vec![
        UsbmonEvent {
            urb_tag: 0xffff_8800_0000_1000,
            kind: b'S',
            transfer_type: 2,
            endpoint_address: 0x80,
            micros: 0,
            status: -115,
            length: 18,
            setup: Some(setup_bytes(0x80, 6, 0x0100, 0, 18)),
            payload: Vec::new(),
        },
        UsbmonEvent {
            urb_tag: 0xffff_8800_0000_1000,
            kind: b'C',
            transfer_type: 2,
            endpoint_address: 0x80,
            micros: 250,
            status,
            length: 18,
            setup: None,
            payload: DEVICE_DESCRIPTOR.to_vec(),
        },
    ]
}

/// A bulk OUT submission and its callback on endpoint 2.
pub fn usbmon_bulk_out(urb_tag: u64, micros: u64, payload: &[u8]) -> Vec<UsbmonEvent> {
    vec![
        UsbmonEvent {
            urb_tag,
            kind: b'S',
            transfer_type: 3,
            endpoint_address: 0x02,
            micros,
            status: -115,
            length: payload.len() as u32,
            setup: None,
            payload: payload.to_vec(),
        },
        UsbmonEvent {
            urb_tag,
            kind: b'C',
            transfer_type: 3,
            endpoint_address: 0x02,
            micros: micros + 100,
            status: 0,
            length: payload.len() as u32,
            setup: None,
            payload: Vec::new(),
        },
    ]
}
