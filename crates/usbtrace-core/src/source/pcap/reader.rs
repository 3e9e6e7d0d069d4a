use std::io::{Read, Seek, SeekFrom};
use std::time::Duration;

use super::error::PcapSourceError;
use super::layout;

const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// Container format and timestamp resolution, as told by the magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFormat {
    PcapNg,
    Legacy { nanosecond: bool },
}

/// Read the magic bytes and rewind the reader to the start.
///
/// # Examples
/// This helper is part of an internal module, so the example is marked as
/// text example.
/// ```text
/// use usbtrace_core::source::pcap::reader::read_magic_and_rewind;
/// use std::io::Cursor;
///
/// let bytes = [0x0a, 0x0d, 0x0d, 0x0a, 0x01];
/// let mut cursor = Cursor::new(bytes);
/// let magic = read_magic_and_rewind(&mut cursor).unwrap();
/// assert_eq!(magic, [0x0a, 0x0d, 0x0d, 0x0a]);
/// ```
///
/// # Errors
/// Returns `PcapSourceError` when the reader cannot be read or rewound.
pub fn read_magic_and_rewind<R: Read + Seek>(reader: &mut R) -> Result<[u8; 4], PcapSourceError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(magic)
}

/// Identify the capture format from its magic bytes.
///
/// # Examples
/// This helper is part of an internal module, so the example is marked as
/// text example.
/// ```text
/// use usbtrace_core::source::pcap::reader::{CaptureFormat, capture_format};
///
/// let format = capture_format(&[0x4d, 0x3c, 0xb2, 0xa1]).unwrap();
/// assert_eq!(format, CaptureFormat::Legacy { nanosecond: true });
/// ```
///
/// # Errors
/// Returns `PcapSourceError::UnknownMagic` for anything that is neither pcap
/// nor pcapng.
pub fn capture_format(magic: &[u8; 4]) -> Result<CaptureFormat, PcapSourceError> {
    if magic == &layout::PCAPNG_MAGIC {
        Ok(CaptureFormat::PcapNg)
    } else if layout::PCAP_MICROSECOND_MAGICS.contains(magic) {
        Ok(CaptureFormat::Legacy { nanosecond: false })
    } else if layout::PCAP_NANOSECOND_MAGICS.contains(magic) {
        Ok(CaptureFormat::Legacy { nanosecond: true })
    } else {
        Err(PcapSourceError::UnknownMagic { magic: *magic })
    }
}

/// Resolve the linktype and timestamp resolution of a pcapng interface.
///
/// # Examples
/// This helper is part of an internal module, so the example is marked as
/// text example.
/// ```text
/// use usbtrace_core::source::pcap::reader::interface_for;
///
/// let interfaces = [(288, 6)];
/// assert_eq!(interface_for(&interfaces, 0), Some((288, 6)));
/// assert_eq!(interface_for(&interfaces, 1), None);
/// ```
pub fn interface_for(interfaces: &[(i32, u8)], if_id: u32) -> Option<(i32, u8)> {
    interfaces.get(if_id as usize).copied()
}

/// Convert a legacy pcap timestamp to time since the Unix epoch.
///
/// # Examples
/// This helper is part of an internal module, so the example is marked as
/// text example.
/// ```text
/// use std::time::Duration;
/// use usbtrace_core::source::pcap::reader::legacy_timestamp;
///
/// assert_eq!(legacy_timestamp(2, 500, false), Duration::new(2, 500_000));
/// assert_eq!(legacy_timestamp(2, 500, true), Duration::new(2, 500));
/// ```
pub fn legacy_timestamp(ts_sec: u32, ts_fraction: u32, nanosecond: bool) -> Duration {
    let fraction = if nanosecond {
        Duration::from_nanos(u64::from(ts_fraction))
    } else {
        Duration::from_micros(u64::from(ts_fraction))
    };
    Duration::from_secs(u64::from(ts_sec)) + fraction
}

/// Convert a pcapng high/low timestamp to time since the Unix epoch.
///
/// `tsresol` follows the `if_tsresol` option: a power of ten, or a power of
/// two when the high bit is set.
///
/// # Examples
/// This helper is part of an internal module, so the example is marked as
/// text example.
/// ```text
/// use std::time::Duration;
/// use usbtrace_core::source::pcap::reader::pcapng_timestamp;
///
/// assert_eq!(pcapng_timestamp(0, 1_500_000, 6), Duration::from_millis(1500));
/// ```
pub fn pcapng_timestamp(ts_high: u32, ts_low: u32, tsresol: u8) -> Duration {
    let ticks = (u128::from(ts_high) << 32) | u128::from(ts_low);
    let exponent = u32::from(tsresol & 0x7F);
    let units_per_second = if tsresol & 0x80 != 0 {
        1u128.checked_shl(exponent)
    } else {
        10u128.checked_pow(exponent)
    }
    .filter(|units| *units > 0)
    .unwrap_or(1_000_000);

    let nanos = ticks * NANOS_PER_SECOND / units_per_second;
    let seconds = u64::try_from(nanos / NANOS_PER_SECOND).unwrap_or(u64::MAX);
    // The remainder is below one billion.
    Duration::new(seconds, (nanos % NANOS_PER_SECOND) as u32)
}
