use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use log::warn;

use super::error::UsbmonError;
use super::layout;
use super::parser::UrbTracker;
use super::reader::{UsbmonEvent, parse_event};
use crate::packet::Packet;
use crate::source::{CaptureStats, PacketSource, ReadyQueue, SourceError};

/// Reads compatibility-mode usbmon events back to back from a byte stream,
/// such as a dump of `/dev/usbmonN`.
pub struct UsbmonStreamSource<R> {
    reader: R,
    tracker: UrbTracker,
    stats: CaptureStats,
    ready: ReadyQueue,
    finished: bool,
}

impl UsbmonStreamSource<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> UsbmonStreamSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            tracker: UrbTracker::new(),
            stats: CaptureStats::default(),
            ready: ReadyQueue::default(),
            finished: false,
        }
    }

    /// `None` at a clean end of stream.
    fn read_header(&mut self) -> Result<Option<[u8; layout::HEADER_LEN]>, UsbmonError> {
        let mut header = [0u8; layout::HEADER_LEN];
        let mut filled = 0;
        while filled < header.len() {
            match self.reader.read(&mut header[filled..]) {
                Ok(0) => break,
                Ok(read) => filled += read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
        match filled {
            0 => Ok(None),
            layout::HEADER_LEN => Ok(Some(header)),
            actual => Err(UsbmonError::TooShort {
                needed: layout::HEADER_LEN,
                actual,
            }),
        }
    }

    fn read_event(&mut self) -> Result<Option<UsbmonEvent>, UsbmonError> {
        let Some(header) = self.read_header()? else {
            return Ok(None);
        };
        let mut event = parse_event(&header, layout::HEADER_LEN)?;
        // The declared length is untrusted; read at most that much.
        let declared = event.length_captured as usize;
        let mut payload = Vec::new();
        (&mut self.reader)
            .take(u64::from(event.length_captured))
            .read_to_end(&mut payload)?;
        if payload.len() < declared {
            return Err(UsbmonError::TooShort {
                needed: layout::HEADER_LEN + declared,
                actual: layout::HEADER_LEN + payload.len(),
            });
        }
        event.data = payload;
        Ok(Some(event))
    }

    fn finish(&mut self) {
        self.finished = true;
        for orphan in self.tracker.drain_orphans() {
            self.ready.push(orphan);
        }
    }
}

fn is_truncation(err: &UsbmonError) -> bool {
    match err {
        UsbmonError::TooShort { .. } => true,
        UsbmonError::Io(err) => err.kind() == ErrorKind::UnexpectedEof,
        _ => false,
    }
}

impl<R: Read> PacketSource for UsbmonStreamSource<R> {
    fn next_packet(&mut self) -> Result<Option<Packet>, SourceError> {
        loop {
            if let Some(packet) = self.ready.pop() {
                return Ok(Some(packet));
            }
            if self.finished {
                return Ok(None);
            }
            match self.read_event() {
                Ok(Some(event)) => {
                    let timestamp = self.stats.record_frame(event.absolute_timestamp());
                    if let Some(packet) = self.tracker.handle(event, timestamp) {
                        self.ready.push(packet);
                    }
                }
                Ok(None) => self.finish(),
                Err(err) if is_truncation(&err) => {
                    warn!("usbmon stream ends inside an event ({err}); stopping");
                    self.stats.truncated = true;
                    self.finish();
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn stats(&self) -> CaptureStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::source::usbmon::reader::testutil::event_bytes;

    fn drain(source: &mut impl PacketSource) -> Vec<Packet> {
        let mut packets = Vec::new();
        while let Some(packet) = source.next_packet().unwrap() {
            packets.push(packet);
        }
        packets
    }

    #[test]
    fn reads_events_back_to_back() {
        let mut stream = event_bytes(1, b'S', layout::TRANSFER_BULK, 0x02, 0, -115, None, b"abc");
        stream.extend(event_bytes(1, b'C', layout::TRANSFER_BULK, 0x02, 30, 0, None, &[]));
        stream.extend(event_bytes(2, b'C', layout::TRANSFER_INTERRUPT, 0x81, 2_000_000, 0, None, &[9]));

        let mut source = UsbmonStreamSource::new(Cursor::new(stream));
        let packets = drain(&mut source);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].data(), Some(&b"abc"[..]));
        assert_eq!(packets[0].header().sequence, Some(0));
        assert_eq!(packets[1].header().sequence, Some(1));
        assert_eq!(packets[1].timestamp(), std::time::Duration::from_secs(2));

        let stats = source.stats();
        assert_eq!(stats.frames_total, 3);
        assert!(!stats.truncated);
    }

    #[test]
    fn truncated_payload_ends_stream_and_flushes_orphans() {
        let mut stream = event_bytes(4, b'S', layout::TRANSFER_BULK, 0x02, 0, -115, None, b"data");
        let mut cut = event_bytes(4, b'C', layout::TRANSFER_BULK, 0x82, 10, 0, None, &[1, 2, 3, 4]);
        cut.truncate(layout::HEADER_LEN + 2);
        stream.extend(cut);

        let mut source = UsbmonStreamSource::new(Cursor::new(stream));
        let packets = drain(&mut source);
        assert_eq!(packets.len(), 1);
        assert!(matches!(packets[0], Packet::TransferFragment(_)));
        assert!(source.stats().truncated);
    }

    #[test]
    fn oversized_declared_length_is_truncation() {
        let mut stream = event_bytes(5, b'S', layout::TRANSFER_BULK, 0x02, 0, -115, None, b"data");
        let mut bogus = event_bytes(5, b'C', layout::TRANSFER_BULK, 0x02, 10, 0, None, b"abc");
        bogus[layout::LENGTH_CAPTURED_RANGE].copy_from_slice(&0xFFFF_FFF0u32.to_le_bytes());
        stream.extend(bogus);

        let mut source = UsbmonStreamSource::new(Cursor::new(stream));
        let packets = drain(&mut source);
        assert_eq!(packets.len(), 1);
        assert!(matches!(packets[0], Packet::TransferFragment(_)));
        assert_eq!(packets[0].data(), Some(&b"data"[..]));
        assert!(source.stats().truncated);
    }

    #[test]
    fn unknown_event_type_is_an_error() {
        let stream = event_bytes(1, b'?', layout::TRANSFER_BULK, 0x02, 0, 0, None, &[]);
        let mut source = UsbmonStreamSource::new(Cursor::new(stream));
        assert!(matches!(
            source.next_packet(),
            Err(SourceError::Usbmon(UsbmonError::UnknownEventType { value: b'?' }))
        ));
    }
}
