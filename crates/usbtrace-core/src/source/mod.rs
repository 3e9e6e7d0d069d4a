//! Capture sources.
//!
//! A source turns a capture (a pcap/pcapng file or a raw usbmon stream) into
//! the packets the decoder chain consumes. Pull-style sources implement
//! [`PacketSource`]; the threaded session drives capture through the
//! push-style [`CaptureBackend`] contract, and [`SourceBackend`] adapts one
//! to the other.

mod pcap;
mod usbmon;

use std::collections::VecDeque;
use std::time::Duration;

use log::debug;
use thiserror::Error;

use crate::packet::Packet;

pub use pcap::PcapFileSource;
pub use pcap::error::PcapSourceError;
pub use usbmon::UsbmonStreamSource;
pub use usbmon::error::UsbmonError;
pub use usbmon::parser::UrbTracker;
pub use usbmon::reader::{EventKind, UsbmonEvent};

/// Frame accounting kept by every source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub frames_total: u64,
    /// Frames read but not turned into packets (unsupported linktype, empty
    /// frame, unreadable usbmon header).
    pub frames_skipped: u64,
    /// Absolute capture time of the first and last frame, since the Unix epoch.
    pub first_timestamp: Option<Duration>,
    pub last_timestamp: Option<Duration>,
    /// The capture ended inside a frame.
    pub truncated: bool,
}

impl CaptureStats {
    /// Counts a frame and returns its offset from the first frame.
    pub fn record_frame(&mut self, absolute: Duration) -> Duration {
        self.frames_total += 1;
        let first = *self.first_timestamp.get_or_insert(absolute);
        if self.last_timestamp.is_none_or(|last| absolute > last) {
            self.last_timestamp = Some(absolute);
        }
        absolute.saturating_sub(first)
    }

    pub fn record_skipped(&mut self) {
        self.frames_total += 1;
        self.frames_skipped += 1;
    }
}

/// Packets decoded from input but not yet handed out, numbered in capture
/// order.
#[derive(Debug, Default)]
struct ReadyQueue {
    packets: VecDeque<Packet>,
    next_sequence: u64,
}

impl ReadyQueue {
    fn push(&mut self, mut packet: Packet) {
        packet.header_mut().sequence = Some(self.next_sequence);
        self.next_sequence += 1;
        self.packets.push_back(packet);
    }

    fn pop(&mut self) -> Option<Packet> {
        self.packets.pop_front()
    }
}

pub trait PacketSource {
    fn next_packet(&mut self) -> Result<Option<Packet>, SourceError>;

    fn stats(&self) -> CaptureStats;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("packet sink closed")]
pub struct SinkClosed;

/// Where finished packets go.
pub trait PacketSink {
    fn emit(&mut self, packet: Packet) -> Result<(), SinkClosed>;
}

impl PacketSink for Vec<Packet> {
    fn emit(&mut self, packet: Packet) -> Result<(), SinkClosed> {
        self.push(packet);
        Ok(())
    }
}

impl PacketSink for crossbeam_channel::Sender<Packet> {
    fn emit(&mut self, packet: Packet) -> Result<(), SinkClosed> {
        self.send(packet).map_err(|_| SinkClosed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    Continue,
    Exhausted,
}

/// A capture backend run on the session's worker thread.
pub trait CaptureBackend: Send {
    fn setup(&mut self) {}

    /// Captures a bounded amount of input into `sink`.
    fn run_capture(&mut self, sink: &mut dyn PacketSink) -> Result<CaptureStatus, SourceError>;

    fn handle_termination(&mut self, _sink: &mut dyn PacketSink) {}

    fn stats(&self) -> CaptureStats {
        CaptureStats::default()
    }
}

/// Runs a pull-style [`PacketSource`] as a [`CaptureBackend`].
pub struct SourceBackend<S> {
    source: S,
}

impl<S: PacketSource> SourceBackend<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

impl<S: PacketSource + Send> CaptureBackend for SourceBackend<S> {
    fn run_capture(&mut self, sink: &mut dyn PacketSink) -> Result<CaptureStatus, SourceError> {
        let Some(packet) = self.source.next_packet()? else {
            return Ok(CaptureStatus::Exhausted);
        };
        match sink.emit(packet) {
            Ok(()) => Ok(CaptureStatus::Continue),
            Err(SinkClosed) => {
                debug!("packet sink closed; stopping capture");
                Ok(CaptureStatus::Exhausted)
            }
        }
    }

    fn stats(&self) -> CaptureStats {
        self.source.stats()
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PCAP parse error: {0}")]
    Pcap(String),
    #[error("usbmon parse error: {0}")]
    Usbmon(#[from] UsbmonError),
}

impl From<PcapSourceError> for SourceError {
    fn from(value: PcapSourceError) -> Self {
        match value {
            PcapSourceError::Io(err) => SourceError::Io(err),
            PcapSourceError::Pcap { context, message } => {
                SourceError::Pcap(format!("{context}: {message}"))
            }
            other => SourceError::Pcap(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{Pid, RawPacket};

    struct Scripted {
        packets: Vec<Packet>,
        stats: CaptureStats,
    }

    impl PacketSource for Scripted {
        fn next_packet(&mut self) -> Result<Option<Packet>, SourceError> {
            if self.packets.is_empty() {
                return Ok(None);
            }
            self.stats.frames_total += 1;
            Ok(Some(self.packets.remove(0)))
        }

        fn stats(&self) -> CaptureStats {
            self.stats
        }
    }

    fn ack(micros: u64) -> Packet {
        Packet::Raw(RawPacket::new(Duration::from_micros(micros), Pid::Ack, Vec::new()))
    }

    #[test]
    fn record_frame_is_relative_to_first_frame() {
        let mut stats = CaptureStats::default();
        assert_eq!(stats.record_frame(Duration::from_secs(100)), Duration::ZERO);
        assert_eq!(stats.record_frame(Duration::from_millis(100_250)), Duration::from_millis(250));
        stats.record_skipped();
        assert_eq!(stats.frames_total, 3);
        assert_eq!(stats.frames_skipped, 1);
        assert_eq!(stats.last_timestamp, Some(Duration::from_millis(100_250)));
    }

    #[test]
    fn source_backend_pushes_until_exhausted() {
        let mut backend = SourceBackend::new(Scripted {
            packets: vec![ack(1), ack(2)],
            stats: CaptureStats::default(),
        });
        let mut sink: Vec<Packet> = Vec::new();
        assert_eq!(backend.run_capture(&mut sink).unwrap(), CaptureStatus::Continue);
        assert_eq!(backend.run_capture(&mut sink).unwrap(), CaptureStatus::Continue);
        assert_eq!(backend.run_capture(&mut sink).unwrap(), CaptureStatus::Exhausted);
        assert_eq!(sink.len(), 2);
        assert_eq!(backend.stats().frames_total, 2);
    }

    #[test]
    fn closed_channel_ends_capture() {
        let (mut sender, receiver) = crossbeam_channel::bounded(1);
        drop(receiver);
        let mut backend = SourceBackend::new(Scripted {
            packets: vec![ack(1)],
            stats: CaptureStats::default(),
        });
        assert_eq!(backend.run_capture(&mut sender).unwrap(), CaptureStatus::Exhausted);
    }
}
