use std::fs::File;
use std::path::Path;
use std::time::Duration;

use log::{debug, warn};
use pcap_parser::{Block, LegacyPcapReader, PcapBlockOwned, PcapError, PcapNGReader, traits::PcapReaderIterator};

use crate::packet::{Packet, RawPacket};
use crate::source::usbmon::{layout as usbmon_layout, parser::UrbTracker, reader::parse_event};
use crate::source::{CaptureStats, PacketSource, ReadyQueue, SourceError};

use super::error::PcapSourceError;
use super::layout;
use super::reader::{CaptureFormat, capture_format, interface_for, legacy_timestamp, pcapng_timestamp, read_magic_and_rewind};

/// Reads USB packets out of a pcap or pcapng file.
pub struct PcapFileSource {
    inner: PcapReader,
    tracker: UrbTracker,
    stats: CaptureStats,
    ready: ReadyQueue,
    finished: bool,
}

enum PcapReader {
    Legacy {
        reader: LegacyPcapReader<File>,
        buffer_size: usize,
        linktype: Option<i32>,
        nanosecond: bool,
    },
    Ng {
        reader: PcapNGReader<File>,
        buffer_size: usize,
        /// Linktype and `if_tsresol`, by interface id.
        interfaces: Vec<(i32, u8)>,
    },
}

/// One captured frame, timestamped since the Unix epoch.
struct Frame {
    timestamp: Duration,
    linktype: i32,
    data: Vec<u8>,
}

impl PcapFileSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path).map_err(SourceError::from)?;
        let inner = create_reader(file).map_err(SourceError::from)?;
        Ok(Self {
            inner,
            tracker: UrbTracker::new(),
            stats: CaptureStats::default(),
            ready: ReadyQueue::default(),
            finished: false,
        })
    }

    fn finish(&mut self) {
        self.finished = true;
        for orphan in self.tracker.drain_orphans() {
            self.ready.push(orphan);
        }
    }

    fn handle_frame(&mut self, frame: Frame) {
        match frame.linktype {
            layout::LINKTYPE_USB_2_0 => {
                let timestamp = self.stats.record_frame(frame.timestamp);
                match RawPacket::from_bytes(timestamp, &frame.data) {
                    Some(raw) => self.ready.push(Packet::Raw(raw)),
                    None => {
                        debug!("skipping empty USB frame at {timestamp:?}");
                        self.stats.frames_skipped += 1;
                    }
                }
            }
            layout::LINKTYPE_USB_LINUX | layout::LINKTYPE_USB_LINUX_MMAPPED => {
                let header_len = if frame.linktype == layout::LINKTYPE_USB_LINUX {
                    usbmon_layout::HEADER_LEN
                } else {
                    usbmon_layout::MMAPPED_HEADER_LEN
                };
                match parse_event(&frame.data, header_len) {
                    Ok(event) => {
                        let timestamp = self.stats.record_frame(frame.timestamp);
                        if let Some(packet) = self.tracker.handle(event, timestamp) {
                            self.ready.push(packet);
                        }
                    }
                    Err(err) => {
                        warn!("skipping unreadable usbmon frame: {err}");
                        self.stats.record_skipped();
                    }
                }
            }
            other => {
                debug!("skipping frame with unsupported linktype {other}");
                self.stats.record_skipped();
            }
        }
    }
}

impl PacketSource for PcapFileSource {
    fn next_packet(&mut self) -> Result<Option<Packet>, SourceError> {
        loop {
            if let Some(packet) = self.ready.pop() {
                return Ok(Some(packet));
            }
            if self.finished {
                return Ok(None);
            }
            match next_frame(&mut self.inner) {
                Ok(Some(frame)) => self.handle_frame(frame),
                Ok(None) => self.finish(),
                Err(PcapSourceError::Truncated { context }) => {
                    warn!("capture is truncated ({context}); keeping the frames read so far");
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

fn create_reader(file: File) -> Result<PcapReader, PcapSourceError> {
    let mut file = file;
    let magic = read_magic_and_rewind(&mut file)?;

    match capture_format(&magic)? {
        CaptureFormat::PcapNg => {
            let reader = PcapNGReader::new(layout::PCAP_READER_BUFFER_SIZE, file).map_err(|e| {
                PcapSourceError::Pcap {
                    context: "pcapng reader init",
                    message: e.to_string(),
                }
            })?;
            Ok(PcapReader::Ng {
                reader,
                buffer_size: layout::PCAP_READER_BUFFER_SIZE,
                interfaces: Vec::new(),
            })
        }
        CaptureFormat::Legacy { nanosecond } => {
            let reader = LegacyPcapReader::new(layout::PCAP_READER_BUFFER_SIZE, file).map_err(|e| {
                PcapSourceError::Pcap {
                    context: "pcap reader init",
                    message: e.to_string(),
                }
            })?;
            Ok(PcapReader::Legacy {
                reader,
                buffer_size: layout::PCAP_READER_BUFFER_SIZE,
                linktype: None,
                nanosecond,
            })
        }
    }
}

/// Doubles the reader's buffer so the next block fits, then refills it.
fn grow_buffer<R: PcapReaderIterator>(
    reader: &mut R,
    buffer_size: &mut usize,
    context: &'static str,
) -> Result<(), PcapSourceError> {
    if *buffer_size >= layout::PCAP_READER_MAX_BUFFER_SIZE {
        return Err(PcapSourceError::Pcap {
            context,
            message: format!("block larger than {} bytes", layout::PCAP_READER_MAX_BUFFER_SIZE),
        });
    }
    let grown = (*buffer_size * 2).min(layout::PCAP_READER_MAX_BUFFER_SIZE);
    if !reader.grow(grown) {
        return Err(PcapSourceError::Pcap {
            context,
            message: format!("cannot grow read buffer to {grown} bytes"),
        });
    }
    debug!("grew capture read buffer to {grown} bytes");
    *buffer_size = grown;
    reader.refill().map_err(|e| PcapSourceError::Pcap {
        context,
        message: e.to_string(),
    })
}

/// Next packet-carrying frame. A block cut short by the end of the file is
/// reported as `Truncated` once a refill brings no further data.
fn next_frame(reader: &mut PcapReader) -> Result<Option<Frame>, PcapSourceError> {
    let mut refilled = false;
    loop {
        match reader {
            PcapReader::Legacy {
                reader,
                buffer_size,
                linktype,
                nanosecond,
            } => match reader.next() {
                Ok((offset, block)) => {
                    refilled = false;
                    let frame = match block {
                        PcapBlockOwned::LegacyHeader(header) => {
                            *linktype = Some(header.network.0);
                            None
                        }
                        PcapBlockOwned::Legacy(packet) => Some(Frame {
                            timestamp: legacy_timestamp(packet.ts_sec, packet.ts_usec, *nanosecond),
                            linktype: linktype.unwrap_or_default(),
                            data: packet.data.to_vec(),
                        }),
                        _ => None,
                    };
                    reader.consume(offset);
                    if frame.is_some() {
                        return Ok(frame);
                    }
                }
                Err(PcapError::Eof) => return Ok(None),
                Err(PcapError::UnexpectedEof) => {
                    return Err(PcapSourceError::Truncated { context: "pcap reader next" });
                }
                Err(PcapError::BufferTooSmall) => {
                    grow_buffer(reader, buffer_size, "pcap reader grow")?;
                    refilled = false;
                }
                Err(PcapError::Incomplete(_)) if refilled => {
                    return Err(PcapSourceError::Truncated { context: "pcap reader next" });
                }
                Err(PcapError::Incomplete(_)) => {
                    reader.refill().map_err(|e| PcapSourceError::Pcap {
                        context: "pcap reader refill",
                        message: e.to_string(),
                    })?;
                    refilled = true;
                }
                Err(_) if refilled => {
                    return Err(PcapSourceError::Truncated { context: "pcap reader next" });
                }
                Err(e) => {
                    return Err(PcapSourceError::Pcap {
                        context: "pcap reader next",
                        message: e.to_string(),
                    });
                }
            },
            PcapReader::Ng {
                reader,
                buffer_size,
                interfaces,
            } => match reader.next() {
                Ok((offset, block)) => {
                    refilled = false;
                    let frame = match block {
                        // Interface ids are scoped to their section.
                        PcapBlockOwned::NG(Block::SectionHeader(_)) => {
                            interfaces.clear();
                            None
                        }
                        PcapBlockOwned::NG(Block::InterfaceDescription(intf)) => {
                            interfaces.push((intf.linktype.0, intf.if_tsresol));
                            None
                        }
                        PcapBlockOwned::NG(Block::EnhancedPacket(packet)) => {
                            let (linktype, tsresol) = interface_for(interfaces, packet.if_id)
                                .unwrap_or((0, layout::PCAPNG_DEFAULT_TSRESOL));
                            // Block data may carry padding past the captured length.
                            let captured = (packet.caplen as usize).min(packet.data.len());
                            Some(Frame {
                                timestamp: pcapng_timestamp(packet.ts_high, packet.ts_low, tsresol),
                                linktype,
                                data: packet.data[..captured].to_vec(),
                            })
                        }
                        _ => None,
                    };
                    reader.consume(offset);
                    if frame.is_some() {
                        return Ok(frame);
                    }
                }
                Err(PcapError::Eof) => return Ok(None),
                Err(PcapError::UnexpectedEof) => {
                    return Err(PcapSourceError::Truncated { context: "pcapng reader next" });
                }
                Err(PcapError::BufferTooSmall) => {
                    grow_buffer(reader, buffer_size, "pcapng reader grow")?;
                    refilled = false;
                }
                Err(PcapError::Incomplete(_)) if refilled => {
                    return Err(PcapSourceError::Truncated { context: "pcapng reader next" });
                }
                Err(PcapError::Incomplete(_)) => {
                    reader.refill().map_err(|e| PcapSourceError::Pcap {
                        context: "pcapng reader refill",
                        message: e.to_string(),
                    })?;
                    refilled = true;
                }
                Err(_) if refilled => {
                    return Err(PcapSourceError::Truncated { context: "pcapng reader next" });
                }
                Err(e) => {
                    return Err(PcapSourceError::Pcap {
                        context: "pcapng reader next",
                        message: e.to_string(),
                    });
                }
            },
        }
    }
}
