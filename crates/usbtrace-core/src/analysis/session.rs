use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use log::{debug, info};

use super::AnalysisError;
use super::config::AnalyzerConfig;
use super::driver::Analyzer;
use crate::packet::Packet;
use crate::source::{CaptureBackend, CaptureStats, CaptureStatus, PacketSink, SourceError};

/// A capture backend running on its own thread, feeding the driver through a
/// bounded channel.
pub struct CaptureSession {
    worker: JoinHandle<Result<CaptureStats, SourceError>>,
    packets: Receiver<Packet>,
    ready: Receiver<()>,
    terminate: Arc<AtomicBool>,
    poll_timeout: Duration,
}

impl CaptureSession {
    pub fn spawn<B: CaptureBackend + 'static>(mut backend: B, config: &AnalyzerConfig) -> Result<Self, AnalysisError> {
        let (packet_tx, packets) = bounded(config.channel_capacity);
        let (ready_tx, ready) = bounded(1);
        let terminate = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&terminate);

        let worker = thread::Builder::new()
            .name("usbtrace-capture".to_string())
            .spawn(move || {
                backend.setup();
                let _ = ready_tx.send(());
                let mut sink = packet_tx;
                let result = loop {
                    if stop.load(Ordering::Acquire) {
                        debug!("capture thread asked to stop");
                        break Ok(());
                    }
                    match backend.run_capture(&mut sink) {
                        Ok(CaptureStatus::Continue) => {}
                        Ok(CaptureStatus::Exhausted) => break Ok(()),
                        Err(err) => break Err(err),
                    }
                };
                backend.handle_termination(&mut sink);
                result.map(|()| backend.stats())
            })?;

        Ok(Self {
            worker,
            packets,
            ready,
            terminate,
            poll_timeout: config.poll_timeout(),
        })
    }

    /// Flag that stops the capture thread when set.
    pub fn terminate_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.terminate)
    }

    /// Waits for the backend to finish its setup.
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        self.ready.recv_timeout(timeout).is_ok()
    }

    /// Decodes everything the backend captures until it runs dry or the
    /// terminate flag is set, then flushes the decoder chain.
    pub fn run(self, analyzer: &mut Analyzer, sink: &mut dyn PacketSink) -> Result<CaptureStats, AnalysisError> {
        let decoded = self.pump(analyzer, sink);
        if decoded.is_err() {
            self.terminate.store(true, Ordering::Release);
        }
        // Unblock a worker waiting on a full channel before joining it.
        drop(self.packets);
        let stats = match self.worker.join() {
            Ok(result) => result?,
            Err(_) => return Err(AnalysisError::CaptureThread),
        };
        decoded?;
        info!(
            "capture finished: {} frame(s), {} skipped",
            stats.frames_total, stats.frames_skipped
        );
        Ok(stats)
    }

    fn pump(&self, analyzer: &mut Analyzer, sink: &mut dyn PacketSink) -> Result<(), AnalysisError> {
        loop {
            match self.packets.recv_timeout(self.poll_timeout) {
                Ok(packet) => analyzer.push(packet, sink)?,
                Err(RecvTimeoutError::Timeout) => {
                    // Termination output still arrives after the flag is set.
                    if self.terminate.load(Ordering::Acquire) {
                        debug!("waiting for the capture thread to wind down");
                    }
                }
                // The worker is done and the channel is empty.
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        analyzer.finish(sink)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{Pid, RawPacket};

    struct Scripted {
        remaining: u64,
        fail_at_end: bool,
        captured: u64,
    }

    impl CaptureBackend for Scripted {
        fn run_capture(&mut self, sink: &mut dyn PacketSink) -> Result<CaptureStatus, SourceError> {
            if self.remaining == 0 {
                if self.fail_at_end {
                    return Err(SourceError::Pcap("device unplugged".to_string()));
                }
                return Ok(CaptureStatus::Exhausted);
            }
            self.remaining -= 1;
            let ack = Packet::Raw(RawPacket::new(Duration::from_micros(self.captured), Pid::Ack, Vec::new()));
            if sink.emit(ack).is_err() {
                return Ok(CaptureStatus::Exhausted);
            }
            self.captured += 1;
            Ok(CaptureStatus::Continue)
        }

        fn stats(&self) -> CaptureStats {
            CaptureStats {
                frames_total: self.captured,
                ..CaptureStats::default()
            }
        }
    }

    fn small_config() -> AnalyzerConfig {
        AnalyzerConfig {
            channel_capacity: 2,
            poll_timeout_ms: 5,
            ..AnalyzerConfig::default()
        }
    }

    #[test]
    fn session_decodes_everything_the_backend_captures() {
        let config = small_config();
        let backend = Scripted {
            remaining: 10,
            fail_at_end: false,
            captured: 0,
        };
        let session = CaptureSession::spawn(backend, &config).unwrap();
        assert!(session.wait_ready(Duration::from_secs(5)));

        let mut analyzer = Analyzer::new(&config);
        let mut out: Vec<Packet> = Vec::new();
        let stats = session.run(&mut analyzer, &mut out).unwrap();
        assert_eq!(stats.frames_total, 10);
        // Lone handshakes cannot form transactions.
        assert_eq!(out.len(), 10);
        assert!(out.iter().all(Packet::is_malformed));
    }

    #[test]
    fn backend_failure_surfaces_as_source_error() {
        let config = small_config();
        let backend = Scripted {
            remaining: 1,
            fail_at_end: true,
            captured: 0,
        };
        let session = CaptureSession::spawn(backend, &config).unwrap();
        let mut analyzer = Analyzer::new(&config);
        let mut out: Vec<Packet> = Vec::new();
        let err = session.run(&mut analyzer, &mut out).unwrap_err();
        assert!(matches!(err, AnalysisError::Source(SourceError::Pcap(_))));
    }

    #[test]
    fn terminate_flag_stops_an_endless_backend() {
        let config = small_config();
        let backend = Scripted {
            remaining: u64::MAX,
            fail_at_end: false,
            captured: 0,
        };
        let session = CaptureSession::spawn(backend, &config).unwrap();
        session.terminate_flag().store(true, Ordering::Release);

        let mut analyzer = Analyzer::new(&config);
        let mut out: Vec<Packet> = Vec::new();
        let stats = session.run(&mut analyzer, &mut out).unwrap();
        assert_eq!(out.len() as u64, stats.frames_total);
    }

    /// Emits one SOF per call and a final SOF when told to stop.
    struct Ticking {
        frame: u16,
    }

    impl Ticking {
        fn sof(&self) -> Packet {
            let number = self.frame.to_le_bytes();
            Packet::Raw(RawPacket::new(
                Duration::from_millis(u64::from(self.frame)),
                Pid::Sof,
                vec![number[0], number[1] & 0x07],
            ))
        }
    }

    impl CaptureBackend for Ticking {
        fn run_capture(&mut self, sink: &mut dyn PacketSink) -> Result<CaptureStatus, SourceError> {
            if sink.emit(self.sof()).is_err() {
                return Ok(CaptureStatus::Exhausted);
            }
            self.frame = self.frame.wrapping_add(1);
            thread::sleep(Duration::from_millis(1));
            Ok(CaptureStatus::Continue)
        }

        fn handle_termination(&mut self, sink: &mut dyn PacketSink) {
            thread::sleep(Duration::from_millis(30));
            let _ = sink.emit(self.sof());
            self.frame = self.frame.wrapping_add(1);
        }

        fn stats(&self) -> CaptureStats {
            CaptureStats {
                frames_total: u64::from(self.frame),
                ..CaptureStats::default()
            }
        }
    }

    #[test]
    fn termination_output_reaches_the_decoder() {
        let config = AnalyzerConfig {
            conglomerate_sofs: false,
            ..small_config()
        };
        let session = CaptureSession::spawn(Ticking { frame: 0 }, &config).unwrap();
        assert!(session.wait_ready(Duration::from_secs(5)));
        session.terminate_flag().store(true, Ordering::Release);

        let mut analyzer = Analyzer::new(&config);
        let mut out: Vec<Packet> = Vec::new();
        let stats = session.run(&mut analyzer, &mut out).unwrap();
        // The SOF sent from handle_termination is the last one counted.
        assert_eq!(out.len() as u64, stats.frames_total);
        assert!(matches!(out.last(), Some(Packet::StartOfFrame(_))));
    }
}
