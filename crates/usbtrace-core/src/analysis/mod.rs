//! Decode orchestration: capture sources feed the stage chain and the
//! resulting packet trees are folded into a [`Report`].

use std::fs;
use std::path::Path;

use log::info;
use thiserror::Error;

use crate::Report;
use crate::packet::Packet;
use crate::source::{
    PacketSource, PcapFileSource, SinkClosed, SourceBackend, SourceError, UsbmonStreamSource,
};

mod config;
mod driver;
mod report;
mod session;

pub use config::{AnalyzerConfig, ConfigError};
pub use driver::Analyzer;
pub use report::build_report;
pub use session::CaptureSession;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("packet sink closed")]
    SinkClosed(#[from] SinkClosed),
    #[error("capture thread panicked")]
    CaptureThread,
}

/// Analyzes a pcap or pcapng file with the default configuration.
pub fn analyze_pcap_file(path: &Path) -> Result<Report, AnalysisError> {
    analyze_pcap_file_with(path, &AnalyzerConfig::default())
}

pub fn analyze_pcap_file_with(path: &Path, config: &AnalyzerConfig) -> Result<Report, AnalysisError> {
    config.validate()?;
    let source = PcapFileSource::open(path)?;
    analyze_source(path, source, config)
}

/// Pulls every packet from `source` through a fresh decoder chain.
pub fn analyze_source<S: PacketSource>(
    path: &Path,
    mut source: S,
    config: &AnalyzerConfig,
) -> Result<Report, AnalysisError> {
    let mut analyzer = Analyzer::new(config);
    let mut packets: Vec<Packet> = Vec::new();
    while let Some(packet) = source.next_packet()? {
        analyzer.push(packet, &mut packets)?;
    }
    analyzer.finish(&mut packets)?;

    let stats = source.stats();
    info!(
        "decoded {} frame(s) into {} top-level packet(s)",
        stats.frames_total,
        packets.len()
    );
    Ok(build_report(
        &path.to_string_lossy(),
        input_bytes(path),
        &stats,
        analyzer.devices(),
        &packets,
    ))
}

/// Analyzes a raw usbmon event stream on a capture thread.
pub fn analyze_usbmon_file(path: &Path, config: &AnalyzerConfig) -> Result<Report, AnalysisError> {
    config.validate()?;
    let source = UsbmonStreamSource::open(path)?;
    let session = CaptureSession::spawn(SourceBackend::new(source), config)?;
    let mut analyzer = Analyzer::new(config);
    let mut packets: Vec<Packet> = Vec::new();
    let stats = session.run(&mut analyzer, &mut packets)?;
    Ok(build_report(
        &path.to_string_lossy(),
        input_bytes(path),
        &stats,
        analyzer.devices(),
        &packets,
    ))
}

fn input_bytes(path: &Path) -> u64 {
    fs::metadata(path).map(|meta| meta.len()).unwrap_or(0)
}
