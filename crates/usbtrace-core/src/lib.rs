//! usbtrace core library for offline USB protocol analysis.
//!
//! Captures flow from a [`source`] (pcap/pcapng files with bus-level or
//! usbmon frames, or raw usbmon event streams) into a chain of [`decoder`]
//! stages that lift raw packets into transactions, transfers, control
//! requests and parsed descriptors. The resulting packet trees are folded
//! into a deterministic [`Report`].
//!
//! Invariants:
//! - Every aggregate keeps the packets it was built from as subordinates.
//! - Malformed input never aborts decoding; it becomes a `MalformedPacket`.
//! - Report ordering follows arrival order; devices are sorted by address.
//!
//! # Examples
//! ```no_run
//! use std::path::Path;
//!
//! use usbtrace_core::analyze_pcap_file;
//!
//! let report = analyze_pcap_file(Path::new("enumeration.pcapng"))?;
//! println!("{} packet(s)", report.decode_summary.packets_total);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Decoding can also be driven by hand:
//! ```
//! use usbtrace_core::{Analyzer, AnalyzerConfig};
//! use usbtrace_core::packet::Packet;
//!
//! let mut analyzer = Analyzer::new(&AnalyzerConfig::default());
//! let mut packets: Vec<Packet> = Vec::new();
//! analyzer.finish(&mut packets)?;
//! assert!(packets.is_empty());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use serde::{Deserialize, Serialize};

mod analysis;
pub mod decoder;
pub mod descriptor;
pub mod packet;
pub mod source;

pub use analysis::{
    AnalysisError, Analyzer, AnalyzerConfig, CaptureSession, ConfigError, analyze_pcap_file,
    analyze_pcap_file_with, analyze_source, analyze_usbmon_file, build_report,
};
pub use source::{
    CaptureBackend, CaptureStats, PacketSink, PacketSource, PcapFileSource, SourceBackend, SourceError,
    UsbmonStreamSource,
};

use packet::display::{DetailGroup, SummaryFields};
use packet::TransferType;

/// Current report schema version.
pub const REPORT_VERSION: u32 = 1;
/// Default timestamp used when no capture time is available.
pub const DEFAULT_GENERATED_AT: &str = "1970-01-01T00:00:00Z";

/// Decoded capture report with deterministic ordering.
///
/// # Examples
/// ```
/// use usbtrace_core::make_stub_report;
///
/// let report = make_stub_report("capture.pcapng", 123);
/// assert_eq!(report.report_version, usbtrace_core::REPORT_VERSION);
/// assert!(report.packets.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// Report schema version (not the binary version).
    pub report_version: u32,
    /// Tool identification metadata.
    pub tool: ToolInfo,
    /// RFC3339 timestamp of the last captured frame, or the epoch.
    pub generated_at: String,

    /// Input capture metadata.
    pub input: InputInfo,

    /// Frame-level statistics (absent on stub reports).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_summary: Option<CaptureSummary>,
    /// Packet counts by decode level.
    pub decode_summary: DecodeSummary,
    /// Devices seen in descriptor traffic, by address.
    pub devices: Vec<DeviceSummary>,
    /// Top-level packets in arrival order.
    pub packets: Vec<PacketRecord>,
}

/// Tool metadata embedded in reports.
///
/// # Examples
/// ```
/// use usbtrace_core::ToolInfo;
///
/// let tool = ToolInfo {
///     name: "usbtrace".to_string(),
///     version: "0.1.0".to_string(),
/// };
/// assert_eq!(tool.name, "usbtrace");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

/// Input capture metadata embedded in reports.
///
/// # Examples
/// ```
/// use usbtrace_core::InputInfo;
///
/// let input = InputInfo {
///     path: "capture.pcapng".to_string(),
///     bytes: 1024,
/// };
/// assert_eq!(input.bytes, 1024);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputInfo {
    /// Input path as provided to the analyzer.
    pub path: String,
    /// Input size in bytes.
    pub bytes: u64,
}

/// Frame-level capture statistics (timestamps may be absent).
///
/// # Examples
/// ```
/// use usbtrace_core::CaptureSummary;
///
/// let summary = CaptureSummary {
///     frames_total: 10,
///     frames_skipped: 1,
///     truncated: false,
///     time_start: None,
///     time_end: None,
/// };
/// assert_eq!(summary.frames_total - summary.frames_skipped, 9);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSummary {
    /// Frames (or usbmon events) read from the input.
    pub frames_total: u64,
    /// Frames that carried nothing decodable.
    pub frames_skipped: u64,
    /// The input ended mid-record.
    #[serde(default, skip_serializing_if = "is_false")]
    pub truncated: bool,
    /// RFC3339 timestamp of the first frame (if known).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_start: Option<String>,
    /// RFC3339 timestamp of the last frame (if known).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_end: Option<String>,
}

/// Packet counts by decode level. Nested packets are counted too, except
/// for `packets_total`, which counts top-level packets only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeSummary {
    pub packets_total: u64,
    pub malformed: u64,
    pub transactions: u64,
    pub transfers: u64,
    pub control_requests: u64,
    /// Descriptor requests whose payload parsed.
    pub descriptors: u64,
}

/// What descriptor traffic revealed about one device.
///
/// # Examples
/// ```
/// use usbtrace_core::DeviceSummary;
///
/// let device = DeviceSummary {
///     address: 3,
///     vendor_id: Some(0x1209),
///     product_id: Some(0x5634),
///     class: None,
///     manufacturer: None,
///     product: Some("Widget".to_string()),
///     configurations: vec![1],
///     endpoints: vec![],
/// };
/// let json = serde_json::to_value(&device)?;
/// assert!(json.get("class").is_none());
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub address: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<u16>,
    /// Human-readable class triple, when the device descriptor was seen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    /// Configuration values in the order they were reported.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub configurations: Vec<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<EndpointSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSummary {
    /// Endpoint address, direction bit included.
    pub address: u8,
    pub transfer_type: TransferType,
}

/// One packet and its subordinates, as shown in a packet tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketRecord {
    /// Variant name, e.g. `ControlTransfer`.
    pub kind: String,
    pub summary: SummaryFields,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<DetailGroup>,
    /// Wire bytes or reassembled payload as lowercase hex.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_hex: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subordinates: Vec<PacketRecord>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

pub fn make_stub_report(input_path: &str, input_bytes: u64) -> Report {
    Report {
        report_version: REPORT_VERSION,
        tool: ToolInfo {
            name: "usbtrace".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        generated_at: DEFAULT_GENERATED_AT.to_string(),
        input: InputInfo {
            path: input_path.to_string(),
            bytes: input_bytes,
        },
        capture_summary: None,
        decode_summary: DecodeSummary::default(),
        devices: vec![],
        packets: vec![],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_omits_optional_fields_when_none() {
        let mut report = make_stub_report("capture.pcapng", 1);
        report.capture_summary = Some(CaptureSummary {
            frames_total: 1,
            frames_skipped: 0,
            truncated: false,
            time_start: None,
            time_end: None,
        });
        report.devices.push(DeviceSummary {
            address: 1,
            vendor_id: None,
            product_id: None,
            class: None,
            manufacturer: None,
            product: None,
            configurations: vec![],
            endpoints: vec![],
        });

        let value = serde_json::to_value(&report).expect("report json");
        let capture = value.get("capture_summary").expect("capture_summary");
        assert!(capture.get("time_start").is_none());
        assert!(capture.get("time_end").is_none());
        assert!(capture.get("truncated").is_none());

        let device = &value["devices"][0];
        assert_eq!(device["address"], 1);
        assert!(device.get("vendor_id").is_none());
        assert!(device.get("endpoints").is_none());
    }

    #[test]
    fn stub_report_has_no_capture_summary() {
        let report = make_stub_report("capture.pcapng", 1);
        let value = serde_json::to_value(&report).expect("report json");
        assert!(value.get("capture_summary").is_none());
        assert_eq!(value["tool"]["name"], "usbtrace");
        assert_eq!(value["decode_summary"]["packets_total"], 0);
    }

    #[test]
    fn endpoint_transfer_type_serializes_lowercase() {
        let endpoint = EndpointSummary {
            address: 0x81,
            transfer_type: TransferType::Interrupt,
        };
        let value = serde_json::to_value(endpoint).expect("endpoint json");
        assert_eq!(value["transfer_type"], "interrupt");
    }
}
