mod common;

use common::*;
use usbtrace_core::{AnalysisError, AnalyzerConfig, analyze_pcap_file, analyze_pcap_file_with, analyze_usbmon_file};

fn sof_then_bulk_in() -> Vec<(u64, Vec<u8>)> {
    vec![
        (BASE_US, vec![PID_SOF, 0x01, 0x00]),
        (BASE_US + 125, vec![PID_SOF, 0x02, 0x00]),
        (BASE_US + 200, token(PID_IN, 4, 1)),
        (BASE_US + 201, data(PID_DATA0, &[1, 2, 3])),
        (BASE_US + 202, vec![PID_ACK]),
    ]
}

#[test]
fn enumeration_capture_yields_descriptor_request() {
    let capture = TempCapture::write("enum.pcapng", &pcapng(LINKTYPE_USB_2_0, &get_device_descriptor_frames()));
    let report = analyze_pcap_file(&capture.path).expect("analyze capture");

    let summary = report.capture_summary.as_ref().expect("capture summary");
    assert_eq!(summary.frames_total, 15);
    assert_eq!(summary.time_start.as_deref(), Some("2023-11-14T22:13:20Z"));
    assert_eq!(Some(report.generated_at.as_str()), summary.time_end.as_deref());

    let decoded = &report.decode_summary;
    assert_eq!(decoded.packets_total, 1);
    assert_eq!(decoded.malformed, 0);
    assert_eq!(decoded.transactions, 4);
    assert_eq!(decoded.transfers, 3);
    assert_eq!(decoded.control_requests, 1);
    assert_eq!(decoded.descriptors, 1);

    assert_eq!(report.devices.len(), 1);
    let device = &report.devices[0];
    assert_eq!(device.address, 0);
    assert_eq!(device.vendor_id, Some(0x1209));
    assert_eq!(device.product_id, Some(0x5634));
    assert!(device.class.is_some());

    let request = &report.packets[0];
    assert_eq!(request.kind, "DescriptorRequest");
    assert_eq!(request.subordinates.len(), 3);
    assert_eq!(request.raw_hex.as_deref(), Some(hex_of(&DEVICE_DESCRIPTOR).as_str()));
}

#[test]
fn report_serializes_with_stable_sections() {
    let capture = TempCapture::write("json.pcapng", &pcapng(LINKTYPE_USB_2_0, &get_device_descriptor_frames()));
    let report = analyze_pcap_file(&capture.path).expect("analyze capture");
    let value = serde_json::to_value(&report).expect("report json");

    for key in ["report_version", "tool", "generated_at", "input", "capture_summary", "decode_summary", "devices", "packets"] {
        assert!(value.get(key).is_some(), "missing {key}");
    }
    assert_eq!(value["tool"]["name"], "usbtrace");
    assert!(value["capture_summary"].get("truncated").is_none());
    assert_eq!(value["packets"][0]["summary"]["device_address"], 0);
}

#[test]
fn sof_handling_follows_config() {
    let capture = TempCapture::write("sof.pcapng", &pcapng(LINKTYPE_USB_2_0, &sof_then_bulk_in()));

    let report = analyze_pcap_file(&capture.path).expect("default analysis");
    let kinds: Vec<_> = report.packets.iter().map(|packet| packet.kind.as_str()).collect();
    assert_eq!(kinds, ["StartOfFrameCollection", "DataTransfer"]);

    let config = AnalyzerConfig {
        filter_sofs: true,
        ..AnalyzerConfig::default()
    };
    let report = analyze_pcap_file_with(&capture.path, &config).expect("filtered analysis");
    let kinds: Vec<_> = report.packets.iter().map(|packet| packet.kind.as_str()).collect();
    assert_eq!(kinds, ["DataTransfer"]);
    assert_eq!(report.capture_summary.expect("capture summary").frames_total, 5);

    let config = AnalyzerConfig {
        conglomerate_sofs: false,
        ..AnalyzerConfig::default()
    };
    let report = analyze_pcap_file_with(&capture.path, &config).expect("ungrouped analysis");
    let kinds: Vec<_> = report.packets.iter().map(|packet| packet.kind.as_str()).collect();
    assert_eq!(kinds, ["StartOfFrame", "StartOfFrame", "DataTransfer"]);
}

#[test]
fn malformed_packets_are_reported_not_fatal() {
    let frames = vec![(BASE_US, vec![PID_OUT, 0x01]), (BASE_US + 10, vec![PID_ACK, 0x00])];
    let capture = TempCapture::write("bad.pcapng", &pcapng(LINKTYPE_USB_2_0, &frames));
    let report = analyze_pcap_file(&capture.path).expect("analyze capture");

    assert_eq!(report.decode_summary.packets_total, 2);
    assert_eq!(report.decode_summary.malformed, 2);
    assert!(report.packets.iter().all(|packet| packet.kind == "MalformedPacket"));
}

#[test]
fn invalid_config_is_rejected_before_reading() {
    let config = AnalyzerConfig {
        channel_capacity: 0,
        ..AnalyzerConfig::default()
    };
    let err = analyze_pcap_file_with(std::path::Path::new("does-not-exist.pcap"), &config).unwrap_err();
    assert!(matches!(err, AnalysisError::Config(_)));
}

#[test]
fn missing_file_is_an_io_error() {
    let err = analyze_pcap_file(std::path::Path::new("/nonexistent/usbtrace.pcapng")).unwrap_err();
    assert!(matches!(err, AnalysisError::Source(usbtrace_core::SourceError::Io(_))));
}

#[test]
fn usbmon_stream_runs_through_capture_thread() {
    let mut bytes = Vec::new();
    for event in usbmon_get_descriptor(0).iter().chain(&usbmon_bulk_out(9, 1_000, b"ping")) {
        bytes.extend(event.to_bytes(48));
    }
    let capture = TempCapture::write("session.usbmon", &bytes);
    let report = analyze_usbmon_file(&capture.path, &AnalyzerConfig::default()).expect("analyze usbmon");

    let kinds: Vec<_> = report.packets.iter().map(|packet| packet.kind.as_str()).collect();
    assert_eq!(kinds, ["DescriptorRequest", "BulkTransfer"]);
    assert_eq!(report.devices.len(), 1);
    assert_eq!(report.devices[0].address, 3);
    assert_eq!(report.devices[0].vendor_id, Some(0x1209));
    assert_eq!(report.decode_summary.descriptors, 1);
    assert_eq!(report.capture_summary.expect("capture summary").frames_total, 4);
}

#[test]
fn stalled_usbmon_request_has_no_status_stage() {
    let mut bytes = Vec::new();
    for event in usbmon_get_descriptor(-32) {
        bytes.extend(event.to_bytes(48));
    }
    let capture = TempCapture::write("stall.usbmon", &bytes);
    let report = analyze_usbmon_file(&capture.path, &AnalyzerConfig::default()).expect("analyze usbmon");

    assert_eq!(report.packets.len(), 1);
    let kinds: Vec<_> = report.packets[0]
        .subordinates
        .iter()
        .map(|packet| packet.kind.as_str())
        .collect();
    assert_eq!(kinds, ["SetupTransfer", "DataTransfer"]);
}

fn hex_of(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}
