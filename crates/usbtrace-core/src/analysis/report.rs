use std::time::Duration;

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::decoder::{DeviceModel, DeviceModels};
use crate::descriptor::registry::device_class_name;
use crate::packet::{DescriptorPayload, Packet};
use crate::source::CaptureStats;
use crate::{
    CaptureSummary, DEFAULT_GENERATED_AT, DecodeSummary, DeviceSummary, EndpointSummary, PacketRecord, Report,
    make_stub_report,
};

/// Assembles the report for one decoded capture.
pub fn build_report(
    input_path: &str,
    input_bytes: u64,
    stats: &CaptureStats,
    devices: &DeviceModels,
    packets: &[Packet],
) -> Report {
    let mut report = make_stub_report(input_path, input_bytes);
    report.capture_summary = Some(CaptureSummary {
        frames_total: stats.frames_total,
        frames_skipped: stats.frames_skipped,
        truncated: stats.truncated,
        time_start: ts_to_rfc3339(stats.first_timestamp),
        time_end: ts_to_rfc3339(stats.last_timestamp),
    });
    report.generated_at = report
        .capture_summary
        .as_ref()
        .and_then(|summary| summary.time_end.clone().or_else(|| summary.time_start.clone()))
        .unwrap_or_else(|| DEFAULT_GENERATED_AT.to_string());
    report.decode_summary = summarize(packets);
    report.devices = devices.iter().map(device_summary).collect();
    report.packets = packets.iter().map(packet_record).collect();
    report
}

pub fn packet_record(packet: &Packet) -> PacketRecord {
    let raw = packet.raw_bytes();
    PacketRecord {
        kind: packet.kind_name().to_string(),
        summary: packet.summary(),
        details: packet.detail_fields(),
        raw_hex: (!raw.is_empty()).then(|| hex::encode(raw)),
        subordinates: packet.subordinates().iter().map(packet_record).collect(),
    }
}

/// Counts packets by decode level across every packet tree.
pub fn summarize(packets: &[Packet]) -> DecodeSummary {
    let mut summary = DecodeSummary {
        packets_total: packets.len() as u64,
        ..DecodeSummary::default()
    };
    let mut pending: Vec<&Packet> = packets.iter().collect();
    while let Some(packet) = pending.pop() {
        match packet {
            Packet::Malformed(_) => summary.malformed += 1,
            Packet::Transaction(_) | Packet::SetupTransaction(_) | Packet::DataTransaction(_) => {
                summary.transactions += 1;
            }
            Packet::SetupTransfer(_)
            | Packet::DataTransfer(_)
            | Packet::BulkTransfer(_)
            | Packet::InterruptTransfer(_)
            | Packet::IsochronousTransfer(_)
            | Packet::StatusTransfer(_)
            | Packet::TransferFragment(_) => summary.transfers += 1,
            Packet::ControlTransfer(_) | Packet::StandardRequest(_) => summary.control_requests += 1,
            Packet::DescriptorRequest(request) => {
                summary.control_requests += 1;
                if matches!(request.payload, DescriptorPayload::Parsed(_)) {
                    summary.descriptors += 1;
                }
            }
            _ => {}
        }
        pending.extend(packet.subordinates());
    }
    summary
}

fn device_summary(device: &DeviceModel) -> DeviceSummary {
    DeviceSummary {
        address: device.address,
        vendor_id: device.vendor_id,
        product_id: device.product_id,
        class: device
            .class
            .map(|(class, subclass, protocol)| device_class_name(class, subclass, protocol)),
        manufacturer: device.manufacturer().map(str::to_string),
        product: device.product().map(str::to_string),
        configurations: device.configurations.clone(),
        endpoints: device
            .endpoints
            .iter()
            .map(|(&address, &transfer_type)| EndpointSummary {
                address,
                transfer_type,
            })
            .collect(),
    }
}

/// Formats time since the Unix epoch as RFC3339.
pub fn ts_to_rfc3339(ts: Option<Duration>) -> Option<String> {
    let ts = ts?;
    let nanos = i128::try_from(ts.as_nanos()).ok()?;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::testutil::{raw, token, transaction};
    use crate::packet::{MalformedPacket, Pid};

    #[test]
    fn rfc3339_from_epoch_offset() {
        let ts = Duration::from_secs(1_700_000_000) + Duration::from_micros(250);
        assert_eq!(ts_to_rfc3339(Some(ts)).as_deref(), Some("2023-11-14T22:13:20.00025Z"));
        assert_eq!(ts_to_rfc3339(None), None);
    }

    #[test]
    fn generated_at_falls_back_to_default() {
        let report = build_report("empty.pcap", 24, &CaptureStats::default(), &DeviceModels::default(), &[]);
        assert_eq!(report.generated_at, DEFAULT_GENERATED_AT);
        let summary = report.capture_summary.expect("capture summary");
        assert_eq!(summary.frames_total, 0);
        assert!(report.packets.is_empty());
    }

    #[test]
    fn summary_walks_nested_packets() {
        let stray = MalformedPacket::from_packets(vec![raw(0, Pid::Ack, &[1])], "stray handshake");
        let packets = vec![
            transaction(10, Pid::In, 1, 1, &[1, 2], Pid::Ack),
            Packet::Malformed(stray),
        ];
        let summary = summarize(&packets);
        assert_eq!(summary.packets_total, 2);
        assert_eq!(summary.transactions, 1);
        assert_eq!(summary.malformed, 1);
        assert_eq!(summary.transfers, 0);
    }

    #[test]
    fn token_record_carries_wire_bytes() {
        let record = packet_record(&token(0, Pid::In, 1, 1));
        assert_eq!(record.kind, "TokenPacket");
        assert!(record.subordinates.is_empty());
        assert_eq!(record.raw_hex.as_deref(), Some("698100"));
    }
}
