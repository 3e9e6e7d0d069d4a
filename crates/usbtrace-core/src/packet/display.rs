//! What a packet shows at the display boundary: a one-line summary row,
//! titled detail groups and the raw bytes.

use serde::{Deserialize, Serialize};

use super::request::{DescriptorPayload, DescriptorRequest, StandardRequest, StandardRequestKind};
use super::setup::{SetupPacket, descriptor_type_name};
use super::types::{Direction, Style};
use super::{Packet, PacketHeader};
use crate::descriptor::{DecodedDescriptor, ParsedDescriptor, TrailingValue, layout, registry};

/// Bytes shown in a data preview before it is elided.
pub const DATA_PREVIEW_LEN: usize = 8;

/// One row of a packet listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryFields {
    pub timestamp_us: u64,
    pub length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bus: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_address: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub style: Style,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailGroup {
    pub title: String,
    pub entries: Vec<DetailEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailEntry {
    pub key: String,
    pub value: DetailValue,
}

/// A detail value: plain text or a nested key/value table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetailValue {
    Text(String),
    Table(Vec<DetailEntry>),
}

fn text(key: impl Into<String>, value: impl Into<String>) -> DetailEntry {
    DetailEntry {
        key: key.into(),
        value: DetailValue::Text(value.into()),
    }
}

fn table(key: impl Into<String>, entries: Vec<DetailEntry>) -> DetailEntry {
    DetailEntry {
        key: key.into(),
        value: DetailValue::Table(entries),
    }
}

fn group(title: impl Into<String>, entries: Vec<DetailEntry>) -> DetailGroup {
    DetailGroup {
        title: title.into(),
        entries,
    }
}

/// Hex preview of the first bytes of a payload, `...` marking elision.
pub fn data_preview(data: &[u8]) -> String {
    let mut preview = data
        .iter()
        .take(DATA_PREVIEW_LEN)
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(" ");
    if data.len() > DATA_PREVIEW_LEN {
        preview.push_str(" ...");
    }
    preview
}

fn direction_name(direction: Option<Direction>) -> &'static str {
    direction.map_or("unknown", Direction::name)
}

impl Packet {
    pub fn summary(&self) -> SummaryFields {
        let header = self.header();
        SummaryFields {
            timestamp_us: u64::try_from(header.timestamp.as_micros()).unwrap_or(u64::MAX),
            length: header.data_len(),
            bus: header.bus_number,
            device_address: header.device_address,
            endpoint: header.endpoint_number,
            direction: header.direction,
            status: self.status_text(),
            style: header.style,
            summary: self.summary_text(),
            data_summary: self.data_summary(),
        }
    }

    fn status_text(&self) -> Option<String> {
        match self {
            Packet::Malformed(_) => Some("*INV*".to_string()),
            Packet::ControlTransfer(transfer) => Some(control_status(transfer.stalled)),
            Packet::StandardRequest(request) => Some(control_status(request.transfer.stalled)),
            Packet::DescriptorRequest(request) => Some(control_status(request.request.transfer.stalled)),
            Packet::Handshake(_) => None,
            _ => self
                .handshake()
                .map(|pid| pid.name().to_string())
                .or_else(|| self.header().status.map(|status| status.to_string())),
        }
    }

    fn data_summary(&self) -> Option<String> {
        match (self, self.data()) {
            (Packet::Data(_), Some([])) => Some("ZLP".to_string()),
            (_, Some([])) | (_, None) => None,
            (_, Some(data)) => Some(data_preview(data)),
        }
    }

    fn summary_text(&self) -> String {
        let header = self.header();
        let direction = direction_name(header.direction);
        match self {
            Packet::Raw(raw) if raw.pid_valid => format!("{} packet", raw.pid),
            Packet::Raw(raw) => format!("{} packet (bad PID check)", raw.pid),
            Packet::StartOfFrame(sof) => match sof.frame_number {
                Some(frame) => format!("start of frame #{frame}"),
                None => "start of frame".to_string(),
            },
            Packet::StartOfFrameCollection(_) => {
                format!("{} start-of-frame markers", header.subordinate_packets.len())
            }
            Packet::Token(token) => format!(
                "{} token: address={}, endpoint=0x{:02x}, direction={}",
                token.pid,
                header.device_address.unwrap_or_default(),
                header.endpoint_number.unwrap_or_default(),
                direction
            ),
            Packet::Data(data) => format!("{} packet", data.pid),
            Packet::Handshake(handshake) => format!("{} handshake", handshake.pid),
            Packet::Malformed(malformed) => malformed.reason.clone(),
            Packet::Transaction(transaction) if transaction.sequence_error => {
                format!("{} transaction (sequence error)", transaction.token)
            }
            Packet::Transaction(transaction) => format!("{} transaction", transaction.token),
            Packet::SetupTransaction(transaction) => format!("{} transaction", transaction.token),
            Packet::DataTransaction(transaction) => format!("{} transaction", transaction.token),
            Packet::SetupTransfer(setup) => format!("SETUP stage: {}", setup.setup.request_name()),
            Packet::DataTransfer(_) if header.data_len() == 0 => format!("data-less {direction} transfer"),
            Packet::DataTransfer(_) => format!("{}B {direction} transfer", header.data_len()),
            Packet::BulkTransfer(_) => format!("bulk {direction} transfer ({})", header.data_len()),
            Packet::InterruptTransfer(_) => {
                format!("interrupt {direction} transfer ({})", header.data_len())
            }
            Packet::IsochronousTransfer(_) => {
                format!("isochronous {direction} transfer ({})", header.data_len())
            }
            Packet::StatusTransfer(_) => format!("{direction} status stage"),
            Packet::TransferFragment(fragment) => format!(
                "ORPHANED {}B {direction}-{} {} transfer",
                header.data_len(),
                fragment.handshake,
                fragment.transfer_type
            ),
            Packet::ControlTransfer(transfer) => control_summary(&transfer.setup),
            Packet::StandardRequest(request) => standard_summary(request),
            Packet::DescriptorRequest(request) => descriptor_summary(request),
        }
    }

    /// Ordered detail groups, most general first.
    pub fn detail_fields(&self) -> Vec<DetailGroup> {
        let mut groups = vec![packet_group(self)];
        match self {
            Packet::Raw(raw) => groups.push(group(
                "Raw packet",
                vec![
                    text("PID", raw.pid.name()),
                    text("PID check", if raw.pid_valid { "valid" } else { "invalid" }),
                ],
            )),
            Packet::StartOfFrame(sof) => {
                if let Some(frame) = sof.frame_number {
                    groups.push(group("Start of frame", vec![text("Frame number", frame.to_string())]));
                }
            }
            Packet::Token(token) => groups.push(group(
                "Token",
                vec![
                    text("PID", token.pid.name()),
                    text("CRC5", format!("0x{:02x}", token.crc5)),
                ],
            )),
            Packet::Data(data) => groups.push(group(
                "Data",
                vec![
                    text("PID", data.pid.name()),
                    text("CRC16", format!("0x{:04x}", data.crc16_value())),
                ],
            )),
            Packet::Malformed(malformed) => {
                let mut entries = vec![text("Reason", malformed.reason.clone())];
                if let Some(pid) = malformed.pid {
                    entries.push(text("PID", pid.name()));
                }
                groups.push(group("Malformed packet", entries));
            }
            Packet::Transaction(transaction) => groups.push(transaction_group(
                transaction.token.name(),
                transaction.data_pid,
                transaction.handshake,
                Some(transaction.sequence_error),
            )),
            Packet::DataTransaction(transaction) => groups.push(transaction_group(
                transaction.token.name(),
                transaction.data_pid,
                transaction.handshake,
                None,
            )),
            Packet::SetupTransaction(setup) | Packet::SetupTransfer(setup) => {
                groups.push(setup_group(&setup.setup));
            }
            Packet::ControlTransfer(transfer) => groups.push(setup_group(&transfer.setup)),
            Packet::StandardRequest(request) => {
                groups.push(setup_group(&request.transfer.setup));
                groups.push(standard_group(request));
            }
            Packet::DescriptorRequest(request) => {
                groups.push(setup_group(&request.request.transfer.setup));
                groups.push(standard_group(&request.request));
                match &request.payload {
                    DescriptorPayload::Parsed(parsed) => groups.extend(descriptor_groups(parsed)),
                    DescriptorPayload::Failed(reason) => groups.push(group(
                        format!("{} descriptor", request.descriptor_name),
                        vec![text("Error", reason.clone())],
                    )),
                    DescriptorPayload::Missing => {}
                }
            }
            _ => {}
        }
        groups
    }

    /// Bytes as seen on the wire for bus-level packets, or the reassembled
    /// payload for aggregates.
    pub fn raw_bytes(&self) -> Vec<u8> {
        let data = self.data().unwrap_or(&[]);
        match self {
            Packet::Raw(raw) => bus_bytes(raw.pid.to_byte(), data, &[]),
            Packet::StartOfFrame(sof) => bus_bytes(sof.pid.to_byte(), data, &[]),
            Packet::Token(token) => bus_bytes(token.pid.to_byte(), data, &[]),
            Packet::Data(packet) => bus_bytes(packet.pid.to_byte(), data, &packet.crc16),
            Packet::Handshake(handshake) => bus_bytes(handshake.pid.to_byte(), data, &[]),
            _ => data.to_vec(),
        }
    }
}

fn bus_bytes(pid: u8, payload: &[u8], trailer: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(1 + payload.len() + trailer.len());
    bytes.push(pid);
    bytes.extend_from_slice(payload);
    bytes.extend_from_slice(trailer);
    bytes
}

fn control_status(stalled: bool) -> String {
    let status = if stalled { "STALL" } else { "ACK" };
    status.to_string()
}

fn control_summary(setup: &SetupPacket) -> String {
    format!(
        "{} {} request #{} to {}",
        setup.request_type, setup.request_direction, setup.request_number, setup.recipient
    )
}

fn standard_summary(request: &StandardRequest) -> String {
    let setup = &request.transfer.setup;
    let recipient = setup.recipient.name().to_lowercase();
    match request.kind {
        StandardRequestKind::GetStatus => format!("requesting {recipient} status"),
        StandardRequestKind::ClearFeature { feature_selector } => {
            format!("requesting {recipient} clear feature {feature_selector}")
        }
        StandardRequestKind::SetFeature { feature_selector } => {
            format!("requesting {recipient} set feature {feature_selector}")
        }
        StandardRequestKind::SetAddress { new_address } => {
            format!("requesting device use address {new_address}")
        }
        StandardRequestKind::GetDescriptor {
            descriptor_number,
            descriptor_index,
            ..
        } => format!(
            "requesting {} bytes of {} descriptor #{}",
            setup.request_length,
            descriptor_type_name(descriptor_number),
            descriptor_index
        ),
        StandardRequestKind::SetDescriptor {
            descriptor_number,
            descriptor_index,
        } => format!(
            "sending {} bytes of {} descriptor #{}",
            setup.request_length,
            descriptor_type_name(descriptor_number),
            descriptor_index
        ),
        StandardRequestKind::GetConfiguration => "requesting current configuration".to_string(),
        StandardRequestKind::SetConfiguration { configuration_number } => {
            format!("requesting device switch to configuration {configuration_number}")
        }
        StandardRequestKind::GetInterface { interface } => {
            format!("requesting alternate setting of interface {interface}")
        }
        StandardRequestKind::SetInterface {
            interface,
            alternate_setting,
        } => format!("requesting interface {interface} switch to alternate setting {alternate_setting}"),
        StandardRequestKind::SynchFrame { endpoint } => {
            format!("requesting synch frame for endpoint 0x{endpoint:02x}")
        }
    }
}

fn descriptor_summary(request: &DescriptorRequest) -> String {
    let parsed = match &request.payload {
        DescriptorPayload::Parsed(parsed) => parsed,
        DescriptorPayload::Failed(reason) => {
            return format!("unparseable {} descriptor: {reason}", request.descriptor_name);
        }
        DescriptorPayload::Missing => return standard_summary(&request.request),
    };
    let head = &parsed.head;
    match head.number {
        layout::DEVICE_DESCRIPTOR => match (head.value("idVendor"), head.value("idProduct")) {
            (Some(vendor), Some(product)) => format!(
                "vid={vendor:04x}, pid={product:04x}, class={}",
                registry::device_class_name(
                    head.byte("bDeviceClass").unwrap_or_default(),
                    head.byte("bDeviceSubclass").unwrap_or_default(),
                    head.byte("bDeviceProtocol").unwrap_or_default(),
                )
            ),
            _ => format!("partial device descriptor ({} bytes)", head.consumed),
        },
        layout::CONFIGURATION_DESCRIPTOR | layout::OTHER_SPEED_CONFIGURATION_DESCRIPTOR => {
            match head.value("bNumInterfaces") {
                Some(count) => format!("{} with {count} interface(s)", head.name),
                None => format!("partial {} descriptor", head.name),
            }
        }
        _ => match (&head.trailing, head.trailing_summary()) {
            (Some(TrailingValue::Text(_)), Some(text)) => format!("\"{text}\""),
            (_, Some(trailing)) => format!("{} descriptor: {trailing}", head.name),
            (_, None) => format!("{} descriptor", head.name),
        },
    }
}

fn packet_group(packet: &Packet) -> DetailGroup {
    let header: &PacketHeader = packet.header();
    let mut entries = vec![
        text("Type", packet.kind_name()),
        text("Timestamp", format!("{} us", header.timestamp.as_micros())),
    ];
    if let Some(bus) = header.bus_number {
        entries.push(text("Bus", bus.to_string()));
    }
    if let Some(address) = header.device_address {
        entries.push(text("Device address", address.to_string()));
    }
    if let Some(endpoint) = header.endpoint_number {
        entries.push(text("Endpoint", endpoint.to_string()));
    }
    if let Some(direction) = header.direction {
        entries.push(text("Direction", direction.name()));
    }
    if let Some(data) = &header.data {
        entries.push(text("Length", data.len().to_string()));
    }
    group("Packet", entries)
}

fn transaction_group(
    token: &str,
    data_pid: Option<super::Pid>,
    handshake: Option<super::Pid>,
    sequence_error: Option<bool>,
) -> DetailGroup {
    let mut entries = vec![text("Token", token)];
    if let Some(pid) = data_pid {
        entries.push(text("Data PID", pid.name()));
    }
    entries.push(text("Handshake", handshake.map_or("none", |pid| pid.name())));
    if let Some(sequence_error) = sequence_error {
        entries.push(text("Sequence error", if sequence_error { "yes" } else { "no" }));
    }
    group("Transaction", entries)
}

fn setup_group(setup: &SetupPacket) -> DetailGroup {
    let direction = match setup.request_direction {
        Direction::In => "device-to-host",
        Direction::Out => "host-to-device",
    };
    group(
        "Setup",
        vec![
            table(
                format!("bmRequestType: 0x{:02x}", setup.request_type_byte()),
                vec![
                    text("Direction", direction),
                    text("Type", setup.request_type.name()),
                    text("Recipient", setup.recipient.name()),
                ],
            ),
            text(
                "bRequest",
                format!("{} ({})", setup.request_number, setup.request_name()),
            ),
            text("wValue", format!("0x{:04x}", setup.value)),
            text("wIndex", format!("0x{:04x}", setup.index)),
            text("wLength", setup.request_length.to_string()),
        ],
    )
}

fn standard_group(request: &StandardRequest) -> DetailGroup {
    let entries = match request.kind {
        StandardRequestKind::GetDescriptor {
            descriptor_number,
            descriptor_index,
            language_id,
        } => vec![
            text(
                "Descriptor type",
                format!("{descriptor_number} ({})", descriptor_type_name(descriptor_number)),
            ),
            text("Descriptor index", descriptor_index.to_string()),
            text("Language ID", format!("0x{language_id:04x}")),
        ],
        StandardRequestKind::SetDescriptor {
            descriptor_number,
            descriptor_index,
        } => vec![
            text(
                "Descriptor type",
                format!("{descriptor_number} ({})", descriptor_type_name(descriptor_number)),
            ),
            text("Descriptor index", descriptor_index.to_string()),
        ],
        StandardRequestKind::ClearFeature { feature_selector }
        | StandardRequestKind::SetFeature { feature_selector } => {
            vec![text("Feature selector", feature_selector.to_string())]
        }
        StandardRequestKind::SetAddress { new_address } => vec![text("New address", new_address.to_string())],
        StandardRequestKind::SetConfiguration { configuration_number } => {
            vec![text("Configuration", configuration_number.to_string())]
        }
        StandardRequestKind::GetInterface { interface } => vec![text("Interface", interface.to_string())],
        StandardRequestKind::SetInterface {
            interface,
            alternate_setting,
        } => vec![
            text("Interface", interface.to_string()),
            text("Alternate setting", alternate_setting.to_string()),
        ],
        StandardRequestKind::SynchFrame { endpoint } => vec![text("Endpoint", format!("0x{endpoint:02x}"))],
        StandardRequestKind::GetStatus | StandardRequestKind::GetConfiguration => Vec::new(),
    };
    group(format!("Standard request: {}", request.name), entries)
}

fn descriptor_fields(decoded: &DecodedDescriptor) -> Vec<DetailEntry> {
    let mut entries: Vec<DetailEntry> = decoded
        .fields
        .iter()
        .map(|field| text(format!("{} ({})", field.label, field.name), field.display.clone()))
        .collect();
    if let Some(trailing) = decoded.trailing_summary() {
        entries.push(text("Payload", trailing));
    }
    if decoded.truncated {
        entries.push(text("Truncated", "yes"));
    }
    entries
}

fn descriptor_groups(parsed: &ParsedDescriptor) -> Vec<DetailGroup> {
    let mut groups = vec![group(
        format!("{} descriptor", parsed.head.name),
        descriptor_fields(&parsed.head),
    )];
    for subordinate in &parsed.subordinates {
        let entries = match &subordinate.decoded {
            Some(decoded) => descriptor_fields(decoded),
            None => vec![text("Raw", hex::encode(&subordinate.raw))],
        };
        groups.push(group(subordinate.description.clone(), entries));
    }
    groups
}
