use log::{debug, warn};

use super::{Decoder, DecoderContext, Outcome};
use crate::descriptor::{decode_with_subordinates, schema_for_request};
use crate::packet::setup::{
    CLEAR_FEATURE, GET_CONFIGURATION, GET_DESCRIPTOR, GET_INTERFACE, GET_STATUS, SET_ADDRESS,
    SET_CONFIGURATION, SET_DESCRIPTOR, SET_FEATURE, SET_INTERFACE, SYNCH_FRAME,
};
use crate::packet::{
    DescriptorPayload, DescriptorRequest, Packet, Recipient, RequestType, SetupPacket, StandardRequest,
    StandardRequestKind,
};

struct StandardRequestEntry {
    number: u8,
    name: &'static str,
    recipients: &'static [Recipient],
    derive: fn(&SetupPacket) -> StandardRequestKind,
}

const ANY_TARGET: &[Recipient] = &[Recipient::Device, Recipient::Interface, Recipient::Endpoint];
const DEVICE: &[Recipient] = &[Recipient::Device];
const INTERFACE: &[Recipient] = &[Recipient::Interface];
const ENDPOINT: &[Recipient] = &[Recipient::Endpoint];
// Class descriptors such as HID reports are fetched from the interface.
const DESCRIPTOR_TARGET: &[Recipient] = &[Recipient::Device, Recipient::Interface];

fn split_descriptor_value(value: u16) -> (u8, u8) {
    ((value >> 8) as u8, (value & 0xFF) as u8)
}

static STANDARD_REQUESTS: &[StandardRequestEntry] = &[
    StandardRequestEntry {
        number: GET_STATUS,
        name: "GET STATUS",
        recipients: ANY_TARGET,
        derive: |_| StandardRequestKind::GetStatus,
    },
    StandardRequestEntry {
        number: CLEAR_FEATURE,
        name: "CLEAR FEATURE",
        recipients: ANY_TARGET,
        derive: |setup| StandardRequestKind::ClearFeature {
            feature_selector: setup.value,
        },
    },
    StandardRequestEntry {
        number: SET_FEATURE,
        name: "SET FEATURE",
        recipients: ANY_TARGET,
        derive: |setup| StandardRequestKind::SetFeature {
            feature_selector: setup.value,
        },
    },
    StandardRequestEntry {
        number: SET_ADDRESS,
        name: "SET ADDRESS",
        recipients: DEVICE,
        derive: |setup| StandardRequestKind::SetAddress {
            new_address: setup.value,
        },
    },
    StandardRequestEntry {
        number: GET_DESCRIPTOR,
        name: "GET DESCRIPTOR",
        recipients: DESCRIPTOR_TARGET,
        derive: |setup| {
            let (descriptor_number, descriptor_index) = split_descriptor_value(setup.value);
            StandardRequestKind::GetDescriptor {
                descriptor_number,
                descriptor_index,
                language_id: setup.index,
            }
        },
    },
    StandardRequestEntry {
        number: SET_DESCRIPTOR,
        name: "SET DESCRIPTOR",
        recipients: DEVICE,
        derive: |setup| {
            let (descriptor_number, descriptor_index) = split_descriptor_value(setup.value);
            StandardRequestKind::SetDescriptor {
                descriptor_number,
                descriptor_index,
            }
        },
    },
    StandardRequestEntry {
        number: GET_CONFIGURATION,
        name: "GET CONFIGURATION",
        recipients: DEVICE,
        derive: |_| StandardRequestKind::GetConfiguration,
    },
    StandardRequestEntry {
        number: SET_CONFIGURATION,
        name: "SET CONFIGURATION",
        recipients: DEVICE,
        derive: |setup| StandardRequestKind::SetConfiguration {
            configuration_number: setup.value,
        },
    },
    StandardRequestEntry {
        number: GET_INTERFACE,
        name: "GET INTERFACE",
        recipients: INTERFACE,
        derive: |setup| StandardRequestKind::GetInterface { interface: setup.index },
    },
    StandardRequestEntry {
        number: SET_INTERFACE,
        name: "SET INTERFACE",
        recipients: INTERFACE,
        derive: |setup| StandardRequestKind::SetInterface {
            interface: setup.index,
            alternate_setting: setup.value,
        },
    },
    StandardRequestEntry {
        number: SYNCH_FRAME,
        name: "SYNCH FRAME",
        recipients: ENDPOINT,
        derive: |setup| StandardRequestKind::SynchFrame { endpoint: setup.index },
    },
];

fn lookup(setup: &SetupPacket) -> Option<&'static StandardRequestEntry> {
    STANDARD_REQUESTS
        .iter()
        .find(|entry| entry.number == setup.request_number && entry.recipients.contains(&setup.recipient))
}

/// Names standard control requests and derives their request-specific
/// fields.
#[derive(Debug, Default)]
pub struct StandardRequestSpecializer;

impl Decoder for StandardRequestSpecializer {
    fn name(&self) -> &'static str {
        "standard-request-specializer"
    }

    fn can_handle(&self, packet: &Packet) -> bool {
        matches!(packet, Packet::ControlTransfer(transfer) if transfer.setup.request_type == RequestType::Standard)
    }

    fn consume(&mut self, packet: Packet, _ctx: &mut DecoderContext) -> Outcome {
        let transfer = match packet {
            Packet::ControlTransfer(transfer) => transfer,
            other => return Outcome::NotHandled(other),
        };
        let Some(entry) = lookup(&transfer.setup) else {
            debug!(
                "no standard request #{} for recipient {}",
                transfer.setup.request_number, transfer.setup.recipient
            );
            return Outcome::NotHandled(Packet::ControlTransfer(transfer));
        };
        let kind = (entry.derive)(&transfer.setup);
        Outcome::Consumed(vec![Packet::StandardRequest(StandardRequest {
            transfer,
            name: entry.name,
            kind,
        })])
    }
}

/// Attaches the decoded descriptor to GET_DESCRIPTOR requests and records
/// what it teaches about the device.
#[derive(Debug, Default)]
pub struct DescriptorRequestSpecializer;

impl Decoder for DescriptorRequestSpecializer {
    fn name(&self) -> &'static str {
        "descriptor-request-specializer"
    }

    fn can_handle(&self, packet: &Packet) -> bool {
        matches!(packet, Packet::StandardRequest(request) if request.descriptor_target().is_some())
    }

    fn consume(&mut self, packet: Packet, ctx: &mut DecoderContext) -> Outcome {
        let request = match packet {
            Packet::StandardRequest(request) => request,
            other => return Outcome::NotHandled(other),
        };
        let Some((number, index)) = request.descriptor_target() else {
            return Outcome::NotHandled(Packet::StandardRequest(request));
        };
        let Some(schema) = schema_for_request(number, index) else {
            return Outcome::NotHandled(Packet::StandardRequest(request));
        };

        let payload = match request.transfer.header.data.as_deref() {
            None | Some([]) => DescriptorPayload::Missing,
            Some(data) => match decode_with_subordinates(data, schema) {
                Ok(parsed) => {
                    if let Some(address) = request.transfer.header.device_address {
                        ctx.devices.record_descriptor(address, index, &parsed);
                    }
                    DescriptorPayload::Parsed(parsed)
                }
                Err(err) => {
                    warn!("{} descriptor did not decode: {err}", schema.name);
                    DescriptorPayload::Failed(err.to_string())
                }
            },
        };

        Outcome::Consumed(vec![Packet::DescriptorRequest(DescriptorRequest {
            request,
            descriptor_name: schema.name,
            payload,
        })])
    }
}
