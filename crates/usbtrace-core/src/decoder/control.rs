use std::collections::BTreeMap;

use log::warn;

use super::{Decoder, DecoderContext, Outcome};
use crate::packet::{ControlTransfer, MalformedPacket, Packet, Pid};

/// Assembles setup, data and status transfers on endpoint 0 into control
/// requests, per device.
#[derive(Debug, Default)]
pub struct ControlRequestGrouper {
    pipes: BTreeMap<Option<u8>, Vec<Packet>>,
}

impl ControlRequestGrouper {
    fn emit(pieces: Vec<Packet>) -> Option<Packet> {
        let count = pieces.len();
        let mut pieces = pieces.into_iter();
        let setup = match pieces.next()? {
            Packet::SetupTransfer(setup) if count > 1 => setup,
            head => {
                let mut all = vec![head];
                all.extend(pieces);
                warn!("incomplete control request: {count} piece(s) without a usable setup stage");
                return Some(Packet::Malformed(MalformedPacket::from_packets(
                    all,
                    "incomplete control request",
                )));
            }
        };
        let transfer = match (pieces.next(), pieces.next()) {
            (Some(second), None) if setup.setup.request_length > 0 => {
                ControlTransfer::from_subordinates(setup, Some(second), None)
            }
            (Some(second), None) => ControlTransfer::from_subordinates(setup, None, Some(second)),
            (data, status) => ControlTransfer::from_subordinates(setup, data, status),
        };
        Some(Packet::ControlTransfer(transfer))
    }
}

impl Decoder for ControlRequestGrouper {
    fn name(&self) -> &'static str {
        "control-request-grouper"
    }

    fn can_handle(&self, packet: &Packet) -> bool {
        matches!(
            packet,
            Packet::SetupTransfer(_) | Packet::DataTransfer(_) | Packet::StatusTransfer(_)
        ) && packet.endpoint_number() == Some(0)
    }

    fn consume(&mut self, packet: Packet, _ctx: &mut DecoderContext) -> Outcome {
        let pieces = self.pipes.entry(packet.device_address()).or_default();
        let mut emitted = Vec::new();

        let head_is_setup = matches!(pieces.first(), Some(Packet::SetupTransfer(_)));
        if matches!(packet, Packet::SetupTransfer(_)) || (!pieces.is_empty() && !head_is_setup) {
            emitted.extend(Self::emit(std::mem::take(pieces)));
        }

        let stalled = packet.handshake() == Some(Pid::Stall);
        pieces.push(packet);

        let complete = match pieces.as_slice() {
            [Packet::SetupTransfer(setup), _] => stalled || setup.setup.request_length == 0,
            [_, _, _] => true,
            _ => false,
        };
        if complete {
            emitted.extend(Self::emit(std::mem::take(pieces)));
        }
        Outcome::Consumed(emitted)
    }

    fn flush(&mut self, _ctx: &mut DecoderContext) -> Vec<Packet> {
        self.pipes
            .values_mut()
            .filter_map(|pieces| Self::emit(std::mem::take(pieces)))
            .collect()
    }
}
