use log::warn;

use super::{Decoder, DecoderContext, Outcome};
use crate::packet::{
    DataPacket, HandshakePacket, Packet, Pid, PidCategory, StartOfFrame, TokenPacket,
};

/// Reclassifies raw captures into token, data, handshake and SOF packets.
#[derive(Debug, Default)]
pub struct PidSpecializer;

impl Decoder for PidSpecializer {
    fn name(&self) -> &'static str {
        "pid-specializer"
    }

    fn can_handle(&self, packet: &Packet) -> bool {
        matches!(packet, Packet::Raw(_))
    }

    fn consume(&mut self, packet: Packet, _ctx: &mut DecoderContext) -> Outcome {
        let raw = match packet {
            Packet::Raw(raw) => raw,
            other => return Outcome::NotHandled(other),
        };

        let specialized = match (raw.pid, raw.pid.category()) {
            (Pid::Sof, _) => Ok(Packet::StartOfFrame(StartOfFrame::from_raw(raw))),
            (Pid::Ping, _) | (_, PidCategory::Token) => TokenPacket::from_raw(raw).map(Packet::Token),
            (_, PidCategory::Data) => DataPacket::from_raw(raw).map(Packet::Data),
            (_, PidCategory::Handshake) => HandshakePacket::from_raw(raw).map(Packet::Handshake),
            (_, PidCategory::Special) => return Outcome::NotHandled(Packet::Raw(raw)),
        };

        match specialized {
            Ok(packet) => Outcome::Consumed(vec![packet]),
            Err(malformed) => {
                warn!("malformed packet at {:?}: {}", malformed.header.timestamp, malformed.reason);
                Outcome::Consumed(vec![Packet::Malformed(malformed)])
            }
        }
    }
}
