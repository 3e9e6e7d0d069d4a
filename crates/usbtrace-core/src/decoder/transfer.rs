use std::collections::BTreeMap;
use std::time::Duration;

use log::debug;

use super::{Decoder, DecoderContext, Outcome};
use crate::packet::{DataTransfer, Packet, Pid, StatusTransfer, TransferType};

/// Gap after which a non-control pipe starts a new transfer.
pub const DISCONTINUITY_GAP: Duration = Duration::from_millis(10);

/// Without max-packet-size metadata, any payload that is not a multiple of
/// this is taken to be a short packet.
const SHORT_PACKET_GRANULARITY: usize = 8;

/// A logical pipe. Both directions of endpoint 0 share one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct PipeKey {
    device_address: Option<u8>,
    endpoint_address: u8,
}

impl PipeKey {
    fn for_packet(packet: &Packet) -> Self {
        let header = packet.header();
        let endpoint_address = match header.endpoint_number {
            None | Some(0) => 0,
            Some(_) => header.endpoint_address().unwrap_or_default(),
        };
        Self {
            device_address: header.device_address,
            endpoint_address,
        }
    }

    fn is_control(self) -> bool {
        self.endpoint_address == 0
    }
}

#[derive(Debug, Default)]
struct Pipe {
    buffer: Vec<Packet>,
    /// Control pipes only: the next transfer closes the request.
    expect_status: bool,
}

/// Collects setup and data transactions into transfers, per pipe.
#[derive(Debug)]
pub struct TransferGrouper {
    collate: bool,
    pipes: BTreeMap<PipeKey, Pipe>,
}

impl Default for TransferGrouper {
    fn default() -> Self {
        Self::new(true)
    }
}

impl TransferGrouper {
    /// With `collate` off, every acknowledged IN/OUT transaction is a
    /// transfer of its own.
    pub fn new(collate: bool) -> Self {
        Self {
            collate,
            pipes: BTreeMap::new(),
        }
    }

    fn starts_new_transfer(packet: &Packet, key: PipeKey, pipe: &Pipe) -> bool {
        if matches!(packet, Packet::SetupTransaction(_)) {
            return true;
        }
        match pipe.buffer.first() {
            Some(first) => key.is_control() && first.direction() != packet.direction(),
            None => false,
        }
    }

    fn seems_discontinuous(packet: &Packet, key: PipeKey, pipe: &Pipe) -> bool {
        if key.is_control() {
            return false;
        }
        match pipe.buffer.last() {
            Some(last) => packet.timestamp().saturating_sub(last.timestamp()) > DISCONTINUITY_GAP,
            None => false,
        }
    }

    fn concludes_transfer(&self, packet: &Packet) -> bool {
        if matches!(packet, Packet::SetupTransaction(_)) {
            return true;
        }
        let handshake = packet.handshake();
        if let (Some(data), Some(Pid::Ack)) = (packet.data(), handshake) {
            if data.is_empty() || data.len() % SHORT_PACKET_GRANULARITY != 0 {
                return true;
            }
        }
        if !self.collate {
            let token = packet.pid();
            if matches!(token, Some(Pid::In | Pid::Out)) && handshake == Some(Pid::Ack) {
                return true;
            }
            if token == Some(Pid::Out) && handshake == Some(Pid::Nyet) {
                return true;
            }
        }
        false
    }

    fn flush_pipe(key: PipeKey, pipe: &mut Pipe, ctx: &DecoderContext) -> Vec<Packet> {
        let mut packets = std::mem::take(&mut pipe.buffer);
        if packets.is_empty() {
            return Vec::new();
        }

        if let [Packet::SetupTransaction(_)] = packets.as_slice() {
            if let Some(Packet::SetupTransaction(setup)) = packets.pop() {
                pipe.expect_status = setup.setup.request_length == 0;
                return vec![Packet::SetupTransfer(setup)];
            }
        }

        let transfer_type = if key.is_control() {
            Some(TransferType::Control)
        } else {
            key.device_address
                .and_then(|address| ctx.devices.transfer_type(address, key.endpoint_address))
        };

        let mut status = None;
        if key.is_control() {
            let first_direction = packets[0].direction();
            let direction_changed = packets.len() > 1
                && packets.last().map(Packet::direction) != Some(first_direction);
            if direction_changed {
                status = packets.pop();
            } else if pipe.expect_status && packets.len() == 1 {
                status = packets.pop();
            }
            pipe.expect_status = status.is_none();
        }

        let mut emitted = Vec::with_capacity(2);
        if !packets.is_empty() {
            debug!(
                "transfer on {:?}/{:#04x}: {} transaction(s)",
                key.device_address,
                key.endpoint_address,
                packets.len()
            );
            emitted.push(DataTransfer::from_transactions(packets).into_packet(transfer_type));
        }
        if let Some(status) = status {
            emitted.push(Packet::StatusTransfer(StatusTransfer::from_transaction(status)));
        }
        emitted
    }
}

impl Decoder for TransferGrouper {
    fn name(&self) -> &'static str {
        "transfer-grouper"
    }

    fn can_handle(&self, packet: &Packet) -> bool {
        matches!(packet, Packet::SetupTransaction(_) | Packet::DataTransaction(_))
    }

    fn consume(&mut self, packet: Packet, ctx: &mut DecoderContext) -> Outcome {
        let key = PipeKey::for_packet(&packet);
        let concludes = self.concludes_transfer(&packet);
        let pipe = self.pipes.entry(key).or_default();
        let mut emitted = Vec::new();

        if Self::starts_new_transfer(&packet, key, pipe) || Self::seems_discontinuous(&packet, key, pipe) {
            emitted.extend(Self::flush_pipe(key, pipe, ctx));
        }
        pipe.buffer.push(packet);
        if concludes {
            emitted.extend(Self::flush_pipe(key, pipe, ctx));
        }
        Outcome::Consumed(emitted)
    }

    fn flush(&mut self, ctx: &mut DecoderContext) -> Vec<Packet> {
        let mut emitted = Vec::new();
        for (key, pipe) in &mut self.pipes {
            emitted.extend(Self::flush_pipe(*key, pipe, ctx));
        }
        emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::testutil::{at, bare_transaction, run, run_with, setup_bytes, transaction};
    use crate::decoder::TransactionSpecializer;

    fn specialized(packets: Vec<Packet>) -> Vec<Packet> {
        run(&mut TransactionSpecializer, packets)
    }

    fn data_transfers(out: &[Packet]) -> Vec<&Packet> {
        out.iter()
            .filter(|packet| matches!(packet, Packet::DataTransfer(_) | Packet::BulkTransfer(_)))
            .collect()
    }

    #[test]
    fn bulk_in_stream_ends_at_zero_length_packet() {
        let mut packets: Vec<Packet> = (0..3u64)
            .map(|n| transaction(n * 100, Pid::In, 2, 1, &[n as u8; 64], Pid::Ack))
            .collect();
        packets.push(transaction(400, Pid::In, 2, 1, &[], Pid::Ack));

        let out = run(&mut TransferGrouper::default(), specialized(packets));
        assert_eq!(out.len(), 1);
        let mut expected = vec![0u8; 64];
        expected.extend_from_slice(&[1u8; 64]);
        expected.extend_from_slice(&[2u8; 64]);
        assert!(matches!(out[0], Packet::DataTransfer(_)));
        assert_eq!(out[0].data(), Some(expected.as_slice()));
        assert_eq!(out[0].subordinates().len(), 4);
    }

    #[test]
    fn gap_over_ten_ms_splits_transfers() {
        let packets = vec![
            transaction(0, Pid::In, 2, 1, &[0xAA; 8], Pid::Ack),
            transaction(10_001 + 2, Pid::In, 2, 1, &[0xBB; 8], Pid::Ack),
        ];
        let out = run(&mut TransferGrouper::default(), specialized(packets));
        assert_eq!(data_transfers(&out).len(), 2);
        assert_eq!(out[0].data(), Some(&[0xAA; 8][..]));
        assert_eq!(out[1].data(), Some(&[0xBB; 8][..]));
    }

    #[test]
    fn gap_of_exactly_ten_ms_continues_transfer() {
        let gap = DISCONTINUITY_GAP.as_micros() as u64;
        let packets = vec![
            transaction(0, Pid::In, 2, 1, &[0xAA; 8], Pid::Ack),
            transaction(gap, Pid::In, 2, 1, &[0xBB; 8], Pid::Ack),
        ];
        let out = run(&mut TransferGrouper::default(), specialized(packets));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].subordinates().len(), 2);
        assert_eq!(out[0].data().map(<[u8]>::len), Some(16));
    }

    #[test]
    fn interleaved_pipes_stay_separate() {
        let packets = vec![
            transaction(0, Pid::In, 2, 1, &[1; 8], Pid::Ack),
            transaction(10, Pid::Out, 2, 2, &[2; 3], Pid::Ack),
            transaction(20, Pid::In, 2, 1, &[3; 2], Pid::Ack),
        ];
        let out = run(&mut TransferGrouper::default(), specialized(packets));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].data(), Some(&[2u8; 3][..]));
        assert_eq!(out[1].data(), Some(&[1, 1, 1, 1, 1, 1, 1, 1, 3, 3][..]));
    }

    #[test]
    fn nacked_data_is_not_collected() {
        let packets = vec![
            transaction(0, Pid::In, 2, 1, &[9; 8], Pid::Nak),
            transaction(10, Pid::In, 2, 1, &[1; 4], Pid::Ack),
        ];
        let out = run(&mut TransferGrouper::default(), specialized(packets));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].data(), Some(&[1u8; 4][..]));
    }

    #[test]
    fn non_collating_mode_ends_on_every_ack() {
        let packets = vec![
            transaction(0, Pid::In, 2, 1, &[1; 8], Pid::Ack),
            transaction(10, Pid::In, 2, 1, &[2; 8], Pid::Ack),
            bare_transaction(20, Pid::Out, 2, 3, Pid::Nyet),
        ];
        let out = run(&mut TransferGrouper::new(false), specialized(packets));
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn control_stages_split_into_setup_data_and_status() {
        let packets = vec![
            transaction(0, Pid::Setup, 5, 0, &setup_bytes(0x80, 6, 0x0100, 0, 64), Pid::Ack),
            transaction(10, Pid::In, 5, 0, &[0x12; 8], Pid::Ack),
            transaction(20, Pid::In, 5, 0, &[0x34; 8], Pid::Ack),
            transaction(30, Pid::Out, 5, 0, &[], Pid::Ack),
        ];
        let out = run(&mut TransferGrouper::default(), specialized(packets));
        let kinds: Vec<_> = out.iter().map(Packet::kind_name).collect();
        assert_eq!(kinds, ["SetupTransfer", "DataTransfer", "StatusTransfer"]);
        assert_eq!(out[1].data().map(<[u8]>::len), Some(16));
    }

    #[test]
    fn endpoint_types_come_from_device_model() {
        use crate::descriptor::{decode_with_subordinates, layout};

        let mut bytes = vec![0x09, 0x02, 0x19, 0x00, 0x01, 0x01, 0x00, 0x80, 0x32];
        bytes.extend_from_slice(&[0x09, 0x04, 0x00, 0x00, 0x01, 0x03, 0x01, 0x01, 0x00]);
        bytes.extend_from_slice(&[0x07, 0x05, 0x81, 0x03, 0x08, 0x00, 0x0A]);
        let config = decode_with_subordinates(&bytes, &layout::CONFIGURATION).unwrap();
        let mut ctx = DecoderContext::default();
        ctx.devices.record_descriptor(2, 0, &config);

        let packets = specialized(vec![transaction(0, Pid::In, 2, 1, &[1, 2, 3], Pid::Ack)]);
        let out = run_with(&mut TransferGrouper::default(), packets, &mut ctx);
        assert!(matches!(out[0], Packet::InterruptTransfer(_)));
        assert_eq!(out[0].timestamp(), at(0));
    }
}
