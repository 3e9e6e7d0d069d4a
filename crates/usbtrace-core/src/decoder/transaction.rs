use log::{debug, warn};

use super::{Decoder, DecoderContext, Outcome};
use crate::packet::{DataTransaction, Packet, Pid, SetupTransaction, Transaction};

/// Groups token, data and handshake packets into transactions.
///
/// Bus packets arrive serialized, so a single buffer suffices: a transaction
/// is whatever follows a token up to and including the next handshake.
#[derive(Debug, Default)]
pub struct TransactionGrouper {
    buffer: Vec<Packet>,
}

impl TransactionGrouper {
    fn emit(&mut self, sequence_error: bool) -> Option<Packet> {
        if self.buffer.is_empty() {
            return None;
        }
        let packets = std::mem::take(&mut self.buffer);
        if sequence_error {
            warn!(
                "sequence error: emitting {} packet(s) starting at {:?}",
                packets.len(),
                packets[0].timestamp()
            );
        }
        Some(match Transaction::from_packets(packets, sequence_error) {
            Ok(transaction) => Packet::Transaction(transaction),
            Err(malformed) => Packet::Malformed(malformed),
        })
    }

    fn last_is_token(&self) -> bool {
        matches!(self.buffer.last(), Some(Packet::Token(_)))
    }

    fn first_is_token(&self) -> bool {
        matches!(self.buffer.first(), Some(Packet::Token(_)))
    }
}

impl Decoder for TransactionGrouper {
    fn name(&self) -> &'static str {
        "transaction-grouper"
    }

    fn can_handle(&self, packet: &Packet) -> bool {
        matches!(packet, Packet::Token(_) | Packet::Data(_) | Packet::Handshake(_))
    }

    fn consume(&mut self, packet: Packet, _ctx: &mut DecoderContext) -> Outcome {
        let mut emitted = Vec::new();
        match packet {
            Packet::Token(_) => {
                emitted.extend(self.emit(true));
                self.buffer.push(packet);
            }
            Packet::Data(_) => {
                if self.last_is_token() {
                    self.buffer.push(packet);
                } else {
                    emitted.extend(self.emit(true));
                    self.buffer.push(packet);
                    emitted.extend(self.emit(true));
                }
            }
            Packet::Handshake(_) => {
                let sequence_error = !self.first_is_token();
                if sequence_error {
                    emitted.extend(self.emit(true));
                }
                self.buffer.push(packet);
                emitted.extend(self.emit(sequence_error));
            }
            other => return Outcome::NotHandled(other),
        }
        Outcome::Consumed(emitted)
    }

    fn flush(&mut self, _ctx: &mut DecoderContext) -> Vec<Packet> {
        // A token still waiting for its handshake never completed.
        self.emit(true).into_iter().collect()
    }
}

/// Refines generic transactions into setup and data transactions.
#[derive(Debug, Default)]
pub struct TransactionSpecializer;

impl Decoder for TransactionSpecializer {
    fn name(&self) -> &'static str {
        "transaction-specializer"
    }

    fn can_handle(&self, packet: &Packet) -> bool {
        matches!(packet, Packet::Transaction(_))
    }

    fn consume(&mut self, packet: Packet, _ctx: &mut DecoderContext) -> Outcome {
        let transaction = match packet {
            Packet::Transaction(transaction) => transaction,
            other => return Outcome::NotHandled(other),
        };
        let specialized = match transaction.token {
            Pid::Setup => match SetupTransaction::from_transaction(transaction) {
                Ok(setup) => Packet::SetupTransaction(setup),
                Err(malformed) => {
                    warn!("unreadable setup stage: {}", malformed.reason);
                    Packet::Malformed(malformed)
                }
            },
            Pid::In | Pid::Out => Packet::DataTransaction(DataTransaction::from_transaction(transaction)),
            other => {
                debug!("leaving {other} transaction unspecialized");
                return Outcome::NotHandled(Packet::Transaction(transaction));
            }
        };
        Outcome::Consumed(vec![specialized])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::testutil::{bare_transaction, data, handshake, run, setup_bytes, token, transaction};

    #[test]
    fn token_data_handshake_is_one_transaction() {
        let out = run(
            &mut TransactionGrouper::default(),
            vec![token(0, Pid::In, 4, 2), data(1, Pid::Data0, b"xyz"), handshake(2, Pid::Ack)],
        );
        assert_eq!(out.len(), 1);
        match &out[0] {
            Packet::Transaction(transaction) => {
                assert_eq!(transaction.handshake, Some(Pid::Ack));
                assert_eq!(transaction.data_pid, Some(Pid::Data0));
                assert!(!transaction.sequence_error);
                assert_eq!(transaction.header.data.as_deref(), Some(&b"xyz"[..]));
                assert_eq!(transaction.header.subordinate_packets.len(), 3);
            }
            other => panic!("expected transaction, got {}", other.kind_name()),
        }
    }

    #[test]
    fn token_without_handshake_is_flushed_as_sequence_error() {
        let out = run(
            &mut TransactionGrouper::default(),
            vec![token(0, Pid::In, 4, 2), token(1, Pid::In, 4, 2), handshake(2, Pid::Nak)],
        );
        assert_eq!(out.len(), 2);
        match &out[0] {
            Packet::Transaction(transaction) => {
                assert!(transaction.sequence_error);
                assert_eq!(transaction.handshake, None);
            }
            other => panic!("expected transaction, got {}", other.kind_name()),
        }
        assert!(matches!(&out[1], Packet::Transaction(t) if t.handshake == Some(Pid::Nak) && !t.sequence_error));
    }

    #[test]
    fn stray_data_and_handshake_are_malformed() {
        let out = run(
            &mut TransactionGrouper::default(),
            vec![data(0, Pid::Data1, b"a"), handshake(1, Pid::Ack)],
        );
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(Packet::is_malformed));
        assert_eq!(out[0].subordinates().len(), 1);
    }

    #[test]
    fn setup_transaction_decodes_request() {
        let packet = transaction(0, Pid::Setup, 5, 0, &setup_bytes(0x80, 6, 0x0100, 0, 18), Pid::Ack);
        let out = run(&mut TransactionSpecializer, vec![packet]);
        match &out[0] {
            Packet::SetupTransaction(setup) => {
                assert_eq!(setup.setup.request_number, 6);
                assert_eq!(setup.setup.request_length, 18);
                assert!(!setup.stalled);
            }
            other => panic!("expected setup transaction, got {}", other.kind_name()),
        }
    }

    #[test]
    fn short_setup_payload_is_malformed() {
        let packet = transaction(0, Pid::Setup, 5, 0, &[0x80, 0x06], Pid::Ack);
        let out = run(&mut TransactionSpecializer, vec![packet]);
        assert!(out[0].is_malformed());
    }

    #[test]
    fn ping_is_left_alone() {
        let out = run(
            &mut TransactionSpecializer,
            vec![
                bare_transaction(0, Pid::Ping, 5, 1, Pid::Ack),
                bare_transaction(5, Pid::Out, 5, 1, Pid::Nak),
            ],
        );
        assert!(matches!(out[0], Packet::Transaction(_)));
        assert!(matches!(out[1], Packet::DataTransaction(_)));
    }
}
