use super::bus::MalformedPacket;
use super::pid::Pid;
use super::setup::{SetupError, SetupPacket};
use super::types::{Direction, Style};
use super::{Packet, PacketHeader};

/// Token, optional data and optional handshake on one pipe.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub header: PacketHeader,
    pub token: Pid,
    pub data_pid: Option<Pid>,
    pub handshake: Option<Pid>,
    pub sequence_error: bool,
}

impl Transaction {
    /// Builds a transaction from a token-led run of bus packets.
    ///
    /// The data stage is only taken from a complete three-packet run; a run
    /// that does not start with a token cannot form a transaction.
    pub fn from_packets(packets: Vec<Packet>, sequence_error: bool) -> Result<Self, MalformedPacket> {
        let token = match packets.first() {
            Some(Packet::Token(token)) => token.pid,
            _ => {
                return Err(MalformedPacket::from_packets(
                    packets,
                    "transaction does not start with a token",
                ));
            }
        };
        let handshake = match packets.last() {
            Some(Packet::Handshake(handshake)) => Some(handshake.pid),
            _ => None,
        };
        let (data, data_pid) = match packets.as_slice() {
            [_, Packet::Data(data), _] => (data.header.data.clone(), Some(data.pid)),
            _ => (None, None),
        };

        let mut header = packets[0].header().addressing();
        header.data = data;
        if sequence_error {
            header.style = Style::Exceptional;
        }
        header.subordinate_packets = packets;
        Ok(Self {
            header,
            token,
            data_pid,
            handshake,
            sequence_error,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetupTransaction {
    pub header: PacketHeader,
    pub token: Pid,
    pub data_pid: Option<Pid>,
    pub handshake: Option<Pid>,
    pub setup: SetupPacket,
    pub stalled: bool,
}

impl SetupTransaction {
    pub fn from_transaction(transaction: Transaction) -> Result<Self, MalformedPacket> {
        let parsed = match transaction.header.data.as_deref() {
            Some(data) => SetupPacket::parse(data),
            None => Err(SetupError::Missing),
        };
        let setup = match parsed {
            Ok(setup) => setup,
            Err(err) => {
                return Err(MalformedPacket::new(
                    transaction.header,
                    Some(transaction.token),
                    err.to_string(),
                ));
            }
        };
        let stalled = transaction.data_pid == Some(Pid::Stall) || transaction.handshake == Some(Pid::Stall);
        let mut header = transaction.header;
        header.direction = Some(Direction::Out);
        if stalled {
            header.style = Style::Exceptional;
        }
        Ok(Self {
            header,
            token: transaction.token,
            data_pid: transaction.data_pid,
            handshake: transaction.handshake,
            setup,
            stalled,
        })
    }

    /// Synthesizes a setup stage from already-decoded request fields.
    pub fn from_setup(mut header: PacketHeader, setup: SetupPacket, handshake: Pid) -> Self {
        header.direction = Some(Direction::Out);
        header.endpoint_number.get_or_insert(0);
        header.data = Some(setup.to_bytes().to_vec());
        Self {
            header,
            token: Pid::Setup,
            data_pid: Some(Pid::Data0),
            handshake: Some(handshake),
            setup,
            stalled: handshake == Pid::Stall,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataTransaction {
    pub header: PacketHeader,
    pub token: Pid,
    pub data_pid: Option<Pid>,
    pub handshake: Option<Pid>,
}

impl DataTransaction {
    pub fn from_transaction(transaction: Transaction) -> Self {
        let mut header = transaction.header;
        header.direction = header.direction.or(transaction.token.direction());
        Self {
            header,
            token: transaction.token,
            data_pid: transaction.data_pid,
            handshake: transaction.handshake,
        }
    }

    pub fn is_acked(&self) -> bool {
        self.handshake == Some(Pid::Ack)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::packet::bus::{DataPacket, HandshakePacket, RawPacket, TokenPacket};

    fn token(pid: Pid, address: u8, endpoint: u8) -> Packet {
        let first = address | ((endpoint & 1) << 7);
        let second = endpoint >> 1;
        let raw = RawPacket::new(Duration::from_micros(10), pid, vec![first, second]);
        Packet::Token(TokenPacket::from_raw(raw).unwrap())
    }

    fn data(pid: Pid, payload: &[u8]) -> Packet {
        let mut bytes = payload.to_vec();
        bytes.extend_from_slice(&[0, 0]);
        let raw = RawPacket::new(Duration::from_micros(11), pid, bytes);
        Packet::Data(DataPacket::from_raw(raw).unwrap())
    }

    fn handshake(pid: Pid) -> Packet {
        let raw = RawPacket::new(Duration::from_micros(12), pid, Vec::new());
        Packet::Handshake(HandshakePacket::from_raw(raw).unwrap())
    }

    #[test]
    fn three_packet_transaction_takes_middle_data() {
        let packets = vec![token(Pid::In, 3, 1), data(Pid::Data1, b"abc"), handshake(Pid::Ack)];
        let transaction = Transaction::from_packets(packets, false).unwrap();
        assert_eq!(transaction.token, Pid::In);
        assert_eq!(transaction.data_pid, Some(Pid::Data1));
        assert_eq!(transaction.handshake, Some(Pid::Ack));
        assert_eq!(transaction.header.data.as_deref(), Some(&b"abc"[..]));
        assert_eq!(transaction.header.device_address, Some(3));
        assert_eq!(transaction.header.endpoint_number, Some(1));
        assert_eq!(transaction.header.timestamp, Duration::from_micros(10));
        assert_eq!(transaction.header.subordinate_packets.len(), 3);
    }

    #[test]
    fn two_packet_transaction_has_no_data() {
        let packets = vec![token(Pid::In, 3, 1), handshake(Pid::Nak)];
        let transaction = Transaction::from_packets(packets, false).unwrap();
        assert_eq!(transaction.data_pid, None);
        assert_eq!(transaction.header.data, None);
        assert_eq!(transaction.handshake, Some(Pid::Nak));
    }

    #[test]
    fn tokenless_run_is_malformed() {
        let err = Transaction::from_packets(vec![handshake(Pid::Ack)], true).unwrap_err();
        assert_eq!(err.pid, Some(Pid::Ack));
        assert_eq!(err.header.subordinate_packets.len(), 1);
    }

    #[test]
    fn setup_transaction_parses_payload() {
        let packets = vec![
            token(Pid::Setup, 0, 0),
            data(Pid::Data0, &[0x80, 0x06, 0x00, 0x01, 0x00, 0x00, 0x40, 0x00]),
            handshake(Pid::Ack),
        ];
        let transaction = Transaction::from_packets(packets, false).unwrap();
        let setup = SetupTransaction::from_transaction(transaction).unwrap();
        assert_eq!(setup.setup.request_length, 0x40);
        assert_eq!(setup.setup.request_direction, Direction::In);
        assert!(!setup.stalled);
    }

    #[test]
    fn short_setup_payload_is_malformed() {
        let packets = vec![token(Pid::Setup, 0, 0), data(Pid::Data0, &[0x80, 0x06]), handshake(Pid::Ack)];
        let transaction = Transaction::from_packets(packets, false).unwrap();
        let err = SetupTransaction::from_transaction(transaction).unwrap_err();
        assert_eq!(err.pid, Some(Pid::Setup));
        assert_eq!(err.header.subordinate_packets.len(), 3);
    }
}
