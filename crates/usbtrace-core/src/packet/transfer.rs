use super::pid::Pid;
use super::setup::SetupPacket;
use super::transaction::SetupTransaction;
use super::types::{Style, TransferType};
use super::{Packet, PacketHeader};

/// Logically grouped data-carrying transactions on one pipe.
#[derive(Debug, Clone, PartialEq)]
pub struct DataTransfer {
    pub header: PacketHeader,
    pub handshake: Option<Pid>,
}

impl DataTransfer {
    /// Concatenates the payloads of every ACKed member in arrival order.
    /// Addressing comes from the first member, the handshake from the last.
    pub fn from_transactions(transactions: Vec<Packet>) -> Self {
        let mut data = Vec::new();
        for transaction in &transactions {
            if transaction.handshake() == Some(Pid::Ack) {
                if let Some(payload) = transaction.header().data.as_deref() {
                    data.extend_from_slice(payload);
                }
            }
        }
        let handshake = transactions.last().and_then(Packet::handshake);
        let mut header = transactions
            .first()
            .map(|first| first.header().addressing())
            .unwrap_or_default();
        header.data = Some(data);
        if handshake == Some(Pid::Stall) {
            header.style = Style::Exceptional;
        }
        header.subordinate_packets = transactions;
        Self { header, handshake }
    }

    /// Wraps the transfer in the variant matching its declared type.
    pub fn into_packet(self, transfer_type: Option<TransferType>) -> Packet {
        match transfer_type {
            Some(TransferType::Bulk) => Packet::BulkTransfer(self),
            Some(TransferType::Interrupt) => Packet::InterruptTransfer(self),
            Some(TransferType::Isochronous) => Packet::IsochronousTransfer(self),
            Some(TransferType::Control) | None => Packet::DataTransfer(self),
        }
    }
}

/// The handshake-only stage that closes a control request.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusTransfer {
    pub header: PacketHeader,
    pub handshake: Option<Pid>,
}

impl StatusTransfer {
    pub fn from_transaction(transaction: Packet) -> Self {
        let handshake = transaction.handshake();
        let mut header = transaction.header().addressing();
        header.data = transaction.header().data.clone();
        header.subordinate_packets = vec![transaction];
        Self { header, handshake }
    }
}

/// Part of a transfer whose other half was never observed.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferFragment {
    pub header: PacketHeader,
    pub handshake: Pid,
    pub transfer_type: TransferType,
}

/// A complete control request: setup, optional data stage and optional
/// status stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlTransfer {
    pub header: PacketHeader,
    pub setup: SetupPacket,
    pub stalled: bool,
}

impl ControlTransfer {
    pub fn from_subordinates(setup: SetupTransaction, data: Option<Packet>, status: Option<Packet>) -> Self {
        let stalled = [data.as_ref(), status.as_ref()]
            .into_iter()
            .flatten()
            .any(|stage| stage.handshake() == Some(Pid::Stall));

        let mut header = setup.header.addressing();
        header.direction = Some(setup.setup.request_direction);
        header.data = data
            .as_ref()
            .map(|stage| stage.header().data.clone().unwrap_or_default());
        if stalled {
            header.style = Style::Exceptional;
        }

        let request = setup.setup;
        let mut subordinates = vec![Packet::SetupTransfer(setup)];
        subordinates.extend(data);
        subordinates.extend(status);
        header.subordinate_packets = subordinates;

        Self {
            header,
            setup: request,
            stalled,
        }
    }

    pub fn setup_stage(&self) -> Option<&SetupTransaction> {
        match self.header.subordinate_packets.first() {
            Some(Packet::SetupTransfer(setup)) => Some(setup),
            _ => None,
        }
    }
}
