//! USB packet model.
//!
//! Every representation a packet can take while moving through the decoder
//! chain is one variant of [`Packet`]. Variants are flat structs embedding a
//! shared [`PacketHeader`]; aggregates keep the exact packets they were built
//! from in `subordinate_packets`, so a decoded control request still carries
//! every bus packet that produced it.

pub mod bus;
pub mod display;
pub mod pid;
pub mod request;
pub mod setup;
pub mod transaction;
pub mod transfer;
pub mod types;

use std::time::Duration;

pub use bus::{
    DataPacket, HandshakePacket, MalformedPacket, RawPacket, StartOfFrame, StartOfFrameCollection,
    TokenPacket,
};
pub use display::{DetailEntry, DetailGroup, DetailValue, SummaryFields};
pub use pid::{Pid, PidCategory};
pub use request::{DescriptorPayload, DescriptorRequest, StandardRequest, StandardRequestKind};
pub use setup::{SetupError, SetupPacket};
pub use transaction::{DataTransaction, SetupTransaction, Transaction};
pub use transfer::{ControlTransfer, DataTransfer, StatusTransfer, TransferFragment};
pub use types::{Direction, Recipient, RequestType, Style, TransferType};

/// Fields common to every packet variant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PacketHeader {
    /// Offset from the start of the capture.
    pub timestamp: Duration,
    /// Capture-order number assigned by the source.
    pub sequence: Option<u64>,
    pub bus_number: Option<u16>,
    pub device_address: Option<u8>,
    pub endpoint_number: Option<u8>,
    pub direction: Option<Direction>,
    pub data: Option<Vec<u8>>,
    /// Raw status code reported by the capture source.
    pub status: Option<i32>,
    pub style: Style,
    pub subordinate_packets: Vec<Packet>,
}

impl PacketHeader {
    pub fn at(timestamp: Duration) -> Self {
        Self {
            timestamp,
            ..Self::default()
        }
    }

    /// Copy of the addressing fields, without data, status or subordinates.
    pub fn addressing(&self) -> Self {
        Self {
            timestamp: self.timestamp,
            sequence: self.sequence,
            bus_number: self.bus_number,
            device_address: self.device_address,
            endpoint_number: self.endpoint_number,
            direction: self.direction,
            ..Self::default()
        }
    }

    /// Endpoint address with the direction bit applied.
    pub fn endpoint_address(&self) -> Option<u8> {
        let number = self.endpoint_number?;
        Some(match self.direction {
            Some(direction) => direction.to_endpoint_address(number),
            None => number,
        })
    }

    pub fn data_len(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Raw(RawPacket),
    StartOfFrame(StartOfFrame),
    StartOfFrameCollection(StartOfFrameCollection),
    Token(TokenPacket),
    Data(DataPacket),
    Handshake(HandshakePacket),
    Malformed(MalformedPacket),
    Transaction(Transaction),
    SetupTransaction(SetupTransaction),
    DataTransaction(DataTransaction),
    SetupTransfer(SetupTransaction),
    DataTransfer(DataTransfer),
    BulkTransfer(DataTransfer),
    InterruptTransfer(DataTransfer),
    IsochronousTransfer(DataTransfer),
    StatusTransfer(StatusTransfer),
    TransferFragment(TransferFragment),
    ControlTransfer(ControlTransfer),
    StandardRequest(StandardRequest),
    DescriptorRequest(DescriptorRequest),
}

impl Packet {
    pub fn header(&self) -> &PacketHeader {
        match self {
            Packet::Raw(p) => &p.header,
            Packet::StartOfFrame(p) => &p.header,
            Packet::StartOfFrameCollection(p) => &p.header,
            Packet::Token(p) => &p.header,
            Packet::Data(p) => &p.header,
            Packet::Handshake(p) => &p.header,
            Packet::Malformed(p) => &p.header,
            Packet::Transaction(p) => &p.header,
            Packet::SetupTransaction(p) | Packet::SetupTransfer(p) => &p.header,
            Packet::DataTransaction(p) => &p.header,
            Packet::DataTransfer(p)
            | Packet::BulkTransfer(p)
            | Packet::InterruptTransfer(p)
            | Packet::IsochronousTransfer(p) => &p.header,
            Packet::StatusTransfer(p) => &p.header,
            Packet::TransferFragment(p) => &p.header,
            Packet::ControlTransfer(p) => &p.header,
            Packet::StandardRequest(p) => &p.transfer.header,
            Packet::DescriptorRequest(p) => &p.request.transfer.header,
        }
    }

    pub fn header_mut(&mut self) -> &mut PacketHeader {
        match self {
            Packet::Raw(p) => &mut p.header,
            Packet::StartOfFrame(p) => &mut p.header,
            Packet::StartOfFrameCollection(p) => &mut p.header,
            Packet::Token(p) => &mut p.header,
            Packet::Data(p) => &mut p.header,
            Packet::Handshake(p) => &mut p.header,
            Packet::Malformed(p) => &mut p.header,
            Packet::Transaction(p) => &mut p.header,
            Packet::SetupTransaction(p) | Packet::SetupTransfer(p) => &mut p.header,
            Packet::DataTransaction(p) => &mut p.header,
            Packet::DataTransfer(p)
            | Packet::BulkTransfer(p)
            | Packet::InterruptTransfer(p)
            | Packet::IsochronousTransfer(p) => &mut p.header,
            Packet::StatusTransfer(p) => &mut p.header,
            Packet::TransferFragment(p) => &mut p.header,
            Packet::ControlTransfer(p) => &mut p.header,
            Packet::StandardRequest(p) => &mut p.transfer.header,
            Packet::DescriptorRequest(p) => &mut p.request.transfer.header,
        }
    }

    /// Variant name as shown in reports.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Packet::Raw(_) => "RawPacket",
            Packet::StartOfFrame(_) => "StartOfFrame",
            Packet::StartOfFrameCollection(_) => "StartOfFrameCollection",
            Packet::Token(_) => "TokenPacket",
            Packet::Data(_) => "DataPacket",
            Packet::Handshake(_) => "HandshakePacket",
            Packet::Malformed(_) => "MalformedPacket",
            Packet::Transaction(_) => "Transaction",
            Packet::SetupTransaction(_) => "SetupTransaction",
            Packet::DataTransaction(_) => "DataTransaction",
            Packet::SetupTransfer(_) => "SetupTransfer",
            Packet::DataTransfer(_) => "DataTransfer",
            Packet::BulkTransfer(_) => "BulkTransfer",
            Packet::InterruptTransfer(_) => "InterruptTransfer",
            Packet::IsochronousTransfer(_) => "IsochronousTransfer",
            Packet::StatusTransfer(_) => "StatusTransfer",
            Packet::TransferFragment(_) => "TransferFragment",
            Packet::ControlTransfer(_) => "ControlTransfer",
            Packet::StandardRequest(_) => "StandardRequest",
            Packet::DescriptorRequest(_) => "DescriptorRequest",
        }
    }

    /// The packet's own PID, for bus-level variants and transaction tokens.
    pub fn pid(&self) -> Option<Pid> {
        match self {
            Packet::Raw(p) => Some(p.pid),
            Packet::StartOfFrame(p) => Some(p.pid),
            Packet::Token(p) => Some(p.pid),
            Packet::Data(p) => Some(p.pid),
            Packet::Handshake(p) => Some(p.pid),
            Packet::Malformed(p) => p.pid,
            Packet::Transaction(p) => Some(p.token),
            Packet::SetupTransaction(p) | Packet::SetupTransfer(p) => Some(p.token),
            Packet::DataTransaction(p) => Some(p.token),
            _ => None,
        }
    }

    /// Handshake that concluded this packet, where one applies.
    pub fn handshake(&self) -> Option<Pid> {
        match self {
            Packet::Handshake(p) => Some(p.pid),
            Packet::Transaction(p) => p.handshake,
            Packet::SetupTransaction(p) | Packet::SetupTransfer(p) => p.handshake,
            Packet::DataTransaction(p) => p.handshake,
            Packet::DataTransfer(p)
            | Packet::BulkTransfer(p)
            | Packet::InterruptTransfer(p)
            | Packet::IsochronousTransfer(p) => p.handshake,
            Packet::StatusTransfer(p) => p.handshake,
            Packet::TransferFragment(p) => Some(p.handshake),
            _ => None,
        }
    }

    pub fn timestamp(&self) -> Duration {
        self.header().timestamp
    }

    pub fn device_address(&self) -> Option<u8> {
        self.header().device_address
    }

    pub fn endpoint_number(&self) -> Option<u8> {
        self.header().endpoint_number
    }

    pub fn direction(&self) -> Option<Direction> {
        self.header().direction
    }

    pub fn data(&self) -> Option<&[u8]> {
        self.header().data.as_deref()
    }

    pub fn subordinates(&self) -> &[Packet] {
        &self.header().subordinate_packets
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Packet::Malformed(_))
    }

    /// Counts this packet and every packet beneath it.
    pub fn tree_size(&self) -> usize {
        1 + self.subordinates().iter().map(Packet::tree_size).sum::<usize>()
    }
}
