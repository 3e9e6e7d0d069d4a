//! Decoder stages.
//!
//! Each stage implements [`Decoder`]: it is offered one packet at a time and
//! either consumes it (emitting zero or more packets, usually more specific
//! variants carrying the consumed packets as subordinates) or hands it back
//! untouched. Stages keep their own grouping buffers; anything still buffered
//! when the capture ends is released by [`Decoder::flush`].
//!
//! Per-session knowledge shared between stages, such as which endpoints a
//! device declared, lives in [`DecoderContext`].

mod control;
mod device;
mod sof;
mod specializer;
mod standard;
mod transaction;
mod transfer;

pub use control::ControlRequestGrouper;
pub use device::{DeviceModel, DeviceModels};
pub use sof::{StartOfFrameConglomerator, StartOfFrameFilter};
pub use specializer::PidSpecializer;
pub use standard::{DescriptorRequestSpecializer, StandardRequestSpecializer};
pub use transaction::{TransactionGrouper, TransactionSpecializer};
pub use transfer::TransferGrouper;

use crate::packet::Packet;

/// Result of offering a packet to a stage.
#[derive(Debug)]
pub enum Outcome {
    /// The stage took ownership and emitted these packets (possibly none).
    Consumed(Vec<Packet>),
    /// The stage declined; the packet goes on to the next stage.
    NotHandled(Packet),
}

/// Session state shared by every stage.
#[derive(Debug, Default)]
pub struct DecoderContext {
    pub devices: DeviceModels,
}

pub trait Decoder {
    fn name(&self) -> &'static str;

    /// Cheap pre-check; a stage that returns `false` is skipped.
    fn can_handle(&self, packet: &Packet) -> bool {
        let _ = packet;
        true
    }

    fn consume(&mut self, packet: Packet, ctx: &mut DecoderContext) -> Outcome;

    /// Releases partially grouped packets at end of capture.
    fn flush(&mut self, ctx: &mut DecoderContext) -> Vec<Packet> {
        let _ = ctx;
        Vec::new()
    }
}
