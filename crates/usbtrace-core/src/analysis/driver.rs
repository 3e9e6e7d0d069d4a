use std::collections::VecDeque;

use log::debug;

use super::config::AnalyzerConfig;
use crate::decoder::{
    ControlRequestGrouper, Decoder, DecoderContext, DescriptorRequestSpecializer, DeviceModels, Outcome,
    PidSpecializer, StandardRequestSpecializer, StartOfFrameConglomerator, StartOfFrameFilter, TransactionGrouper,
    TransactionSpecializer, TransferGrouper,
};
use crate::packet::Packet;
use crate::source::{PacketSink, SinkClosed};

/// Runs packets through the decoder chain.
///
/// Packets a stage emits join the tail of one work queue and are offered to
/// the chain again from the first stage. A packet no stage claims is final
/// and goes to the sink.
pub struct Analyzer {
    decoders: Vec<Box<dyn Decoder>>,
    context: DecoderContext,
    queue: VecDeque<Packet>,
}

impl Analyzer {
    pub fn new(config: &AnalyzerConfig) -> Self {
        let mut decoders: Vec<Box<dyn Decoder>> = Vec::new();
        if config.filter_sofs {
            decoders.push(Box::new(StartOfFrameFilter));
        }
        decoders.push(Box::new(PidSpecializer));
        if config.conglomerate_sofs {
            decoders.push(Box::new(StartOfFrameConglomerator::default()));
        }
        decoders.push(Box::new(TransactionGrouper::default()));
        decoders.push(Box::new(TransactionSpecializer));
        decoders.push(Box::new(TransferGrouper::new(config.collate_transfers)));
        decoders.push(Box::new(ControlRequestGrouper::default()));
        decoders.push(Box::new(StandardRequestSpecializer));
        decoders.push(Box::new(DescriptorRequestSpecializer));
        Self::with_decoders(decoders)
    }

    pub fn with_decoders(decoders: Vec<Box<dyn Decoder>>) -> Self {
        Self {
            decoders,
            context: DecoderContext::default(),
            queue: VecDeque::new(),
        }
    }

    pub fn decoder_names(&self) -> Vec<&'static str> {
        self.decoders.iter().map(|decoder| decoder.name()).collect()
    }

    pub fn devices(&self) -> &DeviceModels {
        &self.context.devices
    }

    /// Decodes one captured packet as far as the chain can take it right now.
    pub fn push(&mut self, packet: Packet, sink: &mut dyn PacketSink) -> Result<(), SinkClosed> {
        self.queue.push_back(packet);
        self.drain(sink)
    }

    /// Ends the capture: every stage releases what it still buffers, in chain
    /// order, and whatever that produces is decoded before the next stage
    /// flushes.
    pub fn finish(&mut self, sink: &mut dyn PacketSink) -> Result<(), SinkClosed> {
        self.drain(sink)?;
        for index in 0..self.decoders.len() {
            let flushed = self.decoders[index].flush(&mut self.context);
            if !flushed.is_empty() {
                debug!("{} flushed {} packet(s)", self.decoders[index].name(), flushed.len());
            }
            self.queue.extend(flushed);
            self.drain(sink)?;
        }
        Ok(())
    }

    fn drain(&mut self, sink: &mut dyn PacketSink) -> Result<(), SinkClosed> {
        while let Some(packet) = self.queue.pop_front() {
            if let Some(finished) = self.offer(packet) {
                sink.emit(finished)?;
            }
        }
        Ok(())
    }

    /// Offers a packet to each stage in turn; returns it if none consumed it.
    fn offer(&mut self, mut packet: Packet) -> Option<Packet> {
        for decoder in &mut self.decoders {
            if !decoder.can_handle(&packet) {
                continue;
            }
            match decoder.consume(packet, &mut self.context) {
                Outcome::Consumed(emitted) => {
                    self.queue.extend(emitted);
                    return None;
                }
                Outcome::NotHandled(declined) => packet = declined,
            }
        }
        Some(packet)
    }
}
