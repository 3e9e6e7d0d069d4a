use super::{Decoder, DecoderContext, Outcome};
use crate::packet::{Packet, Pid, StartOfFrameCollection};

/// Folds runs of start-of-frame markers into a single collection packet.
#[derive(Debug, Default)]
pub struct StartOfFrameConglomerator {
    frames: Vec<Packet>,
}

impl StartOfFrameConglomerator {
    fn take_collection(&mut self) -> Option<Packet> {
        StartOfFrameCollection::from_frames(std::mem::take(&mut self.frames))
            .map(Packet::StartOfFrameCollection)
    }
}

impl Decoder for StartOfFrameConglomerator {
    fn name(&self) -> &'static str {
        "sof-conglomerator"
    }

    fn consume(&mut self, packet: Packet, _ctx: &mut DecoderContext) -> Outcome {
        if matches!(packet, Packet::StartOfFrame(_)) {
            self.frames.push(packet);
            return Outcome::Consumed(Vec::new());
        }
        // The arriving packet is re-queued behind the collection so the run
        // of SOFs keeps its place in arrival order.
        match self.take_collection() {
            Some(collection) => Outcome::Consumed(vec![collection, packet]),
            None => Outcome::NotHandled(packet),
        }
    }

    fn flush(&mut self, _ctx: &mut DecoderContext) -> Vec<Packet> {
        self.take_collection().into_iter().collect()
    }
}

/// Drops raw start-of-frame packets before they are specialized.
#[derive(Debug, Default)]
pub struct StartOfFrameFilter;

impl Decoder for StartOfFrameFilter {
    fn name(&self) -> &'static str {
        "sof-filter"
    }

    fn can_handle(&self, packet: &Packet) -> bool {
        matches!(packet, Packet::Raw(raw) if raw.pid == Pid::Sof)
    }

    fn consume(&mut self, _packet: Packet, _ctx: &mut DecoderContext) -> Outcome {
        Outcome::Consumed(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::testutil::{raw, run, token};
    use crate::decoder::PidSpecializer;

    fn sofs(count: u64) -> Vec<Packet> {
        let raws = (0..count).map(|n| raw(n * 125, Pid::Sof, &[n as u8, 0x00])).collect();
        run(&mut PidSpecializer, raws)
    }

    #[test]
    fn sof_run_becomes_one_collection_before_next_packet() {
        let mut packets = sofs(3);
        packets.push(token(500, Pid::In, 1, 1));
        let out = run(&mut StartOfFrameConglomerator::default(), packets);

        assert_eq!(out.len(), 2);
        match &out[0] {
            Packet::StartOfFrameCollection(collection) => {
                assert_eq!(collection.header.subordinate_packets.len(), 3);
                assert_eq!(out[0].summary().summary, "3 start-of-frame markers");
            }
            other => panic!("expected collection, got {}", other.kind_name()),
        }
        assert!(matches!(out[1], Packet::Token(_)));
    }

    #[test]
    fn trailing_sofs_are_flushed() {
        let out = run(&mut StartOfFrameConglomerator::default(), sofs(2));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].tree_size(), 3);
    }

    #[test]
    fn filter_drops_only_raw_sofs() {
        let out = run(
            &mut StartOfFrameFilter,
            vec![raw(0, Pid::Sof, &[0, 0]), raw(1, Pid::Ack, &[])],
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].pid(), Some(Pid::Ack));
    }
}
