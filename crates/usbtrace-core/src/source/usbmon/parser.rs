use std::collections::HashMap;
use std::time::Duration;

use log::{debug, warn};

use super::layout;
use super::reader::{EventKind, UsbmonEvent};
use crate::packet::{
    ControlTransfer, DataTransfer, Direction, Packet, PacketHeader, Pid, SetupTransaction, StatusTransfer, Style,
    TransferFragment, TransferType,
};

/// Pairs usbmon submissions with their callbacks and turns each completed
/// URB into a transfer.
#[derive(Debug, Default)]
pub struct UrbTracker {
    pending: HashMap<u64, (UsbmonEvent, Duration)>,
}

impl UrbTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Feeds one event; returns the transfer it completes, if any.
    pub fn handle(&mut self, event: UsbmonEvent, timestamp: Duration) -> Option<Packet> {
        match event.kind {
            EventKind::Submission => {
                if self.pending.insert(event.urb_tag, (event, timestamp)).is_some() {
                    debug!("urb resubmitted before completion; keeping the newer submission");
                }
                None
            }
            EventKind::Callback => Some(self.complete(event, timestamp)),
            EventKind::Error => {
                warn!(
                    "dropping usbmon error event: urb {:#x}, device {}, endpoint {:#04x}, status {}",
                    event.urb_tag, event.device_address, event.endpoint_address, event.status
                );
                None
            }
        }
    }

    /// Submissions that never saw a callback, oldest first.
    pub fn drain_orphans(&mut self) -> Vec<Packet> {
        let mut orphans: Vec<_> = self.pending.drain().map(|(_, pending)| pending).collect();
        orphans.sort_by_key(|(event, timestamp)| (*timestamp, event.urb_tag));
        orphans
            .into_iter()
            .map(|(event, timestamp)| fragment(event, timestamp))
            .collect()
    }

    fn complete(&mut self, callback: UsbmonEvent, completed_at: Duration) -> Packet {
        let submission = self.pending.remove(&callback.urb_tag);

        if callback.transfer_type == TransferType::Control {
            return match submission {
                Some((submission, submitted_at)) if submission.setup.is_some() => {
                    control_transfer(submission, submitted_at, callback, completed_at)
                }
                _ => fragment(callback, completed_at),
            };
        }

        match (callback.direction(), submission) {
            // OUT data travels with the submission; the callback only reports status.
            (Direction::Out, Some((mut submission, submitted_at))) => {
                submission.status = callback.status;
                submission.length_captured = callback.length_captured;
                data_transfer(submission, submitted_at)
            }
            (Direction::Out, None) if !callback.data.is_empty() || callback.length == 0 => {
                data_transfer(callback, completed_at)
            }
            (Direction::Out, None) => fragment(callback, completed_at),
            (Direction::In, _) => data_transfer(callback, completed_at),
        }
    }
}

fn handshake_for(status: i32) -> Pid {
    match status {
        0 => Pid::Ack,
        layout::STATUS_STALL => Pid::Stall,
        _ => Pid::Nak,
    }
}

fn stage_header(event: &UsbmonEvent, timestamp: Duration) -> PacketHeader {
    let mut header = PacketHeader::at(timestamp);
    header.bus_number = Some(event.bus_number);
    header.device_address = Some(event.device_address);
    header.endpoint_number = Some(event.endpoint_number());
    header.direction = Some(event.direction());
    header.status = Some(event.status);
    header
}

fn data_transfer(event: UsbmonEvent, timestamp: Duration) -> Packet {
    let handshake = handshake_for(event.status);
    let mut header = stage_header(&event, timestamp);
    if handshake == Pid::Stall {
        header.style = Style::Exceptional;
    }
    let transfer_type = event.transfer_type;
    header.data = Some(event.data);
    DataTransfer {
        header,
        handshake: Some(handshake),
    }
    .into_packet(Some(transfer_type))
}

fn fragment(event: UsbmonEvent, timestamp: Duration) -> Packet {
    let mut header = stage_header(&event, timestamp);
    header.style = Style::Exceptional;
    let handshake = handshake_for(event.status);
    let transfer_type = event.transfer_type;
    header.data = Some(event.data);
    Packet::TransferFragment(TransferFragment {
        header,
        handshake,
        transfer_type,
    })
}

fn control_transfer(
    submission: UsbmonEvent,
    submitted_at: Duration,
    callback: UsbmonEvent,
    completed_at: Duration,
) -> Packet {
    let Some(setup) = submission.setup else {
        return fragment(callback, completed_at);
    };
    let request_direction = setup.request_direction;
    let status = callback.status;

    let setup_stage = SetupTransaction::from_setup(stage_header(&submission, submitted_at), setup, Pid::Ack);

    // The kernel takes OUT data with the submission and returns IN data with
    // the callback.
    let (data, data_at) = match request_direction {
        Direction::In => (callback.data.clone(), completed_at),
        Direction::Out => (submission.data, submitted_at),
    };

    let mut last_direction = Direction::Out;
    let data_stall = !data.is_empty() && status != 0 && request_direction.is_in();
    let data_stage = if data.is_empty() {
        None
    } else {
        let mut header = stage_header(&callback, data_at);
        header.direction = Some(request_direction);
        header.data = Some(data);
        let handshake = if data_stall { Pid::Stall } else { Pid::Ack };
        if data_stall {
            header.style = Style::Exceptional;
        }
        last_direction = request_direction;
        Some(Packet::DataTransfer(DataTransfer {
            header,
            handshake: Some(handshake),
        }))
    };

    let status_stage = (!data_stall).then(|| {
        let mut header = stage_header(&callback, completed_at);
        header.direction = Some(last_direction.reverse());
        Packet::StatusTransfer(StatusTransfer {
            header,
            handshake: Some(handshake_for(status)),
        })
    });

    Packet::ControlTransfer(ControlTransfer::from_subordinates(setup_stage, data_stage, status_stage))
}
