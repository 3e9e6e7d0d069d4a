//! PCAP/PCAPNG source implementation.
//!
//! Frames carrying bus-level USB packets (linktype 288) become raw packets;
//! frames carrying Linux usbmon events (linktypes 189 and 220) go through the
//! URB tracker. Frames of any other linktype are counted and skipped.

pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;

pub use parser::PcapFileSource;
