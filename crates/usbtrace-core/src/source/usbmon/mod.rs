//! Linux usbmon capture decoding.
//!
//! usbmon reports URBs, not bus packets: each transfer shows up as a
//! submission event and a callback event. [`parser::UrbTracker`] pairs the
//! two and synthesizes the transfer (or, for control requests, the complete
//! setup/data/status exchange) the pair describes.

pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;
pub mod stream;

pub use stream::UsbmonStreamSource;
