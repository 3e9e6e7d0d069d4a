use thiserror::Error;

#[derive(Debug, Error)]
pub enum PcapSourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a pcap or pcapng capture (magic {magic:02x?})")]
    UnknownMagic { magic: [u8; 4] },
    #[error("PCAP parse error ({context}): {message}")]
    Pcap {
        context: &'static str,
        message: String,
    },
    #[error("capture ends inside a block ({context})")]
    Truncated { context: &'static str },
}
