use thiserror::Error;

/// Errors returned while reading usbmon events.
///
/// # Examples
/// ```
/// use usbtrace_core::source::UsbmonError;
///
/// let err = UsbmonError::UnknownEventType { value: b'X' };
/// assert!(err.to_string().contains("unknown event type"));
/// ```
#[derive(Debug, Error)]
pub enum UsbmonError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("event too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("unknown event type: {value:#04x}")]
    UnknownEventType { value: u8 },
    #[error("unknown transfer type: {value}")]
    UnknownTransferType { value: u8 },
}
