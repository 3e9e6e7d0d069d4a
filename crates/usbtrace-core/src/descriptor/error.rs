use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("descriptor too short: need {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("{field} must be {expected:#04x}, got {actual:#04x}")]
    MagicMismatch {
        field: &'static str,
        expected: u16,
        actual: u16,
    },
}
