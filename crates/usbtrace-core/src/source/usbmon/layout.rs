pub const HEADER_LEN: usize = 48;
/// Memory-mapped captures (linktype 220) pad the header with 16 extra bytes.
pub const MMAPPED_HEADER_LEN: usize = 64;

pub const URB_TAG_RANGE: std::ops::Range<usize> = 0..8;
pub const EVENT_TYPE_OFFSET: usize = 8;
pub const TRANSFER_TYPE_OFFSET: usize = 9;
pub const ENDPOINT_ADDRESS_OFFSET: usize = 10;
pub const DEVICE_ADDRESS_OFFSET: usize = 11;
pub const BUS_NUMBER_RANGE: std::ops::Range<usize> = 12..14;
pub const FLAG_SETUP_OFFSET: usize = 14;
pub const TS_SEC_RANGE: std::ops::Range<usize> = 16..24;
pub const TS_USEC_RANGE: std::ops::Range<usize> = 24..28;
pub const STATUS_RANGE: std::ops::Range<usize> = 28..32;
pub const LENGTH_RANGE: std::ops::Range<usize> = 32..36;
pub const LENGTH_CAPTURED_RANGE: std::ops::Range<usize> = 36..40;
pub const SETUP_RANGE: std::ops::Range<usize> = 40..48;

pub const EVENT_SUBMISSION: u8 = b'S';
pub const EVENT_CALLBACK: u8 = b'C';
pub const EVENT_ERROR: u8 = b'E';

pub const TRANSFER_ISOCHRONOUS: u8 = 0;
pub const TRANSFER_INTERRUPT: u8 = 1;
pub const TRANSFER_CONTROL: u8 = 2;
pub const TRANSFER_BULK: u8 = 3;

/// The setup flag is zero when the header carries a setup packet.
pub const SETUP_PRESENT: u8 = 0;

/// `-EPIPE`: the device stalled the endpoint.
pub const STATUS_STALL: i32 = -32;
