pub const PCAPNG_MAGIC: [u8; 4] = [0x0a, 0x0d, 0x0d, 0x0a];

/// Legacy pcap magics as they appear on disk, in either byte order.
pub const PCAP_MICROSECOND_MAGICS: [[u8; 4]; 2] = [[0xd4, 0xc3, 0xb2, 0xa1], [0xa1, 0xb2, 0xc3, 0xd4]];
pub const PCAP_NANOSECOND_MAGICS: [[u8; 4]; 2] = [[0x4d, 0x3c, 0xb2, 0xa1], [0xa1, 0xb2, 0x3c, 0x4d]];

pub const PCAP_READER_BUFFER_SIZE: usize = 65536;
/// usbmon records hold whole URBs, so the buffer grows up to this size.
pub const PCAP_READER_MAX_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// Default pcapng `if_tsresol`: microseconds.
pub const PCAPNG_DEFAULT_TSRESOL: u8 = 6;

pub const LINKTYPE_USB_LINUX: i32 = 189;
pub const LINKTYPE_USB_LINUX_MMAPPED: i32 = 220;
/// Bus-level USB 2.0 packets: one PID byte and its payload per frame.
pub const LINKTYPE_USB_2_0: i32 = 288;
