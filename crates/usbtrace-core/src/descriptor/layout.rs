//! Static descriptor schemas.

pub const DEVICE_DESCRIPTOR: u8 = 1;
pub const CONFIGURATION_DESCRIPTOR: u8 = 2;
pub const STRING_DESCRIPTOR: u8 = 3;
pub const INTERFACE_DESCRIPTOR: u8 = 4;
pub const ENDPOINT_DESCRIPTOR: u8 = 5;
pub const DEVICE_QUALIFIER_DESCRIPTOR: u8 = 6;
pub const OTHER_SPEED_CONFIGURATION_DESCRIPTOR: u8 = 7;
pub const INTERFACE_ASSOCIATION_DESCRIPTOR: u8 = 11;
pub const HID_DESCRIPTOR: u8 = 0x21;
pub const CS_INTERFACE_DESCRIPTOR: u8 = 0x24;
pub const CS_ENDPOINT_DESCRIPTOR: u8 = 0x25;

pub const HEADER_LEN: usize = 2;
pub const LENGTH_OFFSET: usize = 0;
pub const TYPE_OFFSET: usize = 1;
pub const SUBTYPE_OFFSET: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldWidth {
    U8,
    U16,
}

impl FieldWidth {
    pub const fn len(self) -> usize {
        match self {
            FieldWidth::U8 => 1,
            FieldWidth::U16 => 2,
        }
    }
}

/// How a field's raw value is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Length,
    DescriptorType,
    Number,
    Bcd,
    Id,
    StringIndex,
    Bitmap,
    ClassCode,
    EndpointAddress,
    EndpointAttributes,
    PacketSize,
    Power,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub width: FieldWidth,
    pub kind: FieldKind,
    pub magic: Option<u16>,
}

/// What follows the fixed fields inside the descriptor's own length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trailing {
    None,
    Bytes,
    Utf16String,
    LanguageIds,
}

#[derive(Debug, PartialEq, Eq)]
pub struct DescriptorSchema {
    pub number: u8,
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
    pub trailing: Trailing,
}

impl DescriptorSchema {
    pub fn fixed_len(&self) -> usize {
        self.fields.iter().map(|field| field.width.len()).sum()
    }
}

const fn byte(name: &'static str, label: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        label,
        width: FieldWidth::U8,
        kind,
        magic: None,
    }
}

const fn word(name: &'static str, label: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        name,
        label,
        width: FieldWidth::U16,
        kind,
        magic: None,
    }
}

const fn magic(name: &'static str, label: &'static str, kind: FieldKind, value: u8) -> FieldSpec {
    FieldSpec {
        name,
        label,
        width: FieldWidth::U8,
        kind,
        magic: Some(value as u16),
    }
}

const fn length() -> FieldSpec {
    byte("bLength", "Length", FieldKind::Length)
}

const fn descriptor_type(number: u8) -> FieldSpec {
    magic("bDescriptorType", "Descriptor Number", FieldKind::DescriptorType, number)
}

const fn subtype(value: u8) -> FieldSpec {
    magic("bDescriptorSubtype", "Descriptor subtype", FieldKind::Number, value)
}

pub static DEVICE: DescriptorSchema = DescriptorSchema {
    number: DEVICE_DESCRIPTOR,
    name: "device",
    fields: &[
        length(),
        descriptor_type(DEVICE_DESCRIPTOR),
        word("bcdUSB", "USB Version", FieldKind::Bcd),
        byte("bDeviceClass", "Class", FieldKind::ClassCode),
        byte("bDeviceSubclass", "Subclass", FieldKind::ClassCode),
        byte("bDeviceProtocol", "Protocol", FieldKind::ClassCode),
        byte("bMaxPacketSize", "EP0 Max Pkt Size", FieldKind::PacketSize),
        word("idVendor", "Vendor ID", FieldKind::Id),
        word("idProduct", "Product ID", FieldKind::Id),
        word("bcdDevice", "Device Version", FieldKind::Bcd),
        byte("iManufacturer", "Manufacturer Str", FieldKind::StringIndex),
        byte("iProduct", "Product Str", FieldKind::StringIndex),
        byte("iSerialNumber", "Serial Number", FieldKind::StringIndex),
        byte("bNumConfigurations", "Configuration Count", FieldKind::Number),
    ],
    trailing: Trailing::None,
};

const CONFIGURATION_FIELDS: [FieldSpec; 6] = [
    word("wTotalLength", "Length including subordinates", FieldKind::Number),
    byte("bNumInterfaces", "Interface count", FieldKind::Number),
    byte("bConfigurationValue", "Configuration number", FieldKind::Number),
    byte("iConfiguration", "Description string", FieldKind::StringIndex),
    byte("bmAttributes", "Attributes", FieldKind::Bitmap),
    byte("bMaxPower", "Max power consumption", FieldKind::Power),
];

pub static CONFIGURATION: DescriptorSchema = DescriptorSchema {
    number: CONFIGURATION_DESCRIPTOR,
    name: "configuration",
    fields: &[
        length(),
        descriptor_type(CONFIGURATION_DESCRIPTOR),
        CONFIGURATION_FIELDS[0],
        CONFIGURATION_FIELDS[1],
        CONFIGURATION_FIELDS[2],
        CONFIGURATION_FIELDS[3],
        CONFIGURATION_FIELDS[4],
        CONFIGURATION_FIELDS[5],
    ],
    trailing: Trailing::None,
};

pub static OTHER_SPEED_CONFIGURATION: DescriptorSchema = DescriptorSchema {
    number: OTHER_SPEED_CONFIGURATION_DESCRIPTOR,
    name: "other speed configuration",
    fields: &[
        length(),
        descriptor_type(OTHER_SPEED_CONFIGURATION_DESCRIPTOR),
        CONFIGURATION_FIELDS[0],
        CONFIGURATION_FIELDS[1],
        CONFIGURATION_FIELDS[2],
        CONFIGURATION_FIELDS[3],
        CONFIGURATION_FIELDS[4],
        CONFIGURATION_FIELDS[5],
    ],
    trailing: Trailing::None,
};

pub static STRING: DescriptorSchema = DescriptorSchema {
    number: STRING_DESCRIPTOR,
    name: "string",
    fields: &[length(), descriptor_type(STRING_DESCRIPTOR)],
    trailing: Trailing::Utf16String,
};

/// String descriptor zero lists the supported language IDs.
pub static STRING_LANGUAGES: DescriptorSchema = DescriptorSchema {
    number: STRING_DESCRIPTOR,
    name: "supported-language string",
    fields: &[length(), descriptor_type(STRING_DESCRIPTOR)],
    trailing: Trailing::LanguageIds,
};

pub static INTERFACE: DescriptorSchema = DescriptorSchema {
    number: INTERFACE_DESCRIPTOR,
    name: "interface",
    fields: &[
        length(),
        descriptor_type(INTERFACE_DESCRIPTOR),
        byte("bInterfaceNumber", "Interface number", FieldKind::Number),
        byte("bAlternateSetting", "Alternate setting", FieldKind::Number),
        byte("bNumEndpoints", "Endpoints included", FieldKind::Number),
        byte("bInterfaceClass", "Class", FieldKind::ClassCode),
        byte("bInterfaceSubclass", "Subclass", FieldKind::ClassCode),
        byte("bInterfaceProtocol", "Protocol", FieldKind::ClassCode),
        byte("iInterface", "String index", FieldKind::StringIndex),
    ],
    trailing: Trailing::None,
};

pub static ENDPOINT: DescriptorSchema = DescriptorSchema {
    number: ENDPOINT_DESCRIPTOR,
    name: "endpoint",
    fields: &[
        length(),
        descriptor_type(ENDPOINT_DESCRIPTOR),
        byte("bEndpointAddress", "Endpoint Address", FieldKind::EndpointAddress),
        byte("bmAttributes", "Attributes", FieldKind::EndpointAttributes),
        word("wMaxPacketSize", "Maximum Packet Size", FieldKind::PacketSize),
        byte("bInterval", "Polling interval", FieldKind::Number),
    ],
    // Audio-class endpoints append bRefresh and bSynchAddress.
    trailing: Trailing::Bytes,
};

pub static DEVICE_QUALIFIER: DescriptorSchema = DescriptorSchema {
    number: DEVICE_QUALIFIER_DESCRIPTOR,
    name: "device qualifier",
    fields: &[
        length(),
        descriptor_type(DEVICE_QUALIFIER_DESCRIPTOR),
        word("bcdUSB", "USB Version", FieldKind::Bcd),
        byte("bDeviceClass", "Class", FieldKind::ClassCode),
        byte("bDeviceSubclass", "Subclass", FieldKind::ClassCode),
        byte("bDeviceProtocol", "Protocol", FieldKind::ClassCode),
        byte("bMaxPacketSize0", "EP0 Max Pkt Size", FieldKind::PacketSize),
        byte("bNumConfigurations", "Configuration Count", FieldKind::Number),
        magic("bReserved", "Reserved", FieldKind::Number, 0),
    ],
    trailing: Trailing::None,
};

pub static INTERFACE_ASSOCIATION: DescriptorSchema = DescriptorSchema {
    number: INTERFACE_ASSOCIATION_DESCRIPTOR,
    name: "interface association",
    fields: &[
        length(),
        descriptor_type(INTERFACE_ASSOCIATION_DESCRIPTOR),
        byte("bFirstInterface", "First interface", FieldKind::Number),
        byte("bInterfaceCount", "Interface count", FieldKind::Number),
        byte("bFunctionClass", "Class", FieldKind::ClassCode),
        byte("bFunctionSubClass", "Subclass", FieldKind::ClassCode),
        byte("bFunctionProtocol", "Protocol", FieldKind::ClassCode),
        byte("iFunction", "String index", FieldKind::StringIndex),
    ],
    trailing: Trailing::None,
};

pub static HID: DescriptorSchema = DescriptorSchema {
    number: HID_DESCRIPTOR,
    name: "HID",
    fields: &[
        length(),
        descriptor_type(HID_DESCRIPTOR),
        word("bcdHID", "HID Version", FieldKind::Bcd),
        byte("bCountryCode", "Country code", FieldKind::Number),
        byte("bNumDescriptors", "Class descriptor count", FieldKind::Number),
        byte("bReportDescriptorType", "Report descriptor type", FieldKind::DescriptorType),
        word("wReportDescriptorLength", "Report descriptor length", FieldKind::Number),
    ],
    trailing: Trailing::Bytes,
};

pub static CLASS_SPECIFIC_INTERFACE: DescriptorSchema = DescriptorSchema {
    number: CS_INTERFACE_DESCRIPTOR,
    name: "class-specific",
    fields: &[
        length(),
        descriptor_type(CS_INTERFACE_DESCRIPTOR),
        byte("bDescriptorSubtype", "Descriptor Subtype", FieldKind::Number),
    ],
    trailing: Trailing::Bytes,
};

pub static CLASS_SPECIFIC_ENDPOINT: DescriptorSchema = DescriptorSchema {
    number: CS_ENDPOINT_DESCRIPTOR,
    name: "class-specific endpoint",
    fields: &[
        length(),
        descriptor_type(CS_ENDPOINT_DESCRIPTOR),
        byte("bDescriptorSubtype", "Descriptor Subtype", FieldKind::Number),
    ],
    trailing: Trailing::Bytes,
};

pub const CDC_CLASS: u8 = 0x02;

pub static CDC_HEADER: DescriptorSchema = DescriptorSchema {
    number: CS_INTERFACE_DESCRIPTOR,
    name: "CDC header",
    fields: &[
        length(),
        descriptor_type(CS_INTERFACE_DESCRIPTOR),
        subtype(0x00),
        word("bcdCDC", "CDC version", FieldKind::Bcd),
    ],
    trailing: Trailing::None,
};

pub static CDC_CALL_MANAGEMENT: DescriptorSchema = DescriptorSchema {
    number: CS_INTERFACE_DESCRIPTOR,
    name: "CDC call management",
    fields: &[
        length(),
        descriptor_type(CS_INTERFACE_DESCRIPTOR),
        subtype(0x01),
        byte("bmCapabilities", "Capabilities", FieldKind::Bitmap),
        byte("bSubordinateInterface0", "Data Interface", FieldKind::Number),
    ],
    trailing: Trailing::None,
};

pub static CDC_ACM: DescriptorSchema = DescriptorSchema {
    number: CS_INTERFACE_DESCRIPTOR,
    name: "CDC-ACM function",
    fields: &[
        length(),
        descriptor_type(CS_INTERFACE_DESCRIPTOR),
        subtype(0x02),
        byte("bmCapabilities", "Capabilities", FieldKind::Bitmap),
    ],
    trailing: Trailing::None,
};

pub static CDC_UNION: DescriptorSchema = DescriptorSchema {
    number: CS_INTERFACE_DESCRIPTOR,
    name: "CDC union",
    fields: &[
        length(),
        descriptor_type(CS_INTERFACE_DESCRIPTOR),
        subtype(0x06),
        byte("bControlInterface", "Control Interface", FieldKind::Number),
        byte("bSubordinateInterface0", "Data Interface", FieldKind::Number),
    ],
    // Further subordinate interface numbers.
    trailing: Trailing::Bytes,
};
