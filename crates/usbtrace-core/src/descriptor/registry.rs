use super::layout::{self, DescriptorSchema};

/// Standard descriptors, keyed by descriptor number.
static STANDARD_SCHEMAS: &[&DescriptorSchema] = &[
    &layout::DEVICE,
    &layout::CONFIGURATION,
    &layout::STRING,
    &layout::INTERFACE,
    &layout::ENDPOINT,
    &layout::DEVICE_QUALIFIER,
    &layout::OTHER_SPEED_CONFIGURATION,
    &layout::INTERFACE_ASSOCIATION,
    &layout::HID,
    &layout::CLASS_SPECIFIC_INTERFACE,
    &layout::CLASS_SPECIFIC_ENDPOINT,
];

/// A class-specific schema and the interface it applies to. `None` matches
/// any subclass or protocol.
pub struct ClassSpecificEntry {
    pub class: u8,
    pub subclass: Option<u8>,
    pub protocol: Option<u8>,
    pub descriptor_type: u8,
    pub subtype: u8,
    pub schema: &'static DescriptorSchema,
}

static CLASS_SPECIFIC_SCHEMAS: &[ClassSpecificEntry] = &[
    ClassSpecificEntry {
        class: layout::CDC_CLASS,
        subclass: None,
        protocol: None,
        descriptor_type: layout::CS_INTERFACE_DESCRIPTOR,
        subtype: 0x00,
        schema: &layout::CDC_HEADER,
    },
    ClassSpecificEntry {
        class: layout::CDC_CLASS,
        subclass: None,
        protocol: None,
        descriptor_type: layout::CS_INTERFACE_DESCRIPTOR,
        subtype: 0x01,
        schema: &layout::CDC_CALL_MANAGEMENT,
    },
    ClassSpecificEntry {
        class: layout::CDC_CLASS,
        subclass: None,
        protocol: None,
        descriptor_type: layout::CS_INTERFACE_DESCRIPTOR,
        subtype: 0x02,
        schema: &layout::CDC_ACM,
    },
    ClassSpecificEntry {
        class: layout::CDC_CLASS,
        subclass: None,
        protocol: None,
        descriptor_type: layout::CS_INTERFACE_DESCRIPTOR,
        subtype: 0x06,
        schema: &layout::CDC_UNION,
    },
];

/// Class, subclass and protocol of the interface a descriptor belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceClass {
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
}

pub fn schema_for_number(number: u8) -> Option<&'static DescriptorSchema> {
    STANDARD_SCHEMAS
        .iter()
        .copied()
        .find(|schema| schema.number == number)
}

/// Schema for the response to GET_DESCRIPTOR(number, index). String
/// descriptor zero is the language table.
pub fn schema_for_request(number: u8, index: u8) -> Option<&'static DescriptorSchema> {
    if number == layout::STRING_DESCRIPTOR && index == 0 {
        return Some(&layout::STRING_LANGUAGES);
    }
    schema_for_number(number)
}

pub fn is_class_specific(number: u8) -> bool {
    number == layout::CS_INTERFACE_DESCRIPTOR || number == layout::CS_ENDPOINT_DESCRIPTOR
}

/// Most specific class-specific schema for a descriptor, falling back to the
/// generic class-specific layout when the owning interface is unknown or the
/// class has no registered specialization.
pub fn class_specific_schema(
    descriptor_type: u8,
    subtype: Option<u8>,
    interface: Option<InterfaceClass>,
) -> Option<&'static DescriptorSchema> {
    let specialized = match (subtype, interface) {
        (Some(subtype), Some(interface)) => CLASS_SPECIFIC_SCHEMAS
            .iter()
            .find(|entry| {
                entry.descriptor_type == descriptor_type
                    && entry.subtype == subtype
                    && entry.class == interface.class
                    && entry.subclass.is_none_or(|value| value == interface.subclass)
                    && entry.protocol.is_none_or(|value| value == interface.protocol)
            })
            .map(|entry| entry.schema),
        _ => None,
    };
    specialized.or_else(|| schema_for_number(descriptor_type))
}

/// Short name for a device's class triple.
pub fn device_class_name(class: u8, subclass: u8, protocol: u8) -> String {
    match (class, subclass, protocol) {
        (0, 0, 0) => "composite".to_string(),
        (255, 255, 255) => "vendor-specific".to_string(),
        (3, _, _) => "HID".to_string(),
        (9, _, _) => "Hub".to_string(),
        _ => format!("{class}:{subclass}:{protocol}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CDC: InterfaceClass = InterfaceClass {
        class: 2,
        subclass: 2,
        protocol: 1,
    };

    #[test]
    fn standard_lookup_by_number() {
        assert_eq!(schema_for_number(1).map(|schema| schema.name), Some("device"));
        assert_eq!(schema_for_number(0x0F), None);
    }

    #[test]
    fn string_zero_is_language_table() {
        assert_eq!(
            schema_for_request(3, 0).map(|schema| schema.name),
            Some("supported-language string")
        );
        assert_eq!(schema_for_request(3, 2).map(|schema| schema.name), Some("string"));
    }

    #[test]
    fn cdc_subtypes_specialize() {
        let schema = class_specific_schema(0x24, Some(6), Some(CDC)).unwrap();
        assert_eq!(schema.name, "CDC union");
    }

    #[test]
    fn unknown_class_falls_back_to_generic() {
        let hid = InterfaceClass {
            class: 3,
            subclass: 0,
            protocol: 0,
        };
        assert_eq!(class_specific_schema(0x24, Some(6), Some(hid)).unwrap().name, "class-specific");
        assert_eq!(class_specific_schema(0x24, Some(0), None).unwrap().name, "class-specific");
    }

    #[test]
    fn device_class_names() {
        assert_eq!(device_class_name(0, 0, 0), "composite");
        assert_eq!(device_class_name(255, 255, 255), "vendor-specific");
        assert_eq!(device_class_name(3, 1, 2), "HID");
        assert_eq!(device_class_name(2, 0, 0), "2:0:0");
    }
}
