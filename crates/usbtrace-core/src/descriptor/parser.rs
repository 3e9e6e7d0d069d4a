use log::debug;

use super::error::DescriptorError;
use super::languages::language_name;
use super::layout::{self, DescriptorSchema, FieldKind, FieldWidth, Trailing};
use super::reader::DescriptorReader;
use super::registry::{self, InterfaceClass};
use crate::packet::setup::descriptor_type_name;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedField {
    pub name: &'static str,
    pub label: &'static str,
    pub width: FieldWidth,
    pub value: u16,
    pub display: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrailingValue {
    Bytes(Vec<u8>),
    Text(String),
    Languages(Vec<u16>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedDescriptor {
    pub number: u8,
    pub name: &'static str,
    pub fields: Vec<DecodedField>,
    /// Bytes this descriptor occupies in its input.
    pub consumed: usize,
    /// Set when the input ended before the declared length or before every
    /// fixed field could be read.
    pub truncated: bool,
    pub trailing: Option<TrailingValue>,
}

impl DecodedDescriptor {
    pub fn field(&self, name: &str) -> Option<&DecodedField> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn value(&self, name: &str) -> Option<u16> {
        self.field(name).map(|field| field.value)
    }

    pub fn byte(&self, name: &str) -> Option<u8> {
        self.value(name).and_then(|value| u8::try_from(value).ok())
    }

    /// Re-encodes the decoded fields and trailing payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.consumed);
        for field in &self.fields {
            match field.width {
                FieldWidth::U8 => out.push(field.value as u8),
                FieldWidth::U16 => out.extend_from_slice(&field.value.to_le_bytes()),
            }
        }
        match &self.trailing {
            Some(TrailingValue::Bytes(bytes)) => out.extend_from_slice(bytes),
            Some(TrailingValue::Text(text)) => {
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_le_bytes());
                }
            }
            Some(TrailingValue::Languages(ids)) => {
                for id in ids {
                    out.extend_from_slice(&id.to_le_bytes());
                }
            }
            None => {}
        }
        out
    }

    pub fn interface_class(&self) -> Option<InterfaceClass> {
        if self.number != layout::INTERFACE_DESCRIPTOR {
            return None;
        }
        Some(InterfaceClass {
            class: self.byte("bInterfaceClass")?,
            subclass: self.byte("bInterfaceSubclass")?,
            protocol: self.byte("bInterfaceProtocol")?,
        })
    }

    /// Display form of the trailing payload: the string itself, or one
    /// entry per supported language.
    pub fn trailing_summary(&self) -> Option<String> {
        match self.trailing.as_ref()? {
            TrailingValue::Text(text) => Some(text.clone()),
            TrailingValue::Languages(ids) => Some(
                ids.iter()
                    .map(|id| describe_language(*id))
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            TrailingValue::Bytes(bytes) if !bytes.is_empty() => Some(hex::encode(bytes)),
            TrailingValue::Bytes(_) => None,
        }
    }
}

/// A descriptor found after the head descriptor's own length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubordinateDescriptor {
    pub description: String,
    pub decoded: Option<DecodedDescriptor>,
    pub raw: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDescriptor {
    pub head: DecodedDescriptor,
    pub subordinates: Vec<SubordinateDescriptor>,
}

impl ParsedDescriptor {
    pub fn decoded_subordinates(&self) -> impl Iterator<Item = &DecodedDescriptor> {
        self.subordinates
            .iter()
            .filter_map(|subordinate| subordinate.decoded.as_ref())
    }
}

pub fn describe_language(id: u16) -> String {
    match language_name(id) {
        Some(name) => format!("{name} (#{id:02x})"),
        None => format!("language #0x{id:02x}"),
    }
}

/// Decodes one descriptor's fixed fields and trailing payload.
pub fn decode(data: &[u8], schema: &'static DescriptorSchema) -> Result<DecodedDescriptor, DescriptorError> {
    let reader = DescriptorReader::new(data);
    let declared = usize::from(reader.read_u8(layout::LENGTH_OFFSET)?);
    let extent = if declared < layout::HEADER_LEN {
        data.len()
    } else {
        declared.min(data.len())
    };
    let body = DescriptorReader::new(reader.read_slice(0..extent)?);

    let mut fields = Vec::with_capacity(schema.fields.len());
    let mut offset = 0;
    let mut truncated = data.len() < declared;
    for spec in schema.fields {
        let width = spec.width.len();
        if offset + width > extent {
            truncated = true;
            break;
        }
        let value = match spec.width {
            FieldWidth::U8 => u16::from(body.read_u8(offset)?),
            FieldWidth::U16 => body.read_u16_le(offset)?,
        };
        if let Some(expected) = spec.magic {
            if value != expected {
                return Err(DescriptorError::MagicMismatch {
                    field: spec.name,
                    expected,
                    actual: value,
                });
            }
        }
        fields.push(DecodedField {
            name: spec.name,
            label: spec.label,
            width: spec.width,
            value,
            display: format_field(spec.kind, value),
        });
        offset += width;
    }

    let rest = body.read_slice(offset.min(extent)..extent)?;
    let trailing = match schema.trailing {
        Trailing::None => None,
        Trailing::Bytes => Some(TrailingValue::Bytes(rest.to_vec())),
        Trailing::Utf16String => Some(TrailingValue::Text(decode_utf16(rest))),
        Trailing::LanguageIds => Some(TrailingValue::Languages(
            rest.chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect(),
        )),
    };

    Ok(DecodedDescriptor {
        number: schema.number,
        name: schema.name,
        fields,
        consumed: extent,
        truncated,
        trailing,
    })
}

/// Decodes a head descriptor, then every descriptor packed after it.
///
/// Subordinates are never dropped: unknown types and anything that fails to
/// decode are kept as labelled raw blobs, and bytes that no longer look like
/// a descriptor header end the walk as one final blob.
pub fn decode_with_subordinates(
    data: &[u8],
    schema: &'static DescriptorSchema,
) -> Result<ParsedDescriptor, DescriptorError> {
    let head = decode(data, schema)?;
    let mut subordinates: Vec<SubordinateDescriptor> = Vec::new();
    let mut offset = head.consumed;

    while offset < data.len() {
        let rest = &data[offset..];
        let number = subordinates.len();
        let declared = match DescriptorReader::new(rest).peek_header() {
            Ok((declared, _)) if usize::from(declared) >= layout::HEADER_LEN => usize::from(declared),
            _ => {
                subordinates.push(SubordinateDescriptor {
                    description: format!("Subordinate # {number}: unrecognized trailing data"),
                    decoded: None,
                    raw: rest.to_vec(),
                });
                break;
            }
        };
        let chunk = &rest[..declared.min(rest.len())];
        subordinates.push(decode_subordinate(chunk, number, &subordinates));
        offset += chunk.len();
    }

    Ok(ParsedDescriptor { head, subordinates })
}

fn decode_subordinate(chunk: &[u8], number: usize, prior: &[SubordinateDescriptor]) -> SubordinateDescriptor {
    let descriptor_type = chunk[layout::TYPE_OFFSET];
    let schema = if registry::is_class_specific(descriptor_type) {
        let interface = prior
            .iter()
            .rev()
            .filter_map(|subordinate| subordinate.decoded.as_ref())
            .find_map(DecodedDescriptor::interface_class);
        registry::class_specific_schema(
            descriptor_type,
            chunk.get(layout::SUBTYPE_OFFSET).copied(),
            interface,
        )
    } else {
        registry::schema_for_number(descriptor_type)
    };

    let decoded = schema.and_then(|schema| match decode(chunk, schema) {
        Ok(decoded) => Some(decoded),
        Err(err) => {
            debug!("subordinate descriptor #{number} ({}) failed to decode: {err}", schema.name);
            None
        }
    });
    let description = match &decoded {
        Some(decoded) => decoded.name.to_string(),
        None => format!("Subordinate # {number}: descriptor #{descriptor_type}"),
    };
    SubordinateDescriptor {
        description,
        decoded,
        raw: chunk.to_vec(),
    }
}

fn decode_utf16(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

fn format_field(kind: FieldKind, value: u16) -> String {
    match kind {
        FieldKind::Length | FieldKind::Number => value.to_string(),
        FieldKind::DescriptorType => {
            let name = match value {
                0x24 => "class-specific interface",
                0x25 => "class-specific endpoint",
                other => descriptor_type_name(other as u8),
            };
            format!("{value:#04x} ({name})")
        }
        FieldKind::Bcd => format!("{:x}.{:02x}", value >> 8, value & 0xFF),
        FieldKind::Id => format!("{value:04x}"),
        FieldKind::StringIndex if value == 0 => "0 (none)".to_string(),
        FieldKind::StringIndex => format!("#{value}"),
        FieldKind::Bitmap | FieldKind::ClassCode => format!("{value:#04x}"),
        FieldKind::EndpointAddress => {
            let direction = if value & 0x80 != 0 { "IN" } else { "OUT" };
            format!("{value:#04x} (EP{} {direction})", value & 0x0F)
        }
        FieldKind::EndpointAttributes => {
            let kind = crate::packet::TransferType::from_attributes(value as u8);
            format!("{value:#04x} ({kind})")
        }
        FieldKind::PacketSize => format!("{} bytes", value & 0x07FF),
        FieldKind::Power => format!("{}mA", u32::from(value) * 2),
    }
}
