//! Table-driven USB descriptor decoding.
//!
//! Each descriptor layout is a static [`layout::DescriptorSchema`]: an ordered
//! list of fixed-width little-endian fields, some pinned to a magic value,
//! followed by an optional trailing payload. [`registry`] maps descriptor
//! numbers (and class-specific subtypes) to schemas; [`parser`] applies a
//! schema to bytes and walks any descriptors packed after the head one.
//!
//! Decoding never panics on short input: fields past the end of the buffer
//! are left out and the result is marked truncated.

pub mod error;
pub mod languages;
pub mod layout;
pub mod parser;
pub mod reader;
pub mod registry;

pub use error::DescriptorError;
pub use layout::DescriptorSchema;
pub use parser::{
    DecodedDescriptor, DecodedField, ParsedDescriptor, SubordinateDescriptor, TrailingValue, decode,
    decode_with_subordinates, describe_language,
};
pub use registry::{schema_for_number, schema_for_request};
