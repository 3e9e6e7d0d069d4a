use super::error::DescriptorError;
use super::layout;

/// Bounds-checked little-endian reads over one descriptor's bytes.
pub struct DescriptorReader<'a> {
    bytes: &'a [u8],
}

impl<'a> DescriptorReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn require_len(&self, needed: usize) -> Result<(), DescriptorError> {
        if self.bytes.len() < needed {
            return Err(DescriptorError::TooShort {
                needed,
                actual: self.bytes.len(),
            });
        }
        Ok(())
    }

    pub fn read_u8(&self, offset: usize) -> Result<u8, DescriptorError> {
        self.bytes
            .get(offset)
            .copied()
            .ok_or(DescriptorError::TooShort {
                needed: offset + 1,
                actual: self.bytes.len(),
            })
    }

    pub fn read_u16_le(&self, offset: usize) -> Result<u16, DescriptorError> {
        let bytes = self.read_slice(offset..offset + 2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_slice(&self, range: std::ops::Range<usize>) -> Result<&'a [u8], DescriptorError> {
        self.bytes
            .get(range.clone())
            .ok_or(DescriptorError::TooShort {
                needed: range.end,
                actual: self.bytes.len(),
            })
    }

    /// Declared length and descriptor type, without consuming anything.
    pub fn peek_header(&self) -> Result<(u8, u8), DescriptorError> {
        self.require_len(layout::HEADER_LEN)?;
        Ok((
            self.read_u8(layout::LENGTH_OFFSET)?,
            self.read_u8(layout::TYPE_OFFSET)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::DescriptorReader;
    use crate::descriptor::error::DescriptorError;

    #[test]
    fn reads_little_endian_words() {
        let reader = DescriptorReader::new(&[0x12, 0x01, 0x00, 0x02]);
        assert_eq!(reader.read_u16_le(2).unwrap(), 0x0200);
        assert_eq!(reader.peek_header().unwrap(), (0x12, 0x01));
    }

    #[test]
    fn short_reads_report_needed_length() {
        let reader = DescriptorReader::new(&[0x12]);
        assert_eq!(
            reader.peek_header().unwrap_err(),
            DescriptorError::TooShort {
                needed: 2,
                actual: 1
            }
        );
        assert!(reader.read_u16_le(0).is_err());
    }
}
