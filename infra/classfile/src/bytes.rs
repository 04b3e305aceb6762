use crate::error::ClassFileError;

/// Big-endian cursor over class data. Every read is bounds checked.
#[derive(Debug, Clone)]
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) const fn position(&self) -> usize {
        self.pos
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub(crate) fn bytes(&mut self, len: usize) -> Result<&'a [u8], ClassFileError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(ClassFileError::Truncated { offset: self.pos, context: None })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Bytes consumed since `start`.
    pub(crate) fn since(&self, start: usize) -> &'a [u8] {
        &self.data[start..self.pos]
    }

    pub(crate) fn skip(&mut self, len: usize) -> Result<(), ClassFileError> {
        self.bytes(len).map(|_| ())
    }

    pub(crate) fn u8(&mut self) -> Result<u8, ClassFileError> {
        Ok(self.bytes(1)?[0])
    }

    pub(crate) fn u16(&mut self) -> Result<u16, ClassFileError> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn u32(&mut self) -> Result<u32, ClassFileError> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub(crate) fn i16(&mut self) -> Result<i16, ClassFileError> {
        self.u16().map(|v| v as i16)
    }

    pub(crate) fn i32(&mut self) -> Result<i32, ClassFileError> {
        self.u32().map(|v| v as i32)
    }
}

/// Big-endian writes onto a byte buffer.
pub(crate) trait ByteSink {
    fn put_u8(&mut self, value: u8);
    fn put_u16(&mut self, value: u16);
    fn put_u32(&mut self, value: u32);

    fn put_i16(&mut self, value: i16) {
        self.put_u16(value as u16);
    }

    fn put_i32(&mut self, value: i32) {
        self.put_u32(value as u32);
    }
}

impl ByteSink for Vec<u8> {
    fn put_u8(&mut self, value: u8) {
        self.push(value);
    }

    fn put_u16(&mut self, value: u16) {
        self.extend_from_slice(&value.to_be_bytes());
    }

    fn put_u32(&mut self, value: u32) {
        self.extend_from_slice(&value.to_be_bytes());
    }
}

/// Narrows a length to the `u16` the format stores.
pub(crate) fn u16_len(len: usize, what: &'static str) -> Result<u16, ClassFileError> {
    u16::try_from(len).map_err(|_| ClassFileError::Internal {
        message: format!("{what} count {len} does not fit in 16 bits").into(),
        context: None,
    })
}

/// Narrows a length to the `u32` the format stores.
pub(crate) fn u32_len(len: usize, what: &'static str) -> Result<u32, ClassFileError> {
    u32::try_from(len).map_err(|_| ClassFileError::Internal {
        message: format!("{what} length {len} does not fit in 32 bits").into(),
        context: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian() {
        let mut reader = Reader::new(&[0x12, 0x34, 0xff, 0xfe, 0, 0, 0, 1]);
        assert_eq!(reader.u16().unwrap(), 0x1234);
        assert_eq!(reader.i16().unwrap(), -2);
        assert_eq!(reader.u32().unwrap(), 1);
        assert!(reader.is_empty());
    }

    #[test]
    fn short_reads_report_offset() {
        let mut reader = Reader::new(&[1, 2, 3]);
        reader.u16().unwrap();
        let err = reader.u16().unwrap_err();
        assert!(matches!(err, ClassFileError::Truncated { offset: 2, .. }));
    }
}
