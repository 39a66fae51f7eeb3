//! Little-endian field reader used by the payload decoders
//!
//! Payload lengths are checked against the message layout before a reader is
//! created, so reads never run past the end of the slice.

pub(crate) struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    pub(crate) fn array<const L: usize>(&mut self) -> [u8; L] {
        let mut out = [0u8; L];
        out.copy_from_slice(&self.bytes[self.offset..self.offset + L]);
        self.offset += L;
        out
    }

    pub(crate) fn slice(&mut self, length: usize) -> &'a [u8] {
        let out = &self.bytes[self.offset..self.offset + length];
        self.offset += length;
        out
    }

    pub(crate) fn u8(&mut self) -> u8 {
        self.array::<1>()[0]
    }

    pub(crate) fn i8(&mut self) -> i8 {
        i8::from_le_bytes(self.array())
    }

    pub(crate) fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.array())
    }

    pub(crate) fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.array())
    }

    pub(crate) fn i32(&mut self) -> i32 {
        i32::from_le_bytes(self.array())
    }

    pub(crate) fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.array())
    }

    pub(crate) fn i64(&mut self) -> i64 {
        i64::from_le_bytes(self.array())
    }

    pub(crate) fn digests(&mut self, count: usize) -> Vec<[u8; 32]> {
        (0..count).map(|_| self.array()).collect()
    }
}
