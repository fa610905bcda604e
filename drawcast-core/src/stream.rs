//! Growable output buffer with back-patchable placeholders.
//!
//! Placeholders are plain offsets tagged with the buffer generation they
//! were reserved in. Growing the underlying `BytesMut` keeps offsets
//! valid; handing the contents off with [`take`](OutputBuffer::take)
//! starts a new generation, so a placeholder from a sent PDU can no
//! longer be patched.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::OrderError;

/// A reserved, zero-filled span waiting for its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder {
    offset: usize,
    width: usize,
    generation: u64,
}

impl Placeholder {
    /// Offset of the first reserved byte.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of reserved bytes (1..=4).
    pub fn width(&self) -> usize {
        self.width
    }
}

/// Write-only byte sink for one PDU at a time.
#[derive(Debug)]
pub struct OutputBuffer {
    buf: BytesMut,
    generation: u64,
    end: Option<usize>,
}

impl OutputBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            generation: 0,
            end: None,
        }
    }

    /// Current write offset.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes written so far in this generation.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn put_u16_le(&mut self, v: u16) {
        self.buf.put_u16_le(v);
    }

    pub fn put_slice(&mut self, src: &[u8]) {
        self.buf.put_slice(src);
    }

    pub fn put_zeros(&mut self, n: usize) {
        self.buf.put_bytes(0, n);
    }

    /// Absolute coordinate: low 16 bits, little-endian.
    pub fn put_coord(&mut self, v: i32) {
        self.buf.put_u16_le(v as u16);
    }

    /// Three color bytes, low first.
    pub fn put_color(&mut self, c: crate::types::Color) {
        self.buf.put_slice(&c.to_wire());
    }

    /// Reserve `width` zero bytes to be filled in later.
    pub fn reserve(&mut self, width: usize) -> Placeholder {
        debug_assert!((1..=4).contains(&width));
        let offset = self.buf.len();
        self.buf.put_bytes(0, width);
        Placeholder {
            offset,
            width,
            generation: self.generation,
        }
    }

    /// Fill a placeholder with `value`, least significant byte first.
    pub fn patch(&mut self, ph: Placeholder, value: u32) -> Result<(), OrderError> {
        if ph.generation != self.generation || ph.offset + ph.width > self.buf.len() {
            return Err(OrderError::StalePlaceholder { offset: ph.offset });
        }
        let bytes = value.to_le_bytes();
        self.buf[ph.offset..ph.offset + ph.width].copy_from_slice(&bytes[..ph.width]);
        Ok(())
    }

    /// Record the logical end of the PDU.
    pub fn mark_end(&mut self) {
        self.end = Some(self.buf.len());
    }

    /// Hand off everything up to the marked end (or the write offset)
    /// and start a new generation.
    pub fn take(&mut self) -> Bytes {
        let end = self.end.take().unwrap_or(self.buf.len());
        self.buf.truncate(end);
        self.generation += 1;
        self.buf.split().freeze()
    }

    /// Drop the current contents without sending them.
    pub fn discard(&mut self) {
        self.buf.clear();
        self.end = None;
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_writes_little_endian() {
        let mut out = OutputBuffer::with_capacity(16);
        out.put_u8(0xAA);
        let ph = out.reserve(3);
        out.put_u8(0xBB);
        out.patch(ph, 0x0020_0105).unwrap();
        assert_eq!(out.as_slice(), &[0xAA, 0x05, 0x01, 0x20, 0xBB]);
    }

    #[test]
    fn placeholder_survives_growth() {
        let mut out = OutputBuffer::with_capacity(4);
        let ph = out.reserve(2);
        out.put_zeros(10_000);
        out.patch(ph, 0x1234).unwrap();
        assert_eq!(&out.as_slice()[..2], &[0x34, 0x12]);
    }

    #[test]
    fn placeholder_from_sent_buffer_is_stale() {
        let mut out = OutputBuffer::with_capacity(16);
        let ph = out.reserve(2);
        let sent = out.take();
        assert_eq!(sent.len(), 2);
        out.put_zeros(4);
        assert!(matches!(
            out.patch(ph, 7),
            Err(OrderError::StalePlaceholder { offset: 0 })
        ));
    }

    #[test]
    fn take_honours_marked_end() {
        let mut out = OutputBuffer::with_capacity(16);
        out.put_slice(&[1, 2, 3]);
        out.mark_end();
        out.put_slice(&[4, 5]);
        let sent = out.take();
        assert_eq!(&sent[..], &[1, 2, 3]);
        assert!(out.is_empty());
    }

    #[test]
    fn coord_truncates_to_sixteen_bits() {
        let mut out = OutputBuffer::with_capacity(4);
        out.put_coord(-1);
        out.put_coord(0x1_0002);
        assert_eq!(out.as_slice(), &[0xff, 0xff, 0x02, 0x00]);
    }
}
