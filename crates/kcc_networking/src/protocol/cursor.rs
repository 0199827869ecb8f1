//! Bounds-checked word cursors over byte slices.

use bytemuck::Pod;
use kcc_shared::Vec3;

use super::{WireError, WireResult, WORD_SIZE};

/// Writes little-endian words into a byte slice.
pub struct WordWriter<'a> {
    buffer: &'a mut [u8],
    position: usize,
}

impl<'a> WordWriter<'a> {
    /// Creates a writer at the start of `buffer`.
    #[must_use]
    pub fn new(buffer: &'a mut [u8]) -> Self {
        Self { buffer, position: 0 }
    }

    /// Bytes written so far.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Words written so far.
    #[inline]
    #[must_use]
    pub const fn word_position(&self) -> usize {
        self.position / WORD_SIZE
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> WireResult<()> {
        let end = self.position + bytes.len();
        if end > self.buffer.len() {
            return Err(WireError::BufferTooSmall {
                required: end,
                available: self.buffer.len(),
            });
        }
        self.buffer[self.position..end].copy_from_slice(bytes);
        self.position = end;
        Ok(())
    }

    /// Writes a `u32`.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::BufferTooSmall`] if the word does not fit.
    #[inline]
    pub fn write_u32(&mut self, value: u32) -> WireResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Writes an `i32`.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::BufferTooSmall`] if the word does not fit.
    #[inline]
    pub fn write_i32(&mut self, value: i32) -> WireResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Writes an `f32`.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::BufferTooSmall`] if the word does not fit.
    #[inline]
    pub fn write_f32(&mut self, value: f32) -> WireResult<()> {
        self.write_bytes(&value.to_le_bytes())
    }

    /// Writes three `f32` words.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::BufferTooSmall`] if the words do not fit.
    pub fn write_vec3(&mut self, value: Vec3) -> WireResult<()> {
        self.write_f32(value.x)?;
        self.write_f32(value.y)?;
        self.write_f32(value.z)
    }

    /// Writes a POD value as raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::BufferTooSmall`] if the value does not fit.
    pub fn write_pod<T: Pod>(&mut self, value: &T) -> WireResult<()> {
        self.write_bytes(bytemuck::bytes_of(value))
    }

    /// Writes `count` zero words.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::BufferTooSmall`] if the words do not fit.
    pub fn write_zeros(&mut self, count: usize) -> WireResult<()> {
        for _ in 0..count {
            self.write_u32(0)?;
        }
        Ok(())
    }
}

/// Reads little-endian words from a byte slice.
#[derive(Clone)]
pub struct WordReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> WordReader<'a> {
    /// Creates a reader at the start of `buffer`.
    #[must_use]
    pub const fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, position: 0 }
    }

    /// Creates a reader positioned at word `word`.
    #[must_use]
    pub const fn at_word(buffer: &'a [u8], word: usize) -> Self {
        Self {
            buffer,
            position: word * WORD_SIZE,
        }
    }

    /// Bytes left to read.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    fn take<const N: usize>(&mut self) -> WireResult<[u8; N]> {
        let end = self.position + N;
        let bytes = self
            .buffer
            .get(self.position..end)
            .ok_or(WireError::Truncated { offset: self.position })?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.position = end;
        Ok(out)
    }

    /// Reads a `u32`.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Truncated`] past the end of the input.
    #[inline]
    pub fn read_u32(&mut self) -> WireResult<u32> {
        self.take::<4>().map(u32::from_le_bytes)
    }

    /// Reads an `i32`.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Truncated`] past the end of the input.
    #[inline]
    pub fn read_i32(&mut self) -> WireResult<i32> {
        self.take::<4>().map(i32::from_le_bytes)
    }

    /// Reads an `f32`.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Truncated`] past the end of the input.
    #[inline]
    pub fn read_f32(&mut self) -> WireResult<f32> {
        self.take::<4>().map(f32::from_le_bytes)
    }

    /// Reads three `f32` words.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Truncated`] past the end of the input.
    pub fn read_vec3(&mut self) -> WireResult<Vec3> {
        Ok(Vec3::new(self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    /// Reads a POD value from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Truncated`] past the end of the input.
    pub fn read_pod<T: Pod>(&mut self) -> WireResult<T> {
        let size = std::mem::size_of::<T>();
        let end = self.position + size;
        let bytes = self
            .buffer
            .get(self.position..end)
            .ok_or(WireError::Truncated { offset: self.position })?;
        let value = bytemuck::try_pod_read_unaligned(bytes).map_err(|_| WireError::Truncated { offset: self.position })?;
        self.position = end;
        Ok(value)
    }

    /// Skips `count` words.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Truncated`] if fewer words are left.
    pub fn skip_words(&mut self, count: usize) -> WireResult<()> {
        let end = self.position + count * WORD_SIZE;
        if end > self.buffer.len() {
            return Err(WireError::Truncated { offset: self.position });
        }
        self.position = end;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kcc_core::NetworkId;

    #[test]
    fn test_words_are_little_endian() {
        let mut buffer = [0u8; 8];
        let mut writer = WordWriter::new(&mut buffer);
        writer.write_u32(0x0403_0201).unwrap();
        writer.write_i32(-2).unwrap();
        assert_eq!(writer.word_position(), 2);
        assert_eq!(buffer[..4], [1, 2, 3, 4]);

        let mut reader = WordReader::new(&buffer);
        assert_eq!(reader.read_u32().unwrap(), 0x0403_0201);
        assert_eq!(reader.read_i32().unwrap(), -2);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_writer_rejects_overflow() {
        let mut buffer = [0u8; 10];
        let mut writer = WordWriter::new(&mut buffer);
        writer.write_vec3(Vec3::ZERO).unwrap_err();

        let mut writer = WordWriter::new(&mut buffer);
        writer.write_u32(1).unwrap();
        writer.write_u32(2).unwrap();
        assert_eq!(
            writer.write_u32(3),
            Err(WireError::BufferTooSmall {
                required: 12,
                available: 10
            })
        );
        assert_eq!(writer.position(), 8);
    }

    #[test]
    fn test_reader_reports_truncation_offset() {
        let buffer = [0u8; 6];
        let mut reader = WordReader::new(&buffer);
        reader.read_f32().unwrap();
        assert_eq!(reader.read_f32(), Err(WireError::Truncated { offset: 4 }));
        assert_eq!(reader.skip_words(1), Err(WireError::Truncated { offset: 4 }));
    }

    #[test]
    fn test_pod_values_use_raw_layout() {
        let id = NetworkId::prefab(77, 3);
        let mut buffer = [0u8; 12];
        let mut writer = WordWriter::new(&mut buffer);
        writer.write_u32(9).unwrap();
        writer.write_pod(&id).unwrap();

        let mut reader = WordReader::at_word(&buffer, 1);
        assert_eq!(reader.read_pod::<NetworkId>().unwrap(), id);
        assert_eq!(WordReader::at_word(&buffer, 1).read_u32().unwrap(), 77);
    }
}
