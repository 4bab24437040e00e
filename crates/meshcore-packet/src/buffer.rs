//! Sequential byte cursor.
//!
//! [`BufferReader`] walks a byte slice front to back and fails with
//! [`PacketError::Truncated`] instead of panicking when a read runs past the
//! end. [`BufferWriter`] is the append-only counterpart used to build
//! command frames and packet bytes.
//!
//! Device framing is little-endian; CayenneLPP telemetry values are
//! big-endian, so both byte orders are available.

use bytes::{Buf, BufMut};

use crate::PacketError;

/// A positional reader over a byte slice.
#[derive(Debug, Clone)]
pub struct BufferReader<'a> {
    data: &'a [u8],
    cursor: &'a [u8],
}

impl<'a> BufferReader<'a> {
    /// Create a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        BufferReader { data, cursor: data }
    }

    /// Current read offset from the start of the buffer.
    pub fn offset(&self) -> usize {
        self.data.len() - self.cursor.len()
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.cursor.len()
    }

    /// Whether all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.cursor.is_empty()
    }

    fn ensure(&self, needed: usize) -> Result<(), PacketError> {
        if self.cursor.len() < needed {
            return Err(PacketError::truncated(
                self.offset(),
                needed,
                self.cursor.len(),
            ));
        }
        Ok(())
    }

    /// Read a single byte.
    pub fn read_byte(&mut self) -> Result<u8, PacketError> {
        self.read_u8()
    }

    /// Read `count` bytes.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], PacketError> {
        self.ensure(count)?;
        let (head, tail) = self.cursor.split_at(count);
        self.cursor = tail;
        Ok(head)
    }

    /// Read exactly `N` bytes into an array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], PacketError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Read every remaining byte.
    pub fn read_remaining(&mut self) -> &'a [u8] {
        let rest = self.cursor;
        self.cursor = &[];
        rest
    }

    /// Read the rest of the buffer as UTF-8 (invalid sequences are replaced).
    pub fn read_string(&mut self) -> String {
        String::from_utf8_lossy(self.read_remaining()).into_owned()
    }

    /// Read a fixed-width, null-terminated string field of `max_len` bytes.
    ///
    /// All `max_len` bytes are consumed; anything after the first zero byte
    /// is padding and is discarded.
    pub fn read_cstring(&mut self, max_len: usize) -> Result<String, PacketError> {
        let field = self.read_bytes(max_len)?;
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        Ok(String::from_utf8_lossy(&field[..end]).into_owned())
    }

    pub fn read_u8(&mut self) -> Result<u8, PacketError> {
        self.ensure(1)?;
        Ok(self.cursor.get_u8())
    }

    pub fn read_i8(&mut self) -> Result<i8, PacketError> {
        self.ensure(1)?;
        Ok(self.cursor.get_i8())
    }

    pub fn read_u16_le(&mut self) -> Result<u16, PacketError> {
        self.ensure(2)?;
        Ok(self.cursor.get_u16_le())
    }

    pub fn read_u16_be(&mut self) -> Result<u16, PacketError> {
        self.ensure(2)?;
        Ok(self.cursor.get_u16())
    }

    pub fn read_i16_le(&mut self) -> Result<i16, PacketError> {
        self.ensure(2)?;
        Ok(self.cursor.get_i16_le())
    }

    pub fn read_i16_be(&mut self) -> Result<i16, PacketError> {
        self.ensure(2)?;
        Ok(self.cursor.get_i16())
    }

    /// Read a signed 24-bit little-endian integer, sign-extended from bit 23.
    pub fn read_i24_le(&mut self) -> Result<i32, PacketError> {
        let b = self.read_array::<3>()?;
        Ok(sign_extend_24(u32::from_le_bytes([b[0], b[1], b[2], 0])))
    }

    /// Read a signed 24-bit big-endian integer, sign-extended from bit 23.
    pub fn read_i24_be(&mut self) -> Result<i32, PacketError> {
        let b = self.read_array::<3>()?;
        Ok(sign_extend_24(u32::from_be_bytes([0, b[0], b[1], b[2]])))
    }

    pub fn read_u32_le(&mut self) -> Result<u32, PacketError> {
        self.ensure(4)?;
        Ok(self.cursor.get_u32_le())
    }

    pub fn read_u32_be(&mut self) -> Result<u32, PacketError> {
        self.ensure(4)?;
        Ok(self.cursor.get_u32())
    }

    pub fn read_i32_le(&mut self) -> Result<i32, PacketError> {
        self.ensure(4)?;
        Ok(self.cursor.get_i32_le())
    }

    pub fn read_i32_be(&mut self) -> Result<i32, PacketError> {
        self.ensure(4)?;
        Ok(self.cursor.get_i32())
    }
}

fn sign_extend_24(raw: u32) -> i32 {
    ((raw << 8) as i32) >> 8
}

/// An append-only byte writer.
#[derive(Debug, Clone, Default)]
pub struct BufferWriter {
    buf: Vec<u8>,
}

impl BufferWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        BufferWriter::default()
    }

    /// Create an empty writer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        BufferWriter {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Borrow the written bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the writer and return the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_byte(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.buf.put_i8(value);
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Write `count` zero bytes.
    pub fn write_zeros(&mut self, count: usize) {
        self.buf.put_bytes(0, count);
    }

    pub fn write_u16_le(&mut self, value: u16) {
        self.buf.put_u16_le(value);
    }

    pub fn write_u32_le(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    pub fn write_i32_le(&mut self, value: i32) {
        self.buf.put_i32_le(value);
    }

    pub fn write_u16_be(&mut self, value: u16) {
        self.buf.put_u16(value);
    }

    pub fn write_i16_be(&mut self, value: i16) {
        self.buf.put_i16(value);
    }

    pub fn write_u32_be(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    /// Write the low 24 bits of `value` big-endian.
    pub fn write_i24_be(&mut self, value: i32) {
        let bytes = value.to_be_bytes();
        self.buf.put_slice(&bytes[1..]);
    }

    /// Write a string's UTF-8 bytes with no length prefix or terminator.
    pub fn write_string(&mut self, value: &str) {
        self.buf.put_slice(value.as_bytes());
    }

    /// Write a fixed-width, zero-padded string field of `max_len` bytes.
    ///
    /// Content longer than the field is truncated and the last byte is
    /// always zero, so at most `max_len - 1` content bytes survive.
    pub fn write_cstring(&mut self, value: &str, max_len: usize) {
        if max_len == 0 {
            return;
        }
        let mut field = vec![0u8; max_len];
        let bytes = value.as_bytes();
        let len = bytes.len().min(max_len);
        field[..len].copy_from_slice(&bytes[..len]);
        field[max_len - 1] = 0;
        self.buf.put_slice(&field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cstring_round_trip() {
        let mut writer = BufferWriter::new();
        writer.write_cstring("ABC", 32);
        let bytes = writer.into_bytes();
        assert_eq!(bytes.len(), 32);

        let mut reader = BufferReader::new(&bytes);
        assert_eq!(reader.read_cstring(32).unwrap(), "ABC");
        assert!(reader.is_empty());
    }

    #[test]
    fn test_cstring_truncates_and_terminates() {
        let name = "A".repeat(40);
        let mut writer = BufferWriter::new();
        writer.write_cstring(&name, 32);
        let bytes = writer.into_bytes();
        assert_eq!(bytes.len(), 32);
        assert_eq!(bytes[31], 0);

        let mut reader = BufferReader::new(&bytes);
        assert_eq!(reader.read_cstring(32).unwrap(), "A".repeat(31));
    }

    #[test]
    fn test_cstring_without_terminator_reads_whole_field() {
        let mut reader = BufferReader::new(b"abcd");
        assert_eq!(reader.read_cstring(4).unwrap(), "abcd");
    }

    #[test]
    fn test_little_and_big_endian() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let mut reader = BufferReader::new(&data);
        assert_eq!(reader.read_u16_le().unwrap(), 0x0201);
        assert_eq!(reader.read_u16_be().unwrap(), 0x0304);

        let mut reader = BufferReader::new(&data);
        assert_eq!(reader.read_u32_le().unwrap(), 0x0403_0201);

        let mut reader = BufferReader::new(&data);
        assert_eq!(reader.read_u32_be().unwrap(), 0x0102_0304);
    }

    #[test]
    fn test_i24_sign_extension() {
        let mut reader = BufferReader::new(&[0xFF, 0xFF, 0xFE, 0x7F, 0xFF, 0xFF]);
        assert_eq!(reader.read_i24_be().unwrap(), -2);
        assert_eq!(reader.read_i24_be().unwrap(), 0x7F_FFFF);

        let mut reader = BufferReader::new(&[0x00, 0x00, 0x80]);
        assert_eq!(reader.read_i24_le().unwrap(), -0x80_0000);
    }

    #[test]
    fn test_i24_write_read() {
        let mut writer = BufferWriter::new();
        writer.write_i24_be(-123_456);
        writer.write_i24_be(654_321);
        let bytes = writer.into_bytes();
        assert_eq!(bytes.len(), 6);

        let mut reader = BufferReader::new(&bytes);
        assert_eq!(reader.read_i24_be().unwrap(), -123_456);
        assert_eq!(reader.read_i24_be().unwrap(), 654_321);
    }

    #[test]
    fn test_read_past_end_is_truncated() {
        let mut reader = BufferReader::new(&[0x01, 0x02]);
        reader.read_u8().unwrap();
        let err = reader.read_u32_le().unwrap_err();
        assert_eq!(err, PacketError::truncated(1, 4, 1));
        // A failed read does not consume anything.
        assert_eq!(reader.remaining(), 1);
    }

    #[test]
    fn test_read_string_consumes_rest() {
        let mut reader = BufferReader::new(b"\x05hello");
        assert_eq!(reader.read_u8().unwrap(), 5);
        assert_eq!(reader.read_string(), "hello");
        assert!(reader.is_empty());
        assert_eq!(reader.read_string(), "");
    }

    #[test]
    fn test_signed_reads() {
        let mut reader = BufferReader::new(&[0xFF, 0xFF, 0x9C, 0xFE, 0xFF, 0xFF, 0xFF]);
        assert_eq!(reader.read_i8().unwrap(), -1);
        assert_eq!(reader.read_i16_be().unwrap(), -100);
        assert_eq!(reader.read_i32_le().unwrap(), -2);
    }
}
