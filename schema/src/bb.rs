use std::str;

use crate::error::{Result, WireError};
use crate::order::ByteOrder;

/// Zigzag-rotates a signed value so that small magnitudes of either sign
/// produce small unsigned values.
pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode`].
pub fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Number of bytes needed to LEB128-encode `value`.
pub fn var_uint_len(mut value: u64) -> usize {
    let mut len = 1;
    while value > 0x7F {
        value >>= 7;
        len += 1;
    }
    len
}

/// Number of bytes needed to encode `value` as a zigzag varint.
pub fn var_int_len(value: i64) -> usize {
    var_uint_len(zigzag_encode(value))
}

/// Maximum number of bytes a varint of the given width may occupy.
pub fn var_max_len(bits: u8) -> usize {
    (bits as usize + 6) / 7
}

/// Whether `value` fits a two's complement integer of `bits` bits.
pub fn fits_signed(value: i128, bits: u8) -> bool {
    let half = 1i128 << (bits - 1);
    value >= -half && value < half
}

/// Whether `value` fits an unsigned integer of `bits` bits.
pub fn fits_unsigned(value: i128, bits: u8) -> bool {
    value >= 0 && value < (1i128 << bits)
}

/// The all-ones pattern of a length prefix, reserved as the null sentinel.
pub fn null_length(bits: u8) -> u64 {
    if bits == 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Largest byte length a prefix of `bits` bits may carry.
pub fn max_length(bits: u8) -> usize {
    match bits {
        32 => i32::MAX as usize,
        _ => null_length(bits) as usize - 1,
    }
}

/// A bounded, read-only window over caller-owned bytes. Reads take absolute
/// offsets and never look past `limit`.
///
/// ```
/// use brine_wire_schema::{ByteBuffer, ByteOrder};
/// let bb = ByteBuffer::new(&[0x18, 0x83, 0x01, 0x00, 0x2A]);
/// assert_eq!(bb.read_var_int(0, 32), Ok((12, 1)));
/// assert_eq!(bb.read_var_int(1, 32), Ok((-66, 2)));
/// assert_eq!(bb.read_int(3, 16, ByteOrder::Network), Ok(42));
/// ```
#[derive(Clone, Copy)]
pub struct ByteBuffer<'a> {
    data:  &'a [u8],
    limit: usize,
}

impl<'a> ByteBuffer<'a> {
    /// Wraps the whole slice.
    pub fn new(data: &'a [u8]) -> ByteBuffer<'a> {
        ByteBuffer { data, limit: data.len() }
    }

    /// Wraps the slice but refuses reads at or beyond `max_limit`.
    pub fn with_limit(data: &'a [u8], max_limit: usize) -> ByteBuffer<'a> {
        ByteBuffer {
            data,
            limit: max_limit.min(data.len()),
        }
    }

    /// Retrieves the underlying byte slice.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// First offset that may not be read.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Fails unless `need` bytes are readable at `offset`.
    pub fn check(&self, offset: usize, need: usize) -> Result<usize> {
        match offset.checked_add(need) {
            Some(end) if end <= self.limit => Ok(end),
            _ => Err(WireError::Truncated {
                offset,
                need,
                limit: self.limit,
            }),
        }
    }

    pub fn read_byte(&self, offset: usize) -> Result<u8> {
        self.check(offset, 1)?;
        Ok(self.data[offset])
    }

    pub fn read_bytes(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        let end = self.check(offset, len)?;
        Ok(&self.data[offset..end])
    }

    /// Reads a fixed-width signed integer, sign-extending it to 64 bits.
    pub fn read_int(&self, offset: usize, bits: u8, order: ByteOrder) -> Result<i64> {
        let raw = self.read_uint(offset, bits, order)?;
        let shift = 64 - bits as u32;
        Ok(((raw << shift) as i64) >> shift)
    }

    /// Reads a fixed-width integer, masked to its width.
    pub fn read_uint(&self, offset: usize, bits: u8, order: ByteOrder) -> Result<u64> {
        let bytes = self.read_bytes(offset, bits as usize / 8)?;
        Ok(order.unpack(bytes))
    }

    /// Reads a LEB128 value of at most `bits` bits. Returns the value and
    /// the number of bytes consumed.
    pub fn read_var_uint(&self, offset: usize, bits: u8) -> Result<(u64, usize)> {
        let max_len = var_max_len(bits);
        let mut result: u128 = 0;
        let mut shift = 0u32;
        let mut len = 0;

        loop {
            if len == max_len {
                return Err(WireError::ValueTooLong { offset, bits });
            }
            let byte = self.read_byte(offset + len)?;
            result |= ((byte & 0x7F) as u128) << shift;
            len += 1;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }

        if result >> bits != 0 {
            return Err(WireError::ExceedsBits {
                offset,
                bits,
                value: result as i128,
            });
        }
        Ok((result as u64, len))
    }

    /// Reads a zigzag varint of `bits` bits (32 or 64).
    pub fn read_var_int(&self, offset: usize, bits: u8) -> Result<(i64, usize)> {
        let (raw, len) = self.read_var_uint(offset, bits)?;
        Ok((zigzag_decode(raw), len))
    }

    /// Reads a length prefix. `None` is the all-ones null sentinel.
    pub fn read_length(&self, offset: usize, bits: u8, order: ByteOrder) -> Result<Option<usize>> {
        let raw = self.read_uint(offset, bits, order)?;
        if raw == null_length(bits) {
            return Ok(None);
        }
        if raw as usize > max_length(bits) {
            return Err(WireError::NegativeLength {
                offset,
                length: self.read_int(offset, bits, order)?,
            });
        }
        Ok(Some(raw as usize))
    }

    /// Reads length-prefixed octets. Returns the payload (absent when null)
    /// and the limit just past the value.
    pub fn read_octets(
        &self,
        offset: usize,
        bits: u8,
        order: ByteOrder,
    ) -> Result<(Option<&'a [u8]>, usize)> {
        let length = self.read_length(offset, bits, order)?;
        // The prefix was readable, so this cannot overflow.
        let start = offset + bits as usize / 8;
        match length {
            None => Ok((None, start)),
            Some(len) => Ok((Some(self.read_bytes(start, len)?), start + len)),
        }
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn read_string(
        &self,
        offset: usize,
        bits: u8,
        order: ByteOrder,
    ) -> Result<(Option<&'a str>, usize)> {
        let (bytes, limit) = self.read_octets(offset, bits, order)?;
        match bytes {
            None => Ok((None, limit)),
            Some(bytes) => {
                let text = str::from_utf8(bytes).map_err(|_| WireError::InvalidUtf8 {
                    offset: offset + bits as usize / 8,
                })?;
                Ok((Some(text), limit))
            }
        }
    }
}


/// A bounded, writable window over caller-owned bytes. Every write checks the
/// prospective limit against `max_limit` before touching memory.
///
/// ```
/// let mut bytes = [0u8; 4];
/// let mut bb = brine_wire_schema::ByteBufferMut::new(&mut bytes);
/// assert_eq!(bb.write_var_int(0, 32, -66), Ok(2));
/// assert_eq!(bb.write_var_int(2, 32, 12), Ok(3));
/// assert_eq!(bytes, [0x83, 0x01, 0x18, 0x00]);
/// ```
pub struct ByteBufferMut<'a> {
    data:      &'a mut [u8],
    max_limit: usize,
}

impl<'a> ByteBufferMut<'a> {
    pub fn new(data: &'a mut [u8]) -> ByteBufferMut<'a> {
        let max_limit = data.len();
        ByteBufferMut { data, max_limit }
    }

    pub fn with_limit(data: &'a mut [u8], max_limit: usize) -> ByteBufferMut<'a> {
        let max_limit = max_limit.min(data.len());
        ByteBufferMut { data, max_limit }
    }

    /// Borrows this buffer for a nested writer with the same bounds.
    pub fn reborrow(&mut self) -> ByteBufferMut<'_> {
        ByteBufferMut {
            data:      &mut *self.data,
            max_limit: self.max_limit,
        }
    }

    pub fn max_limit(&self) -> usize {
        self.max_limit
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..]
    }

    /// Fails unless `need` bytes may be written at `offset`. Returns the
    /// prospective limit.
    pub fn check(&self, offset: usize, need: usize) -> Result<usize> {
        match offset.checked_add(need) {
            Some(end) if end <= self.max_limit => Ok(end),
            _ => Err(WireError::OutOfBounds {
                offset,
                need,
                max_limit: self.max_limit,
            }),
        }
    }

    pub fn write_bytes(&mut self, offset: usize, value: &[u8]) -> Result<usize> {
        let end = self.check(offset, value.len())?;
        self.data[offset..end].copy_from_slice(value);
        Ok(end)
    }

    /// Sets `len` bytes at `offset` to `value`.
    pub fn fill(&mut self, offset: usize, len: usize, value: u8) -> Result<usize> {
        let end = self.check(offset, len)?;
        self.data[offset..end].fill(value);
        Ok(end)
    }

    /// Writes the low `bits` bits of `raw` without any range check.
    pub fn write_bits(
        &mut self,
        offset: usize,
        bits: u8,
        order: ByteOrder,
        raw: u64,
    ) -> Result<usize> {
        let width = bits as usize / 8;
        let end = self.check(offset, width)?;
        order.pack(raw, width, &mut self.data[offset..end]);
        Ok(end)
    }

    /// Writes a signed fixed-width integer, rejecting values outside its range.
    pub fn write_int(
        &mut self,
        offset: usize,
        bits: u8,
        order: ByteOrder,
        value: i64,
    ) -> Result<usize> {
        if !fits_signed(value as i128, bits) {
            return Err(WireError::ExceedsBits {
                offset,
                bits,
                value: value as i128,
            });
        }
        self.write_bits(offset, bits, order, value as u64)
    }

    /// Writes an unsigned fixed-width integer, rejecting values outside `[0, 2^bits)`.
    pub fn write_uint(
        &mut self,
        offset: usize,
        bits: u8,
        order: ByteOrder,
        value: u64,
    ) -> Result<usize> {
        if !fits_unsigned(value as i128, bits) {
            return Err(WireError::ExceedsBits {
                offset,
                bits,
                value: value as i128,
            });
        }
        self.write_bits(offset, bits, order, value)
    }

    /// Writes a LEB128 value, rejecting values wider than `bits`.
    pub fn write_var_uint(&mut self, offset: usize, bits: u8, mut value: u64) -> Result<usize> {
        if bits < 64 && value >> bits != 0 {
            return Err(WireError::ExceedsBits {
                offset,
                bits,
                value: value as i128,
            });
        }
        let end = self.check(offset, var_uint_len(value))?;
        let mut index = offset;
        loop {
            let byte = value as u8 & 0x7F;
            value >>= 7;
            if value == 0 {
                self.data[index] = byte;
                break;
            }
            self.data[index] = byte | 0x80;
            index += 1;
        }
        Ok(end)
    }

    /// Writes a zigzag varint; the rotated magnitude must fit `bits`.
    pub fn write_var_int(&mut self, offset: usize, bits: u8, value: i64) -> Result<usize> {
        if !fits_signed(value as i128, bits) {
            return Err(WireError::ExceedsBits {
                offset,
                bits,
                value: value as i128,
            });
        }
        self.write_var_uint(offset, bits, zigzag_encode(value))
    }

    /// Writes a length prefix; `None` writes the null sentinel.
    pub fn write_length(
        &mut self,
        offset: usize,
        bits: u8,
        order: ByteOrder,
        len: Option<usize>,
    ) -> Result<usize> {
        match len {
            None => self.write_bits(offset, bits, order, null_length(bits)),
            Some(len) if len <= max_length(bits) => {
                self.write_bits(offset, bits, order, len as u64)
            }
            Some(len) => Err(WireError::ExceedsBits {
                offset,
                bits,
                value: len as i128,
            }),
        }
    }

    /// Writes length-prefixed octets. Nothing is written if the whole value
    /// does not fit.
    pub fn write_octets(
        &mut self,
        offset: usize,
        bits: u8,
        order: ByteOrder,
        value: Option<&[u8]>,
    ) -> Result<usize> {
        let prefix = bits as usize / 8;
        let len = value.map_or(0, <[u8]>::len);
        self.check(offset, prefix + len)?;
        let start = self.write_length(offset, bits, order, value.map(<[u8]>::len))?;
        match value {
            None => Ok(start),
            Some(bytes) => self.write_bytes(start, bytes),
        }
    }

    pub fn write_string(
        &mut self,
        offset: usize,
        bits: u8,
        order: ByteOrder,
        value: Option<&str>,
    ) -> Result<usize> {
        self.write_octets(offset, bits, order, value.map(str::as_bytes))
    }
}

#[cfg(test)]
mod write_tests {
    use super::*;

    fn write_once(cb: impl FnOnce(&mut ByteBufferMut) -> Result<usize>) -> Vec<u8> {
        let mut bytes = [0u8; 16];
        let mut bb = ByteBufferMut::new(&mut bytes);
        let limit = cb(&mut bb).unwrap();
        bytes[..limit].to_vec()
    }

    #[test]
    fn write_int() {
        assert_eq!(write_once(|bb| bb.write_int(0, 8, ByteOrder::Native, -1)), [0xFF]);
        assert_eq!(write_once(|bb| bb.write_int(0, 16, ByteOrder::Network, -257)), [0xFE, 0xFF]);
        assert_eq!(
            write_once(|bb| bb.write_int(0, 24, ByteOrder::Network, 0x010203)),
            [0x01, 0x02, 0x03]
        );
        assert_eq!(
            write_once(|bb| bb.write_int(0, 32, ByteOrder::Native, 7)),
            7i32.to_ne_bytes()
        );
    }

    #[test]
    fn write_int_checks_range() {
        let mut bytes = [0u8; 4];
        let mut bb = ByteBufferMut::new(&mut bytes);
        assert_eq!(
            bb.write_int(1, 8, ByteOrder::Native, 128),
            Err(WireError::ExceedsBits { offset: 1, bits: 8, value: 128 })
        );
        assert_eq!(
            bb.write_uint(0, 16, ByteOrder::Native, 65536),
            Err(WireError::ExceedsBits { offset: 0, bits: 16, value: 65536 })
        );
        assert_eq!(bb.write_uint(0, 16, ByteOrder::Network, 65535), Ok(2));
        assert_eq!(bytes, [0xFF, 0xFF, 0, 0]);
    }

    #[test]
    fn write_var_int() {
        assert_eq!(write_once(|bb| bb.write_var_int(0, 32, 0)), [0]);
        assert_eq!(write_once(|bb| bb.write_var_int(0, 32, -1)), [1]);
        assert_eq!(write_once(|bb| bb.write_var_int(0, 32, 1)), [2]);
        assert_eq!(write_once(|bb| bb.write_var_int(0, 32, 12)), [0x18]);
        assert_eq!(write_once(|bb| bb.write_var_int(0, 32, -66)), [0x83, 0x01]);
        assert_eq!(write_once(|bb| bb.write_var_int(0, 32, 64)), [128, 1]);
        assert_eq!(
            write_once(|bb| bb.write_var_int(0, 32, i32::MIN as i64)),
            [255, 255, 255, 255, 15]
        );
        assert_eq!(
            write_once(|bb| bb.write_var_int(0, 64, i64::MAX)),
            [0xFE, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]
        );
    }

    #[test]
    fn write_var_int_rejects_wide_values() {
        let mut bytes = [0u8; 8];
        let mut bb = ByteBufferMut::new(&mut bytes);
        assert_eq!(
            bb.write_var_int(3, 32, 1 << 31),
            Err(WireError::ExceedsBits { offset: 3, bits: 32, value: 1 << 31 })
        );
        assert_eq!(bytes, [0u8; 8]);
    }

    #[test]
    fn write_checks_bounds_before_mutating() {
        let mut bytes = [0xAAu8; 6];
        let mut bb = ByteBufferMut::with_limit(&mut bytes, 4);
        assert_eq!(
            bb.write_string(1, 8, ByteOrder::Native, Some("abcd")),
            Err(WireError::OutOfBounds { offset: 1, need: 5, max_limit: 4 })
        );
        assert_eq!(
            bb.write_var_int(3, 64, 1 << 12),
            Err(WireError::OutOfBounds { offset: 3, need: 2, max_limit: 4 })
        );
        assert_eq!(bytes, [0xAA; 6]);
    }

    #[test]
    fn fill_checks_bounds() {
        let mut bytes = [0xAAu8; 6];
        let mut bb = ByteBufferMut::with_limit(&mut bytes, 5);
        assert_eq!(bb.fill(1, 3, 0), Ok(4));
        assert_eq!(
            bb.fill(4, 2, 0),
            Err(WireError::OutOfBounds { offset: 4, need: 2, max_limit: 5 })
        );
        assert_eq!(
            bb.fill(usize::MAX, 1, 0),
            Err(WireError::OutOfBounds { offset: usize::MAX, need: 1, max_limit: 5 })
        );
        assert_eq!(bytes, [0xAA, 0, 0, 0, 0xAA, 0xAA]);
    }

    #[test]
    fn write_string() {
        assert_eq!(write_once(|bb| bb.write_string(0, 8, ByteOrder::Native, Some(""))), [0]);
        assert_eq!(write_once(|bb| bb.write_string(0, 8, ByteOrder::Native, None)), [0xFF]);
        assert_eq!(
            write_once(|bb| bb.write_string(0, 16, ByteOrder::Network, Some("ab"))),
            [0, 2, 97, 98]
        );
        assert_eq!(
            write_once(|bb| bb.write_string(0, 32, ByteOrder::Network, None)),
            [0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn varint_round_trip_boundaries() {
        for value in [0, 1, -1, 63, -64, 64, -65, i32::MAX as i64, i32::MIN as i64] {
            let mut bytes = [0u8; 10];
            let limit = ByteBufferMut::new(&mut bytes).write_var_int(0, 32, value).unwrap();
            assert_eq!(limit, var_int_len(value));
            assert_eq!(ByteBuffer::new(&bytes).read_var_int(0, 32), Ok((value, limit)));
        }
        for value in [i64::MAX, i64::MIN, 1 << 40, -(1 << 40)] {
            let mut bytes = [0u8; 10];
            let limit = ByteBufferMut::new(&mut bytes).write_var_int(0, 64, value).unwrap();
            assert_eq!(ByteBuffer::new(&bytes).read_var_int(0, 64), Ok((value, limit)));
        }
    }
}
