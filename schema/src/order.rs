use serde::{Deserialize, Serialize};

/// Byte order of a multi-byte primitive. Single-byte values ignore it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    /// Host byte order.
    #[default]
    Native,
    /// Big-endian.
    Network,
}

impl ByteOrder {
    /// Whether values in this order are laid out most significant byte first.
    pub fn is_big_endian(self) -> bool {
        match self {
            ByteOrder::Native => cfg!(target_endian = "big"),
            ByteOrder::Network => true,
        }
    }

    /// Keyword used for this order in schema text.
    pub fn keyword(self) -> &'static str {
        match self {
            ByteOrder::Native => "native",
            ByteOrder::Network => "network",
        }
    }

    /// Packs the low `width` bytes of `value` into `out[..width]`.
    pub fn pack(self, value: u64, width: usize, out: &mut [u8]) {
        for i in 0..width {
            let shift = if self.is_big_endian() {
                8 * (width - 1 - i)
            } else {
                8 * i
            };
            out[i] = (value >> shift) as u8;
        }
    }

    /// Unpacks `bytes` into the low bytes of a `u64`.
    pub fn unpack(self, bytes: &[u8]) -> u64 {
        let width = bytes.len();
        let mut value = 0u64;
        for (i, byte) in bytes.iter().enumerate() {
            let shift = if self.is_big_endian() {
                8 * (width - 1 - i)
            } else {
                8 * i
            };
            value |= (*byte as u64) << shift;
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_is_big_endian() {
        let mut out = [0u8; 3];
        ByteOrder::Network.pack(0x0A0B0C, 3, &mut out);
        assert_eq!(out, [0x0A, 0x0B, 0x0C]);
        assert_eq!(ByteOrder::Network.unpack(&out), 0x0A0B0C);
    }

    #[test]
    fn native_round_trips_through_host_order() {
        let mut out = [0u8; 4];
        ByteOrder::Native.pack(0x01020304, 4, &mut out);
        assert_eq!(out, 0x01020304u32.to_ne_bytes());
        assert_eq!(ByteOrder::Native.unpack(&out), 0x01020304);
    }
}
