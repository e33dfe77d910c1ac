//! Fixed-width text encodings used by editor buffers.
//!
//! The buffer is a plain array of code units, so every encoding here has a
//! fixed unit width. Characters that need more than one unit (UTF-16
//! surrogate pairs) still encode, they just occupy more than one cell.

use serde::Serialize;

/// Byte order for multi-byte integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// Decode an unsigned integer from a 1, 2, 4 or 8 byte slice.
///
/// Returns `None` for any other length.
pub fn decode_uint(bytes: &[u8], endian: Endian) -> Option<u64> {
    let value = match (bytes.len(), endian) {
        (1, _) => u64::from(bytes[0]),
        (2, Endian::Little) => u64::from(u16::from_le_bytes(bytes.try_into().ok()?)),
        (2, Endian::Big) => u64::from(u16::from_be_bytes(bytes.try_into().ok()?)),
        (4, Endian::Little) => u64::from(u32::from_le_bytes(bytes.try_into().ok()?)),
        (4, Endian::Big) => u64::from(u32::from_be_bytes(bytes.try_into().ok()?)),
        (8, Endian::Little) => u64::from_le_bytes(bytes.try_into().ok()?),
        (8, Endian::Big) => u64::from_be_bytes(bytes.try_into().ok()?),
        _ => return None,
    };
    Some(value)
}

/// Text encoding of a buffer cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    /// 7-bit ASCII, one byte per cell.
    Ascii,
    /// UTF-16 little endian, the native wide-character layout on Windows.
    #[default]
    Utf16Le,
    Utf16Be,
    Utf32Le,
}

impl TextEncoding {
    /// Width in bytes of one code unit.
    pub const fn unit_width(self) -> usize {
        match self {
            Self::Ascii => 1,
            Self::Utf16Le | Self::Utf16Be => 2,
            Self::Utf32Le => 4,
        }
    }

    /// Encode `text` into the buffer's byte layout.
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Self::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
            Self::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Self::Utf16Be => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
            Self::Utf32Le => text.chars().flat_map(|c| u32::from(c).to_le_bytes()).collect(),
        }
    }

    /// Decode bytes read back from a buffer.
    ///
    /// Trailing bytes that do not fill a whole unit are ignored. Invalid units
    /// become U+FFFD.
    pub fn decode(self, bytes: &[u8]) -> String {
        let width = self.unit_width();
        let endian = match self {
            Self::Utf16Be => Endian::Big,
            _ => Endian::Little,
        };
        let units = bytes
            .chunks_exact(width)
            .filter_map(move |chunk| decode_uint(chunk, endian));

        match self {
            Self::Ascii => units
                .map(|u| {
                    u8::try_from(u)
                        .ok()
                        .filter(u8::is_ascii)
                        .map_or(char::REPLACEMENT_CHARACTER, char::from)
                })
                .collect(),
            Self::Utf16Le | Self::Utf16Be => {
                let wide: Vec<u16> = units.filter_map(|u| u16::try_from(u).ok()).collect();
                String::from_utf16_lossy(&wide)
            }
            Self::Utf32Le => units
                .map(|u| {
                    u32::try_from(u)
                        .ok()
                        .and_then(char::from_u32)
                        .unwrap_or(char::REPLACEMENT_CHARACTER)
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_uint_handles_each_width() {
        assert_eq!(decode_uint(&[0x7f], Endian::Little), Some(0x7f));
        assert_eq!(decode_uint(&[0x34, 0x12], Endian::Little), Some(0x1234));
        assert_eq!(decode_uint(&[0x12, 0x34], Endian::Big), Some(0x1234));
        assert_eq!(
            decode_uint(&[0x78, 0x56, 0x34, 0x12], Endian::Little),
            Some(0x1234_5678)
        );
        assert_eq!(
            decode_uint(&[1, 0, 0, 0, 0, 0, 0, 0x80], Endian::Little),
            Some(0x8000_0000_0000_0001)
        );
    }

    #[test]
    fn test_decode_uint_rejects_odd_widths() {
        assert_eq!(decode_uint(&[], Endian::Little), None);
        assert_eq!(decode_uint(&[1, 2, 3], Endian::Big), None);
    }

    #[test]
    fn test_utf16le_is_two_bytes_per_ascii_char() {
        let bytes = TextEncoding::Utf16Le.encode("AB");
        assert_eq!(bytes, vec![b'A', 0, b'B', 0]);
        assert_eq!(TextEncoding::Utf16Le.decode(&bytes), "AB");
    }

    #[test]
    fn test_utf16be_orders_high_byte_first() {
        assert_eq!(TextEncoding::Utf16Be.encode("A"), vec![0, b'A']);
    }

    #[test]
    fn test_ascii_replaces_unrepresentable_chars() {
        assert_eq!(TextEncoding::Ascii.encode("aé"), b"a?".to_vec());
    }

    #[test]
    fn test_utf32_round_trips_non_bmp_char() {
        let bytes = TextEncoding::Utf32Le.encode("🦀");
        assert_eq!(bytes.len(), 4);
        assert_eq!(TextEncoding::Utf32Le.decode(&bytes), "🦀");
    }

    #[test]
    fn test_decode_ignores_partial_trailing_unit() {
        assert_eq!(TextEncoding::Utf16Le.decode(&[b'x', 0, b'y']), "x");
    }
}
