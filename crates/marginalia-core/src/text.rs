//! UTF-16 offset helpers.
//!
//! Offsets handed to and from the document are UTF-16 code units, while Rust
//! strings are UTF-8. These helpers convert between the two without allocating.

use std::ops::Range;

/// Length of a string in UTF-16 code units.
pub fn utf16_len(s: &str) -> usize {
    s.chars().map(char::len_utf16).sum()
}

/// Convert a UTF-16 offset to a byte offset.
///
/// Returns None if the offset is past the end or falls inside a surrogate pair.
pub fn utf16_to_byte(s: &str, offset: usize) -> Option<usize> {
    let mut units = 0;
    for (byte, ch) in s.char_indices() {
        if units == offset {
            return Some(byte);
        }
        units += ch.len_utf16();
        if units > offset {
            return None;
        }
    }
    (units == offset).then_some(s.len())
}

/// Convert a byte offset to a UTF-16 offset.
///
/// Byte offsets that are not on a char boundary round down.
pub fn byte_to_utf16(s: &str, byte: usize) -> usize {
    let mut end = byte.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    utf16_len(&s[..end])
}

/// Slice a string by a UTF-16 range.
pub fn utf16_slice(s: &str, range: Range<usize>) -> Option<&str> {
    if range.start > range.end {
        return None;
    }
    let start = utf16_to_byte(s, range.start)?;
    let end = utf16_to_byte(s, range.end)?;
    s.get(start..end)
}

/// Split a string at a UTF-16 offset.
pub fn utf16_split(s: &str, offset: usize) -> Option<(&str, &str)> {
    let byte = utf16_to_byte(s, offset)?;
    Some(s.split_at(byte))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_offsets() {
        let s = "The quick brown fox";
        assert_eq!(utf16_len(s), 19);
        assert_eq!(utf16_slice(s, 4..9), Some("quick"));
        assert_eq!(utf16_to_byte(s, 19), Some(19));
        assert_eq!(utf16_to_byte(s, 20), None);
    }

    #[test]
    fn test_multibyte_offsets() {
        // é is 2 bytes in UTF-8 and 1 unit in UTF-16
        let s = "café au lait";
        assert_eq!(utf16_len(s), 12);
        assert_eq!(utf16_slice(s, 0..4), Some("café"));
        assert_eq!(byte_to_utf16(s, 5), 4);
    }

    #[test]
    fn test_surrogate_pairs() {
        // 🦀 is 4 bytes in UTF-8 and 2 units in UTF-16
        let s = "a🦀b";
        assert_eq!(utf16_len(s), 4);
        assert_eq!(utf16_slice(s, 1..3), Some("🦀"));
        assert_eq!(utf16_to_byte(s, 2), None);
        assert_eq!(utf16_slice(s, 0..2), None);
        assert_eq!(utf16_split(s, 3), Some(("a🦀", "b")));
    }

    #[test]
    fn test_reversed_range() {
        assert_eq!(utf16_slice("abc", 2..1), None);
    }
}
