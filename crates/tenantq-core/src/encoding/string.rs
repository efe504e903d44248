/// Encode a string using the escaped-terminator scheme for lexicographic ordering.
///
/// For each byte `b` in the UTF-8 representation:
/// - If `b == 0x00`: emit `0x00 0xFF` (escape)
/// - Otherwise: emit `b` as-is
///
/// After all bytes: emit `0x00 0x00` (terminator).
pub fn encode_string(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len() + 2);
    for &b in s.as_bytes() {
        if b == 0x00 {
            out.push(0x00);
            out.push(0xFF);
        } else {
            out.push(b);
        }
    }
    out.push(0x00);
    out.push(0x00);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_ordering() {
        let strings = ["", "a", "aa", "ab", "b", "group1#user1@example.com"];
        let mut sorted = strings.to_vec();
        sorted.sort();
        let encoded: Vec<Vec<u8>> = sorted.iter().map(|s| encode_string(s)).collect();
        for pair in encoded.windows(2) {
            assert!(pair[0] < pair[1], "expected {:?} < {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_timestamp_ordering() {
        let earlier = encode_string("2024-01-01T00:00:09Z");
        let later = encode_string("2024-01-01T00:00:10Z");
        assert!(earlier < later);
    }

    #[test]
    fn test_nul_is_escaped() {
        let encoded = encode_string("a\x00b");
        assert_eq!(encoded, vec![b'a', 0x00, 0xFF, b'b', 0x00, 0x00]);
        assert!(encode_string("a") < encoded);
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(encode_string(""), vec![0x00, 0x00]);
    }
}
