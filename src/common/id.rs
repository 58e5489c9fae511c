use rand::RngExt;

const ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generate random raw bytes for a request nonce
pub fn generate_nonce_bytes() -> [u8; 5] {
    let mut bytes = [0u8; 5];
    let mut rng = rand::rng();
    rng.fill(&mut bytes);
    bytes
}

/// Generate an 8-character uppercase nonce (no ambiguous `0/O/1/I`).
///
/// The output only contains characters translators leave alone: uppercase
/// ASCII letters and digits, no whitespace and no punctuation.
pub fn generate_nonce() -> String {
    format_nonce(&generate_nonce_bytes())
}

/// Format 40 random bits as eight base-32 characters
pub fn format_nonce(bytes: &[u8; 5]) -> String {
    let mut value: u64 = 0;
    for b in bytes {
        value = (value << 8) | u64::from(*b);
    }
    let mut out = String::with_capacity(8);
    for shift in (0..8).rev() {
        let idx = ((value >> (shift * 5)) & 0x1f) as usize;
        out.push(ALPHABET[idx] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_nonce_format() {
        let s = generate_nonce();
        assert_eq!(s.len(), 8);
        for ch in s.chars() {
            assert!(ch.is_ascii_uppercase() || ch.is_ascii_digit());
            assert!(!matches!(ch, '0' | 'O' | '1' | 'I'));
        }
    }

    #[test]
    fn test_format_nonce_is_deterministic() {
        assert_eq!(format_nonce(&[0, 0, 0, 0, 0]), "AAAAAAAA");
        assert_eq!(format_nonce(&[0xff; 5]), "99999999");
    }
}
