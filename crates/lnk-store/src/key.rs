//! Short key generation.
//!
//! Keys are the base-62 rendering of an ordinal, most significant symbol
//! first, over the alphabet `0-9A-Za-z`.

/// Symbols in ascending digit order.
pub const ALPHABET: &[u8; 62] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

const BASE: u64 = ALPHABET.len() as u64;

/// Render ordinal `n` as a short key.
///
/// `generate(0)` is `"0"`; no other key has a leading `'0'`.
pub fn generate(mut n: u64) -> String {
    if n == 0 {
        return (ALPHABET[0] as char).to_string();
    }
    // u64::MAX needs 11 base-62 digits.
    let mut buf = [0u8; 11];
    let mut i = buf.len();
    while n > 0 {
        i -= 1;
        buf[i] = ALPHABET[(n % BASE) as usize];
        n /= BASE;
    }
    buf[i..].iter().map(|&b| b as char).collect()
}

/// Decode a key produced by [`generate`] back into its ordinal.
///
/// Returns `None` for the empty string, symbols outside the alphabet,
/// non-canonical leading zeros, or values that overflow `u64`.
pub fn parse(key: &str) -> Option<u64> {
    let bytes = key.as_bytes();
    if bytes.is_empty() || (bytes.len() > 1 && bytes[0] == ALPHABET[0]) {
        return None;
    }
    bytes.iter().try_fold(0u64, |acc, &b| {
        let digit = symbol_value(b)?;
        acc.checked_mul(BASE)?.checked_add(digit)
    })
}

fn symbol_value(b: u8) -> Option<u64> {
    match b {
        b'0'..=b'9' => Some((b - b'0') as u64),
        b'A'..=b'Z' => Some((b - b'A') as u64 + 10),
        b'a'..=b'z' => Some((b - b'a') as u64 + 36),
        _ => None,
    }
}
