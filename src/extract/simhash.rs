//! SimHash content fingerprinting.
//!
//! Maps similar texts to nearby 64-bit patterns so near-duplicates can be
//! found by Hamming distance instead of exact equality. The construction is
//! fixed bit-for-bit (MD5 token digests, low 64 bits, `>= 0` tie-break) so
//! fingerprints created by different processes stay comparable.

use md5::{Digest, Md5};
use regex::Regex;
use std::sync::LazyLock;

/// Maximum Hamming distance between two 64-bit fingerprints.
pub const MAX_DISTANCE: u32 = 64;

// Token delimiters: whitespace plus common ASCII and CJK punctuation.
// The character class is part of the fingerprint contract.
static TOKEN_SPLIT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\s,，。.!！?？;；:：、]+").expect("static regex: token delimiters")
});

/// Low 64 bits of the MD5 digest of a token, interpreting the 16-byte
/// digest as a big-endian 128-bit integer.
fn token_hash(token: &str) -> u64 {
    let digest = Md5::digest(token.as_bytes());
    let mut low = [0u8; 8];
    low.copy_from_slice(&digest[8..16]);
    u64::from_be_bytes(low)
}

/// Computes the SimHash content fingerprint of `text`.
///
/// Tokens are the delimiter-split pieces of the text, lowercased, kept when
/// at least 2 characters long. Each token's 64-bit digest votes +1/−1 per
/// bit position into a signed accumulator; the final fingerprint sets bit
/// *i* when `accumulator[i] >= 0`, encoded as 16 lowercase hex digits.
///
/// Degenerate cases:
/// - empty input returns an empty string;
/// - input with no surviving tokens returns the plain 32-hex MD5 of the raw
///   text. That value is stored but can never fuzzy-match anything, because
///   [`simhash_distance`] rejects it as a 64-bit fingerprint; near-empty
///   inputs deliberately do not participate in similarity detection.
#[must_use]
pub fn compute_content_hash(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let tokens: Vec<String> = TOKEN_SPLIT_REGEX
        .split(text)
        .map(|w| w.trim().to_lowercase())
        .filter(|w| w.chars().count() >= 2)
        .collect();

    if tokens.is_empty() {
        return hex::encode(Md5::digest(text.as_bytes()));
    }

    let mut accumulator = [0i32; 64];
    for token in &tokens {
        let word_hash = token_hash(token);
        for (i, slot) in accumulator.iter_mut().enumerate() {
            if word_hash & (1 << i) != 0 {
                *slot += 1;
            } else {
                *slot -= 1;
            }
        }
    }

    let mut fingerprint: u64 = 0;
    for (i, &vote) in accumulator.iter().enumerate() {
        if vote >= 0 {
            fingerprint |= 1 << i;
        }
    }

    format!("{fingerprint:016x}")
}

/// Hamming distance between two hex-encoded 64-bit fingerprints.
///
/// Returns [`MAX_DISTANCE`] when either input is empty or does not parse as
/// a 64-bit hex integer (including the 32-hex degenerate digests), so
/// malformed or missing hashes read as "maximally dissimilar" rather than
/// erroring.
#[must_use]
pub fn simhash_distance(hash_a: &str, hash_b: &str) -> u32 {
    if hash_a.is_empty() || hash_b.is_empty() {
        return MAX_DISTANCE;
    }

    match (
        u64::from_str_radix(hash_a, 16),
        u64::from_str_radix(hash_b, 16),
    ) {
        (Ok(a), Ok(b)) => (a ^ b).count_ones(),
        _ => MAX_DISTANCE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_fingerprint() {
        // Pinned value: changing it means the fingerprint contract changed
        // and FINGERPRINT_VERSION must be bumped.
        assert_eq!(compute_content_hash("hello world"), "ff7b9f93f2f7f5f7");
    }

    #[test]
    fn test_hash_is_16_hex_chars() {
        let hash = compute_content_hash("some ordinary submission text");
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, hash.to_lowercase());
    }

    #[test]
    fn test_hash_is_deterministic() {
        let text = "Join our channel for daily market analysis";
        assert_eq!(compute_content_hash(text), compute_content_hash(text));
    }

    #[test]
    fn test_empty_input_yields_empty_hash() {
        assert_eq!(compute_content_hash(""), "");
    }

    #[test]
    fn test_token_free_input_falls_back_to_raw_digest() {
        // "a !" has no token of length >= 2
        let hash = compute_content_hash("a !");
        assert_eq!(hash, "98d3d0aa1c9c6c90d3e2c2fe21f734d2");
        assert_eq!(hash.len(), 32);
        // and the fallback never participates in fuzzy matching
        assert_eq!(simhash_distance(&hash, &hash), MAX_DISTANCE);
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        let hash = compute_content_hash("identical content hashes identically");
        assert_eq!(simhash_distance(&hash, &hash), 0);
    }

    #[test]
    fn test_distance_symmetry() {
        let a = compute_content_hash("first piece of text for the test");
        let b = compute_content_hash("second piece of text for the test");
        assert_eq!(simhash_distance(&a, &b), simhash_distance(&b, &a));
    }

    #[test]
    fn test_distance_invalid_inputs() {
        assert_eq!(simhash_distance("", "ff7b9f93f2f7f5f7"), MAX_DISTANCE);
        assert_eq!(simhash_distance("ff7b9f93f2f7f5f7", ""), MAX_DISTANCE);
        assert_eq!(simhash_distance("not-hex", "ff7b9f93f2f7f5f7"), MAX_DISTANCE);
        // 32-hex raw digests overflow u64 and read as maximally dissimilar
        assert_eq!(
            simhash_distance("98d3d0aa1c9c6c90d3e2c2fe21f734d2", "ff7b9f93f2f7f5f7"),
            MAX_DISTANCE
        );
    }

    #[test]
    fn test_near_duplicates_hash_close() {
        // One word swapped, punctuation changed
        let a = compute_content_hash(
            "Join our amazing channel for daily crypto trading signals and market analysis today!",
        );
        let b = compute_content_hash(
            "Join our amazing channel for weekly crypto trading signals and market analysis today.",
        );
        let near = simhash_distance(&a, &b);
        assert!(near <= 10, "near-duplicate distance was {near}");

        // An unrelated paragraph of similar length must land farther away
        let c = compute_content_hash(
            "The committee reviewed the quarterly budget report and approved additional \
             funding for the library renovation project.",
        );
        let far = simhash_distance(&a, &c);
        assert!(far > near, "unrelated distance {far} <= near distance {near}");
    }

    #[test]
    fn test_punctuation_and_case_insensitive() {
        let a = compute_content_hash("Hello, World. Testing!");
        let b = compute_content_hash("hello world testing");
        assert_eq!(a, b);
    }

    #[test]
    fn test_cjk_delimiters_split_tokens() {
        let a = compute_content_hash("优质频道，每日更新。欢迎订阅！");
        let b = compute_content_hash("优质频道 每日更新 欢迎订阅");
        assert_eq!(a, b);
    }
}
