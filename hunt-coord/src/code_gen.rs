//! Team join codes
//!
//! Short codes people read aloud and type on phones, so the alphabet leaves
//! out look-alike characters (no I, O, 0, 1).

use rand::Rng;

pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generate a random code of the given length
pub fn generate_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Canonical form of a user-typed code
pub fn normalize_code(input: &str) -> String {
    input.trim().to_uppercase()
}
