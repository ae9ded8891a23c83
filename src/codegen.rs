//! Short code generation
//!
//! Codes are drawn from a 62-character alphanumeric alphabet. Nothing here
//! guarantees uniqueness; see [`crate::shortener`] for the collision loop.

use rand::Rng;

/// Characters a generated code may contain
pub const ALPHABET: &[u8; 62] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Where code randomness comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodeSource {
    /// Thread-local general purpose RNG, uniform over the alphabet
    #[default]
    Fast,
    /// OS CSPRNG bytes mapped modulo the alphabet size (slightly biased)
    Secure,
}

#[derive(Debug, thiserror::Error)]
#[error("OS random source unavailable: {0}")]
pub struct EntropyError(#[from] getrandom::Error);

/// Generates a code of exactly `length` characters from `source`
pub fn generate(source: CodeSource, length: usize) -> Result<String, EntropyError> {
    match source {
        CodeSource::Fast => Ok(generate_fast(length)),
        CodeSource::Secure => generate_secure(length),
    }
}

pub fn generate_fast(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

pub fn generate_secure(length: usize) -> Result<String, EntropyError> {
    let mut bytes = vec![0u8; length];
    getrandom::getrandom(&mut bytes)?;
    // 256 % 62 != 0, so the first 8 characters are marginally more likely.
    Ok(bytes
        .iter()
        .map(|b| ALPHABET[*b as usize % ALPHABET.len()] as char)
        .collect())
}
