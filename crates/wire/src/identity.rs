//! Human-readable identities and digest strings
//!
//! Every 8-byte little-endian word is written as 14 base-26 letters, least
//! significant letter first. Identities append a 4-letter checksum taken from
//! the low 18 bits of a 3-byte hash of the public key and are uppercase;
//! digests and signatures have no checksum and are lowercase.

use crate::crypto::{Crypto, Digest, PublicKey, Signature, DIGEST_LENGTH, SIGNATURE_LENGTH};
use crate::error::WireError;

/// Letters per 8-byte word
const WORD_LETTERS: usize = 14;
const CHECKSUM_LETTERS: usize = 4;
const CHECKSUM_MASK: u32 = 0x3FFFF;

/// Length of an identity string
pub const IDENTITY_LENGTH: usize = 4 * WORD_LETTERS + CHECKSUM_LETTERS;

fn push_letters(out: &mut String, mut value: u64, count: usize, base: u8) {
    for _ in 0..count {
        out.push((base + (value % 26) as u8) as char);
        value /= 26;
    }
}

fn read_letters(letters: &[u8], base: u8) -> Option<u64> {
    let mut value: u64 = 0;
    for &letter in letters.iter().rev() {
        if !(base..base + 26).contains(&letter) {
            return None;
        }
        value = value
            .checked_mul(26)?
            .checked_add(u64::from(letter - base))?;
    }
    Some(value)
}

fn encode_words(bytes: &[u8], base: u8) -> String {
    let mut out = String::with_capacity(bytes.len() / 8 * WORD_LETTERS + CHECKSUM_LETTERS);
    for word in bytes.chunks_exact(8) {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(word);
        push_letters(&mut out, u64::from_le_bytes(buf), WORD_LETTERS, base);
    }
    out
}

fn decode_words(letters: &[u8], base: u8, out: &mut [u8]) -> Option<()> {
    for (word, chunk) in out.chunks_exact_mut(8).zip(letters.chunks_exact(WORD_LETTERS)) {
        word.copy_from_slice(&read_letters(chunk, base)?.to_le_bytes());
    }
    Some(())
}

fn checksum(crypto: &dyn Crypto, public_key: &PublicKey) -> u32 {
    let mut hash = [0u8; 3];
    crypto.hash_into(public_key, &mut hash);
    u32::from_le_bytes([hash[0], hash[1], hash[2], 0]) & CHECKSUM_MASK
}

/// Render a public key as a 60-letter uppercase identity
pub fn public_key_to_identity(crypto: &dyn Crypto, public_key: &PublicKey) -> String {
    let mut identity = encode_words(public_key, b'A');
    push_letters(
        &mut identity,
        u64::from(checksum(crypto, public_key)),
        CHECKSUM_LETTERS,
        b'A',
    );
    identity
}

/// Parse an identity back into its public key, validating the checksum
pub fn identity_to_public_key(crypto: &dyn Crypto, identity: &str) -> Result<PublicKey, WireError> {
    let letters = identity.as_bytes();
    if letters.len() != IDENTITY_LENGTH {
        return Err(WireError::InvalidIdentity(format!(
            "expected {} letters, got {}",
            IDENTITY_LENGTH,
            letters.len()
        )));
    }

    let mut public_key = [0u8; 32];
    decode_words(&letters[..4 * WORD_LETTERS], b'A', &mut public_key)
        .ok_or_else(|| WireError::InvalidIdentity(identity.to_string()))?;

    let expected = read_letters(&letters[4 * WORD_LETTERS..], b'A')
        .ok_or_else(|| WireError::InvalidIdentity(identity.to_string()))?;
    if expected != u64::from(checksum(crypto, &public_key)) {
        return Err(WireError::InvalidIdentity(format!("bad checksum in {}", identity)));
    }

    Ok(public_key)
}

/// Lowercase 56-letter rendering of a 32-byte digest
pub fn digest_to_string(digest: &Digest) -> String {
    encode_words(digest, b'a')
}

pub fn string_to_digest(value: &str) -> Result<Digest, WireError> {
    let mut digest = [0u8; DIGEST_LENGTH];
    decode_exact(value, &mut digest)?;
    Ok(digest)
}

/// Lowercase 112-letter rendering of a signature
pub fn signature_to_string(signature: &Signature) -> String {
    encode_words(signature, b'a')
}

pub fn string_to_signature(value: &str) -> Result<Signature, WireError> {
    let mut signature = [0u8; SIGNATURE_LENGTH];
    decode_exact(value, &mut signature)?;
    Ok(signature)
}

/// 14-letter rendering of the 8-byte resource testing digest
pub fn resource_digest_to_string(digest: &[u8; 8]) -> String {
    encode_words(digest, b'a')
}

fn decode_exact(value: &str, out: &mut [u8]) -> Result<(), WireError> {
    let letters = value.as_bytes();
    if letters.len() != out.len() / 8 * WORD_LETTERS {
        return Err(WireError::InvalidEncoding(format!(
            "expected {} letters, got {}",
            out.len() / 8 * WORD_LETTERS,
            letters.len()
        )));
    }
    decode_words(letters, b'a', out).ok_or_else(|| WireError::InvalidEncoding(value.to_string()))
}
