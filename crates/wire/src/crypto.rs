//! Crypto capability
//!
//! The ledger hashes with a variable-output function and signs with a
//! 32-byte-key scheme. Both are reached only through [`Crypto`], so a
//! deployment can plug in the network's native primitives. [`DefaultCrypto`]
//! backs the trait with blake3 (extendable output) and ed25519.
//!
//! The live network hashes with KangarooTwelve and signs with FourQ Schnorr
//! signatures, so [`DefaultCrypto`] cannot verify its committees, votes or
//! proofs. It serves self-contained deployments and tests; talking to real
//! computors requires a [`Crypto`] implementation over those primitives.

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};

pub const PUBLIC_KEY_LENGTH: usize = 32;
pub const DIGEST_LENGTH: usize = 32;
pub const SIGNATURE_LENGTH: usize = 64;

pub type PublicKey = [u8; PUBLIC_KEY_LENGTH];
pub type Digest = [u8; DIGEST_LENGTH];
pub type Signature = [u8; SIGNATURE_LENGTH];

/// Hash, verify and key derivation used by every verification path
pub trait Crypto: Send + Sync {
    /// Hash `input` into `output`; the output length selects the digest size.
    fn hash_into(&self, input: &[u8], output: &mut [u8]);

    /// Verify `signature` over `digest` by `public_key`
    fn verify(&self, public_key: &PublicKey, digest: &Digest, signature: &Signature) -> bool;

    /// Derive the public key of a 32-byte private key
    fn public_key(&self, private_key: &[u8; 32]) -> PublicKey;

    /// 32-byte digest of `input`
    fn digest(&self, input: &[u8]) -> Digest {
        let mut output = [0u8; DIGEST_LENGTH];
        self.hash_into(input, &mut output);
        output
    }
}

/// blake3 and ed25519; not interoperable with the live network
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCrypto;

impl DefaultCrypto {
    pub fn new() -> Self {
        Self
    }

    /// Sign a digest. Used by tooling and test fixtures, never by verification.
    pub fn sign(&self, private_key: &[u8; 32], digest: &Digest) -> Signature {
        SigningKey::from_bytes(private_key).sign(digest).to_bytes()
    }
}

impl Crypto for DefaultCrypto {
    fn hash_into(&self, input: &[u8], output: &mut [u8]) {
        let mut hasher = blake3::Hasher::new();
        hasher.update(input);
        hasher.finalize_xof().fill(output);
    }

    fn verify(&self, public_key: &PublicKey, digest: &Digest, signature: &Signature) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(public_key) else {
            return false;
        };
        let signature = ed25519_dalek::Signature::from_bytes(signature);
        key.verify_strict(digest, &signature).is_ok()
    }

    fn public_key(&self, private_key: &[u8; 32]) -> PublicKey {
        SigningKey::from_bytes(private_key).verifying_key().to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let crypto = DefaultCrypto::new();
        let private_key = [7u8; 32];
        let public_key = crypto.public_key(&private_key);
        let digest = crypto.digest(b"tick");

        let signature = crypto.sign(&private_key, &digest);
        assert!(crypto.verify(&public_key, &digest, &signature));

        let mut tampered = digest;
        tampered[0] ^= 1;
        assert!(!crypto.verify(&public_key, &tampered, &signature));
    }

    #[test]
    fn test_output_length_selects_digest() {
        let crypto = DefaultCrypto::new();
        let mut short = [0u8; 3];
        crypto.hash_into(b"abc", &mut short);
        let long = crypto.digest(b"abc");
        // XOF output is a prefix of the longer output
        assert_eq!(&long[..3], &short);
    }

    #[test]
    fn test_zero_key_never_verifies() {
        let crypto = DefaultCrypto::new();
        assert!(!crypto.verify(&[0u8; 32], &[1u8; 32], &[0u8; 64]));
    }
}
