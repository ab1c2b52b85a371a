use crate::error::AlertError;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use zeroize::Zeroizing;

/// Produces a detached signature over an alert digest
pub trait SigningCapability: Send + Sync {
    fn sign(&self, digest: &[u8; 32], key: &[u8]) -> Result<Vec<u8>, AlertError>;
}

/// Checks a detached signature against the network's alert authority
pub trait VerificationCapability: Send + Sync {
    fn verify(&self, digest: &[u8; 32], signature: &[u8], authority: &[u8]) -> bool;
}

/// Ed25519 signatures over the 32-byte alert digest
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519Signer;

impl Ed25519Signer {
    /// Accepts either the 32-byte secret or the 64-byte secret||public
    /// keypair encoding. The keypair form is checked for consistency.
    pub fn signing_key(key: &[u8]) -> Result<SigningKey, AlertError> {
        match key.len() {
            32 => {
                let mut secret = Zeroizing::new([0u8; 32]);
                secret.copy_from_slice(key);
                Ok(SigningKey::from_bytes(&secret))
            }
            64 => {
                let mut pair = Zeroizing::new([0u8; 64]);
                pair.copy_from_slice(key);
                SigningKey::from_keypair_bytes(&pair)
                    .map_err(|e| AlertError::SigningFailed(format!("inconsistent keypair: {}", e)))
            }
            n => Err(AlertError::SigningFailed(format!(
                "expected a 32 or 64 byte key, got {} bytes",
                n
            ))),
        }
    }
}

impl SigningCapability for Ed25519Signer {
    fn sign(&self, digest: &[u8; 32], key: &[u8]) -> Result<Vec<u8>, AlertError> {
        let signing_key = Self::signing_key(key)?;
        let signature = signing_key.sign(digest);
        // Never hand out a signature we could not verify ourselves
        signing_key
            .verifying_key()
            .verify(digest, &signature)
            .map_err(|e| AlertError::SigningFailed(e.to_string()))?;
        Ok(signature.to_bytes().to_vec())
    }
}

impl VerificationCapability for Ed25519Signer {
    fn verify(&self, digest: &[u8; 32], signature: &[u8], authority: &[u8]) -> bool {
        let Ok(authority) = <[u8; 32]>::try_from(authority) else {
            return false;
        };
        let Ok(verifying_key) = VerifyingKey::from_bytes(&authority) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        verifying_key.verify(digest, &signature).is_ok()
    }
}

/// Decode hex key material typed by an operator, wiping the buffer on drop
pub fn decode_key_hex(key_hex: &str) -> Result<Zeroizing<Vec<u8>>, AlertError> {
    hex::decode(key_hex.trim())
        .map(Zeroizing::new)
        .map_err(|e| AlertError::SigningFailed(format!("key is not valid hex: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: [u8; 32] = [42u8; 32];

    fn authority() -> [u8; 32] {
        SigningKey::from_bytes(&SECRET).verifying_key().to_bytes()
    }

    #[test]
    fn test_sign_and_verify() {
        let signer = Ed25519Signer;
        let digest = [9u8; 32];
        let sig = signer.sign(&digest, &SECRET).unwrap();
        assert!(signer.verify(&digest, &sig, &authority()));
        assert!(!signer.verify(&[8u8; 32], &sig, &authority()));
    }

    #[test]
    fn test_wrong_authority_rejected() {
        let signer = Ed25519Signer;
        let digest = [9u8; 32];
        let sig = signer.sign(&digest, &SECRET).unwrap();
        let other = SigningKey::from_bytes(&[7u8; 32]).verifying_key().to_bytes();
        assert!(!signer.verify(&digest, &sig, &other));
        assert!(!signer.verify(&digest, &sig, &[1, 2, 3]));
        assert!(!signer.verify(&digest, &sig[..10], &authority()));
    }

    #[test]
    fn test_keypair_encoding() {
        let key = SigningKey::from_bytes(&SECRET);
        let pair = key.to_keypair_bytes();
        let sig = Ed25519Signer.sign(&[1u8; 32], &pair).unwrap();
        assert!(Ed25519Signer.verify(&[1u8; 32], &sig, &authority()));

        // Public half does not match the secret
        let mut bad = pair;
        bad[40] ^= 0xff;
        assert!(matches!(
            Ed25519Signer.sign(&[1u8; 32], &bad),
            Err(AlertError::SigningFailed(_))
        ));
    }

    #[test]
    fn test_malformed_key_material() {
        assert!(matches!(
            Ed25519Signer.sign(&[1u8; 32], &[1u8; 31]),
            Err(AlertError::SigningFailed(_))
        ));
        assert!(matches!(decode_key_hex("zz"), Err(AlertError::SigningFailed(_))));
        assert_eq!(decode_key_hex(" 0a0b ").unwrap().as_slice(), &[10, 11]);
    }
}
