//! Wallet keypairs for child agents.
//!
//! Key material is held in [`KeyMaterial`], which never prints its contents and
//! cannot be cloned, so exactly one owner exists for each secret.

use anyhow::{anyhow, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair};
use sha2::{Digest, Sha256};
use std::fmt;

/// Secret key material owned by a single agent record
#[derive(PartialEq, Eq)]
pub struct KeyMaterial(String);

impl KeyMaterial {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Base64 PKCS#8 document. Only for handing to a signer.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial([redacted])")
    }
}

impl fmt::Display for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

/// A freshly generated wallet
#[derive(Debug)]
pub struct Keypair {
    pub address: String,
    pub key_material: KeyMaterial,
}

/// Generate an Ed25519 wallet; the address is the first 20 bytes of SHA-256(public key)
pub fn generate_keypair() -> Result<Keypair> {
    let rng = SystemRandom::new();
    let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng)
        .map_err(|_| anyhow!("Failed to generate Ed25519 key"))?;
    let pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref())
        .map_err(|e| anyhow!("Generated key was rejected: {}", e))?;

    Ok(Keypair {
        address: address_for_public_key(pair.public_key().as_ref()),
        key_material: KeyMaterial::new(BASE64.encode(pkcs8.as_ref())),
    })
}

/// Recover the wallet address a key material belongs to
pub fn address_for_key(key: &KeyMaterial) -> Result<String> {
    let der = BASE64
        .decode(key.expose_secret())
        .map_err(|e| anyhow!("Key material is not valid base64: {}", e))?;
    let pair = Ed25519KeyPair::from_pkcs8(&der)
        .map_err(|e| anyhow!("Key material was rejected: {}", e))?;
    Ok(address_for_public_key(pair.public_key().as_ref()))
}

fn address_for_public_key(public_key: &[u8]) -> String {
    let digest = Sha256::digest(public_key);
    let hex: String = digest[..20].iter().map(|b| format!("{:02x}", b)).collect();
    format!("0x{}", hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_address_shape() {
        let pair = generate_keypair().unwrap();
        assert!(pair.address.starts_with("0x"));
        assert_eq!(pair.address.len(), 42);
    }

    #[test]
    fn test_address_recovered_from_key() {
        let pair = generate_keypair().unwrap();
        assert_eq!(address_for_key(&pair.key_material).unwrap(), pair.address);
    }

    #[test]
    fn test_key_material_is_redacted() {
        let pair = generate_keypair().unwrap();
        let secret = pair.key_material.expose_secret().to_string();
        let debug = format!("{:?}", pair);
        assert!(!debug.contains(&secret));
        assert_eq!(pair.key_material.to_string(), "[redacted]");
    }

    #[test]
    fn test_fresh_keypairs_differ() {
        let a = generate_keypair().unwrap();
        let b = generate_keypair().unwrap();
        assert_ne!(a.address, b.address);
    }
}
