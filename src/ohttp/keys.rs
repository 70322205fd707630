/// Key configuration registry for the gateway.
///
/// Each entry binds a one-byte key ID to an X25519 key pair and the symmetric
/// suites advertised for it. The registry is built once at startup and is
/// read-only afterwards, so request handling never takes a lock.
///
/// Public wire form, per key:
/// [key_id(1B) | kem_id(2B) | pk_len(2B) | pk | suites_len(2B) | (kdf_id(2B) aead_id(2B))*]
/// The `/ohttp-configs` body is the concatenation of the per-key encodings;
/// `suites_len` is the byte length of the suite list.
use std::collections::BTreeMap;

use bytes::{Buf, BufMut};

use crate::crypto::hpke::{
    self, AeadId, KdfId, KemId, PrivateKey, PublicKey, SymmetricSuite,
};
use crate::error::{GatewayError, Result};

/// A private key configuration held by the gateway.
pub struct KeyConfig {
    key_id: u8,
    kem: KemId,
    private_key: PrivateKey,
    public_key: PublicKey,
    suites: Vec<SymmetricSuite>,
}

impl KeyConfig {
    /// Create a configuration with a freshly generated key pair.
    pub fn generate(key_id: u8, suites: Vec<SymmetricSuite>) -> Result<Self> {
        let (sk, pk) = hpke::generate_keypair();
        Self::new(key_id, sk, pk, suites)
    }

    /// Create a configuration with a key pair derived from seed material.
    pub fn from_seed(key_id: u8, seed: &[u8], suites: Vec<SymmetricSuite>) -> Result<Self> {
        if seed.len() < 32 {
            return Err(GatewayError::Config(format!(
                "key seed must be at least 32 bytes, got {}",
                seed.len()
            )));
        }
        let (sk, pk) = hpke::derive_keypair(seed);
        Self::new(key_id, sk, pk, suites)
    }

    fn new(
        key_id: u8,
        private_key: PrivateKey,
        public_key: PublicKey,
        suites: Vec<SymmetricSuite>,
    ) -> Result<Self> {
        if suites.is_empty() {
            return Err(GatewayError::Config(
                "a key configuration needs at least one symmetric suite".to_string(),
            ));
        }
        Ok(Self {
            key_id,
            kem: KemId::X25519HkdfSha256,
            private_key,
            public_key,
            suites,
        })
    }

    pub fn key_id(&self) -> u8 {
        self.key_id
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    /// Find the advertised suite matching the wire identifiers, if any.
    pub fn supports(&self, kdf_id: u16, aead_id: u16) -> Option<SymmetricSuite> {
        let kdf = KdfId::from_wire(kdf_id)?;
        let aead = AeadId::from_wire(aead_id)?;
        self.suites
            .iter()
            .copied()
            .find(|s| s.kdf == kdf && s.aead == aead)
    }

    /// Encode the public view of this key.
    pub fn marshal_public(&self) -> Vec<u8> {
        let pk = hpke::public_key_bytes(&self.public_key);
        let mut out = Vec::with_capacity(1 + 2 + 2 + pk.len() + 2 + 4 * self.suites.len());
        out.put_u8(self.key_id);
        out.put_u16(self.kem.wire());
        out.put_u16(pk.len() as u16);
        out.put_slice(&pk);
        out.put_u16((4 * self.suites.len()) as u16);
        for suite in &self.suites {
            out.put_u16(suite.kdf.wire());
            out.put_u16(suite.aead.wire());
        }
        out
    }
}

/// The public view of a key configuration, as parsed by clients.
#[derive(Clone)]
pub struct PublicKeyConfig {
    pub key_id: u8,
    pub kem: KemId,
    pub public_key: PublicKey,
    pub suites: Vec<SymmetricSuite>,
}

impl PublicKeyConfig {
    /// Parse the concatenated `/ohttp-configs` body into its entries.
    pub fn unmarshal_all(mut buf: &[u8]) -> Result<Vec<Self>> {
        let mut configs = Vec::new();
        while buf.has_remaining() {
            configs.push(Self::unmarshal_one(&mut buf)?);
        }
        if configs.is_empty() {
            return Err(GatewayError::Config("empty key configuration".to_string()));
        }
        Ok(configs)
    }

    fn unmarshal_one(buf: &mut &[u8]) -> Result<Self> {
        let truncated = || GatewayError::Config("truncated key configuration".to_string());

        if buf.remaining() < 5 {
            return Err(truncated());
        }
        let key_id = buf.get_u8();
        let kem = KemId::from_wire(buf.get_u16())
            .ok_or_else(|| GatewayError::Config("unsupported KEM identifier".to_string()))?;
        let pk_len = buf.get_u16() as usize;
        if buf.remaining() < pk_len {
            return Err(truncated());
        }
        let public_key = hpke::public_key_from_bytes(&buf[..pk_len])
            .map_err(|_| GatewayError::Config("invalid public key".to_string()))?;
        buf.advance(pk_len);

        if buf.remaining() < 2 {
            return Err(truncated());
        }
        let suites_len = buf.get_u16() as usize;
        if suites_len == 0 || suites_len % 4 != 0 || buf.remaining() < suites_len {
            return Err(GatewayError::Config(
                "invalid symmetric suite list".to_string(),
            ));
        }
        let mut suites = Vec::with_capacity(suites_len / 4);
        for _ in 0..suites_len / 4 {
            let kdf = KdfId::from_wire(buf.get_u16())
                .ok_or_else(|| GatewayError::Config("unsupported KDF identifier".to_string()))?;
            let aead = AeadId::from_wire(buf.get_u16())
                .ok_or_else(|| GatewayError::Config("unsupported AEAD identifier".to_string()))?;
            suites.push(SymmetricSuite::new(kdf, aead));
        }

        Ok(Self {
            key_id,
            kem,
            public_key,
            suites,
        })
    }
}

/// The set of key configurations the gateway serves.
///
/// Immutable after construction; shared across request tasks without locking.
pub struct KeyRegistry {
    configs: BTreeMap<u8, KeyConfig>,
}

impl KeyRegistry {
    /// Build a registry, rejecting duplicate key IDs and empty sets.
    pub fn new(configs: Vec<KeyConfig>) -> Result<Self> {
        if configs.is_empty() {
            return Err(GatewayError::InvalidRegistry(
                "at least one key configuration is required".to_string(),
            ));
        }
        let mut map = BTreeMap::new();
        for config in configs {
            let key_id = config.key_id();
            if map.insert(key_id, config).is_some() {
                return Err(GatewayError::InvalidRegistry(format!(
                    "duplicate key ID {key_id}"
                )));
            }
        }
        Ok(Self { configs: map })
    }

    /// Look up the configuration for a wire key ID.
    pub fn config(&self, key_id: u8) -> Result<&KeyConfig> {
        self.configs
            .get(&key_id)
            .ok_or(GatewayError::UnknownKey(key_id))
    }

    /// Concatenated public encodings of every key, in key ID order.
    pub fn marshal_public(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for config in self.configs.values() {
            out.extend_from_slice(&config.marshal_public());
        }
        out
    }
}

/// The suite every conforming gateway must offer.
pub fn default_suites() -> Vec<SymmetricSuite> {
    vec![SymmetricSuite::new(KdfId::HkdfSha256, AeadId::Aes128Gcm)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marshal_public_layout() {
        let config = KeyConfig::generate(0x07, default_suites()).unwrap();
        let encoded = config.marshal_public();

        assert_eq!(encoded.len(), 1 + 2 + 2 + 32 + 2 + 4);
        assert_eq!(encoded[0], 0x07);
        assert_eq!(&encoded[1..3], &[0x00, 0x20]); // DHKEM(X25519, HKDF-SHA256)
        assert_eq!(&encoded[3..5], &[0x00, 0x20]); // 32-byte public key
        assert_eq!(&encoded[37..39], &[0x00, 0x04]); // one 4-byte suite
        assert_eq!(&encoded[39..43], &[0x00, 0x01, 0x00, 0x01]); // HKDF-SHA256, AES-128-GCM
    }

    #[test]
    fn test_marshal_unmarshal_roundtrip() {
        let registry = KeyRegistry::new(vec![
            KeyConfig::generate(0x00, default_suites()).unwrap(),
            KeyConfig::generate(
                0x01,
                vec![
                    SymmetricSuite::new(KdfId::HkdfSha256, AeadId::Aes128Gcm),
                    SymmetricSuite::new(KdfId::HkdfSha256, AeadId::ChaCha20Poly1305),
                ],
            )
            .unwrap(),
        ])
        .unwrap();

        let configs = PublicKeyConfig::unmarshal_all(&registry.marshal_public()).unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].key_id, 0x00);
        assert_eq!(configs[1].key_id, 0x01);
        assert_eq!(configs[1].suites.len(), 2);
    }

    #[test]
    fn test_unmarshal_truncated_fails() {
        let config = KeyConfig::generate(0x00, default_suites()).unwrap();
        let encoded = config.marshal_public();
        assert!(PublicKeyConfig::unmarshal_all(&encoded[..encoded.len() - 3]).is_err());
        assert!(PublicKeyConfig::unmarshal_all(&[]).is_err());
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let result = KeyRegistry::new(vec![
            KeyConfig::generate(0x05, default_suites()).unwrap(),
            KeyConfig::generate(0x05, default_suites()).unwrap(),
        ]);
        assert!(matches!(result, Err(GatewayError::InvalidRegistry(_))));
    }

    #[test]
    fn test_registry_rejects_empty() {
        assert!(matches!(
            KeyRegistry::new(Vec::new()),
            Err(GatewayError::InvalidRegistry(_))
        ));
    }

    #[test]
    fn test_registry_lookup() {
        let registry =
            KeyRegistry::new(vec![KeyConfig::generate(0x02, default_suites()).unwrap()]).unwrap();
        assert_eq!(registry.config(0x02).unwrap().key_id(), 0x02);
        assert!(matches!(
            registry.config(0x03),
            Err(GatewayError::UnknownKey(0x03))
        ));
    }

    #[test]
    fn test_supports_checks_advertised_suites() {
        let config = KeyConfig::generate(0x00, default_suites()).unwrap();
        assert!(config.supports(0x0001, 0x0001).is_some());
        assert!(config.supports(0x0001, 0x0003).is_none()); // ChaCha not advertised
        assert!(config.supports(0x0009, 0x0001).is_none()); // unknown KDF
    }
}
