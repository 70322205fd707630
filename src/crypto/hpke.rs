/// HPKE adapter for the gateway: DHKEM(X25519, HKDF-SHA256) with HKDF-SHA256
/// and a small set of AEADs, RFC 9180 Base mode only.
///
/// The gateway needs exactly three capabilities from HPKE: set up a receiver
/// context from a wire-encapsulated key, open the sealed request, and export
/// secret material for the response. The sender half exists for the in-crate
/// client used by tests and smoke tooling. Primitive errors are deliberately
/// collapsed into opaque gateway errors.
use hpke::aead::{AeadCtxR, AeadCtxS, AesGcm128, AesGcm256, ChaCha20Poly1305};
use hpke::kdf::HkdfSha256;
use hpke::kem::X25519HkdfSha256;
use hpke::{Deserializable, Kem, OpModeR, OpModeS, Serializable};
use rand::rngs::OsRng;

use crate::crypto::sensitive::SensitiveBytes;
use crate::error::{GatewayError, Result};

pub type PrivateKey = <X25519HkdfSha256 as Kem>::PrivateKey;
pub type PublicKey = <X25519HkdfSha256 as Kem>::PublicKey;

/// KEM output (`enc`) length for DHKEM(X25519, HKDF-SHA256).
pub const ENC_LEN: usize = 32;

/// KEM identifiers, per the HPKE IANA registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KemId {
    X25519HkdfSha256,
}

impl KemId {
    pub const fn wire(self) -> u16 {
        match self {
            KemId::X25519HkdfSha256 => 0x0020,
        }
    }

    pub fn from_wire(id: u16) -> Option<Self> {
        match id {
            0x0020 => Some(KemId::X25519HkdfSha256),
            _ => None,
        }
    }
}

/// KDF identifiers, per the HPKE IANA registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfId {
    HkdfSha256,
}

impl KdfId {
    pub const fn wire(self) -> u16 {
        match self {
            KdfId::HkdfSha256 => 0x0001,
        }
    }

    pub fn from_wire(id: u16) -> Option<Self> {
        match id {
            0x0001 => Some(KdfId::HkdfSha256),
            _ => None,
        }
    }
}

/// AEAD identifiers, per the HPKE IANA registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AeadId {
    Aes128Gcm,
    Aes256Gcm,
    ChaCha20Poly1305,
}

impl AeadId {
    pub const fn wire(self) -> u16 {
        match self {
            AeadId::Aes128Gcm => 0x0001,
            AeadId::Aes256Gcm => 0x0002,
            AeadId::ChaCha20Poly1305 => 0x0003,
        }
    }

    pub fn from_wire(id: u16) -> Option<Self> {
        match id {
            0x0001 => Some(AeadId::Aes128Gcm),
            0x0002 => Some(AeadId::Aes256Gcm),
            0x0003 => Some(AeadId::ChaCha20Poly1305),
            _ => None,
        }
    }

    pub const fn key_len(self) -> usize {
        match self {
            AeadId::Aes128Gcm => 16,
            AeadId::Aes256Gcm => 32,
            AeadId::ChaCha20Poly1305 => 32,
        }
    }

    pub const fn nonce_len(self) -> usize {
        12
    }

    pub const fn tag_len(self) -> usize {
        16
    }
}

/// A (KDF, AEAD) pair advertised alongside a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymmetricSuite {
    pub kdf: KdfId,
    pub aead: AeadId,
}

impl SymmetricSuite {
    pub const fn new(kdf: KdfId, aead: AeadId) -> Self {
        Self { kdf, aead }
    }
}

/// Generate a fresh X25519 key pair from the OS CSPRNG.
pub fn generate_keypair() -> (PrivateKey, PublicKey) {
    X25519HkdfSha256::gen_keypair(&mut OsRng)
}

/// Deterministically derive an X25519 key pair from seed material.
pub fn derive_keypair(seed: &[u8]) -> (PrivateKey, PublicKey) {
    X25519HkdfSha256::derive_keypair(seed)
}

/// Serialize a public key to its wire form.
pub fn public_key_bytes(pk: &PublicKey) -> Vec<u8> {
    pk.to_bytes().to_vec()
}

/// Parse a public key from its wire form.
pub fn public_key_from_bytes(bytes: &[u8]) -> Result<PublicKey> {
    PublicKey::from_bytes(bytes).map_err(|_| GatewayError::DecapsulationFailed)
}

/// Receiver-side HPKE context, one per supported AEAD.
pub enum HpkeReceiver {
    Aes128Gcm(AeadCtxR<AesGcm128, HkdfSha256, X25519HkdfSha256>),
    Aes256Gcm(AeadCtxR<AesGcm256, HkdfSha256, X25519HkdfSha256>),
    ChaCha20Poly1305(AeadCtxR<ChaCha20Poly1305, HkdfSha256, X25519HkdfSha256>),
}

impl HpkeReceiver {
    /// Run KEM decapsulation and the KDF schedule for an incoming request.
    pub fn accept(aead: AeadId, sk: &PrivateKey, enc: &[u8], info: &[u8]) -> Result<Self> {
        let encapped = <X25519HkdfSha256 as Kem>::EncappedKey::from_bytes(enc)
            .map_err(|_| GatewayError::DecapsulationFailed)?;
        let receiver = match aead {
            AeadId::Aes128Gcm => hpke::setup_receiver::<AesGcm128, HkdfSha256, X25519HkdfSha256>(
                &OpModeR::Base,
                sk,
                &encapped,
                info,
            )
            .map(HpkeReceiver::Aes128Gcm),
            AeadId::Aes256Gcm => hpke::setup_receiver::<AesGcm256, HkdfSha256, X25519HkdfSha256>(
                &OpModeR::Base,
                sk,
                &encapped,
                info,
            )
            .map(HpkeReceiver::Aes256Gcm),
            AeadId::ChaCha20Poly1305 => hpke::setup_receiver::<
                ChaCha20Poly1305,
                HkdfSha256,
                X25519HkdfSha256,
            >(&OpModeR::Base, sk, &encapped, info)
            .map(HpkeReceiver::ChaCha20Poly1305),
        };
        receiver.map_err(|_| GatewayError::DecapsulationFailed)
    }

    /// AEAD-open the sealed request body.
    pub fn open(&mut self, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let plaintext = match self {
            HpkeReceiver::Aes128Gcm(ctx) => ctx.open(ciphertext, aad),
            HpkeReceiver::Aes256Gcm(ctx) => ctx.open(ciphertext, aad),
            HpkeReceiver::ChaCha20Poly1305(ctx) => ctx.open(ciphertext, aad),
        };
        plaintext.map_err(|_| GatewayError::DecapsulationFailed)
    }

    /// Export `len` bytes of secret material bound to `label`.
    pub fn export(&self, label: &[u8], len: usize) -> Result<SensitiveBytes> {
        let mut out = vec![0u8; len];
        let exported = match self {
            HpkeReceiver::Aes128Gcm(ctx) => ctx.export(label, &mut out),
            HpkeReceiver::Aes256Gcm(ctx) => ctx.export(label, &mut out),
            HpkeReceiver::ChaCha20Poly1305(ctx) => ctx.export(label, &mut out),
        };
        exported.map_err(|_| GatewayError::EncapsulationFailed)?;
        Ok(SensitiveBytes::new(out))
    }
}

/// Sender-side HPKE context, the client half of [`HpkeReceiver`].
pub enum HpkeSender {
    Aes128Gcm(AeadCtxS<AesGcm128, HkdfSha256, X25519HkdfSha256>),
    Aes256Gcm(AeadCtxS<AesGcm256, HkdfSha256, X25519HkdfSha256>),
    ChaCha20Poly1305(AeadCtxS<ChaCha20Poly1305, HkdfSha256, X25519HkdfSha256>),
}

impl HpkeSender {
    /// Encapsulate to a public key, returning the KEM output and the context.
    pub fn connect(aead: AeadId, pk: &PublicKey, info: &[u8]) -> Result<(Vec<u8>, Self)> {
        let sender = match aead {
            AeadId::Aes128Gcm => hpke::setup_sender::<AesGcm128, HkdfSha256, X25519HkdfSha256, _>(
                &OpModeS::Base,
                pk,
                info,
                &mut OsRng,
            )
            .map(|(enc, ctx)| (enc, HpkeSender::Aes128Gcm(ctx))),
            AeadId::Aes256Gcm => hpke::setup_sender::<AesGcm256, HkdfSha256, X25519HkdfSha256, _>(
                &OpModeS::Base,
                pk,
                info,
                &mut OsRng,
            )
            .map(|(enc, ctx)| (enc, HpkeSender::Aes256Gcm(ctx))),
            AeadId::ChaCha20Poly1305 => hpke::setup_sender::<
                ChaCha20Poly1305,
                HkdfSha256,
                X25519HkdfSha256,
                _,
            >(&OpModeS::Base, pk, info, &mut OsRng)
            .map(|(enc, ctx)| (enc, HpkeSender::ChaCha20Poly1305(ctx))),
        };
        let (enc, ctx) = sender.map_err(|_| GatewayError::EncapsulationFailed)?;
        Ok((enc.to_bytes().to_vec(), ctx))
    }

    /// AEAD-seal a request body under the context.
    pub fn seal(&mut self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        let ciphertext = match self {
            HpkeSender::Aes128Gcm(ctx) => ctx.seal(plaintext, aad),
            HpkeSender::Aes256Gcm(ctx) => ctx.seal(plaintext, aad),
            HpkeSender::ChaCha20Poly1305(ctx) => ctx.seal(plaintext, aad),
        };
        ciphertext.map_err(|_| GatewayError::EncapsulationFailed)
    }

    /// Export `len` bytes of secret material bound to `label`.
    ///
    /// For matching labels and lengths this agrees with the receiver's export.
    pub fn export(&self, label: &[u8], len: usize) -> Result<SensitiveBytes> {
        let mut out = vec![0u8; len];
        let exported = match self {
            HpkeSender::Aes128Gcm(ctx) => ctx.export(label, &mut out),
            HpkeSender::Aes256Gcm(ctx) => ctx.export(label, &mut out),
            HpkeSender::ChaCha20Poly1305(ctx) => ctx.export(label, &mut out),
        };
        exported.map_err(|_| GatewayError::DecapsulationFailed)?;
        Ok(SensitiveBytes::new(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO: &[u8] = b"message/ohttp-req";
    const EXPORT_LABEL: &[u8] = b"message/ohttp-res";

    #[test]
    fn test_sender_receiver_roundtrip_all_suites() {
        for aead in [AeadId::Aes128Gcm, AeadId::Aes256Gcm, AeadId::ChaCha20Poly1305] {
            let (sk, pk) = generate_keypair();

            let (enc, mut sender) = HpkeSender::connect(aead, &pk, INFO).unwrap();
            let ciphertext = sender.seal(b"hello through the relay", b"").unwrap();

            let mut receiver = HpkeReceiver::accept(aead, &sk, &enc, INFO).unwrap();
            let plaintext = receiver.open(&ciphertext, b"").unwrap();

            assert_eq!(plaintext, b"hello through the relay");
        }
    }

    #[test]
    fn test_export_agrees_between_sender_and_receiver() {
        let (sk, pk) = generate_keypair();

        let (enc, mut sender) = HpkeSender::connect(AeadId::Aes128Gcm, &pk, INFO).unwrap();
        let ciphertext = sender.seal(b"x", b"").unwrap();
        let mut receiver = HpkeReceiver::accept(AeadId::Aes128Gcm, &sk, &enc, INFO).unwrap();
        receiver.open(&ciphertext, b"").unwrap();

        let sent = sender.export(EXPORT_LABEL, 28).unwrap();
        let received = receiver.export(EXPORT_LABEL, 28).unwrap();
        assert_eq!(sent.as_bytes(), received.as_bytes());
    }

    #[test]
    fn test_wrong_private_key_fails_open() {
        let (_, pk) = generate_keypair();
        let (other_sk, _) = generate_keypair();

        let (enc, mut sender) = HpkeSender::connect(AeadId::Aes128Gcm, &pk, INFO).unwrap();
        let ciphertext = sender.seal(b"secret", b"").unwrap();

        // X25519 decapsulation cannot fail structurally; the tag check does.
        let mut receiver = HpkeReceiver::accept(AeadId::Aes128Gcm, &other_sk, &enc, INFO).unwrap();
        assert!(receiver.open(&ciphertext, b"").is_err());
    }

    #[test]
    fn test_truncated_enc_fails_setup() {
        let (sk, _) = generate_keypair();
        let result = HpkeReceiver::accept(AeadId::Aes128Gcm, &sk, &[0u8; 16], INFO);
        assert!(result.is_err());
    }

    #[test]
    fn test_derive_keypair_deterministic() {
        let (_, pk1) = derive_keypair(&[0x42; 32]);
        let (_, pk2) = derive_keypair(&[0x42; 32]);
        assert_eq!(public_key_bytes(&pk1), public_key_bytes(&pk2));
    }

    #[test]
    fn test_suite_id_wire_roundtrip() {
        for aead in [AeadId::Aes128Gcm, AeadId::Aes256Gcm, AeadId::ChaCha20Poly1305] {
            assert_eq!(AeadId::from_wire(aead.wire()), Some(aead));
        }
        assert_eq!(AeadId::from_wire(0x7777), None);
        assert_eq!(KemId::from_wire(0x0020), Some(KemId::X25519HkdfSha256));
        assert_eq!(KdfId::from_wire(0x0001), Some(KdfId::HkdfSha256));
    }
}
