/// Raw-key AEAD operations for the response leg of the encapsulation.
///
/// The request leg is opened inside the HPKE context; the response is sealed
/// under a key and nonce derived from the context's secret export, so these
/// helpers take the key material directly. All supported suites use 12-byte
/// nonces and 16-byte tags.
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};

use crate::crypto::hpke::AeadId;
use crate::error::{GatewayError, Result};

pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// Encrypt `plaintext` under (key, nonce), returning ciphertext with tag.
pub fn seal(aead: AeadId, key: &[u8], nonce: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    if nonce.len() != NONCE_LEN {
        return Err(GatewayError::EncapsulationFailed);
    }
    let payload = Payload { msg: plaintext, aad };
    let nonce = Nonce::from_slice(nonce);
    let ciphertext = match aead {
        AeadId::Aes128Gcm => Aes128Gcm::new_from_slice(key)
            .map_err(|_| GatewayError::EncapsulationFailed)?
            .encrypt(nonce, payload),
        AeadId::Aes256Gcm => Aes256Gcm::new_from_slice(key)
            .map_err(|_| GatewayError::EncapsulationFailed)?
            .encrypt(nonce, payload),
        AeadId::ChaCha20Poly1305 => ChaCha20Poly1305::new_from_slice(key)
            .map_err(|_| GatewayError::EncapsulationFailed)?
            .encrypt(nonce, payload),
    };
    ciphertext.map_err(|_| GatewayError::EncapsulationFailed)
}

/// Decrypt `ciphertext` under (key, nonce), verifying the tag.
pub fn open(aead: AeadId, key: &[u8], nonce: &[u8], aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if nonce.len() != NONCE_LEN {
        return Err(GatewayError::DecapsulationFailed);
    }
    let payload = Payload { msg: ciphertext, aad };
    let nonce = Nonce::from_slice(nonce);
    let plaintext = match aead {
        AeadId::Aes128Gcm => Aes128Gcm::new_from_slice(key)
            .map_err(|_| GatewayError::DecapsulationFailed)?
            .decrypt(nonce, payload),
        AeadId::Aes256Gcm => Aes256Gcm::new_from_slice(key)
            .map_err(|_| GatewayError::DecapsulationFailed)?
            .decrypt(nonce, payload),
        AeadId::ChaCha20Poly1305 => ChaCha20Poly1305::new_from_slice(key)
            .map_err(|_| GatewayError::DecapsulationFailed)?
            .decrypt(nonce, payload),
    };
    plaintext.map_err(|_| GatewayError::DecapsulationFailed)
}
