/// Client half of the encapsulation, the peer of [`crate::ohttp::gateway`].
///
/// Deployed clients normally live behind the relay and use their own OHTTP
/// library; this implementation keeps the crate self-contained for round-trip
/// tests and operator smoke tooling.
use crate::crypto::aead;
use crate::crypto::hpke::{AeadId, HpkeSender, ENC_LEN};
use crate::crypto::sensitive::SensitiveBytes;
use crate::error::{GatewayError, Result};
use crate::ohttp::gateway::MediaLabels;
use crate::ohttp::keys::PublicKeyConfig;

/// Client-side residue of one encapsulated request, used to open the
/// gateway's sealed response. Zeroized on drop.
pub struct ClientContext {
    aead: AeadId,
    secret: SensitiveBytes,
}

pub struct ClientSession;

impl ClientSession {
    /// Encapsulate `plaintext` to the gateway key described by `config`.
    ///
    /// Uses the first symmetric suite the key advertises. Returns the wire
    /// request and the context for decapsulating the response.
    pub fn encapsulate_request(
        config: &PublicKeyConfig,
        labels: &MediaLabels,
        plaintext: &[u8],
    ) -> Result<(Vec<u8>, ClientContext)> {
        let suite = *config
            .suites
            .first()
            .ok_or_else(|| GatewayError::Config("key advertises no suites".to_string()))?;

        let (enc, mut sender) = HpkeSender::connect(
            suite.aead,
            &config.public_key,
            labels.request.as_bytes(),
        )?;
        let ciphertext = sender.seal(plaintext, b"")?;
        let secret = sender.export(
            labels.response.as_bytes(),
            suite.aead.key_len() + suite.aead.nonce_len(),
        )?;

        let mut wire = Vec::with_capacity(7 + enc.len() + ciphertext.len());
        wire.push(config.key_id);
        wire.extend_from_slice(&config.kem.wire().to_be_bytes());
        wire.extend_from_slice(&suite.kdf.wire().to_be_bytes());
        wire.extend_from_slice(&suite.aead.wire().to_be_bytes());
        wire.extend_from_slice(&enc);
        wire.extend_from_slice(&ciphertext);

        debug_assert_eq!(enc.len(), ENC_LEN);

        Ok((
            wire,
            ClientContext {
                aead: suite.aead,
                secret,
            },
        ))
    }
}

impl ClientContext {
    /// Open an encapsulated response: [response_nonce(Nn) | aead_ct].
    pub fn decapsulate_response(&self, wire: &[u8]) -> Result<Vec<u8>> {
        let nk = self.aead.key_len();
        let nn = self.aead.nonce_len();
        if wire.len() < nn + self.aead.tag_len() {
            return Err(GatewayError::MalformedRequest(
                "truncated encapsulated response".to_string(),
            ));
        }
        let (response_nonce, ciphertext) = wire.split_at(nn);

        let secret = self.secret.as_bytes();
        let key = &secret[..nk];
        let nonce: Vec<u8> = secret[nk..]
            .iter()
            .zip(response_nonce)
            .map(|(seed, fresh)| seed ^ fresh)
            .collect();

        aead::open(self.aead, key, &nonce, b"", ciphertext)
    }
}
