/// Gateway core: per-request decapsulation and response encapsulation.
///
/// Encapsulated request wire form:
/// [key_id(1B) | kem_id(2B) | kdf_id(2B) | aead_id(2B) | enc(Nenc) | aead_ct]
/// Encapsulated response wire form:
/// [response_nonce(Nn) | aead_ct]
///
/// The response key and nonce seed come from the HPKE secret export under the
/// response label: Nk + Nn exported bytes, the first Nk the AEAD key, the
/// rest XORed with a fresh random response nonce to form the AEAD nonce.
use rand::rngs::OsRng;
use rand::RngCore;

use crate::crypto::aead;
use crate::crypto::hpke::{AeadId, HpkeReceiver, KemId, ENC_LEN};
use crate::crypto::sensitive::SensitiveBytes;
use crate::error::{GatewayError, Result};
use crate::ohttp::keys::KeyRegistry;

/// Length of the fixed portion of an encapsulated request.
pub const REQUEST_HEADER_LEN: usize = 7;

/// HPKE info and export labels for one encapsulation endpoint.
///
/// Client and gateway must agree on the pair; it is carried as configuration
/// on each endpoint rather than hard-coded.
#[derive(Debug, Clone, Copy)]
pub struct MediaLabels {
    pub request: &'static str,
    pub response: &'static str,
}

/// Labels for the binary-HTTP encapsulation endpoint.
pub const BHTTP_LABELS: MediaLabels = MediaLabels {
    request: "message/bhttp request",
    response: "message/bhttp response",
};

/// Labels for the echo encapsulation endpoint.
pub const ECHO_LABELS: MediaLabels = MediaLabels {
    request: "message/ohttp-req",
    response: "message/ohttp-res",
};

/// What survives a successful decapsulation: the suite and the exported
/// response secret. Zeroized on drop; discarded wholesale if the client goes
/// away before the response is sealed.
pub struct ResponseContext {
    aead: AeadId,
    secret: SensitiveBytes,
}

/// The OHTTP gateway: owns the key registry and the request/response
/// encapsulation state machine.
pub struct Gateway {
    registry: KeyRegistry,
}

impl Gateway {
    pub fn new(registry: KeyRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    /// Open an encapsulated request.
    ///
    /// Returns the plaintext and the context needed to seal the response.
    /// Error order matters: a syntactically valid but unregistered key ID is
    /// `UnknownKey` no matter what the rest of the body holds.
    pub fn decapsulate(
        &self,
        labels: &MediaLabels,
        wire: &[u8],
    ) -> Result<(Vec<u8>, ResponseContext)> {
        if wire.len() < REQUEST_HEADER_LEN {
            return Err(GatewayError::MalformedRequest(format!(
                "{} bytes is shorter than the {} byte header",
                wire.len(),
                REQUEST_HEADER_LEN
            )));
        }
        let key_id = wire[0];
        let kem_id = u16::from_be_bytes([wire[1], wire[2]]);
        let kdf_id = u16::from_be_bytes([wire[3], wire[4]]);
        let aead_id = u16::from_be_bytes([wire[5], wire[6]]);

        let config = self.registry.config(key_id)?;

        if KemId::from_wire(kem_id) != Some(KemId::X25519HkdfSha256) {
            return Err(GatewayError::DecapsulationFailed);
        }
        let suite = config
            .supports(kdf_id, aead_id)
            .ok_or(GatewayError::DecapsulationFailed)?;

        let rest = &wire[REQUEST_HEADER_LEN..];
        if rest.len() < ENC_LEN + suite.aead.tag_len() {
            return Err(GatewayError::MalformedRequest(
                "truncated KEM output or ciphertext".to_string(),
            ));
        }
        let (enc, ciphertext) = rest.split_at(ENC_LEN);

        let mut receiver = HpkeReceiver::accept(
            suite.aead,
            config.private_key(),
            enc,
            labels.request.as_bytes(),
        )?;
        let plaintext = receiver.open(ciphertext, b"")?;
        let secret = receiver.export(
            labels.response.as_bytes(),
            suite.aead.key_len() + suite.aead.nonce_len(),
        )?;

        Ok((
            plaintext,
            ResponseContext {
                aead: suite.aead,
                secret,
            },
        ))
    }

    /// Seal a response under the context produced by [`Self::decapsulate`].
    ///
    /// Consumes the context: one response per request.
    pub fn encapsulate_response(&self, ctx: ResponseContext, plaintext: &[u8]) -> Result<Vec<u8>> {
        let nk = ctx.aead.key_len();
        let nn = ctx.aead.nonce_len();

        let mut response_nonce = vec![0u8; nn];
        OsRng.fill_bytes(&mut response_nonce);

        let secret = ctx.secret.as_bytes();
        let key = &secret[..nk];
        let nonce: Vec<u8> = secret[nk..]
            .iter()
            .zip(&response_nonce)
            .map(|(seed, fresh)| seed ^ fresh)
            .collect();

        let ciphertext = aead::seal(ctx.aead, key, &nonce, b"", plaintext)?;

        let mut out = Vec::with_capacity(nn + ciphertext.len());
        out.extend_from_slice(&response_nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ohttp::client::ClientSession;
    use crate::ohttp::keys::{default_suites, KeyConfig, PublicKeyConfig};

    fn test_gateway(key_id: u8) -> Gateway {
        let registry =
            KeyRegistry::new(vec![KeyConfig::generate(key_id, default_suites()).unwrap()]).unwrap();
        Gateway::new(registry)
    }

    fn client_for(gateway: &Gateway) -> PublicKeyConfig {
        PublicKeyConfig::unmarshal_all(&gateway.registry().marshal_public())
            .unwrap()
            .remove(0)
    }

    #[test]
    fn test_request_roundtrip() {
        let gateway = test_gateway(0x00);
        let config = client_for(&gateway);

        for len in [0usize, 1, 2, 333, 16384] {
            let message = vec![0xA5u8; len];
            let (wire, _) =
                ClientSession::encapsulate_request(&config, &ECHO_LABELS, &message).unwrap();
            let (plaintext, _) = gateway.decapsulate(&ECHO_LABELS, &wire).unwrap();
            assert_eq!(plaintext, message);
        }
    }

    #[test]
    fn test_response_roundtrip() {
        let gateway = test_gateway(0x00);
        let config = client_for(&gateway);

        let (wire, client_ctx) =
            ClientSession::encapsulate_request(&config, &ECHO_LABELS, &[0xCA, 0xFE]).unwrap();
        let (plaintext, server_ctx) = gateway.decapsulate(&ECHO_LABELS, &wire).unwrap();

        let sealed = gateway
            .encapsulate_response(server_ctx, &plaintext)
            .unwrap();
        let recovered = client_ctx.decapsulate_response(&sealed).unwrap();
        assert_eq!(recovered, vec![0xCA, 0xFE]);
    }

    #[test]
    fn test_every_bit_flip_in_ciphertext_is_detected() {
        let gateway = test_gateway(0x00);
        let config = client_for(&gateway);

        let (wire, _) =
            ClientSession::encapsulate_request(&config, &ECHO_LABELS, &[0xCA, 0xFE]).unwrap();

        // Flip each bit of the sealed body (past the header and enc) in turn.
        for byte in REQUEST_HEADER_LEN + ENC_LEN..wire.len() {
            for bit in 0..8 {
                let mut corrupt = wire.clone();
                corrupt[byte] ^= 1 << bit;
                assert!(matches!(
                    gateway.decapsulate(&ECHO_LABELS, &corrupt),
                    Err(GatewayError::DecapsulationFailed)
                ));
            }
        }
    }

    #[test]
    fn test_unknown_key_id_regardless_of_remainder() {
        let gateway = test_gateway(0x00);
        let config = client_for(&gateway);

        let (mut wire, _) =
            ClientSession::encapsulate_request(&config, &ECHO_LABELS, &[0xCA, 0xFE]).unwrap();
        wire[0] ^= 0xFF;
        assert!(matches!(
            gateway.decapsulate(&ECHO_LABELS, &wire),
            Err(GatewayError::UnknownKey(0xFF))
        ));

        // Unknown key wins even over garbage suite identifiers.
        let mut garbage = vec![0xFFu8; 64];
        garbage[0] = 0xFF;
        assert!(matches!(
            gateway.decapsulate(&ECHO_LABELS, &garbage),
            Err(GatewayError::UnknownKey(0xFF))
        ));
    }

    #[test]
    fn test_wrong_key_material_fails() {
        let gateway = test_gateway(0x00);
        // Same key ID, different private key.
        let other = test_gateway(0x00);
        let config = client_for(&other);

        let (wire, _) =
            ClientSession::encapsulate_request(&config, &ECHO_LABELS, &[0xCA, 0xFE]).unwrap();
        assert!(matches!(
            gateway.decapsulate(&ECHO_LABELS, &wire),
            Err(GatewayError::DecapsulationFailed)
        ));
    }

    #[test]
    fn test_unadvertised_suite_fails() {
        let gateway = test_gateway(0x00);
        let config = client_for(&gateway);

        let (mut wire, _) =
            ClientSession::encapsulate_request(&config, &ECHO_LABELS, &[0xCA, 0xFE]).unwrap();
        // Rewrite the AEAD identifier to ChaCha20-Poly1305, which this key
        // does not advertise.
        wire[5] = 0x00;
        wire[6] = 0x03;
        assert!(matches!(
            gateway.decapsulate(&ECHO_LABELS, &wire),
            Err(GatewayError::DecapsulationFailed)
        ));
    }

    #[test]
    fn test_truncated_request_is_malformed() {
        let gateway = test_gateway(0x00);
        let config = client_for(&gateway);

        let (wire, _) =
            ClientSession::encapsulate_request(&config, &ECHO_LABELS, &[0xCA, 0xFE]).unwrap();

        assert!(matches!(
            gateway.decapsulate(&ECHO_LABELS, &wire[..3]),
            Err(GatewayError::MalformedRequest(_))
        ));
        assert!(matches!(
            gateway.decapsulate(&ECHO_LABELS, &wire[..REQUEST_HEADER_LEN + 10]),
            Err(GatewayError::MalformedRequest(_))
        ));
    }

    #[test]
    fn test_label_mismatch_fails() {
        let gateway = test_gateway(0x00);
        let config = client_for(&gateway);

        let (wire, _) =
            ClientSession::encapsulate_request(&config, &BHTTP_LABELS, &[0xCA, 0xFE]).unwrap();
        assert!(gateway.decapsulate(&ECHO_LABELS, &wire).is_err());
    }
}
