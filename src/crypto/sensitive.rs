/// Wrappers for derived key material that is automatically zeroized on drop.
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A variable-length secret buffer that is zeroized when dropped.
///
/// Holds HPKE-exported material (response AEAD key and nonce seed) and
/// private key seeds loaded from configuration.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SensitiveBytes(Vec<u8>);

impl SensitiveBytes {
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for SensitiveBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sensitive_bytes() {
        let secret = SensitiveBytes::new(vec![0xAA; 28]);
        assert_eq!(secret.len(), 28);
        assert!(!secret.is_empty());
        assert_eq!(secret.as_bytes(), &[0xAA; 28][..]);
    }

    #[test]
    fn test_sensitive_bytes_empty() {
        let secret = SensitiveBytes::new(Vec::new());
        assert!(secret.is_empty());
    }
}
