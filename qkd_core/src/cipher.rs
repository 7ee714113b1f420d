//! XOR stream cipher keyed by the final QKD key.

use crate::error::{QkdError, Result};
use crate::sequence::BitSequence;

/// Packs bits MSB-first into bytes, 8 at a time.
///
/// A trailing chunk shorter than 8 bits is read as a shorter binary number,
/// so `101` becomes `0b101 = 5`, not `0b1010_0000`.
pub fn pack_key_bytes(key: &BitSequence) -> Vec<u8> {
    key.as_slice()
        .chunks(8)
        .map(|chunk| chunk.iter().fold(0u8, |acc, bit| (acc << 1) | bit.value()))
        .collect()
}

/// Result of encrypting one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherResult {
    pub plaintext: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

impl CipherResult {
    /// Lowercase hex rendering of the ciphertext.
    pub fn ciphertext_hex(&self) -> String {
        hex::encode(&self.ciphertext)
    }
}

/// Repeating-key XOR cipher.
#[derive(Debug, Clone)]
pub struct XorCipher {
    key_bytes: Vec<u8>,
}

impl XorCipher {
    /// Builds a cipher from the final key bits.
    pub fn from_key(final_key: &BitSequence) -> Result<Self> {
        Self::from_key_bytes(pack_key_bytes(final_key))
    }

    /// Builds a cipher from already packed key bytes.
    pub fn from_key_bytes(key_bytes: Vec<u8>) -> Result<Self> {
        if key_bytes.is_empty() {
            return Err(QkdError::EmptyKey);
        }
        Ok(Self { key_bytes })
    }

    /// Key bytes repeated and truncated to exactly `len` bytes.
    pub fn keystream(&self, len: usize) -> Vec<u8> {
        self.key_bytes.iter().copied().cycle().take(len).collect()
    }

    /// XORs `data` with the keystream. Encryption and decryption are the
    /// same operation.
    pub fn apply(&self, data: &[u8]) -> Vec<u8> {
        data.iter()
            .zip(self.keystream(data.len()))
            .map(|(d, k)| d ^ k)
            .collect()
    }

    /// Encrypts a text message as UTF-8 bytes.
    pub fn encrypt(&self, message: &str) -> CipherResult {
        let plaintext = message.as_bytes().to_vec();
        let ciphertext = self.apply(&plaintext);
        CipherResult {
            plaintext,
            ciphertext,
        }
    }

    /// Decrypts ciphertext back into text.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<String> {
        String::from_utf8(self.apply(ciphertext)).map_err(|e| QkdError::Encoding(e.to_string()))
    }
}
