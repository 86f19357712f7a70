use crate::domain::encoding::{decode_uri_component, encode_uri_component};
use crate::error::{GatewayError, Result};
use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde::de::DeserializeOwned;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

const BLOCK_LEN: usize = 16;

/// AES-128-CBC codec with PKCS#7 padding and base64 framing.
///
/// Key and IV are fixed at construction. The JSON methods wrap the
/// plaintext in `encodeURIComponent` escaping, which is what the invoice
/// API expects inside its `Data` envelope.
#[derive(Clone)]
pub struct EnvelopeCipher {
    key: [u8; BLOCK_LEN],
    iv: [u8; BLOCK_LEN],
}

impl std::fmt::Debug for EnvelopeCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeCipher").finish_non_exhaustive()
    }
}

impl EnvelopeCipher {
    pub fn new(key: &str, iv: &str) -> Result<Self> {
        Ok(Self {
            key: block(key, "key")?,
            iv: block(iv, "IV")?,
        })
    }

    /// Encrypts raw text without any escaping.
    pub fn encrypt_text(&self, plain: &str) -> String {
        let ciphertext = Aes128CbcEnc::new(&self.key.into(), &self.iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plain.as_bytes());
        STANDARD.encode(ciphertext)
    }

    pub fn decrypt_text(&self, encoded: &str) -> Result<String> {
        let ciphertext = STANDARD
            .decode(encoded.trim())
            .map_err(|e| GatewayError::Decrypt(format!("invalid base64: {e}")))?;
        let plain = Aes128CbcDec::new(&self.key.into(), &self.iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|e| GatewayError::Decrypt(format!("invalid padding: {e}")))?;
        String::from_utf8(plain)
            .map_err(|e| GatewayError::Decrypt(format!("invalid UTF-8: {e}")))
    }

    pub fn encrypt<T: Serialize + ?Sized>(&self, payload: &T) -> Result<String> {
        let json = serde_json::to_string(payload)?;
        Ok(self.encrypt_text(&encode_uri_component(&json)))
    }

    pub fn decrypt<T: DeserializeOwned>(&self, encoded: &str) -> Result<T> {
        let escaped = self.decrypt_text(encoded)?;
        let json = decode_uri_component(&escaped)?;
        Ok(serde_json::from_str(&json)?)
    }
}

fn block(value: &str, what: &str) -> Result<[u8; BLOCK_LEN]> {
    let Ok(block) = <[u8; BLOCK_LEN]>::try_from(value.as_bytes()) else {
        let len = value.len();
        let message = format!("cipher {what} must be {BLOCK_LEN} bytes, got {len}");
        return Err(GatewayError::Config(message));
    };
    Ok(block)
}
