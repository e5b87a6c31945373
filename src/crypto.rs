//! AES-256-CBC encryption of session file payloads
//!
//! The layout is kept compatible with existing session files: a fixed IV and
//! PKCS7 padding. A fixed IV leaks equality of plaintext prefixes across
//! files.
// TODO: move to AES-GCM with a random per-file nonce stored after the timestamp header.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::error::{Result, SessionError};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Required key length in bytes
pub const KEY_LEN: usize = 32;

/// The built-in key. Stores refuse to encrypt with it.
pub const DEFAULT_KEY: &[u8; KEY_LEN] = b"Session storage file crypto key!";

/// IV seed; repeated to fill the 16-byte AES block.
const IV_SEED: &[u8; 8] = b"Root1234";

fn iv() -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..8].copy_from_slice(IV_SEED);
    iv[8..].copy_from_slice(IV_SEED);
    iv
}

/// Validate a user supplied key
pub fn parse_key(key: &[u8]) -> Result<[u8; KEY_LEN]> {
    let key: [u8; KEY_LEN] = key.try_into().map_err(|_| {
        SessionError::Config(format!(
            "crypto key must be {} bytes, got {}",
            KEY_LEN,
            key.len()
        ))
    })?;
    if &key == DEFAULT_KEY {
        return Err(SessionError::Config(
            "refusing to encrypt sessions with the built-in default key".to_string(),
        ));
    }
    Ok(key)
}

/// Encrypt `plain` with PKCS7 padding
pub fn encrypt(plain: &[u8], key: &[u8; KEY_LEN]) -> Vec<u8> {
    Aes256CbcEnc::new(key.into(), &iv().into()).encrypt_padded_vec_mut::<Pkcs7>(plain)
}

/// Decrypt `cipher`, failing on bad length or padding
pub fn decrypt(cipher: &[u8], key: &[u8; KEY_LEN]) -> Result<Vec<u8>> {
    Aes256CbcDec::new(key.into(), &iv().into())
        .decrypt_padded_vec_mut::<Pkcs7>(cipher)
        .map_err(|e| SessionError::Crypto(format!("decryption failed: {}", e)))
}
