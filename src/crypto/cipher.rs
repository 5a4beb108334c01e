// src/crypto/cipher.rs
//
// Cifra das senhas dos certificados: AES-256-CBC com PKCS#7 e IV aleatório por chamada.
// Formato armazenado (estável): `hex(iv):hex(ciphertext)`.

use aes::Aes256;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

pub const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;
const DELIMITER: char = ':';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("formato de texto cifrado inválido")]
    MalformedCiphertext,

    #[error("hexadecimal inválido")]
    InvalidHex,

    #[error("padding inválido ou chave incorreta")]
    Decryption,

    #[error("texto decifrado não é UTF-8")]
    InvalidUtf8,

    #[error("a chave de cifra deve ter 32 bytes (64 caracteres hex ou 32 caracteres)")]
    InvalidKey,
}

#[derive(Clone)]
pub struct SecretCipher {
    key: [u8; KEY_LEN],
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCipher").finish_non_exhaustive()
    }
}

impl SecretCipher {
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Aceita a chave como 64 caracteres hexadecimais ou como 32 bytes literais.
    pub fn from_key_material(material: &str) -> Result<Self, CipherError> {
        let bytes = if material.len() == KEY_LEN * 2 {
            hex::decode(material).map_err(|_| CipherError::InvalidKey)?
        } else {
            material.as_bytes().to_vec()
        };
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|_| CipherError::InvalidKey)?;
        Ok(Self::new(key))
    }

    pub fn encrypt(&self, plaintext: &str) -> String {
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let ciphertext = Aes256CbcEnc::new(&self.key.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        format!("{}{}{}", hex::encode(iv), DELIMITER, hex::encode(ciphertext))
    }

    pub fn decrypt(&self, stored: &str) -> Result<String, CipherError> {
        let (iv_hex, ct_hex) = stored
            .split_once(DELIMITER)
            .ok_or(CipherError::MalformedCiphertext)?;

        let iv = hex::decode(iv_hex).map_err(|_| CipherError::InvalidHex)?;
        let ciphertext = hex::decode(ct_hex).map_err(|_| CipherError::InvalidHex)?;
        let iv: [u8; IV_LEN] = iv.try_into().map_err(|_| CipherError::MalformedCiphertext)?;

        let plaintext = Aes256CbcDec::new(&self.key.into(), &iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| CipherError::Decryption)?;

        String::from_utf8(plaintext).map_err(|_| CipherError::InvalidUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cipher() -> SecretCipher {
        SecretCipher::new([7u8; KEY_LEN])
    }

    #[test]
    fn decrypt_inverts_encrypt() {
        let c = cipher();
        for plain in ["s3cr3t", "", "senha com acentuação ç", &"x".repeat(100)] {
            assert_eq!(c.decrypt(&c.encrypt(plain)).unwrap(), plain);
        }
    }

    #[test]
    fn each_encryption_uses_a_fresh_iv() {
        let c = cipher();
        assert_ne!(c.encrypt("s3cr3t"), c.encrypt("s3cr3t"));
    }

    #[test]
    fn stored_form_uses_colon_delimiter() {
        let stored = cipher().encrypt("s3cr3t");
        let (iv, ct) = stored.split_once(':').unwrap();
        assert_eq!(iv.len(), IV_LEN * 2);
        assert_eq!(ct.len() % 32, 0);
    }

    #[test]
    fn dot_delimiter_is_rejected() {
        let c = cipher();
        let dotted = c.encrypt("s3cr3t").replace(':', ".");
        assert_eq!(c.decrypt(&dotted), Err(CipherError::MalformedCiphertext));
    }

    #[test]
    fn truncated_or_bad_hex_fails() {
        let c = cipher();
        let stored = c.encrypt("s3cr3t");
        assert!(c.decrypt(&stored[..stored.len() - 3]).is_err());
        assert_eq!(c.decrypt("zz:zz"), Err(CipherError::InvalidHex));
        assert_eq!(c.decrypt("abcd:abcd"), Err(CipherError::MalformedCiphertext));
    }

    #[test]
    fn wrong_key_does_not_yield_plaintext() {
        let stored = cipher().encrypt("s3cr3t");
        let other = SecretCipher::new([9u8; KEY_LEN]);
        assert_ne!(other.decrypt(&stored).ok().as_deref(), Some("s3cr3t"));
    }

    #[test]
    fn key_material_accepts_hex_and_raw() {
        assert!(SecretCipher::from_key_material(&"ab".repeat(32)).is_ok());
        assert!(SecretCipher::from_key_material("0123456789abcdef0123456789abcdef").is_ok());
        assert_eq!(
            SecretCipher::from_key_material("curta").unwrap_err(),
            CipherError::InvalidKey
        );
    }
}
