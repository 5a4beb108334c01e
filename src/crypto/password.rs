// src/crypto/password.rs
//
// Hash das senhas de login: scrypt (N=16384, r=8, p=1), chave de 64 bytes e sal
// aleatório de 16 bytes. Formato armazenado: `hex(chave).hex(sal)`.

use rand::{rngs::OsRng, RngCore};
use scrypt::{scrypt, Params};
use subtle::ConstantTimeEq;

const SALT_LEN: usize = 16;
const KEY_LEN: usize = 64;
const LOG_N: u8 = 14;
const R: u32 = 8;
const P: u32 = 1;

fn derive(password: &str, salt: &[u8]) -> anyhow::Result<[u8; KEY_LEN]> {
    let params = Params::new(LOG_N, R, P, KEY_LEN)
        .map_err(|e| anyhow::anyhow!("Parâmetros de scrypt inválidos: {}", e))?;
    let mut key = [0u8; KEY_LEN];
    scrypt(password.as_bytes(), salt, &params, &mut key)
        .map_err(|e| anyhow::anyhow!("Falha ao derivar chave com scrypt: {}", e))?;
    Ok(key)
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let key = derive(password, &salt)?;
    Ok(format!("{}.{}", hex::encode(key), hex::encode(salt)))
}

/// Nunca falha: formato inválido ou senha errada devolvem `false`.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((key_hex, salt_hex)) = stored.split_once('.') else {
        return false;
    };
    let (Ok(expected), Ok(salt)) = (hex::decode(key_hex), hex::decode(salt_hex)) else {
        return false;
    };
    if expected.len() != KEY_LEN {
        return false;
    }
    match derive(password, &salt) {
        Ok(derived) => derived.as_slice().ct_eq(expected.as_slice()).into(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correct_password_verifies() {
        let stored = hash_password("s3cr3t-P4ss").unwrap();
        assert!(verify_password("s3cr3t-P4ss", &stored));
    }

    #[test]
    fn wrong_password_is_rejected() {
        let stored = hash_password("s3cr3t-P4ss").unwrap();
        assert!(!verify_password("s3cr3t-P4sS", &stored));
    }

    #[test]
    fn stored_form_is_hex_key_dot_hex_salt() {
        let stored = hash_password("abc").unwrap();
        let (key, salt) = stored.split_once('.').unwrap();
        assert_eq!(key.len(), KEY_LEN * 2);
        assert_eq!(salt.len(), SALT_LEN * 2);
    }

    #[test]
    fn same_password_gets_different_salts() {
        assert_ne!(hash_password("abc").unwrap(), hash_password("abc").unwrap());
    }

    #[test]
    fn malformed_stored_forms_return_false() {
        assert!(!verify_password("abc", ""));
        assert!(!verify_password("abc", "semponto"));
        assert!(!verify_password("abc", "zz.zz"));
        assert!(!verify_password("abc", "abcd.abcd"));
    }
}
