// src/crypto/totp.rs
//
// TOTP (RFC 6238): HMAC-SHA1, 6 dígitos, passo de 30 segundos.

use data_encoding::BASE32_NOPAD;
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha1::Sha1;
use subtle::ConstantTimeEq;

type HmacSha1 = Hmac<Sha1>;

pub const DIGITS: u32 = 6;
pub const PERIOD_SECS: i64 = 30;
const SECRET_LEN: usize = 20;
// Tolerância de relógio: um passo para trás e um para frente
const SKEW_STEPS: i64 = 1;

/// Novo segredo aleatório em base32 (sem padding), pronto para apps autenticadores.
pub fn generate_secret() -> String {
    let mut secret = [0u8; SECRET_LEN];
    OsRng.fill_bytes(&mut secret);
    BASE32_NOPAD.encode(&secret)
}

fn decode_secret(secret_base32: &str) -> Option<Vec<u8>> {
    let normalized = secret_base32
        .trim()
        .replace([' ', '-'], "")
        .trim_end_matches('=')
        .to_ascii_uppercase();
    BASE32_NOPAD
        .decode(normalized.as_bytes())
        .ok()
        .filter(|bytes| !bytes.is_empty())
}

fn code_for_counter(secret: &[u8], counter: u64) -> Option<String> {
    let mut mac = HmacSha1::new_from_slice(secret).ok()?;
    mac.update(&counter.to_be_bytes());
    let digest = mac.finalize().into_bytes();

    let offset = (digest[digest.len() - 1] & 0x0f) as usize;
    let binary = ((digest[offset] as u32 & 0x7f) << 24)
        | ((digest[offset + 1] as u32) << 16)
        | ((digest[offset + 2] as u32) << 8)
        | (digest[offset + 3] as u32);

    let code = binary % 10u32.pow(DIGITS);
    Some(format!("{:0width$}", code, width = DIGITS as usize))
}

pub fn generate_code(secret_base32: &str, timestamp: i64) -> Option<String> {
    let secret = decode_secret(secret_base32)?;
    code_for_counter(&secret, (timestamp.max(0) / PERIOD_SECS) as u64)
}

/// Confere o código dentro da janela de tolerância. Segredo inválido devolve `false`.
pub fn verify_code(secret_base32: &str, code: &str, timestamp: i64) -> bool {
    let code = code.trim();
    if code.len() != DIGITS as usize || !code.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let Some(secret) = decode_secret(secret_base32) else {
        return false;
    };

    let current = timestamp.max(0) / PERIOD_SECS;
    (-SKEW_STEPS..=SKEW_STEPS).any(|delta| {
        let counter = current + delta;
        counter >= 0
            && code_for_counter(&secret, counter as u64)
                .is_some_and(|expected| bool::from(expected.as_bytes().ct_eq(code.as_bytes())))
    })
}

/// URI `otpauth://` usada pelo QR Code de cadastro.
pub fn provisioning_uri(secret_base32: &str, issuer: &str, account: &str) -> String {
    format!(
        "otpauth://totp/{}:{}?secret={}&issuer={}&algorithm=SHA1&digits={}&period={}",
        url_encode(issuer),
        url_encode(account),
        secret_base32,
        url_encode(issuer),
        DIGITS,
        PERIOD_SECS
    )
}

fn url_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'@' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // Segredo ASCII "12345678901234567890" do apêndice B da RFC 6238
    fn rfc_secret() -> String {
        BASE32_NOPAD.encode(b"12345678901234567890")
    }

    #[test]
    fn rfc_6238_sha1_vectors_truncated_to_six_digits() {
        let secret = rfc_secret();
        assert_eq!(generate_code(&secret, 59).unwrap(), "287082");
        assert_eq!(generate_code(&secret, 1111111109).unwrap(), "081804");
        assert_eq!(generate_code(&secret, 1234567890).unwrap(), "005924");
    }

    #[test]
    fn verify_accepts_adjacent_steps_only() {
        let secret = rfc_secret();
        let now = 1234567890;
        let code = generate_code(&secret, now).unwrap();
        assert!(verify_code(&secret, &code, now));
        assert!(verify_code(&secret, &code, now + PERIOD_SECS));
        assert!(!verify_code(&secret, &code, now + 3 * PERIOD_SECS));
    }

    #[test]
    fn hardcoded_placeholder_code_is_not_accepted() {
        let secret = generate_secret();
        let now = 1_700_000_000;
        let valid = generate_code(&secret, now).unwrap();
        if valid != "123456" {
            assert!(!verify_code(&secret, "123456", now));
        }
    }

    #[test]
    fn malformed_codes_are_rejected() {
        let secret = rfc_secret();
        assert!(!verify_code(&secret, "", 59));
        assert!(!verify_code(&secret, "28708", 59));
        assert!(!verify_code(&secret, "28708a", 59));
        assert!(!verify_code("!!!", "287082", 59));
    }

    #[test]
    fn generated_secret_is_base32() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 32);
        assert!(decode_secret(&secret).is_some());
    }

    #[test]
    fn provisioning_uri_escapes_labels() {
        let uri = provisioning_uri("ABC", "Gestor Certificados", "ana@acme.com");
        assert!(uri.starts_with("otpauth://totp/Gestor%20Certificados:ana@acme.com?secret=ABC"));
    }
}
