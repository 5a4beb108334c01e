// src/crypto.rs

pub mod cipher;
pub use cipher::SecretCipher;
pub mod password;
pub mod totp;
