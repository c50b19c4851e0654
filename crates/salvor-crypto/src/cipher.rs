// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AES-256-CBC encrypt/decrypt with PKCS#7 padding.
//!
//! Every call to [`encrypt`] generates a fresh random 128-bit IV via the
//! system CSPRNG. IVs are stored alongside artifact metadata and never
//! reused across artifacts.

use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use ring::rand::{SecureRandom, SystemRandom};

use salvor_core::SalvorError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES block and IV size in bytes.
pub const IV_LEN: usize = 16;

/// AES-256 key size in bytes.
pub const KEY_LEN: usize = 32;

/// Encrypt plaintext with AES-256-CBC using a random 128-bit IV.
///
/// Returns `(ciphertext, iv_bytes)`. The caller must store both to be able
/// to decrypt later; the artifact metadata sidecar records the IV as hex.
pub fn encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<(Vec<u8>, [u8; IV_LEN]), SalvorError> {
    // Generate random 128-bit IV.
    let rng = SystemRandom::new();
    let mut iv = [0u8; IV_LEN];
    rng.fill(&mut iv)
        .map_err(|_| SalvorError::Internal("failed to generate random IV".to_string()))?;

    let ciphertext =
        Aes256CbcEnc::new(key.into(), (&iv).into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    Ok((ciphertext, iv))
}

/// Decrypt ciphertext with AES-256-CBC.
///
/// Fails with [`SalvorError::Decryption`] when the padding is invalid or the
/// key/IV pairing is wrong. No key recovery is attempted -- the error is
/// surfaced for operator escalation.
pub fn decrypt(
    key: &[u8; KEY_LEN],
    iv: &[u8; IV_LEN],
    ciphertext: &[u8],
) -> Result<Vec<u8>, SalvorError> {
    if ciphertext.is_empty() || ciphertext.len() % IV_LEN != 0 {
        return Err(SalvorError::Decryption {
            message: format!(
                "ciphertext length {} is not a positive multiple of the AES block size",
                ciphertext.len()
            ),
        });
    }

    Aes256CbcDec::new(key.into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| SalvorError::Decryption {
            message: "invalid padding -- wrong key/IV or corrupted data".to_string(),
        })
}

/// Generate a random 32-byte key suitable for AES-256-CBC.
///
/// Used by operators to provision a new key file; the engine itself only
/// ever reads keys.
pub fn generate_random_key() -> Result<[u8; KEY_LEN], SalvorError> {
    let rng = SystemRandom::new();
    let mut key = [0u8; KEY_LEN];
    rng.fill(&mut key)
        .map_err(|_| SalvorError::Internal("failed to generate random key".to_string()))?;
    Ok(key)
}
