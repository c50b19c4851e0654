// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Encryption key loading from a configured file path.
//!
//! The key file is read exactly once, at component construction. It must be
//! owner-read-only; looser permissions fail closed with
//! [`SalvorError::KeyUnavailable`]. Key bytes never appear in logs or
//! `Debug` output and are zeroed on drop.

use std::path::Path;

use zeroize::{Zeroize, Zeroizing};

use salvor_core::SalvorError;

use crate::cipher::KEY_LEN;

/// A loaded AES-256 key, zeroed on drop.
pub struct KeyMaterial {
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl KeyMaterial {
    /// Load a key from `path`: either 32 raw bytes or 64 hex characters
    /// (surrounding whitespace tolerated for the hex form).
    ///
    /// Fails closed when the file is missing, not owner-read-only, or not a
    /// well-formed key.
    pub fn load(path: &Path) -> Result<Self, SalvorError> {
        let metadata = std::fs::metadata(path).map_err(|e| SalvorError::KeyUnavailable {
            message: format!("{}: {e}", path.display()),
        })?;
        if !metadata.is_file() {
            return Err(SalvorError::KeyUnavailable {
                message: format!("{}: not a regular file", path.display()),
            });
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = metadata.permissions().mode();
            if mode & 0o077 != 0 {
                return Err(SalvorError::KeyUnavailable {
                    message: format!(
                        "{}: mode {:03o} grants group/other access; require owner-only (0600)",
                        path.display(),
                        mode & 0o777
                    ),
                });
            }
        }

        let mut raw = std::fs::read(path).map_err(|e| SalvorError::KeyUnavailable {
            message: format!("{}: {e}", path.display()),
        })?;
        let result = Self::parse(&raw, path);
        raw.zeroize();

        if result.is_ok() {
            tracing::debug!(path = %path.display(), "encryption key loaded");
        }
        result
    }

    fn parse(raw: &[u8], path: &Path) -> Result<Self, SalvorError> {
        if raw.len() == KEY_LEN {
            let mut key = Zeroizing::new([0u8; KEY_LEN]);
            key.copy_from_slice(raw);
            return Ok(KeyMaterial { key });
        }

        if let Ok(text) = std::str::from_utf8(raw) {
            let trimmed = text.trim();
            if trimmed.len() == KEY_LEN * 2 && trimmed.bytes().all(|b| b.is_ascii_hexdigit()) {
                let mut decoded = hex::decode(trimmed).map_err(|e| SalvorError::KeyUnavailable {
                    message: format!("{}: invalid hex: {e}", path.display()),
                })?;
                let mut key = Zeroizing::new([0u8; KEY_LEN]);
                key.copy_from_slice(&decoded);
                decoded.zeroize();
                return Ok(KeyMaterial { key });
            }
        }

        Err(SalvorError::KeyUnavailable {
            message: format!(
                "{}: expected 32 raw bytes or 64 hex characters, got {} bytes",
                path.display(),
                raw.len()
            ),
        })
    }

    /// The raw key bytes, for handing to the cipher.
    pub fn bytes(&self) -> &[u8; KEY_LEN] {
        &self.key
    }
}

// Never expose key bytes through Debug.
impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyMaterial(..)")
    }
}
