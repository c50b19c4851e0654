// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Checksum and artifact encryption primitives for the Salvor engine.
//!
//! Every artifact gets a SHA-256 digest at creation time; the same digest
//! is recomputed before replication and before restore, and a mismatch
//! anywhere stops the pipeline. Encryption is AES-256-CBC with a random
//! per-artifact IV and a key loaded from an operator-provided key file
//! that is never written back to disk.

pub mod checksum;
pub mod cipher;
pub mod keyfile;

pub use checksum::{sha256_file, sha256_hex};
pub use cipher::{decrypt, encrypt, generate_random_key, IV_LEN, KEY_LEN};
pub use keyfile::KeyMaterial;
