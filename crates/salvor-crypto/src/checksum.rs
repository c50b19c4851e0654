// SPDX-FileCopyrightText: 2026 Salvor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SHA-256 digests over in-memory payloads and on-disk artifacts.

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use salvor_core::SalvorError;

/// Read size for streaming file digests.
const CHUNK_SIZE: usize = 64 * 1024;

/// SHA-256 hex digest of a byte slice.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// SHA-256 hex digest of a file, streamed in 64 KiB chunks.
///
/// Artifacts can run to many gigabytes; this never buffers more than one
/// chunk. Blocking I/O -- callers on the async runtime wrap this in
/// `spawn_blocking`.
pub fn sha256_file(path: &Path) -> Result<String, SalvorError> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::with_capacity(CHUNK_SIZE, file);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}
