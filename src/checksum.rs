//! IEEE 802.3 CRC-32 engine
//!
//! Every checksummed datagram carries a CRC-32 over header bytes [0..23)
//! followed by the point payload. The polynomial is the reflected IEEE 802.3
//! one (0xEDB88320, init 0xFFFFFFFF, final XOR 0xFFFFFFFF) — the same
//! algorithm as zlib. `crc32fast` implements exactly this and dispatches to
//! hardware carry-less multiply where the CPU supports it.
//!
//! CRC32C (Castagnoli, the `crc32` *instruction* on x86) uses a different
//! polynomial and is **not** interchangeable; do not swap the backend for it.
//!
//! [`self_test`] asserts the three canonical vectors and must be run at
//! startup whenever checksumming is enabled. A failure means the engine is
//! miscompiled or misconfigured and is fatal.

use crate::error::{Error, Result};
use crc32fast::Hasher;

/// Calculate the CRC-32 of a contiguous byte range
#[inline]
pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Calculate the CRC-32 of `head ∥ tail` without concatenating them
///
/// Used for the datagram checksum, which covers the header prefix and the
/// point payload but skips the CRC field sitting between them.
#[inline]
pub fn crc32_parts(head: &[u8], tail: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(head);
    hasher.update(tail);
    hasher.finalize()
}

/// Canonical IEEE 802.3 test vectors: (input, expected CRC)
const TEST_VECTORS: [(&[u8], u32); 3] = [
    (b"123456789", 0xCBF4_3926),
    (b"", 0x0000_0000),
    (
        b"The quick brown fox jumps over the lazy dog",
        0x414F_A339,
    ),
];

/// Verify the engine against the canonical vectors
///
/// Called at startup when checksumming is enabled; a mismatch is fatal.
pub fn self_test() -> Result<()> {
    for (input, expected) in TEST_VECTORS {
        let got = crc32(input);
        if got != expected {
            return Err(Error::SelfTest(format!(
                "vector {:?}: expected {:#010X}, got {:#010X}",
                String::from_utf8_lossy(input),
                expected,
                got
            )));
        }
    }
    Ok(())
}
