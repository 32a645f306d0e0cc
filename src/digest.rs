//! Content digests for post identifiers.
//!
//! Post ids are the hex-encoded SHA-1 of `"<timestamp>\n<text>\n<permalink>"`.
//! Two interchangeable providers compute it:
//!
//! - **[`LibrarySha1`]**: RustCrypto `sha1` (feature `library-digest`, on by default).
//! - **[`BuiltinSha1`]**: self-contained implementation, always available.
//!
//! Use [`create_provider`] to select one from configuration. `auto` prefers
//! the library provider and falls back to the builtin one when the crate was
//! built without it.

use std::sync::Arc;

use crate::config::DigestConfig;
use crate::error::DigestError;

/// Length of a digest in bytes.
pub const DIGEST_LEN: usize = 20;

/// A deterministic 20-byte digest function.
pub trait DigestProvider: Send + Sync {
    /// Provider identifier (e.g. `"library"`).
    fn name(&self) -> &str;

    fn digest(&self, data: &[u8]) -> [u8; DIGEST_LEN];

    /// Lowercase hex of [`digest`](DigestProvider::digest).
    fn hex_digest(&self, data: &[u8]) -> String {
        hex::encode(self.digest(data))
    }
}

/// Create the provider named by `config.provider`.
pub fn create_provider(config: &DigestConfig) -> Result<Arc<dyn DigestProvider>, DigestError> {
    match config.provider.as_str() {
        "auto" => Ok(default_provider()),
        #[cfg(feature = "library-digest")]
        "library" => Ok(Arc::new(LibrarySha1)),
        #[cfg(not(feature = "library-digest"))]
        "library" => Err(DigestError::Unavailable("library".to_string())),
        "builtin" => Ok(Arc::new(BuiltinSha1)),
        other => Err(DigestError::Unknown(other.to_string())),
    }
}

/// The best provider compiled into this build.
pub fn default_provider() -> Arc<dyn DigestProvider> {
    #[cfg(feature = "library-digest")]
    {
        Arc::new(LibrarySha1)
    }
    #[cfg(not(feature = "library-digest"))]
    {
        Arc::new(BuiltinSha1)
    }
}

// ============ Library Provider ============

/// SHA-1 from the RustCrypto `sha1` crate.
#[cfg(feature = "library-digest")]
#[derive(Debug, Default, Clone, Copy)]
pub struct LibrarySha1;

#[cfg(feature = "library-digest")]
impl DigestProvider for LibrarySha1 {
    fn name(&self) -> &str {
        "library"
    }

    fn digest(&self, data: &[u8]) -> [u8; DIGEST_LEN] {
        use sha1::{Digest, Sha1};
        let mut out = [0u8; DIGEST_LEN];
        out.copy_from_slice(&Sha1::digest(data));
        out
    }
}

// ============ Builtin Provider ============

/// Self-contained SHA-1 (FIPS 180-4).
///
/// The message is padded with `0x80`, zeros, and the 64-bit big-endian bit
/// length; each 64-byte block is read as sixteen big-endian words.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinSha1;

const H0: [u32; 5] = [0x6745_2301, 0xefcd_ab89, 0x98ba_dcfe, 0x1032_5476, 0xc3d2_e1f0];

impl DigestProvider for BuiltinSha1 {
    fn name(&self) -> &str {
        "builtin"
    }

    fn digest(&self, data: &[u8]) -> [u8; DIGEST_LEN] {
        let bit_len = (data.len() as u64).wrapping_mul(8);

        let mut message = Vec::with_capacity(data.len() + 72);
        message.extend_from_slice(data);
        message.push(0x80);
        while message.len() % 64 != 56 {
            message.push(0);
        }
        message.extend_from_slice(&bit_len.to_be_bytes());

        let mut state = H0;
        for block in message.chunks_exact(64) {
            compress(&mut state, block);
        }

        let mut out = [0u8; DIGEST_LEN];
        for (chunk, word) in out.chunks_exact_mut(4).zip(state.iter()) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        out
    }
}

fn compress(state: &mut [u32; 5], block: &[u8]) {
    let mut w = [0u32; 80];
    for (i, word) in block.chunks_exact(4).enumerate() {
        w[i] = u32::from_be_bytes([word[0], word[1], word[2], word[3]]);
    }
    for i in 16..80 {
        w[i] = (w[i - 3] ^ w[i - 8] ^ w[i - 14] ^ w[i - 16]).rotate_left(1);
    }

    let [mut a, mut b, mut c, mut d, mut e] = *state;
    for (i, &wi) in w.iter().enumerate() {
        let (f, k) = match i {
            0..=19 => ((b & c) | (!b & d), 0x5a82_7999),
            20..=39 => (b ^ c ^ d, 0x6ed9_eba1),
            40..=59 => ((b & c) | (b & d) | (c & d), 0x8f1b_bcdc),
            _ => (b ^ c ^ d, 0xca62_c1d6),
        };
        let temp = a
            .rotate_left(5)
            .wrapping_add(f)
            .wrapping_add(e)
            .wrapping_add(k)
            .wrapping_add(wi);
        e = d;
        d = c;
        c = b.rotate_left(30);
        b = a;
        a = temp;
    }

    state[0] = state[0].wrapping_add(a);
    state[1] = state[1].wrapping_add(b);
    state[2] = state[2].wrapping_add(c);
    state[3] = state[3].wrapping_add(d);
    state[4] = state[4].wrapping_add(e);
}
