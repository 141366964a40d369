//! The crypto kernel for the PKG key-derivation chain.
//!
//! All operations are pure: keys and inputs are passed in, results are
//! returned. Concurrent calls with distinct buffers are safe.

use crate::keys;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, KeyIvInit};
use sha2::{Digest, Sha256};
use snafu::{ResultExt, Snafu, ensure};

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// Selects which embedded RSA-2048 keyset an operation uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySelector {
    /// The entry-keys keyset (entry 0x10, key slot 3).
    Dk3,
    /// The PFS image-key keyset (entry 0x20).
    Pkg,
}

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum CryptoError {
    #[snafu(display("RSA decrypt failed"))]
    RsaFailed { source: rsa::errors::Error },

    #[snafu(display("RSA plaintext is {len} bytes, expected {expected}"))]
    UnexpectedWidth { len: usize, expected: usize },

    #[snafu(display("ciphertext length {len} is not a multiple of the AES block size"))]
    MisalignedData { len: usize },
}

type Result<T, E = CryptoError> = std::result::Result<T, E>;

/// RSA-2048 decrypts a 256-byte blob with PKCS#1 v1.5 padding removal.
///
/// Both embedded keysets produce a 32-byte plaintext.
pub fn rsa_decrypt(selector: KeySelector, cipher: &[u8; 256]) -> Result<[u8; 32]> {
    let key = match selector {
        KeySelector::Dk3 => &*keys::DK3_KEY,
        KeySelector::Pkg => &*keys::PKG_KEY,
    };

    let plain = key
        .decrypt(rsa::Pkcs1v15Encrypt, cipher)
        .context(RsaFailedSnafu)?;

    plain
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::UnexpectedWidth {
            len: plain.len(),
            expected: 32,
        })
}

/// Derives the 32-byte per-entry IV: SHA-256 over the 32-byte on-disk entry
/// record followed by DK3.
#[must_use]
pub fn derive_entry_iv(entry_bytes: &[u8; 32], dk3: &[u8; 32]) -> [u8; 32] {
    let mut sha256 = Sha256::new();
    sha256.update(entry_bytes);
    sha256.update(dk3);
    sha256.finalize().into()
}

/// Decrypts the 256-byte image-key payload of entry 0x20.
///
/// The 32-byte derived value splits into the IV (first half) and the
/// AES-128 key (second half); the payload is plain CBC without padding.
#[must_use]
pub fn decrypt_image_key(iv_key: &[u8; 32], cipher: &[u8; 256]) -> [u8; 256] {
    let mut out = [0u8; 256];
    cbc_decrypt(iv_key, cipher, &mut out);
    out
}

/// Decrypts an arbitrary-length encrypted entry payload (the NP license
/// entries) under a per-entry IV. The length must be block-aligned.
pub fn decrypt_entry_payload(iv_key: &[u8; 32], cipher: &[u8]) -> Result<Vec<u8>> {
    ensure!(
        cipher.len() % 16 == 0,
        MisalignedDataSnafu { len: cipher.len() }
    );

    let mut out = vec![0u8; cipher.len()];
    cbc_decrypt(iv_key, cipher, &mut out);
    Ok(out)
}

fn cbc_decrypt(iv_key: &[u8; 32], cipher: &[u8], out: &mut [u8]) {
    debug_assert_eq!(cipher.len() % 16, 0);
    debug_assert_eq!(cipher.len(), out.len());

    let (iv, key) = iv_key.split_at(16);
    let mut dec = Aes128CbcDec::new(GenericArray::from_slice(key), GenericArray::from_slice(iv));

    for (src, dst) in cipher.chunks_exact(16).zip(out.chunks_exact_mut(16)) {
        dst.copy_from_slice(src);
        dec.decrypt_block_mut(GenericArray::from_mut_slice(dst));
    }
}
