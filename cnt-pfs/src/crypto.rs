//! PFS key derivation and XTS sector decryption.

use aes::Aes128;
use aes::cipher::KeyInit;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use xts_mode::{Xts128, get_tweak_default};

/// XTS operates on 0x1000-byte sectors.
pub const XTS_SECTOR_SIZE: usize = 0x1000;

/// Derives the XTS `(data_key, tweak_key)` pair from EKPFS and the 16-byte
/// seed stored in the PFS superblock.
///
/// HMAC-SHA256 keyed with EKPFS over an index prefix and the seed; the
/// first half of the digest is the tweak key, the second half the data key.
#[must_use]
pub fn derive_xts_keys(ekpfs: &[u8], seed: &[u8; 16]) -> ([u8; 16], [u8; 16]) {
    let mut hmac = <Hmac<Sha256> as Mac>::new_from_slice(ekpfs).unwrap();
    hmac.update(&[0x01, 0x00, 0x00, 0x00]);
    hmac.update(seed);

    let secret = hmac.finalize().into_bytes();
    let mut tweak_key = [0u8; 16];
    let mut data_key = [0u8; 16];

    tweak_key.copy_from_slice(&secret[..16]);
    data_key.copy_from_slice(&secret[16..]);

    (data_key, tweak_key)
}

/// AES-XTS-128 sector decryptor for PFS images.
///
/// Stateless after construction; decrypting distinct buffers from multiple
/// threads is safe.
pub struct XtsDecryptor {
    cipher: Xts128<Aes128>,
}

impl XtsDecryptor {
    #[must_use]
    pub fn new(data_key: &[u8; 16], tweak_key: &[u8; 16]) -> Self {
        let cipher_1 = Aes128::new(data_key.into());
        let cipher_2 = Aes128::new(tweak_key.into());

        Self {
            cipher: Xts128::new(cipher_1, cipher_2),
        }
    }

    /// Decrypts whole sectors of `buf` in place.
    ///
    /// `first_sector` is the sector index of `buf[0]` within the PFS image.
    /// A trailing partial sector is left untouched; short reads at end of
    /// file only ever truncate past the data of interest.
    pub fn decrypt(&self, buf: &mut [u8], first_sector: u64) {
        for (i, sector) in buf.chunks_exact_mut(XTS_SECTOR_SIZE).enumerate() {
            let tweak = get_tweak_default((first_sector + i as u64) as u128);
            self.cipher.decrypt_sector(sector, tweak);
        }
    }
}

impl std::fmt::Debug for XtsDecryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("XtsDecryptor")
    }
}
