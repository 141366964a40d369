use crate::crypto::{self, KeySelector};
use snafu::{OptionExt, Snafu};

/// Errors from the key-derivation chain.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum KeyError {
    #[snafu(display("the entry-keys entry (0x10) was not seen before a dependent entry"))]
    MissingDk3,

    #[snafu(display("no EKPFS available; the PKG has no image-key entry (0x20)"))]
    MissingEkpfs,

    #[snafu(transparent)]
    Crypto { source: crypto::CryptoError },
}

type Result<T, E = KeyError> = std::result::Result<T, E>;

/// Keys derived while the entry table is traversed.
///
/// The chain runs in a fixed order: the entry-keys entry yields DK3, then
/// the image-key entry yields the per-entry IV, the image key and finally
/// EKPFS. A duplicate occurrence of either entry silently overwrites the
/// earlier derivation.
///
/// The session is populated during [`Pkg::read`](crate::Pkg::read) and
/// immutable afterwards; every accessor takes `&self`.
#[derive(Default)]
pub struct KeySession {
    dk3: Option<[u8; 32]>,
    iv_key: Option<[u8; 32]>,
    image_key: Option<[u8; 256]>,
    ekpfs: Option<[u8; 32]>,
}

impl std::fmt::Debug for KeySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material stays out of debug output.
        f.debug_struct("KeySession")
            .field("dk3", &self.dk3.is_some())
            .field("ekpfs", &self.ekpfs.is_some())
            .finish()
    }
}

impl KeySession {
    /// Step 1: decrypts DK3 from key slot 3 of the entry-keys entry.
    pub(crate) fn derive_dk3(&mut self, key3: &[u8; 256]) -> Result<()> {
        self.dk3 = Some(crypto::rsa_decrypt(KeySelector::Dk3, key3)?);
        Ok(())
    }

    /// Step 2: derives the IV from the image-key entry record, decrypts the
    /// image key under it and unwraps EKPFS.
    pub(crate) fn derive_ekpfs(
        &mut self,
        entry_bytes: &[u8; 32],
        img_key_data: &[u8; 256],
    ) -> Result<()> {
        let dk3 = self.dk3.as_ref().context(MissingDk3Snafu)?;

        let iv_key = crypto::derive_entry_iv(entry_bytes, dk3);
        let image_key = crypto::decrypt_image_key(&iv_key, img_key_data);
        let ekpfs = crypto::rsa_decrypt(KeySelector::Pkg, &image_key)?;

        self.iv_key = Some(iv_key);
        self.image_key = Some(image_key);
        self.ekpfs = Some(ekpfs);

        Ok(())
    }

    /// Step 3: decrypts an NP license payload under its per-entry IV.
    pub fn decrypt_entry(&self, entry_bytes: &[u8; 32], data: &[u8]) -> Result<Vec<u8>> {
        let dk3 = self.dk3.as_ref().context(MissingDk3Snafu)?;
        let iv_key = crypto::derive_entry_iv(entry_bytes, dk3);

        Ok(crypto::decrypt_entry_payload(&iv_key, data)?)
    }

    #[must_use]
    pub fn dk3(&self) -> Option<&[u8; 32]> {
        self.dk3.as_ref()
    }

    /// IV derived for the image-key entry.
    #[must_use]
    pub fn iv_key(&self) -> Option<&[u8; 32]> {
        self.iv_key.as_ref()
    }

    /// Decrypted (but still RSA-wrapped) image key.
    #[must_use]
    pub fn image_key(&self) -> Option<&[u8; 256]> {
        self.image_key.as_ref()
    }

    /// The PFS master key, or [`KeyError::MissingEkpfs`] if the chain never
    /// reached step 2.
    pub fn ekpfs(&self) -> Result<&[u8; 32]> {
        self.ekpfs.as_ref().context(MissingEkpfsSnafu)
    }
}
