//! The PFS (PlayStation File System) side of PS4 PKG extraction.
//!
//! A PKG carries its game content inside an AES-XTS-encrypted PFS image;
//! within it, a PFSC substream stores the actual filesystem as 64 KiB
//! blocks that are either raw or zlib-deflated. This crate provides:
//!
//! - [`crypto`]: the EKPFS-to-XTS key derivation and sector decryption,
//! - [`pfsc`]: locating and parsing the PFSC substream and its sector map,
//! - [`inode`] / [`dirent`]: the on-disk metadata records,
//! - [`vfs`]: the block walk that rebuilds the directory tree.
//!
//! The orchestration that ties these to a PKG file lives in `cnt-extract`.
//!
//! # References
//!
//! - <https://www.psdevwiki.com/ps4/PFS>

pub mod crypto;
pub mod dirent;
pub mod inode;
pub mod pfsc;
pub mod vfs;

pub use self::crypto::{XtsDecryptor, derive_xts_keys};
pub use self::pfsc::{Pfsc, find_pfsc_offset};
pub use self::vfs::{Vfs, walk};

/// Superblock offset of the 16-byte XTS key seed within the PFS image.
pub const KEY_SEED_OFFSET: u64 = 0x370;
