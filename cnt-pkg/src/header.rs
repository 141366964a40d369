use std::fmt;

use snafu::ensure;
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    byteorder::big_endian::{U16, U32, U64},
};

/// Errors when reading a PKG header.
#[derive(Debug, snafu::Snafu)]
#[non_exhaustive]
pub enum ReadError {
    #[snafu(display("PKG file is too small to hold a header"))]
    TooSmall,

    #[snafu(display("invalid PKG magic"))]
    InvalidMagic,
}

type Result<T, E = ReadError> = std::result::Result<T, E>;

/// `"\x7FCNT"` read as a big-endian u32.
pub const PKG_MAGIC: u32 = 0x7F434E54;

/// The full on-disk header size.
pub const HEADER_SIZE: usize = 0x1000;

/// Raw on-disk PKG header. All integers are big-endian.
///
/// Reference: <https://www.psdevwiki.com/ps4/PKG_files>
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct PkgHeaderRaw {
    pub magic: U32,              // 0x000
    pub pkg_type: U32,           // 0x004
    pub unk_0x008: U32,          // 0x008
    pub file_count: U32,         // 0x00C
    pub entry_count: U32,        // 0x010
    pub sc_entry_count: U16,     // 0x014
    pub entry_count_2: U16,      // 0x016
    pub table_offset: U32,       // 0x018
    pub entry_data_size: U32,    // 0x01C
    pub body_offset: U64,        // 0x020
    pub body_size: U64,          // 0x028
    pub content_offset: U64,     // 0x030
    pub content_size: U64,       // 0x038
    pub content_id: ContentId,   // 0x040 (36 bytes)
    pub padding_0x064: [u8; 12], // 0x064
    pub drm_type: U32,           // 0x070
    pub content_type: U32,       // 0x074
    pub content_flags: U32,      // 0x078
    pub promote_size: U32,       // 0x07C
    pub version_date: U32,       // 0x080
    pub version_hash: U32,       // 0x084
    pub unk_0x088: [u8; 16],     // 0x088
    pub iro_tag: U32,            // 0x098
    pub drm_type_version: U32,   // 0x09C

    pub padding_0x0a0: [u8; 0x60], // 0x0A0

    // Digest table (0x100 - 0x180).
    pub digest_entries1: [u8; 0x20],
    pub digest_entries2: [u8; 0x20],
    pub digest_table_digest: [u8; 0x20],
    pub digest_body_digest: [u8; 0x20],

    pub padding_0x180: [u8; 0x284], // 0x180

    // PFS image info (0x404 - 0x490).
    pub pfs_image_count: U32,          // 0x404
    pub pfs_image_flags: U64,          // 0x408
    pub pfs_image_offset: U64,         // 0x410
    pub pfs_image_size: U64,           // 0x418
    pub mount_image_offset: U64,       // 0x420
    pub mount_image_size: U64,         // 0x428
    pub pkg_size: U64,                 // 0x430
    pub pfs_signed_size: U32,          // 0x438
    pub pfs_cache_size: U32,           // 0x43C
    pub pfs_image_digest: [u8; 0x20],  // 0x440
    pub pfs_signed_digest: [u8; 0x20], // 0x460
    pub pfs_split_size_nth_0: U64,     // 0x480
    pub pfs_split_size_nth_1: U64,     // 0x488

    pub padding_0x490: [u8; 0xB50], // 0x490

    pub pkg_digest: [u8; 0x20], // 0xFE0
}

impl std::fmt::Debug for PkgHeaderRaw {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkgHeaderRaw")
            .field("content_id", &self.content_id)
            .field("entry_count", &self.entry_count.get())
            .field("pkg_size", &self.pkg_size.get())
            .finish_non_exhaustive()
    }
}

/// Content ID (36 bytes): `<service><publisher>-<title-id>_<version>-<label>`,
/// e.g. `UP0102-CUSA03173_00-PSYCHONAUTS1PS40`. The 9-character title id
/// begins at byte 7 (offset 0x47 within the PKG).
#[derive(
    Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned,
)]
#[repr(C)]
pub struct ContentId {
    service_id: [u8; 2],
    publisher_code: [u8; 4],
    _sep1: u8,
    title_id: [u8; 9],
    _sep2: u8,
    version: [u8; 2],
    _sep3: u8,
    label: [u8; 16],
}

impl ContentId {
    fn str_field(bytes: &[u8]) -> &str {
        let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        std::str::from_utf8(&bytes[..len]).unwrap_or("")
    }

    #[must_use]
    pub fn service_id(&self) -> &str {
        Self::str_field(&self.service_id)
    }

    #[must_use]
    pub fn publisher_code(&self) -> &str {
        Self::str_field(&self.publisher_code)
    }

    /// The 9-character title id, e.g. `CUSA03173`.
    #[must_use]
    pub fn title_id(&self) -> &str {
        Self::str_field(&self.title_id)
    }

    #[must_use]
    pub fn version(&self) -> &str {
        Self::str_field(&self.version)
    }

    #[must_use]
    pub fn label(&self) -> &str {
        Self::str_field(&self.label)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        Self::str_field(self.as_bytes())
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", self.as_str())
    }
}

bitflags::bitflags! {
    /// Content flags at header offset 0x78. Purely informational.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ContentFlags: u32 {
        const FIRST_PATCH = 0x0010_0000;
        const PATCHGO = 0x0020_0000;
        const REMASTER = 0x0040_0000;
        const PS_CLOUD = 0x0080_0000;
        const GD_AC = 0x0200_0000;
        const NON_GAME = 0x0400_0000;
        const SUBSEQUENT_PATCH = 0x4000_0000;
        const DELTA_PATCH = 0x4100_0000;
        const CUMULATIVE_PATCH = 0x6000_0000;

        const _ = !0;
    }
}

const FLAG_NAMES: &[(ContentFlags, &str)] = &[
    (ContentFlags::FIRST_PATCH, "FIRST_PATCH"),
    (ContentFlags::PATCHGO, "PATCHGO"),
    (ContentFlags::REMASTER, "REMASTER"),
    (ContentFlags::PS_CLOUD, "PS_CLOUD"),
    (ContentFlags::GD_AC, "GD_AC"),
    (ContentFlags::NON_GAME, "NON_GAME"),
    (ContentFlags::SUBSEQUENT_PATCH, "SUBSEQUENT_PATCH"),
    (ContentFlags::DELTA_PATCH, "DELTA_PATCH"),
    (ContentFlags::CUMULATIVE_PATCH, "CUMULATIVE_PATCH"),
];

impl fmt::Display for ContentFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;

        for (flag, name) in FLAG_NAMES {
            if self.contains(*flag) {
                if !first {
                    f.write_str(", ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }

        if first {
            f.write_str("(none)")?;
        }

        Ok(())
    }
}

/// Returns a human-readable name for a content type value.
#[must_use]
pub const fn content_type_name(content_type: u32) -> &'static str {
    match content_type {
        0x01 | 0x1A => "GD (Game Data)",
        0x02 | 0x1B => "AC (Additional Content)",
        0x03 => "AL (App License)",
        0x04 => "DP (Delta Patch)",
        0x05 => "DP (Cumulative Patch)",
        0x06 => "Remaster",
        _ => "Unknown",
    }
}

/// Returns a human-readable name for a DRM type value.
#[must_use]
pub const fn drm_type_name(drm_type: u32) -> &'static str {
    match drm_type {
        0x0 => "None",
        0x1 | 0xF => "PS4",
        0xD => "PS4 (Free)",
        _ => "Unknown",
    }
}

/// Parsed PKG header.
#[derive(Debug)]
#[must_use]
pub struct PkgHeader {
    raw: PkgHeaderRaw,
}

impl PkgHeader {
    /// Parses the header from the first [`HEADER_SIZE`] bytes of a PKG.
    pub fn read(data: &[u8]) -> Result<Self> {
        ensure!(data.len() >= HEADER_SIZE, TooSmallSnafu);

        let (raw, _) = PkgHeaderRaw::read_from_prefix(data).map_err(|_| TooSmallSnafu.build())?;

        ensure!(raw.magic.get() == PKG_MAGIC, InvalidMagicSnafu);

        Ok(Self { raw })
    }

    #[must_use]
    pub const fn entry_count(&self) -> usize {
        self.raw.entry_count.get() as _
    }

    #[must_use]
    pub const fn table_offset(&self) -> u64 {
        self.raw.table_offset.get() as _
    }

    #[must_use]
    pub const fn content_offset(&self) -> u64 {
        self.raw.content_offset.get()
    }

    #[must_use]
    pub const fn content_size(&self) -> u64 {
        self.raw.content_size.get()
    }

    #[must_use]
    pub const fn pkg_size(&self) -> u64 {
        self.raw.pkg_size.get()
    }

    #[must_use]
    pub const fn file_count(&self) -> u32 {
        self.raw.file_count.get()
    }

    #[must_use]
    pub const fn pkg_type(&self) -> u32 {
        self.raw.pkg_type.get()
    }

    #[must_use]
    pub fn content_id(&self) -> &ContentId {
        &self.raw.content_id
    }

    #[must_use]
    pub const fn content_type(&self) -> u32 {
        self.raw.content_type.get()
    }

    #[must_use]
    pub const fn drm_type(&self) -> u32 {
        self.raw.drm_type.get()
    }

    #[must_use]
    pub const fn content_flags(&self) -> ContentFlags {
        ContentFlags::from_bits_retain(self.raw.content_flags.get())
    }

    /// Offset of the PFS image within the PKG.
    #[must_use]
    pub const fn pfs_offset(&self) -> u64 {
        self.raw.pfs_image_offset.get()
    }

    /// Size of the PFS image in bytes.
    #[must_use]
    pub const fn pfs_size(&self) -> u64 {
        self.raw.pfs_image_size.get()
    }

    /// PFS cache size; the decrypted locate window is twice this value.
    #[must_use]
    pub const fn pfs_cache_size(&self) -> u32 {
        self.raw.pfs_cache_size.get()
    }

    #[must_use]
    pub const fn raw(&self) -> &PkgHeaderRaw {
        &self.raw
    }
}
