use snafu::Snafu;
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    byteorder::little_endian::{U16, U32, U64},
};

/// On-disk inode record size.
pub const INODE_SIZE: usize = 0xA8;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ParseError {
    #[snafu(display("data too small for an inode record"))]
    TooSmall,
}

/// Raw on-disk inode record (0xA8 bytes, little-endian).
///
/// The stat area occupies the first 0x60 bytes; `blocks` and the first
/// direct block slot (`loc`) follow at 0x60 and 0x64.
///
/// Reference: <https://www.psdevwiki.com/ps4/PFS#Inodes>
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct InodeRaw {
    pub mode: U16,            // 0x00 - 0 terminates the inode list
    pub nlink: U16,           // 0x02
    pub flags: U32,           // 0x04
    pub size: U64,            // 0x08 - logical file size
    pub size_compressed: U64, // 0x10
    pub atime: U64,           // 0x18
    pub mtime: U64,           // 0x20
    pub ctime: U64,           // 0x28
    pub birthtime: U64,       // 0x30
    pub mtimensec: U32,       // 0x38
    pub atimensec: U32,       // 0x3C
    pub ctimensec: U32,       // 0x40
    pub birthnsec: U32,       // 0x44
    pub uid: U32,             // 0x48
    pub gid: U32,             // 0x4C
    pub spare: [u8; 16],      // 0x50
    pub blocks: U32,          // 0x60 - number of PFSC blocks spanned
    pub loc: U32,             // 0x64 - sector-map index of the first block
    pub rest: [u8; 0x40],     // 0x68 - remaining block slots, unused here
}

/// One parsed inode.
#[derive(Clone, Copy)]
#[must_use]
pub struct Inode {
    raw: InodeRaw,
}

impl std::fmt::Debug for Inode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inode")
            .field("mode", &self.mode())
            .field("size", &self.size())
            .field("blocks", &self.blocks())
            .field("loc", &self.loc())
            .finish()
    }
}

impl Inode {
    /// Parses an inode from the front of `src`, advancing it past the
    /// record.
    pub fn read(src: &mut &[u8]) -> Result<Self, ParseError> {
        let (raw, rest) = InodeRaw::read_from_prefix(*src).map_err(|_| TooSmallSnafu.build())?;
        *src = rest;

        Ok(Self { raw })
    }

    /// A zero mode marks the end of the inode list.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        self.raw.mode.get() == 0
    }

    #[must_use]
    pub fn mode(&self) -> u16 {
        self.raw.mode.get()
    }

    /// Logical file size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.raw.size.get()
    }

    /// Number of PFSC blocks the data spans.
    #[must_use]
    pub fn blocks(&self) -> u32 {
        self.raw.blocks.get()
    }

    /// Sector-map index of the first data block.
    #[must_use]
    pub fn loc(&self) -> u32 {
        self.raw.loc.get()
    }

    #[must_use]
    pub const fn raw(&self) -> &InodeRaw {
        &self.raw
    }
}
