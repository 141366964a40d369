use snafu::{Snafu, ensure};
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned, byteorder::little_endian::U32,
};

/// Fixed dirent header size; the name follows, padded out to `entsize`.
pub const DIRENT_HEADER_SIZE: usize = 16;

/// Errors when parsing a directory entry.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ParseError {
    #[snafu(display("data too small for a dirent"))]
    TooSmall,

    /// A zero `entsize` means the rest of the block is unused.
    #[snafu(display("end of directory block"))]
    EndOfBlock,

    #[snafu(display("dirent claims {namelen} name bytes in a {entsize}-byte record"))]
    InvalidSize { namelen: u32, entsize: u32 },
}

/// Raw dirent header (16 bytes, little-endian).
///
/// Reference: <https://www.psdevwiki.com/ps4/PFS#Dirents>
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct DirentRaw {
    pub ino: U32,
    pub ty: U32,
    pub namelen: U32,
    pub entsize: U32,
}

/// One directory entry within a 64 KiB directory block.
///
/// An `ino` of zero terminates the block; callers check it after parsing.
#[must_use]
pub struct Dirent {
    ino: u32,
    ty: u32,
    entsize: usize,
    name: Vec<u8>,
}

impl std::fmt::Debug for Dirent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dirent")
            .field("ino", &self.ino)
            .field("ty", &self.ty)
            .field("name", &String::from_utf8_lossy(&self.name))
            .finish()
    }
}

impl Dirent {
    pub const FILE: u32 = 2;
    pub const DIRECTORY: u32 = 3;
    pub const SELF: u32 = 4;
    pub const PARENT: u32 = 5;

    /// Parses the dirent at the start of `src`.
    ///
    /// The caller advances by [`entsize()`](Self::entsize) to reach the
    /// next entry.
    pub fn parse(src: &[u8]) -> Result<Self, ParseError> {
        let (raw, rest) = DirentRaw::read_from_prefix(src).map_err(|_| TooSmallSnafu.build())?;

        let entsize = raw.entsize.get();
        ensure!(entsize != 0, EndOfBlockSnafu);

        let namelen = raw.namelen.get();
        ensure!(
            (entsize as usize) >= DIRENT_HEADER_SIZE + namelen as usize,
            InvalidSizeSnafu { namelen, entsize }
        );

        let name = rest
            .get(..namelen as usize)
            .ok_or_else(|| TooSmallSnafu.build())?
            .to_vec();

        Ok(Self {
            ino: raw.ino.get(),
            ty: raw.ty.get(),
            entsize: entsize as usize,
            name,
        })
    }

    #[must_use]
    pub fn ino(&self) -> u32 {
        self.ino
    }

    #[must_use]
    pub fn ty(&self) -> u32 {
        self.ty
    }

    /// Total record size; the offset step to the next dirent.
    #[must_use]
    pub fn entsize(&self) -> usize {
        self.entsize
    }

    /// The entry name as raw bytes.
    #[must_use]
    pub fn name(&self) -> &[u8] {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_dirent(ino: u32, ty: u32, name: &[u8], entsize: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&ino.to_le_bytes());
        out.extend_from_slice(&ty.to_le_bytes());
        out.extend_from_slice(&(name.len() as u32).to_le_bytes());
        out.extend_from_slice(&entsize.to_le_bytes());
        out.extend_from_slice(name);
        out.resize(entsize as usize, 0);
        out
    }

    #[test]
    fn parses_name_and_fields() {
        let data = raw_dirent(7, Dirent::FILE, b"eboot.bin", 0x20);
        let d = Dirent::parse(&data).unwrap();

        assert_eq!(d.ino(), 7);
        assert_eq!(d.ty(), Dirent::FILE);
        assert_eq!(d.name(), b"eboot.bin");
        assert_eq!(d.entsize(), 0x20);
    }

    #[test]
    fn zero_entsize_ends_the_block() {
        let data = raw_dirent(1, Dirent::FILE, b"x", 0x18);
        let mut data = data;
        data[12..16].copy_from_slice(&0u32.to_le_bytes());

        assert!(matches!(Dirent::parse(&data), Err(ParseError::EndOfBlock)));
    }

    #[test]
    fn zero_ino_is_returned_to_the_caller() {
        let data = raw_dirent(0, 0, b"", 0x18);
        let d = Dirent::parse(&data).unwrap();
        assert_eq!(d.ino(), 0);
    }

    #[test]
    fn name_cannot_exceed_record() {
        let mut data = raw_dirent(1, Dirent::FILE, b"abc", 0x18);
        data[8..12].copy_from_slice(&100u32.to_le_bytes());

        assert!(matches!(
            Dirent::parse(&data),
            Err(ParseError::InvalidSize { namelen: 100, .. })
        ));
    }
}
