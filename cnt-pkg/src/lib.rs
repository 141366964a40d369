//! Parsing and key derivation for PlayStation 4 PKG (CNT) containers.
//!
//! A PKG file is a big-endian, fixed-layout container carrying a table of
//! metadata entries plus an encrypted PFS filesystem image. This crate
//! parses the container and runs the key-derivation chain; the PFS side
//! lives in `cnt-pfs`.
//!
//! # Example
//!
//! ```no_run
//! use cnt_pkg::{Pkg, reader::PkgReader};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut reader = PkgReader::open("game.pkg")?;
//! let pkg = Pkg::read(&mut reader)?;
//!
//! println!("Content ID: {}", pkg.header().content_id());
//! println!("Entries:    {}", pkg.entries().len());
//!
//! // Keys derived while walking the entry table:
//! let _ekpfs = pkg.session().ekpfs()?;
//! # Ok(())
//! # }
//! ```
//!
//! # References
//!
//! - <https://www.psdevwiki.com/ps4/PKG_files>

use snafu::{ResultExt, Snafu, ensure};

use self::entry::{EntryId, PkgEntry};
use self::header::PkgHeader;
use self::reader::PkgReader;
use self::session::KeySession;

pub mod crypto;
pub mod entry;
pub mod header;
pub mod keys;
pub mod reader;
pub mod session;

/// Errors when parsing a PKG.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum OpenError {
    #[snafu(display("cannot read PKG header"))]
    ReadHeaderFailed { source: reader::ReadError },

    #[snafu(display("invalid PKG header"))]
    ParseHeaderFailed { source: header::ReadError },

    #[snafu(display("declared PKG size 0x{declared:X} does not fit the file (0x{actual:X})"))]
    SizeMismatch { declared: u64, actual: u64 },

    #[snafu(display(
        "content region [0x{offset:X}, +0x{size:X}) exceeds the declared PKG size 0x{pkg_size:X}"
    ))]
    ContentOverflow { offset: u64, size: u64, pkg_size: u64 },

    #[snafu(display("cannot read the entry table"))]
    ReadTableFailed { source: reader::ReadError },

    #[snafu(display("cannot parse entry #{num}"))]
    ParseEntryFailed { num: usize, source: entry::EntryError },

    #[snafu(display("entry #{num} [0x{offset:X}, +0x{size:X}) lies outside the PKG"))]
    EntryOutOfBounds { num: usize, offset: u64, size: u64 },

    #[snafu(display("cannot read payload of entry #{num}"))]
    ReadEntryPayloadFailed { num: usize, source: reader::ReadError },

    #[snafu(display("cannot derive keys from entry #{num}"))]
    DeriveKeysFailed { num: usize, source: session::KeyError },
}

type Result<T, E = OpenError> = std::result::Result<T, E>;

/// A parsed PKG: header, entry table and the keys derived along the way.
///
/// Produced by [`Pkg::read`]; immutable afterwards. Extraction consumes a
/// `&Pkg` and re-opens its own readers for payload I/O.
#[must_use]
pub struct Pkg {
    header: PkgHeader,
    entries: Vec<PkgEntry>,
    session: KeySession,
    param_sfo: Option<Vec<u8>>,
}

impl std::fmt::Debug for Pkg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pkg")
            .field("header", &self.header)
            .field("entry_count", &self.entries.len())
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl Pkg {
    /// Parses the PKG at the reader's start and runs the key-derivation
    /// chain over the entry table.
    ///
    /// The entry table is traversed exactly once, in order. Entries that
    /// feed the key chain (`0x10`, `0x20`) are side-read; after each
    /// side-read the cursor is restored to the table position.
    pub fn read(reader: &mut PkgReader) -> Result<Self> {
        reader.seek(0).context(ReadHeaderFailedSnafu)?;

        let mut header_buf = vec![0u8; header::HEADER_SIZE];
        reader
            .read_exact(&mut header_buf)
            .context(ReadHeaderFailedSnafu)?;

        let header = PkgHeader::read(&header_buf).context(ParseHeaderFailedSnafu)?;

        // A PKG smaller than its own header is as invalid as one larger
        // than the file.
        let file_size = reader.size();
        let pkg_size = header.pkg_size();
        ensure!(
            pkg_size >= header::HEADER_SIZE as u64 && pkg_size <= file_size,
            SizeMismatchSnafu {
                declared: pkg_size,
                actual: file_size
            }
        );

        let content_end = header
            .content_offset()
            .checked_add(header.content_size())
            .filter(|&end| end <= pkg_size);
        ensure!(
            content_end.is_some(),
            ContentOverflowSnafu {
                offset: header.content_offset(),
                size: header.content_size(),
                pkg_size
            }
        );

        let mut pkg = Self {
            header,
            entries: Vec::new(),
            session: KeySession::default(),
            param_sfo: None,
        };
        pkg.read_entry_table(reader)?;

        Ok(pkg)
    }

    fn read_entry_table(&mut self, reader: &mut PkgReader) -> Result<()> {
        let count = self.header.entry_count();
        let pkg_size = self.header.pkg_size();

        reader
            .seek(self.header.table_offset())
            .context(ReadTableFailedSnafu)?;
        self.entries.reserve(count);

        for num in 0..count {
            let raw: [u8; PkgEntry::RAW_SIZE] =
                reader.read_array().context(ReadTableFailedSnafu)?;
            let entry = PkgEntry::read(&raw).context(ParseEntryFailedSnafu { num })?;

            let end = entry.data_offset().checked_add(entry.data_size());
            ensure!(
                end.is_some_and(|end| end <= pkg_size),
                EntryOutOfBoundsSnafu {
                    num,
                    offset: entry.data_offset(),
                    size: entry.data_size()
                }
            );

            // Side-reads restore the cursor to the table position.
            let table_pos = reader.position();

            match entry.entry_id() {
                EntryId::EntryKeys => self.derive_from_entry_keys(reader, num, &entry)?,
                EntryId::PfsImageKey => self.derive_from_image_key(reader, num, &entry)?,
                EntryId::ParamSfo => {
                    self.param_sfo = Some(read_payload(reader, num, &entry)?);
                }
                _ => {}
            }

            reader.seek(table_pos).context(ReadTableFailedSnafu)?;
            self.entries.push(entry);
        }

        Ok(())
    }

    /// Entry 0x10: a seed digest, seven digests and seven 256-byte RSA
    /// blobs. Key slot 3 decrypts to DK3.
    fn derive_from_entry_keys(
        &mut self,
        reader: &mut PkgReader,
        num: usize,
        entry: &PkgEntry,
    ) -> Result<()> {
        reader
            .seek(entry.data_offset())
            .context(ReadEntryPayloadFailedSnafu { num })?;

        let _seed_digest: [u8; 32] = reader
            .read_array()
            .context(ReadEntryPayloadFailedSnafu { num })?;

        for _ in 0..7 {
            let _digest: [u8; 32] = reader
                .read_array()
                .context(ReadEntryPayloadFailedSnafu { num })?;
        }

        let mut key3 = [0u8; 256];
        reader
            .skip(3 * 256)
            .and_then(|()| reader.read_exact(&mut key3))
            .context(ReadEntryPayloadFailedSnafu { num })?;

        self.session
            .derive_dk3(&key3)
            .context(DeriveKeysFailedSnafu { num })
    }

    /// Entry 0x20: the 256-byte wrapped image key, unwrapped to EKPFS.
    fn derive_from_image_key(
        &mut self,
        reader: &mut PkgReader,
        num: usize,
        entry: &PkgEntry,
    ) -> Result<()> {
        reader
            .seek(entry.data_offset())
            .context(ReadEntryPayloadFailedSnafu { num })?;

        let img_key_data: [u8; 256] = reader
            .read_array()
            .context(ReadEntryPayloadFailedSnafu { num })?;

        self.session
            .derive_ekpfs(entry.record_bytes(), &img_key_data)
            .context(DeriveKeysFailedSnafu { num })
    }

    #[must_use]
    pub fn header(&self) -> &PkgHeader {
        &self.header
    }

    /// The entry table in on-disk order.
    #[must_use]
    pub fn entries(&self) -> &[PkgEntry] {
        &self.entries
    }

    #[must_use]
    pub fn session(&self) -> &KeySession {
        &self.session
    }

    /// Raw `param.sfo` payload, if the PKG has one.
    #[must_use]
    pub fn param_sfo(&self) -> Option<&[u8]> {
        self.param_sfo.as_deref()
    }

    /// Finds the first entry with the given ID.
    #[must_use]
    pub fn find_entry(&self, id: EntryId) -> Option<&PkgEntry> {
        self.entries.iter().find(|e| e.entry_id() == id)
    }
}

fn read_payload(reader: &mut PkgReader, num: usize, entry: &PkgEntry) -> Result<Vec<u8>> {
    reader
        .seek(entry.data_offset())
        .context(ReadEntryPayloadFailedSnafu { num })?;

    let mut data = vec![0u8; entry.data_size() as usize];
    reader
        .read_exact(&mut data)
        .context(ReadEntryPayloadFailedSnafu { num })?;

    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zerocopy::{FromZeros, IntoBytes};

    fn write_fixture(dir: &tempfile::TempDir, data: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join("test.pkg");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(data)
            .unwrap();
        path
    }

    fn base_header(pkg_size: u64, entry_count: u32) -> Vec<u8> {
        let mut raw = header::PkgHeaderRaw::new_zeroed();
        raw.magic = header::PKG_MAGIC.into();
        raw.pkg_size = pkg_size.into();
        raw.entry_count = entry_count.into();
        raw.table_offset = 0x1000u32.into();
        raw.as_bytes().to_vec()
    }

    fn push_entry(table: &mut Vec<u8>, id: u32, offset: u32, size: u32) {
        table.extend_from_slice(&id.to_be_bytes());
        table.extend_from_slice(&[0u8; 8]); // filename offset, flags1
        table.extend_from_slice(&[0u8; 4]); // flags2
        table.extend_from_slice(&offset.to_be_bytes());
        table.extend_from_slice(&size.to_be_bytes());
        table.extend_from_slice(&[0u8; 8]); // reserved
    }

    #[test]
    fn bad_magic_fails_before_anything_else() {
        let dir = tempfile::tempdir().unwrap();
        let mut data = base_header(0x2000, 0);
        data[..4].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        data.resize(0x2000, 0);

        let path = write_fixture(&dir, &data);
        let mut reader = PkgReader::open(path).unwrap();

        assert!(matches!(
            Pkg::read(&mut reader),
            Err(OpenError::ParseHeaderFailed {
                source: header::ReadError::InvalidMagic
            })
        ));
    }

    #[test]
    fn zero_declared_size_is_a_size_mismatch() {
        // Magic followed by zeros: the declared size cannot cover the header.
        let dir = tempfile::tempdir().unwrap();
        let data = base_header(0, 0);
        let path = write_fixture(&dir, &data);
        let mut reader = PkgReader::open(path).unwrap();

        assert!(matches!(
            Pkg::read(&mut reader),
            Err(OpenError::SizeMismatch { declared: 0, .. })
        ));
    }

    #[test]
    fn declared_size_larger_than_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let data = base_header(0x10000, 0);
        let path = write_fixture(&dir, &data);
        let mut reader = PkgReader::open(path).unwrap();

        assert!(matches!(
            Pkg::read(&mut reader),
            Err(OpenError::SizeMismatch {
                declared: 0x10000,
                actual: 0x1000
            })
        ));
    }

    #[test]
    fn content_region_must_fit_declared_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut raw = header::PkgHeaderRaw::new_zeroed();
        raw.magic = header::PKG_MAGIC.into();
        raw.pkg_size = 0x2000u64.into();
        raw.content_offset = 0x1000u64.into();
        raw.content_size = 0x1001u64.into();

        let mut data = raw.as_bytes().to_vec();
        data.resize(0x2000, 0);
        let path = write_fixture(&dir, &data);
        let mut reader = PkgReader::open(path).unwrap();

        assert!(matches!(
            Pkg::read(&mut reader),
            Err(OpenError::ContentOverflow { .. })
        ));
    }

    #[test]
    fn entry_ranges_are_bounds_checked() {
        let dir = tempfile::tempdir().unwrap();
        let mut data = base_header(0x2000, 1);
        data.resize(0x1000, 0);
        push_entry(&mut data, 0x9999, 0x1FF0, 0x20); // runs past pkg_size
        data.resize(0x2000, 0);

        let path = write_fixture(&dir, &data);
        let mut reader = PkgReader::open(path).unwrap();

        assert!(matches!(
            Pkg::read(&mut reader),
            Err(OpenError::EntryOutOfBounds { num: 0, .. })
        ));
    }

    #[test]
    fn entry_table_is_parsed_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut data = base_header(0x2000, 3);
        data.resize(0x1000, 0);
        push_entry(&mut data, 0x1000, 0x1800, 12);
        push_entry(&mut data, 0x1200, 0x1900, 4);
        push_entry(&mut data, 0x9999, 0x1A00, 2);
        data.resize(0x2000, 0);
        data[0x1800..0x180C].copy_from_slice(b"SFOTESTDATA\n");

        let path = write_fixture(&dir, &data);
        let mut reader = PkgReader::open(path).unwrap();
        let pkg = Pkg::read(&mut reader).unwrap();

        let ids: Vec<u32> = pkg.entries().iter().map(|e| e.id()).collect();
        assert_eq!(ids, [0x1000, 0x1200, 0x9999]);
        assert_eq!(pkg.param_sfo(), Some(&b"SFOTESTDATA\n"[..]));
        assert!(pkg.find_entry(EntryId::Icon0Png).is_some());
        assert!(pkg.find_entry(EntryId::EntryKeys).is_none());
    }
}
