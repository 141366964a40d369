use snafu::{ResultExt, Snafu, ensure};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Errors when reading from a PKG file.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ReadError {
    #[snafu(display("cannot open {}", path.display()))]
    OpenFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("offset 0x{offset:X} is beyond the end of the file (0x{size:X})"))]
    OutOfRange { offset: u64, size: u64 },

    #[snafu(display("cannot seek to 0x{offset:X}"))]
    SeekFailed {
        offset: u64,
        source: std::io::Error,
    },

    #[snafu(display("short read at 0x{offset:X}"))]
    ShortRead {
        offset: u64,
        source: std::io::Error,
    },
}

type Result<T, E = ReadError> = std::result::Result<T, E>;

/// Bounds-checked random access over a PKG file.
///
/// All primitive reads are big-endian, matching the container format.
/// A reader owns its own cursor and is not meant to be shared; parallel
/// extraction opens one reader per worker.
#[must_use]
pub struct PkgReader {
    file: File,
    size: u64,
    pos: u64,
}

impl std::fmt::Debug for PkgReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkgReader")
            .field("size", &self.size)
            .field("pos", &self.pos)
            .finish_non_exhaustive()
    }
}

impl PkgReader {
    /// Opens the file at `path` for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).context(OpenFailedSnafu { path })?;
        let size = file
            .metadata()
            .context(OpenFailedSnafu { path })?
            .len();

        Ok(Self { file, size, pos: 0 })
    }

    /// Returns the total file size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the current cursor position.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Moves the cursor to an absolute offset.
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        ensure!(
            offset <= self.size,
            OutOfRangeSnafu {
                offset,
                size: self.size
            }
        );

        self.file
            .seek(SeekFrom::Start(offset))
            .context(SeekFailedSnafu { offset })?;
        self.pos = offset;

        Ok(())
    }

    /// Advances the cursor by `n` bytes without reading.
    pub fn skip(&mut self, n: u64) -> Result<()> {
        self.seek(self.pos + n)
    }

    /// Fills `buf` completely or fails with [`ReadError::ShortRead`].
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let offset = self.pos;

        self.file
            .read_exact(buf)
            .context(ShortReadSnafu { offset })?;
        self.pos += buf.len() as u64;

        Ok(())
    }

    /// Reads up to `buf.len()` bytes, stopping early at end of file.
    ///
    /// Returns the number of bytes actually read.
    pub fn read_up_to(&mut self, buf: &mut [u8]) -> Result<usize> {
        let offset = self.pos;
        let mut total = 0;

        while total < buf.len() {
            let n = match self.file.read(&mut buf[total..]) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(ReadError::ShortRead { offset, source: e }),
            };
            total += n;
        }

        self.pos += total as u64;
        Ok(total)
    }

    /// Reads a fixed-size byte array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn fixture(data: &[u8]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.bin");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(data)
            .unwrap();
        (dir, path)
    }

    #[test]
    fn big_endian_primitives() {
        let (_dir, path) = fixture(&[0x12, 0x34, 0x56, 0x78, 0xAB, 0xCD, 0x01, 0x02]);
        let mut r = PkgReader::open(&path).unwrap();

        assert_eq!(r.size(), 8);
        assert_eq!(r.read_u32().unwrap(), 0x12345678);
        assert_eq!(r.read_u16().unwrap(), 0xABCD);
        assert_eq!(r.read_u8().unwrap(), 0x01);
        assert_eq!(r.position(), 7);
    }

    #[test]
    fn seek_and_skip() {
        let (_dir, path) = fixture(&[0u8, 1, 2, 3, 4, 5, 6, 7]);
        let mut r = PkgReader::open(&path).unwrap();

        r.seek(4).unwrap();
        assert_eq!(r.read_u8().unwrap(), 4);
        r.skip(2).unwrap();
        assert_eq!(r.read_u8().unwrap(), 7);
    }

    #[test]
    fn seek_past_end_is_rejected() {
        let (_dir, path) = fixture(&[0u8; 16]);
        let mut r = PkgReader::open(&path).unwrap();

        assert!(matches!(r.seek(17), Err(ReadError::OutOfRange { .. })));
    }

    #[test]
    fn short_read_reports_offset() {
        let (_dir, path) = fixture(&[0u8; 4]);
        let mut r = PkgReader::open(&path).unwrap();

        r.seek(2).unwrap();
        let err = r.read_array::<8>().unwrap_err();
        assert!(matches!(err, ReadError::ShortRead { offset: 2, .. }));
    }

    #[test]
    fn read_up_to_stops_at_eof() {
        let (_dir, path) = fixture(&[7u8; 10]);
        let mut r = PkgReader::open(&path).unwrap();

        let mut buf = [0u8; 64];
        assert_eq!(r.read_up_to(&mut buf).unwrap(), 10);
        assert_eq!(&buf[..10], &[7u8; 10]);
    }
}
