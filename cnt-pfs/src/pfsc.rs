use flate2::FlushDecompress;
use snafu::{Snafu, ensure};
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    byteorder::little_endian::{U32, U64},
};

/// `"PFSC"` read as a little-endian u32.
pub const PFSC_MAGIC: u32 = 0x43534650;

/// Uncompressed PFSC block size.
pub const BLOCK_SIZE: usize = 0x10000;

/// The magic scan begins this far into the decrypted PFS image.
const SCAN_START: usize = 0x20000;

/// PFSC header (48 bytes, little-endian).
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct PfscHeaderRaw {
    pub magic: U32,         // 0x00
    pub unk_0x04: U32,      // 0x04
    pub unk_0x08: U32,      // 0x08
    pub block_size: U32,    // 0x0C - stored block size
    pub block_size2: U64,   // 0x10 - uncompressed block size
    pub block_offsets: U64, // 0x18 - offset of the sector map
    pub data_start: U64,    // 0x20
    pub data_length: U64,   // 0x28 - uncompressed data length
}

/// Errors when parsing a PFSC substream.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ParseError {
    #[snafu(display("data too small for a PFSC header"))]
    TooSmall,

    #[snafu(display("invalid PFSC magic"))]
    InvalidMagic,

    #[snafu(display("invalid uncompressed block size 0x{size:X}"))]
    InvalidBlockSize { size: u64 },

    #[snafu(display("sector map [0x{offset:X}, +{count} entries) lies outside the substream"))]
    SectorMapOutOfBounds { offset: u64, count: usize },
}

/// Errors when reading a block out of a PFSC substream.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ReadBlockError {
    #[snafu(display("block #{block} does not exist"))]
    NoSuchBlock { block: usize },

    #[snafu(display("block #{block} [0x{offset:X}, +0x{size:X}) lies outside the substream"))]
    BlockOutOfBounds { block: usize, offset: u64, size: u64 },

    #[snafu(display("cannot decompress block #{block}"))]
    DecompressFailed {
        block: usize,
        source: DecompressError,
    },
}

/// Errors from zlib inflation of a stored block.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum DecompressError {
    #[snafu(display("zlib error: {message}"))]
    ZlibFailed { message: String },

    #[snafu(display("inflate produced {produced} bytes, expected {expected}"))]
    ShortInflate { produced: usize, expected: usize },
}

/// Scans a decrypted PFS image for the PFSC magic.
///
/// The scan walks 0x10000-byte boundaries starting at offset 0x20000;
/// the returned offset is relative to the start of `decrypted`.
#[must_use]
pub fn find_pfsc_offset(decrypted: &[u8]) -> Option<usize> {
    let mut offset = SCAN_START;

    while offset + 4 <= decrypted.len() {
        let value = u32::from_le_bytes(decrypted[offset..offset + 4].try_into().unwrap());
        if value == PFSC_MAGIC {
            return Some(offset);
        }
        offset += BLOCK_SIZE;
    }

    None
}

/// A parsed PFSC substream: header fields, sector map and the raw bytes.
///
/// `sector_map()[i]` is the byte offset of stored block `i` inside the
/// substream; the stored size of block `i` is `map[i + 1] - map[i]`. A
/// stored size equal to [`BLOCK_SIZE`] means the block is raw, a smaller
/// one means zlib-deflated, a larger one marks a sparse (all-zero) block.
#[must_use]
pub struct Pfsc {
    data: Vec<u8>,
    sector_map: Vec<u64>,
    data_length: u64,
}

impl std::fmt::Debug for Pfsc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pfsc")
            .field("blocks", &self.block_count())
            .field("data_length", &self.data_length)
            .finish_non_exhaustive()
    }
}

impl Pfsc {
    /// Parses a PFSC substream. `data` must start at the PFSC magic.
    pub fn parse(data: Vec<u8>) -> Result<Self, ParseError> {
        let (header, _) =
            PfscHeaderRaw::read_from_prefix(data.as_slice()).map_err(|_| TooSmallSnafu.build())?;

        ensure!(header.magic.get() == PFSC_MAGIC, InvalidMagicSnafu);

        let block_size = header.block_size2.get();
        ensure!(
            block_size == BLOCK_SIZE as u64,
            InvalidBlockSizeSnafu { size: block_size }
        );

        let data_length = header.data_length.get();
        let num_blocks = (data_length / block_size) as usize;

        // One extra entry so the last block's size can be computed.
        let map_offset = header.block_offsets.get();
        let map_len = (num_blocks + 1) * size_of::<u64>();
        let map_bytes = map_offset
            .checked_add(map_len as u64)
            .and_then(|end| data.get(map_offset as usize..end as usize))
            .ok_or_else(|| {
                SectorMapOutOfBoundsSnafu {
                    offset: map_offset,
                    count: num_blocks + 1,
                }
                .build()
            })?;

        let sector_map = map_bytes
            .chunks_exact(8)
            .map(|c| u64::from_le_bytes(c.try_into().unwrap()))
            .collect();

        Ok(Self {
            data,
            sector_map,
            data_length,
        })
    }

    /// Number of uncompressed blocks the substream carries.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.sector_map.len().saturating_sub(1)
    }

    #[must_use]
    pub fn data_length(&self) -> u64 {
        self.data_length
    }

    #[must_use]
    pub fn sector_map(&self) -> &[u64] {
        &self.sector_map
    }

    /// Returns `(offset, stored_size)` of block `i` within the substream.
    #[must_use]
    pub fn sector_span(&self, i: usize) -> Option<(u64, u64)> {
        let start = *self.sector_map.get(i)?;
        let end = *self.sector_map.get(i + 1)?;
        Some((start, end.saturating_sub(start)))
    }

    /// Reads block `i` into `out` (which must be [`BLOCK_SIZE`] bytes),
    /// inflating or zero-filling as the stored size dictates.
    pub fn read_block(&self, i: usize, out: &mut [u8]) -> Result<(), ReadBlockError> {
        let (offset, size) = self
            .sector_span(i)
            .ok_or_else(|| NoSuchBlockSnafu { block: i }.build())?;

        let stored = offset
            .checked_add(size)
            .and_then(|end| self.data.get(offset as usize..end as usize))
            .ok_or_else(|| {
                BlockOutOfBoundsSnafu {
                    block: i,
                    offset,
                    size,
                }
                .build()
            })?;

        expand_block(stored, out).map_err(|source| ReadBlockError::DecompressFailed {
            block: i,
            source,
        })
    }
}

/// Expands one stored block into `out`.
///
/// A stored size equal to `out.len()` is a raw copy, a smaller one is
/// zlib-inflated, a larger one is a sparse block and zero-fills.
pub fn expand_block(stored: &[u8], out: &mut [u8]) -> Result<(), DecompressError> {
    match stored.len().cmp(&out.len()) {
        std::cmp::Ordering::Equal => {
            out.copy_from_slice(stored);
            Ok(())
        }
        std::cmp::Ordering::Less => decompress_block(stored, out),
        std::cmp::Ordering::Greater => {
            log::debug!("sparse block ({} > {} bytes), zero-filled", stored.len(), out.len());
            out.fill(0);
            Ok(())
        }
    }
}

/// Inflates a zlib-deflated block into `out`, which must come out full.
///
/// `out` is zero-filled first, so on a short inflate the caller is left
/// with inflated data up to the failure point and zeros after it.
pub fn decompress_block(compressed: &[u8], out: &mut [u8]) -> Result<(), DecompressError> {
    out.fill(0);

    let mut inflate = flate2::Decompress::new(true);

    let status = inflate
        .decompress(compressed, out, FlushDecompress::Finish)
        .map_err(|e| DecompressError::ZlibFailed {
            message: e.to_string(),
        })?;

    let produced = inflate.total_out() as usize;
    ensure!(
        status == flate2::Status::StreamEnd && produced == out.len(),
        ShortInflateSnafu {
            produced,
            expected: out.len()
        }
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{Compress, Compression, FlushCompress};
    use zerocopy::FromZeros;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; data.len() + 1024];
        let mut compress = Compress::new(Compression::default(), true);
        compress
            .compress(data, &mut out, FlushCompress::Finish)
            .unwrap();
        out.truncate(compress.total_out() as usize);
        out
    }

    fn substream(map: &[u64], data_length: u64, payload: &[(u64, Vec<u8>)]) -> Vec<u8> {
        let mut raw = PfscHeaderRaw::new_zeroed();
        raw.magic = PFSC_MAGIC.into();
        raw.block_size = (BLOCK_SIZE as u32).into();
        raw.block_size2 = (BLOCK_SIZE as u64).into();
        raw.block_offsets = 0x60u64.into();
        raw.data_length = data_length.into();

        let mut data = raw.as_bytes().to_vec();
        data.resize(0x60, 0);
        for &off in map {
            data.extend_from_slice(&off.to_le_bytes());
        }

        for (off, bytes) in payload {
            let end = *off as usize + bytes.len();
            if data.len() < end {
                data.resize(end, 0);
            }
            data[*off as usize..end].copy_from_slice(bytes);
        }

        data
    }

    #[test]
    fn header_is_48_bytes() {
        assert_eq!(size_of::<PfscHeaderRaw>(), 0x30);
    }

    #[test]
    fn sector_map_parsing() {
        // Three blocks: raw, compressed, raw.
        let map = [0x1000u64, 0x11000, 0x12000, 0x22000];
        let data = substream(&map, 0x30000, &[]);

        let pfsc = Pfsc::parse(data).unwrap();
        assert_eq!(pfsc.block_count(), 3);
        assert_eq!(pfsc.sector_span(0), Some((0x1000, 0x10000)));
        assert_eq!(pfsc.sector_span(1), Some((0x11000, 0x1000)));
        assert_eq!(pfsc.sector_span(2), Some((0x12000, 0x10000)));
        assert_eq!(pfsc.sector_span(3), None);
    }

    #[test]
    fn magic_is_checked() {
        let map = [0x1000u64, 0x11000];
        let mut data = substream(&map, 0x10000, &[]);
        data[0] = b'X';

        assert!(matches!(Pfsc::parse(data), Err(ParseError::InvalidMagic)));
    }

    #[test]
    fn sector_map_must_fit() {
        let map = [0x1000u64, 0x11000];
        let mut data = substream(&map, 0x10000, &[]);
        data.truncate(0x40); // header only, map cut off

        assert!(matches!(
            Pfsc::parse(data),
            Err(ParseError::SectorMapOutOfBounds { .. })
        ));
    }

    #[test]
    fn magic_scan_walks_block_boundaries() {
        let mut image = vec![0u8; 0x50000];

        // A decoy magic off-boundary is not found.
        image[0x20004..0x20008].copy_from_slice(&PFSC_MAGIC.to_le_bytes());
        image[0x40000..0x40004].copy_from_slice(&PFSC_MAGIC.to_le_bytes());
        assert_eq!(find_pfsc_offset(&image), Some(0x40000));

        // Magic before the scan start is ignored.
        let mut early = vec![0u8; 0x30000];
        early[0x10000..0x10004].copy_from_slice(&PFSC_MAGIC.to_le_bytes());
        assert_eq!(find_pfsc_offset(&early), None);
    }

    #[test]
    fn raw_block_is_copied_verbatim() {
        let block = vec![0xAAu8; BLOCK_SIZE];
        let map = [0x1000u64, 0x11000];
        let data = substream(&map, 0x10000, &[(0x1000, block.clone())]);

        let pfsc = Pfsc::parse(data).unwrap();
        let mut out = vec![0u8; BLOCK_SIZE];
        pfsc.read_block(0, &mut out).unwrap();
        assert_eq!(out, block);
    }

    #[test]
    fn compressed_block_inflates_to_full_size() {
        let plain: Vec<u8> = (0..BLOCK_SIZE).map(|i| (i / 256) as u8).collect();
        let packed = deflate(&plain);
        assert!(packed.len() < BLOCK_SIZE);

        let map = [0x1000u64, 0x1000 + packed.len() as u64];
        let data = substream(&map, 0x10000, &[(0x1000, packed)]);

        let pfsc = Pfsc::parse(data).unwrap();
        let mut out = vec![0u8; BLOCK_SIZE];
        pfsc.read_block(0, &mut out).unwrap();
        assert_eq!(out, plain);
    }

    #[test]
    fn sparse_block_zero_fills() {
        let mut out = vec![0xFFu8; BLOCK_SIZE];
        expand_block(&vec![0u8; BLOCK_SIZE + 1], &mut out).unwrap();
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn garbage_reports_zlib_error() {
        let mut out = vec![0u8; BLOCK_SIZE];
        let err = decompress_block(&[0xDE, 0xAD, 0xBE, 0xEF], &mut out).unwrap_err();
        assert!(matches!(
            err,
            DecompressError::ZlibFailed { .. } | DecompressError::ShortInflate { .. }
        ));
    }

    #[test]
    fn truncated_stream_is_a_short_inflate() {
        let plain: Vec<u8> = (0..BLOCK_SIZE).map(|i| (i % 251) as u8).collect();
        let packed = deflate(&plain);

        let mut out = vec![0u8; BLOCK_SIZE];
        let err = decompress_block(&packed[..packed.len() / 2], &mut out).unwrap_err();
        assert!(matches!(err, DecompressError::ShortInflate { .. }));
    }
}
