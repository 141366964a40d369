mod error;

pub use self::error::ExtractError;
use self::error::*;

use crate::progress::ExtractProgress;

use cnt_pfs::crypto::XTS_SECTOR_SIZE;
use cnt_pfs::inode::Inode;
use cnt_pfs::pfsc::{self, BLOCK_SIZE, Pfsc};
use cnt_pfs::vfs;
use cnt_pfs::{KEY_SEED_OFFSET, XtsDecryptor, derive_xts_keys, find_pfsc_offset};
use cnt_pkg::Pkg;
use cnt_pkg::reader::PkgReader;

use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use snafu::{OptionExt, ResultExt, Snafu};
use std::fs::{File, OpenOptions, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};

type Result<T, E = ExtractError> = std::result::Result<T, E>;

/// The Phase-D read window: one PFSC block plus one extra XTS sector so
/// the data of interest never straddles the window's tail.
const WINDOW_SIZE: usize = BLOCK_SIZE + XTS_SECTOR_SIZE;

/// Extracts a parsed PKG to an output directory.
///
/// The entry-table payloads land under `<out>/sce_sys/`; the PFS tree
/// lands under the resolved output root (see [`resolve_output_root`]).
pub struct PkgExtractor<'a, P: ExtractProgress> {
    pkg: &'a Pkg,
    pkg_path: PathBuf,
    progress: P,
    overwrite: bool,
    threads: Option<usize>,
}

impl<'a, P: ExtractProgress> PkgExtractor<'a, P> {
    /// Creates an extractor for `pkg`, which was parsed from the file at
    /// `pkg_path`.
    ///
    /// If `overwrite` is `true`, existing PFS files are replaced;
    /// otherwise extraction of an existing file fails (and is logged).
    pub fn new(pkg: &'a Pkg, pkg_path: impl Into<PathBuf>, progress: P, overwrite: bool) -> Self {
        Self {
            pkg,
            pkg_path: pkg_path.into(),
            progress,
            overwrite,
            threads: None,
        }
    }

    /// Overrides the worker count for the parallel file pass.
    #[must_use]
    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    /// Runs the full extraction: entry payloads, then the PFS tree.
    pub fn extract(&self, output: impl AsRef<Path>) -> Result<()> {
        let output = output.as_ref();

        self.extract_entries(output.join("sce_sys"))?;
        self.extract_pfs(output)?;

        Ok(())
    }

    /// Writes every entry-table payload under `output`.
    ///
    /// Known ids get their well-known names, unknown ids their decimal
    /// rendering. NP license entries (0x400-0x403) are written raw and
    /// then overwritten with their decryption; if the decryption fails
    /// the raw payload stays and the entry is reported as skipped.
    pub fn extract_entries(&self, output: impl AsRef<Path>) -> Result<()> {
        let output = output.as_ref();
        let total = self.pkg.entries().len();
        let mut reader = PkgReader::open(&self.pkg_path).context(OpenReaderFailedSnafu)?;

        let mut extracted = 0usize;
        let mut skipped = 0usize;

        for (num, entry) in self.pkg.entries().iter().enumerate() {
            let path = entry.to_path(output);
            self.progress.entry_start(&path, num, total);

            reader
                .seek(entry.data_offset())
                .context(ReadEntryFailedSnafu { num })?;
            let mut data = vec![0u8; entry.data_size() as usize];
            reader
                .read_exact(&mut data)
                .context(ReadEntryFailedSnafu { num })?;

            if let Some(parent) = path.parent() {
                create_dir_all(parent).context(CreateDirectoryFailedSnafu { path: parent })?;
            }

            write_file(&path, &data)?;
            extracted += 1;

            // NP license entries are decrypted in place after the raw write.
            if (0x400..=0x403).contains(&entry.id()) {
                match self.pkg.session().decrypt_entry(entry.record_bytes(), &data) {
                    Ok(decrypted) => write_file(&path, &decrypted)?,
                    Err(e) => {
                        log::warn!("cannot decrypt {}: {e}", path.display());
                        self.progress.entry_skipped(&path, &e.to_string());
                        skipped += 1;
                    }
                }
            }
        }

        if total > 0 {
            self.progress.entries_completed(extracted, skipped);
        }

        Ok(())
    }

    /// Extracts the PFS tree: locates and decrypts the PFSC substream,
    /// rebuilds the directory tree, then materializes the files with a
    /// worker pool.
    pub fn extract_pfs(&self, output: impl AsRef<Path>) -> Result<()> {
        let output = output.as_ref();
        let header = self.pkg.header();

        let pfs_offset = header.pfs_offset();
        let window = u64::from(header.pfs_cache_size()) * 2;
        if header.pfs_size() == 0 || window == 0 {
            log::info!("PKG has no PFS image, nothing further to extract");
            return Ok(());
        }

        let ekpfs = self.pkg.session().ekpfs().context(MissingKeysSnafu)?;

        let mut reader = PkgReader::open(&self.pkg_path).context(OpenReaderFailedSnafu)?;

        // Phase A: derive the XTS keys and locate the PFSC substream.
        reader
            .seek(pfs_offset + KEY_SEED_OFFSET)
            .context(ReadSeedFailedSnafu)?;
        let seed: [u8; 16] = reader.read_array().context(ReadSeedFailedSnafu)?;

        let (data_key, tweak_key) = derive_xts_keys(ekpfs, &seed);
        let xts = XtsDecryptor::new(&data_key, &tweak_key);

        let length = window.min(reader.size().saturating_sub(pfs_offset));
        let mut image = vec![0u8; length as usize];
        reader.seek(pfs_offset).context(ReadImageFailedSnafu)?;
        reader
            .read_exact(&mut image)
            .context(ReadImageFailedSnafu)?;
        xts.decrypt(&mut image, 0);

        let pfsc_offset = find_pfsc_offset(&image).context(PfscNotFoundSnafu)?;

        // Phase B: sector map.
        let pfsc = Pfsc::parse(image.split_off(pfsc_offset)).context(ParsePfscFailedSnafu)?;
        drop(image);

        // Phase C: rebuild the tree, creating directories as they appear.
        let anchor = resolve_output_root(output, header.content_id().title_id());
        let vfs = vfs::walk(&pfsc, &anchor).context(WalkFailedSnafu)?;

        // Phase D: materialize the files in parallel.
        let files: Vec<FileWork<'_>> = vfs
            .files()
            .map(|(entry, path)| FileWork {
                inode: entry.inode,
                path,
            })
            .collect();

        self.progress.pfs_start(files.len());

        let ctx = PfsContext {
            pkg_path: &self.pkg_path,
            pfs_offset,
            pfsc_offset: pfsc_offset as u64,
            sector_map: pfsc.sector_map(),
            inodes: vfs.inodes(),
            xts: &xts,
            overwrite: self.overwrite,
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads.unwrap_or_else(default_threads))
            .build()
            .context(ThreadPoolFailedSnafu)?;

        pool.install(|| {
            files.par_iter().for_each_init(
                || PkgReader::open(ctx.pkg_path),
                |reader, work| {
                    // A failed file never aborts the session.
                    let result = match reader {
                        Ok(reader) => extract_single_file(&ctx, reader, work),
                        Err(e) => Err(FileError::OpenReader {
                            message: e.to_string(),
                        }),
                    };

                    if let Err(e) = result {
                        log::warn!("cannot extract {}: {e}", work.path.display());
                    }

                    self.progress.pfs_file_completed();
                },
            );
        });

        self.progress.pfs_completed();

        Ok(())
    }
}

/// Resolves the directory the PFS tree is rooted at.
///
/// Game packages extract next to the chosen directory under the title id;
/// an output directory already named after the title, or one marking an
/// update (`...-UPDATE`), is used as is. This keeps DLC and update
/// layouts chosen by the caller intact.
#[must_use]
pub fn resolve_output_root(output: &Path, title_id: &str) -> PathBuf {
    let Some(leaf) = output.file_name().map(|n| n.to_string_lossy()) else {
        return output.to_path_buf();
    };

    if leaf.as_ref() != title_id && !leaf.ends_with("-UPDATE") {
        match output.parent() {
            Some(parent) => parent.join(title_id),
            None => output.to_path_buf(),
        }
    } else {
        output.to_path_buf()
    }
}

fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
        .min(8)
}

fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    let mut file = File::create(path).context(CreateFileFailedSnafu { path })?;
    file.write_all(data).context(WriteFailedSnafu { path })?;
    Ok(())
}

/// One file of the parallel pass.
struct FileWork<'a> {
    inode: u32,
    path: &'a Path,
}

/// Read-only state shared by the extraction workers.
struct PfsContext<'a> {
    pkg_path: &'a Path,
    pfs_offset: u64,
    pfsc_offset: u64,
    sector_map: &'a [u64],
    inodes: &'a [Inode],
    xts: &'a XtsDecryptor,
    overwrite: bool,
}

/// Per-file failures; logged by the worker, never fatal.
#[derive(Debug, Snafu)]
enum FileError {
    #[snafu(display("cannot open PKG reader: {message}"))]
    OpenReader { message: String },

    #[snafu(display("inode #{inode} is not in the inode table"))]
    MissingInode { inode: u32 },

    #[snafu(display("sector-map index {index} is out of range"))]
    SectorOutOfRange { index: usize },

    #[snafu(display("cannot create parent directory {}", path.display()))]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("cannot create output file: {source}"))]
    Create { source: std::io::Error },

    #[snafu(display("cannot write output file: {source}"))]
    WriteOut { source: std::io::Error },

    #[snafu(display("cannot read PKG: {source}"))]
    ReadPkg { source: cnt_pkg::reader::ReadError },

    #[snafu(display("decrypted window too short: got {got}, need {need}"))]
    ShortWindow { got: usize, need: usize },
}

/// Decrypts, decompresses and writes one file.
///
/// Each block is fetched with an XTS-aligned read of [`WINDOW_SIZE`]
/// bytes; the stored block starts `skew` bytes into the window. Short
/// reads at end of file are fine as long as the whole stored block was
/// covered. Decompression failures are logged and the zero-padded block
/// is written anyway, matching the tolerance real packages rely on for
/// their final blocks.
fn extract_single_file(
    ctx: &PfsContext<'_>,
    reader: &mut PkgReader,
    work: &FileWork<'_>,
) -> Result<(), FileError> {
    let inode = ctx
        .inodes
        .get(work.inode as usize)
        .context(MissingInodeSnafu { inode: work.inode })?;

    if let Some(parent) = work.path.parent() {
        create_dir_all(parent).context(CreateDirSnafu { path: parent })?;
    }

    let mut opts = OpenOptions::new();
    opts.write(true);
    if ctx.overwrite {
        opts.create(true).truncate(true);
    } else {
        opts.create_new(true);
    }
    let mut dest = opts.open(work.path).context(CreateSnafu)?;

    let size = inode.size();
    let nblocks = inode.blocks() as usize;
    let loc = inode.loc() as usize;

    let mut window = vec![0u8; WINDOW_SIZE];
    let mut plain = vec![0u8; BLOCK_SIZE];

    for j in 0..nblocks {
        let index = loc + j;
        let (&start, &end) = ctx
            .sector_map
            .get(index)
            .zip(ctx.sector_map.get(index + 1))
            .context(SectorOutOfRangeSnafu { index })?;

        let sector_offset = start;
        let sector_size = end.saturating_sub(start) as usize;

        if sector_size > BLOCK_SIZE {
            // Sparse block: nothing stored.
            plain.fill(0);
        } else {
            // XTS-aligned read around the stored block.
            let abs = ctx.pfsc_offset + sector_offset;
            let aligned = abs & !(XTS_SECTOR_SIZE as u64 - 1);
            let skew = (abs - aligned) as usize;

            reader
                .seek(ctx.pfs_offset + aligned)
                .context(ReadPkgSnafu)?;
            let got = reader.read_up_to(&mut window).context(ReadPkgSnafu)?;

            let whole = got - got % XTS_SECTOR_SIZE;
            let need = skew + sector_size;
            snafu::ensure!(whole >= need, ShortWindowSnafu { got: whole, need });

            ctx.xts
                .decrypt(&mut window[..whole], aligned / XTS_SECTOR_SIZE as u64);

            if let Err(e) = pfsc::expand_block(&window[skew..skew + sector_size], &mut plain) {
                log::warn!(
                    "block {j} of {}: {e}; writing zero-padded block",
                    work.path.display()
                );
            }
        }

        // Trailing blocks are padded; the last write is truncated to the
        // logical size.
        let written = (j as u64) * BLOCK_SIZE as u64;
        let write_len = if j + 1 < nblocks {
            BLOCK_SIZE
        } else {
            size.saturating_sub(written).min(BLOCK_SIZE as u64) as usize
        };

        dest.write_all(&plain[..write_len]).context(WriteOutSnafu)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_root_redirects_to_title_id() {
        let out = Path::new("/tmp/extract/SomeGame");
        assert_eq!(
            resolve_output_root(out, "CUSA12345"),
            Path::new("/tmp/extract/CUSA12345")
        );
    }

    #[test]
    fn output_root_named_after_title_is_kept() {
        let out = Path::new("/tmp/extract/CUSA12345");
        assert_eq!(resolve_output_root(out, "CUSA12345"), out);
    }

    #[test]
    fn update_suffix_keeps_the_chosen_directory() {
        let out = Path::new("/tmp/extract/CUSA12345-UPDATE");
        assert_eq!(resolve_output_root(out, "CUSA12345"), out);
    }

    #[test]
    fn worker_count_is_capped() {
        assert!(default_threads() >= 1);
        assert!(default_threads() <= 8);
    }
}
