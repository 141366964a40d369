use snafu::Snafu;
use std::path::PathBuf;

/// Errors that abort an extraction session.
///
/// Per-file failures during the parallel pass are logged and skipped
/// instead of surfacing here.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
#[non_exhaustive]
pub enum ExtractError {
    #[snafu(display("cannot open the PKG file"))]
    OpenReaderFailed { source: cnt_pkg::reader::ReadError },

    #[snafu(display("cannot read payload of entry #{num}"))]
    ReadEntryFailed {
        num: usize,
        source: cnt_pkg::reader::ReadError,
    },

    #[snafu(display("cannot create directory {}", path.display()))]
    CreateDirectoryFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("cannot create file {}", path.display()))]
    CreateFileFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("cannot write to {}", path.display()))]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("PFS extraction requires keys the PKG did not provide"))]
    MissingKeys { source: cnt_pkg::session::KeyError },

    #[snafu(display("cannot read the PFS key seed"))]
    ReadSeedFailed { source: cnt_pkg::reader::ReadError },

    #[snafu(display("cannot read the PFS image"))]
    ReadImageFailed { source: cnt_pkg::reader::ReadError },

    #[snafu(display("no PFSC magic found in the decrypted PFS image"))]
    PfscNotFound,

    #[snafu(display("cannot parse the PFSC substream"))]
    ParsePfscFailed { source: cnt_pfs::pfsc::ParseError },

    #[snafu(display("cannot reconstruct the PFS directory tree"))]
    WalkFailed { source: cnt_pfs::vfs::WalkError },

    #[snafu(display("cannot build the extraction thread pool"))]
    ThreadPoolFailed { source: rayon::ThreadPoolBuildError },
}
