//! Extraction of PS4 PKG files to disk.
//!
//! Ties `cnt-pkg` (container parsing, key derivation) and `cnt-pfs`
//! (filesystem image) together: [`PkgExtractor`] writes the entry-table
//! payloads under `sce_sys/` and materializes the full PFS tree, with
//! the file pass running on a worker pool.
//!
//! # Example
//!
//! ```no_run
//! use cnt_extract::{PkgExtractor, SilentProgress, open_pkg};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pkg = open_pkg("game.pkg".as_ref())?;
//! let extractor = PkgExtractor::new(&pkg, "game.pkg", SilentProgress, false);
//! extractor.extract("out/")?;
//! # Ok(())
//! # }
//! ```

pub mod extract;
pub mod progress;

pub use self::extract::{ExtractError, PkgExtractor, resolve_output_root};
pub use self::progress::{ConsoleProgress, ExtractProgress, SilentProgress};

use cnt_pkg::Pkg;
use cnt_pkg::reader::PkgReader;
use snafu::{ResultExt, Snafu};
use std::path::Path;

/// Errors when opening and parsing a PKG from disk.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum OpenPkgError {
    #[snafu(display("cannot open file"))]
    OpenFailed { source: cnt_pkg::reader::ReadError },

    #[snafu(display("cannot parse PKG"))]
    ParseFailed { source: cnt_pkg::OpenError },
}

/// Opens and parses the PKG at `path`.
///
/// The reader used for parsing is dropped afterwards; extraction opens
/// its own.
pub fn open_pkg(path: &Path) -> Result<Pkg, OpenPkgError> {
    let mut reader = PkgReader::open(path).context(OpenFailedSnafu)?;
    Pkg::read(&mut reader).context(ParseFailedSnafu)
}
