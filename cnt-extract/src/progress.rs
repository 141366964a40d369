use std::path::Path;

/// Receives extraction progress updates.
///
/// All methods take `&self` so a reporter can be shared across the
/// extraction workers. Updates are best effort and may coalesce.
pub trait ExtractProgress: Send + Sync {
    /// An entry-table payload is about to be written.
    fn entry_start(&self, _path: &Path, _current: usize, _total: usize) {}

    /// An entry was written raw but could not be post-processed.
    fn entry_skipped(&self, _path: &Path, _reason: &str) {}

    /// The entry-table pass finished.
    fn entries_completed(&self, _extracted: usize, _skipped: usize) {}

    /// The parallel file pass is starting with this many files.
    fn pfs_start(&self, _total_files: usize) {}

    /// One file finished (successfully or not).
    fn pfs_file_completed(&self) {}

    /// The file pass finished.
    fn pfs_completed(&self) {}
}

/// Discards all updates.
pub struct SilentProgress;

impl ExtractProgress for SilentProgress {}

/// Console reporter: a progress bar on stdout during the file pass.
///
/// The bar redraws at a fixed rate instead of printing per file, so the
/// workers never contend on the stdout lock.
pub struct ConsoleProgress {
    bar: indicatif::ProgressBar,
}

impl ConsoleProgress {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bar: indicatif::ProgressBar::hidden(),
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractProgress for ConsoleProgress {
    fn entries_completed(&self, extracted: usize, skipped: usize) {
        if skipped > 0 {
            println!("sce_sys: {extracted} entries written, {skipped} skipped");
        } else {
            println!("sce_sys: {extracted} entries written");
        }
    }

    fn pfs_start(&self, total_files: usize) {
        self.bar
            .set_draw_target(indicatif::ProgressDrawTarget::stdout());
        self.bar.set_length(total_files as u64);
        self.bar.set_style(
            indicatif::ProgressStyle::default_bar()
                .template("[{bar:40}] {pos}/{len} files [{elapsed_precise}]")
                .unwrap()
                .progress_chars("=> "),
        );
        self.bar.reset();
    }

    fn pfs_file_completed(&self) {
        self.bar.inc(1);
    }

    fn pfs_completed(&self) {
        let total = self.bar.position();
        self.bar.finish_and_clear();
        println!("PFS extraction complete ({total} files).");
    }
}
