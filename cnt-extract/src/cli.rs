use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "cnt-extract")]
#[command(about = "PS4 PKG extractor", version)]
pub struct Cli {
    /// Path to the PKG file
    #[arg(value_name = "PKG_FILE")]
    pub pkg_path: PathBuf,

    /// Directory to extract into
    #[arg(value_name = "OUTPUT_DIR")]
    pub output: PathBuf,

    /// Overwrite existing files
    #[arg(short, long)]
    pub force: bool,

    /// Suppress the metadata report and progress output
    #[arg(short, long)]
    pub quiet: bool,

    /// Worker threads for file extraction (default: min(8, CPUs))
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,
}
