mod cli;

use clap::Parser;
use cli::Cli;
use cnt_extract::{ConsoleProgress, PkgExtractor, SilentProgress};
use cnt_pkg::header::{content_type_name, drm_type_name};
use snafu::{ResultExt, Snafu};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to open PKG file '{}'", path.display()))]
    OpenPkg {
        path: PathBuf,
        source: cnt_extract::OpenPkgError,
    },

    #[snafu(display("failed to extract PKG"))]
    Extract { source: cnt_extract::ExtractError },
}

type Result<T, E = Error> = std::result::Result<T, E>;

fn main() -> ExitCode {
    env_logger::init();

    // Exit codes: 0 success, 1 parse/extract error, 2 caught panic with a
    // printable payload, 3 anything else.
    match std::panic::catch_unwind(run) {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(e)) => {
            eprintln!("{}", snafu::Report::from_error(e));
            ExitCode::from(1)
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned());

            match message {
                Some(message) => {
                    eprintln!("unhandled runtime error: {message}");
                    ExitCode::from(2)
                }
                None => {
                    eprintln!("fatal unknown error");
                    ExitCode::from(3)
                }
            }
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let pkg = cnt_extract::open_pkg(&cli.pkg_path).context(OpenPkgSnafu {
        path: cli.pkg_path.clone(),
    })?;

    if !cli.quiet {
        print_report(&cli, &pkg);
    }

    let start = std::time::Instant::now();

    if cli.quiet {
        PkgExtractor::new(&pkg, &cli.pkg_path, SilentProgress, cli.force)
            .with_threads(cli.threads)
            .extract(&cli.output)
            .context(ExtractSnafu)?;
    } else {
        PkgExtractor::new(&pkg, &cli.pkg_path, ConsoleProgress::new(), cli.force)
            .with_threads(cli.threads)
            .extract(&cli.output)
            .context(ExtractSnafu)?;
    }

    if !cli.quiet {
        println!(
            "Extracted {} to {} in {:.2}s.",
            cli.pkg_path.display(),
            cli.output.display(),
            start.elapsed().as_secs_f64()
        );
    }

    Ok(())
}

fn print_report(cli: &Cli, pkg: &cnt_pkg::Pkg) {
    let header = pkg.header();
    let content_id = header.content_id();

    println!("PKG: {}", cli.pkg_path.display());
    println!();
    println!("Content ID:     {}", content_id);
    println!("  Service ID:   {}", content_id.service_id());
    println!("  Publisher:    {}", content_id.publisher_code());
    println!("  Title ID:     {}", content_id.title_id());
    println!("  Version:      {}", content_id.version());
    println!("  Label:        {}", content_id.label());
    println!(
        "Content Type:   0x{:02X} ({})",
        header.content_type(),
        content_type_name(header.content_type())
    );
    println!("Content Flags:  {}", header.content_flags());
    println!(
        "DRM Type:       0x{:02X} ({})",
        header.drm_type(),
        drm_type_name(header.drm_type())
    );
    println!("PKG Size:       {} bytes", header.pkg_size());
    println!("File Count:     {}", header.file_count());
    println!("Entry Count:    {}", header.entry_count());
    println!("PFS Offset:     0x{:X}", header.pfs_offset());
    println!("PFS Size:       {} bytes", header.pfs_size());
    println!();
}
