use std::fs::File;
use std::io;
use std::path::PathBuf;

use anyhow::*;
use log::*;
use structopt::*;

use pkscan::format::DEFAULT_MAX_VARIABLE_LENGTH;
use pkscan::*;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "pkscan",
    about = "Find hidden files in a Zip archive by looking for local file headers."
)]
struct Opt {
    /// Pass multiple times for additional verbosity (info, debug, trace)
    #[structopt(short, long, parse(from_occurrences))]
    verbosity: usize,

    /// Ignore headers whose name and extra field are longer than this, combined.
    #[structopt(short, long, default_value = "255")]
    max_variable_length: u16,

    #[structopt(name("ZIP file"), parse(from_os_str))]
    zip_path: PathBuf,
}

fn main() -> Result<()> {
    let args = Opt::from_args();

    let mut errlog = stderrlog::new();
    errlog.verbosity(args.verbosity + 1);
    errlog.init()?;

    if args.max_variable_length > DEFAULT_MAX_VARIABLE_LENGTH {
        warn!(
            "Allowing names and extra fields up to {} bytes; expect more false positives",
            args.max_variable_length
        );
    }

    info!("Scanning {} for local file headers", args.zip_path.display());
    let zip_file = File::open(&args.zip_path)
        .with_context(|| format!("Couldn't open {}", args.zip_path.display()))?;
    let mut scanner =
        HeaderScanner::with_limits(zip_file, HeaderLimits::new(args.max_variable_length));

    let stdout = io::stdout();
    let found = report_headers(&mut scanner, &mut stdout.lock())
        .with_context(|| format!("Couldn't scan {}", args.zip_path.display()))?;
    info!(
        "Reached the end of {}: {} headers",
        args.zip_path.display(),
        found
    );
    Ok(())
}
