//! pkscan finds ZIP entries by looking for their local file headers,
//! byte by byte, instead of trusting the central directory:
//!
//! ```no_run
//! # use std::fs::File;
//! # use std::io;
//! # use pkscan::*;
//! let zip_file = File::open("suspicious.zip")?;
//! let mut scanner = HeaderScanner::new(zip_file);
//!
//! // Print `<name> at <offset> len <size>` for every header found...
//! let found = report_headers(&mut scanner, &mut io::stdout().lock())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//! or, to do something else with each header,
//! ```no_run
//! # use std::fs::File;
//! # use pkscan::*;
//! for located in HeaderScanner::new(File::open("suspicious.zip")?) {
//!     let located = located?;
//!     println!("{} @ {}", located.header.display_path(), located.header_offset);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! A ZIP archive's central directory is an index at the back of the file
//! listing each entry and where its local header is.
//! Nearly every ZIP reader goes by that index,
//! so anything it doesn't mention is invisible to them.
//! Entries can be hidden that way, or left behind by a sloppy archiver.
//!
//! The magic number `PK\x03\x04` that starts each local header
//! also turns up by chance in compressed data.
//! Candidates whose name or extra field is implausibly long
//! (see [`HeaderLimits`]) are dropped, and the search resumes
//! one byte past where the rejected one started.
//! Entry contents are never skipped, so headers buried inside
//! another entry's data are found too.
//!
//! Nothing is decompressed or checksummed; this only reports
//! what the headers claim and where they are.

pub mod format;
pub mod result;
pub mod scan;
pub mod signature;

pub use format::{HeaderLimits, LocalFileHeader};
pub use result::{ScanError, ScanResult};
pub use scan::{report_headers, HeaderScanner, LocatedHeader};
