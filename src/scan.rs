//! Finding local file headers in a stream.
//!
//! [`HeaderScanner`] pairs a [`SignatureScanner`] with the header decoder
//! in [`format`](crate::format), and [`report_headers()`] drives it to the
//! end of the stream.
//!
//! The scanner never skips over an entry's contents: after a header is found,
//! the search picks up right after its extra field. Entries hidden inside
//! other entries' data are found that way, and bogus size fields can't
//! send us past anything.

use std::io::{self, Read, Seek, SeekFrom, Write};

use log::*;

use crate::format::*;
use crate::result::*;
use crate::signature::{read_up_to, SignatureScanner};

/// A local file header and where it was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedHeader {
    /// Stream offset of the header's magic number
    pub header_offset: u64,
    /// Stream offset just past the header's extra field,
    /// where its data (if any) would start
    pub data_offset: u64,
    pub header: LocalFileHeader<'static>,
}

/// Finds local file headers in a stream without any help from
/// the central directory.
pub struct HeaderScanner<R> {
    reader: R,
    limits: HeaderLimits,
    signatures: SignatureScanner,
    /// Bytes following a signature, enough for the largest plausible header
    lookahead: Box<[u8]>,
}

impl<R: Read + Seek> HeaderScanner<R> {
    /// Scans from the reader's current position with the default limits.
    pub fn new(reader: R) -> Self {
        Self::with_limits(reader, HeaderLimits::default())
    }

    pub fn with_limits(reader: R, limits: HeaderLimits) -> Self {
        Self {
            reader,
            limits,
            signatures: SignatureScanner::new(&LOCAL_FILE_HEADER_MAGIC),
            lookahead: vec![0; limits.lookahead()].into_boxed_slice(),
        }
    }

    /// Where the next search will begin
    pub fn stream_position(&mut self) -> io::Result<u64> {
        self.reader.stream_position()
    }

    /// Finds the next plausible local file header.
    ///
    /// Returns [`ScanError::EndOfStream`] once the stream runs out.
    /// Bytes that merely look like a header are skipped silently.
    pub fn next_header(&mut self) -> ScanResult<LocatedHeader> {
        loop {
            let found = self.signatures.next_match(&mut self.reader)?;
            let header_offset = found.offset;
            let body_offset = header_offset + LOCAL_FILE_HEADER_MAGIC.len() as u64;

            let mut available = found.trailing.len().min(self.lookahead.len());
            self.lookahead[..available].copy_from_slice(&found.trailing[..available]);
            if available < self.lookahead.len() {
                available += read_up_to(&mut self.reader, &mut self.lookahead[available..])?;
            }

            match LocalFileHeader::parse(&self.lookahead[..available], &self.limits) {
                Candidate::Plausible(header) => {
                    let data_offset = body_offset + header.size_in_file() as u64;
                    // Stop right after the header, not after its data.
                    self.reader.seek(SeekFrom::Start(data_offset))?;
                    trace!("{:?}", header);
                    debug!(
                        "Found {} at {} ({:?}, {} bytes, modified {:?}, flags {:#06x})",
                        header.display_path(),
                        header_offset,
                        header.compression(),
                        header.uncompressed_size,
                        header.last_modified(),
                        header.flags
                    );
                    return Ok(LocatedHeader {
                        header_offset,
                        data_offset,
                        header: header.into_owned(),
                    });
                }
                Candidate::Implausible(why) => {
                    trace!("Skipping candidate at {}: {:?}", header_offset, why);
                    // Resume one byte past this signature's start
                    // so a real one just after it isn't lost.
                    self.reader.seek(SeekFrom::Start(header_offset + 1))?;
                }
            }
        }
    }
}

impl<R: Read + Seek> Iterator for HeaderScanner<R> {
    type Item = ScanResult<LocatedHeader>;

    /// Yields each header, then stops at the end of the stream.
    /// An I/O error is yielded once; there's no guarantee of anything after it.
    fn next(&mut self) -> Option<Self::Item> {
        match self.next_header() {
            Err(ScanError::EndOfStream) => None,
            other => Some(other),
        }
    }
}

/// Writes a header's report line: `<name> at <offset> len <size>`
///
/// The name is written as-is, whatever bytes it contains.
pub fn write_entry<W: Write>(out: &mut W, located: &LocatedHeader) -> io::Result<()> {
    out.write_all(&located.header.path)?;
    writeln!(
        out,
        " at {} len {}",
        located.data_offset, located.header.uncompressed_size
    )
}

/// Reports every header the scanner finds to `out`, one line each,
/// until the stream runs out.
///
/// Returns how many headers were found.
/// Running out of stream is the normal way this ends, and isn't an error.
pub fn report_headers<R: Read + Seek, W: Write>(
    scanner: &mut HeaderScanner<R>,
    out: &mut W,
) -> ScanResult<usize> {
    let mut count = 0;
    loop {
        match scanner.next_header() {
            Ok(located) => {
                write_entry(out, &located)?;
                count += 1;
            }
            Err(ScanError::EndOfStream) => return Ok(count),
            Err(e) => return Err(e),
        }
    }
}
