//! Streaming search for a byte signature.
//!
//! Reads go through one fixed-size buffer, so memory use doesn't depend on
//! the size of the file being scanned.

use std::io::{self, Read, Seek};

use memchr::memmem;

use crate::result::*;

/// How many bytes to pull from the source at a time
pub const CHUNK_SIZE: usize = 4096;

/// A signature found in the stream
#[derive(Debug)]
pub struct SignatureMatch<'a> {
    /// Stream offset of the signature's first byte
    pub offset: u64,
    /// Bytes right after the signature that were already read.
    /// Could be empty if the signature ended the read.
    pub trailing: &'a [u8],
}

/// Finds each occurrence of a signature in a `Read + Seek` stream.
pub struct SignatureScanner {
    finder: memmem::Finder<'static>,
    buffer: [u8; CHUNK_SIZE],
}

impl SignatureScanner {
    pub fn new(signature: &[u8]) -> Self {
        assert!(
            !signature.is_empty() && signature.len() < CHUNK_SIZE,
            "Signature must fit in a scan buffer"
        );
        Self {
            finder: memmem::Finder::new(signature).into_owned(),
            buffer: [0; CHUNK_SIZE],
        }
    }

    /// Reads forward from the stream's current position to the next signature.
    ///
    /// The stream is left wherever the last read ended,
    /// i.e., at the end of the returned `trailing` bytes.
    pub fn next_match<R: Read + Seek>(&mut self, reader: &mut R) -> ScanResult<SignatureMatch<'_>> {
        let signature_length = self.finder.needle().len();
        let carry = signature_length - 1;

        // Stream offset of buffer[0]
        let mut base = reader.stream_position()?;
        let mut filled = 0;

        loop {
            let count = read_some(reader, &mut self.buffer[filled..])?;
            if count == 0 {
                return Err(ScanError::EndOfStream);
            }
            let end = filled + count;

            if let Some(found) = self.finder.find(&self.buffer[..end]) {
                return Ok(SignatureMatch {
                    offset: base + found as u64,
                    trailing: &self.buffer[found + signature_length..end],
                });
            }

            // The last few bytes could be the front of a signature
            // split across reads. Keep them around.
            let keep = carry.min(end);
            self.buffer.copy_within(end - keep..end, 0);
            base += (end - keep) as u64;
            filled = keep;
        }
    }
}

/// `Read::read()`, but retried when interrupted by a signal.
pub(crate) fn read_some<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// Reads until `buf` is full or the stream ends, returning how much was read.
pub(crate) fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        let count = read_some(reader, &mut buf[total..])?;
        if count == 0 {
            break;
        }
        total += count;
    }
    Ok(total)
}
