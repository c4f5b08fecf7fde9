//! Code specific to the ZIP local file header.
//!
//! Only the local file header matters here.
//! The central directory and End of central directory record are never read,
//! since the whole point is finding entries they don't mention.
//!
//! Most comments quote PKWARE's [`APPNOTE.TXT`].
//!
//! [`APPNOTE.TXT`]: https://pkware.cachefly.net/webdocs/APPNOTE/APPNOTE-6.3.6.TXT

use std::borrow::Cow;

use camino::Utf8Path;
use chrono::{NaiveDate, NaiveDateTime};
use codepage_437::*;

/// Local file header magic number (0x04034b50, little-endian)
pub const LOCAL_FILE_HEADER_MAGIC: [u8; 4] = [b'P', b'K', 3, 4];

/// Size of the fixed-length fields between the magic number
/// and the file name.
pub const FIXED_FIELDS_SIZE: usize = 26;

/// Default upper bound on file name + extra field length.
///
/// The format allows 16-bit lengths, but real archives almost never
/// come close, and random bytes that happen to follow a stray magic
/// number almost always blow past it.
pub const DEFAULT_MAX_VARIABLE_LENGTH: u16 = 255;

/// The compression method used to store a file
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CompressionMethod {
    /// The file is uncompressed
    Stored,
    /// The file is [DEFLATE](https://en.wikipedia.org/wiki/DEFLATE)d.
    Deflate,
    /// Anything else. (The u16 is the raw format code.)
    Other(u16),
}

impl CompressionMethod {
    fn from_u16(u: u16) -> Self {
        match u {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            v => CompressionMethod::Other(v),
        }
    }
}

/// Limits a candidate header must satisfy to be believed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HeaderLimits {
    /// Maximum length of the file name, the extra field,
    /// and both of them together.
    pub max_variable_length: u16,
}

impl Default for HeaderLimits {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_VARIABLE_LENGTH)
    }
}

impl HeaderLimits {
    pub fn new(max_variable_length: u16) -> Self {
        Self {
            max_variable_length,
        }
    }

    /// Returns true if a header with the given name and extra field lengths
    /// is plausible.
    pub fn accepts(&self, path_length: u16, extra_field_length: u16) -> bool {
        let max = self.max_variable_length as usize;
        let path_length = path_length as usize;
        let extra_field_length = extra_field_length as usize;
        path_length <= max && extra_field_length <= max && path_length + extra_field_length <= max
    }

    /// How many bytes after the magic number we need to decode
    /// the largest header these limits accept.
    pub fn lookahead(&self) -> usize {
        FIXED_FIELDS_SIZE + self.max_variable_length as usize
    }
}

// Straight from the Rust docs:

/// Reads a little-endian u32 from the front of the provided slice, shrinking it.
fn read_u32(input: &mut &[u8]) -> u32 {
    let (int_bytes, rest) = input.split_at(std::mem::size_of::<u32>());
    *input = rest;
    u32::from_le_bytes(int_bytes.try_into().expect("less than four bytes for u32"))
}

/// Reads a little-endian u16 from the front of the provided slice, shrinking it.
fn read_u16(input: &mut &[u8]) -> u16 {
    let (int_bytes, rest) = input.split_at(std::mem::size_of::<u16>());
    *input = rest;
    u16::from_le_bytes(int_bytes.try_into().expect("less than two bytes for u16"))
}

/// Why some bytes following a magic number aren't a header we believe.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Implausible {
    /// The name and/or extra field lengths exceed the [`HeaderLimits`].
    TooLong {
        path_length: u16,
        extra_field_length: u16,
    },
    /// The stream ends before the header does.
    Truncated { available: usize },
}

/// The outcome of decoding the bytes after a magic number.
#[derive(Debug)]
pub enum Candidate<'a> {
    Plausible(LocalFileHeader<'a>),
    Implausible(Implausible),
}

/// Data from a local file header
///
/// Each file's actual contents is preceded by this header,
/// whether or not the central directory knows about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader<'a> {
    pub minimum_extract_version: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_modified_time: u16,
    pub last_modified_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    /// The raw file name. No attempt is made to decode it.
    pub path: Cow<'a, [u8]>,
    pub extra_field: Cow<'a, [u8]>,
}

impl<'a> LocalFileHeader<'a> {
    /// Decodes a header from the bytes immediately following its magic number.
    ///
    /// Anything past the extra field is ignored.
    pub fn parse(mut header: &'a [u8], limits: &HeaderLimits) -> Candidate<'a> {
        // 4.3.7  Local file header:
        //
        // local file header signature     4 bytes  (0x04034b50)
        // version needed to extract       2 bytes
        // general purpose bit flag        2 bytes
        // compression method              2 bytes
        // last mod file time              2 bytes
        // last mod file date              2 bytes
        // crc-32                          4 bytes
        // compressed size                 4 bytes
        // uncompressed size               4 bytes
        // file name length                2 bytes
        // extra field length              2 bytes
        //
        // file name (variable size)
        // extra field (variable size)
        let available = header.len();
        if available < FIXED_FIELDS_SIZE {
            return Candidate::Implausible(Implausible::Truncated { available });
        }
        let minimum_extract_version = read_u16(&mut header);
        let flags = read_u16(&mut header);
        let compression_method = read_u16(&mut header);
        let last_modified_time = read_u16(&mut header);
        let last_modified_date = read_u16(&mut header);
        let crc32 = read_u32(&mut header);
        let compressed_size = read_u32(&mut header);
        let uncompressed_size = read_u32(&mut header);
        let path_length = read_u16(&mut header);
        let extra_field_length = read_u16(&mut header);

        if !limits.accepts(path_length, extra_field_length) {
            return Candidate::Implausible(Implausible::TooLong {
                path_length,
                extra_field_length,
            });
        }
        let path_length = path_length as usize;
        let extra_field_length = extra_field_length as usize;
        if header.len() < path_length + extra_field_length {
            return Candidate::Implausible(Implausible::Truncated { available });
        }
        let (path, remaining) = header.split_at(path_length);
        let extra_field = &remaining[..extra_field_length];

        Candidate::Plausible(Self {
            minimum_extract_version,
            flags,
            compression_method,
            last_modified_time,
            last_modified_date,
            crc32,
            compressed_size,
            uncompressed_size,
            path: Cow::Borrowed(path),
            extra_field: Cow::Borrowed(extra_field),
        })
    }

    /// Bytes the header occupies after its magic number.
    pub fn size_in_file(&self) -> usize {
        FIXED_FIELDS_SIZE + self.path.len() + self.extra_field.len()
    }

    pub fn compression(&self) -> CompressionMethod {
        CompressionMethod::from_u16(self.compression_method)
    }

    /// Extracts the "is this text UTF-8?" bit from the flags.
    ///
    /// If false, the name is assumed to be CP437.
    pub fn is_utf8(&self) -> bool {
        // Bit 11: Language encoding flag (EFS).  If this bit is set,
        //         the filename and comment fields for this file
        //         MUST be encoded using UTF-8. (see APPENDIX D)
        self.flags & (1 << 11) != 0
    }

    /// Extracts the "is this file encrypted?" bit from the flags.
    pub fn is_encrypted(&self) -> bool {
        // Bit 0: If set, indicates that the file is encrypted
        self.flags & 1 != 0
    }

    /// True if the sizes and CRC were written after the data instead,
    /// in which case this header's values are usually zero.
    pub fn has_data_descriptor(&self) -> bool {
        // Bit 3: If this bit is set, the fields crc-32, compressed
        //        size and uncompressed size are set to zero in the
        //        local header.  The correct values are put in the
        //        data descriptor immediately following the compressed
        //        data.
        self.flags & (1 << 3) != 0
    }

    /// The modification time, if the DOS fields hold a real date and time.
    pub fn last_modified(&self) -> Option<NaiveDateTime> {
        parse_msdos(self.last_modified_time, self.last_modified_date)
    }

    /// The file name decoded for humans: UTF-8 if the flags say so,
    /// CP437 otherwise.
    pub fn display_path(&self) -> Cow<'_, Utf8Path> {
        let str_cow: Cow<str> = if self.is_utf8() {
            String::from_utf8_lossy(&self.path)
        } else {
            Cow::borrow_from_cp437(&self.path[..], &CP437_CONTROL)
        };
        match str_cow {
            Cow::Borrowed(s) => Cow::Borrowed(Utf8Path::new(s)),
            Cow::Owned(s) => Cow::Owned(s.into()),
        }
    }

    pub fn into_owned(self) -> LocalFileHeader<'static> {
        LocalFileHeader {
            path: Cow::Owned(self.path.into_owned()),
            extra_field: Cow::Owned(self.extra_field.into_owned()),
            ..self
        }
    }
}

fn parse_msdos(time: u16, date: u16) -> Option<NaiveDateTime> {
    let seconds = (0b0000_0000_0001_1111 & time) as u32 * 2; // MSDOS uses 2-second precision
    let minutes = (0b0000_0111_1110_0000 & time) as u32 >> 5;
    let hours = (0b1111_1000_0000_0000 & time) as u32 >> 11;

    let days = (0b0000_0000_0001_1111 & date) as u32;
    let months = (0b0000_0001_1110_0000 & date) as u32 >> 5;
    // MSDOS uses years since 1980; Always interpreted as a positive value
    let years = ((0b1111_1110_0000_0000 & date) >> 9) as i32 + 1980;

    NaiveDate::from_ymd_opt(years, months, days)?.and_hms_opt(hours, minutes, seconds)
}

#[cfg(test)]
mod test {
    use super::*;

    #[allow(clippy::too_many_arguments)]
    fn header_body(
        version: u16,
        flags: u16,
        method: u16,
        time: u16,
        date: u16,
        crc32: u32,
        compressed_size: u32,
        uncompressed_size: u32,
        path: &[u8],
        extra_field: &[u8],
    ) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&version.to_le_bytes());
        body.extend_from_slice(&flags.to_le_bytes());
        body.extend_from_slice(&method.to_le_bytes());
        body.extend_from_slice(&time.to_le_bytes());
        body.extend_from_slice(&date.to_le_bytes());
        body.extend_from_slice(&crc32.to_le_bytes());
        body.extend_from_slice(&compressed_size.to_le_bytes());
        body.extend_from_slice(&uncompressed_size.to_le_bytes());
        body.extend_from_slice(&(path.len() as u16).to_le_bytes());
        body.extend_from_slice(&(extra_field.len() as u16).to_le_bytes());
        body.extend_from_slice(path);
        body.extend_from_slice(extra_field);
        body
    }

    fn plausible(candidate: Candidate<'_>) -> LocalFileHeader<'_> {
        match candidate {
            Candidate::Plausible(header) => header,
            Candidate::Implausible(why) => panic!("Expected a header, got {:?}", why),
        }
    }

    #[test]
    fn every_field_survives() {
        let body = header_body(
            0x0314,
            0x0808,
            8,
            0xbeef,
            0x5a5a,
            0xdeadbeef,
            0x0102_0304,
            0xa0b0_c0d0,
            b"dir/hidden.bin",
            &[0x55, 0x54, 0x05, 0x00, 1, 2, 3, 4, 5],
        );
        let header = plausible(LocalFileHeader::parse(&body, &HeaderLimits::default()));

        assert_eq!(header.minimum_extract_version, 0x0314);
        assert_eq!(header.flags, 0x0808);
        assert_eq!(header.compression_method, 8);
        assert_eq!(header.last_modified_time, 0xbeef);
        assert_eq!(header.last_modified_date, 0x5a5a);
        assert_eq!(header.crc32, 0xdeadbeef);
        assert_eq!(header.compressed_size, 0x0102_0304);
        assert_eq!(header.uncompressed_size, 0xa0b0_c0d0);
        assert_eq!(&*header.path, b"dir/hidden.bin");
        assert_eq!(&*header.extra_field, &[0x55, 0x54, 0x05, 0x00, 1, 2, 3, 4, 5]);
        assert_eq!(header.size_in_file(), 26 + 14 + 9);
        assert_eq!(header.compression(), CompressionMethod::Deflate);
        assert!(header.is_utf8());
        assert!(header.has_data_descriptor());
        assert!(!header.is_encrypted());
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut body = header_body(20, 0, 0, 0, 0, 0, 3, 3, b"a", b"");
        body.extend_from_slice(b"abcPK\x03\x04");
        let header = plausible(LocalFileHeader::parse(&body, &HeaderLimits::default()));
        assert_eq!(&*header.path, b"a");
        assert_eq!(header.size_in_file(), 27);
    }

    #[test]
    fn limits() {
        let limits = HeaderLimits::default();
        assert_eq!(limits.lookahead(), 26 + 255);
        assert!(limits.accepts(255, 0));
        assert!(limits.accepts(0, 255));
        assert!(limits.accepts(200, 55));
        assert!(!limits.accepts(200, 56));
        assert!(!limits.accepts(256, 0));
        assert!(!limits.accepts(0, u16::MAX));

        let roomy = HeaderLimits::new(1000);
        assert!(roomy.accepts(600, 400));
        assert!(!roomy.accepts(600, 401));
    }

    #[test]
    fn too_long() {
        let path = vec![b'x'; 200];
        let extra = vec![0; 100];
        let body = header_body(20, 0, 0, 0, 0, 0, 0, 0, &path, &extra);
        match LocalFileHeader::parse(&body, &HeaderLimits::default()) {
            Candidate::Implausible(Implausible::TooLong {
                path_length,
                extra_field_length,
            }) => {
                assert_eq!(path_length, 200);
                assert_eq!(extra_field_length, 100);
            }
            other => panic!("Expected a rejection, got {:?}", other),
        }

        // Fine with a higher limit
        let header = plausible(LocalFileHeader::parse(&body, &HeaderLimits::new(300)));
        assert_eq!(header.path.len(), 200);
        assert_eq!(header.extra_field.len(), 100);
    }

    #[test]
    fn truncated() {
        let body = header_body(20, 0, 0, 0, 0, 0, 0, 0, b"name.txt", b"");

        for cut in [0, 1, 25] {
            match LocalFileHeader::parse(&body[..cut], &HeaderLimits::default()) {
                Candidate::Implausible(Implausible::Truncated { available }) => {
                    assert_eq!(available, cut)
                }
                other => panic!("Expected truncation at {}, got {:?}", cut, other),
            }
        }

        // Fixed fields fit, the name doesn't.
        match LocalFileHeader::parse(&body[..30], &HeaderLimits::default()) {
            Candidate::Implausible(Implausible::Truncated { available: 30 }) => {}
            other => panic!("Expected truncation, got {:?}", other),
        }

        // Exactly enough is enough.
        plausible(LocalFileHeader::parse(&body, &HeaderLimits::default()));
    }

    #[test]
    fn timestamps() {
        // 2020-06-15 13:45:30
        let date = (40 << 9) | (6 << 5) | 15;
        let time = (13 << 11) | (45 << 5) | 15;
        let body = header_body(20, 0, 0, time, date, 0, 0, 0, b"t", b"");
        let header = plausible(LocalFileHeader::parse(&body, &HeaderLimits::default()));
        let expected = NaiveDate::from_ymd_opt(2020, 6, 15)
            .unwrap()
            .and_hms_opt(13, 45, 30)
            .unwrap();
        assert_eq!(header.last_modified(), Some(expected));

        // Month zero is what random junk tends to look like.
        let body = header_body(20, 0, 0, 0, 0, 0, 0, 0, b"t", b"");
        let header = plausible(LocalFileHeader::parse(&body, &HeaderLimits::default()));
        assert_eq!(header.last_modified(), None);
    }

    #[test]
    fn display_paths() {
        let body = header_body(20, 0, 0, 0, 0, 0, 0, 0, &[0x80, b'a'], b"");
        let header = plausible(LocalFileHeader::parse(&body, &HeaderLimits::default()));
        assert_eq!(header.display_path(), Utf8Path::new("Ça"));

        let body = header_body(20, 1 << 11, 0, 0, 0, 0, 0, 0, "dir/é".as_bytes(), b"");
        let header = plausible(LocalFileHeader::parse(&body, &HeaderLimits::default()));
        let path = header.display_path();
        assert_eq!(path, Utf8Path::new("dir/é"));
        assert_eq!(path.file_name(), Some("é"));
    }

    #[test]
    fn into_owned_keeps_everything() {
        let body = header_body(20, 0, 0, 1, 2, 3, 4, 5, b"keep", b"me");
        let borrowed = plausible(LocalFileHeader::parse(&body, &HeaderLimits::default()));
        let owned: LocalFileHeader<'static> = borrowed.clone().into_owned();
        assert_eq!(borrowed, owned);
    }
}
