use memchr::{memchr, memchr2};

/// The result of scanning for at most one record.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ScanResult<'a> {
    /// A complete record was found.
    Record {
        /// The raw text of the record, without its newline marker and
        /// without a trailing carriage return.
        record: &'a [u8],
        /// The number of input bytes consumed, including the newline
        /// marker (when one was present).
        consumed: usize,
    },
    /// The input ended before a record boundary was found. The caller
    /// should provide more input (everything given so far, plus new bytes)
    /// and scan again. No bytes were consumed.
    NeedMore,
    /// There are no records left. This is only returned when the caller
    /// signals end of input and the input is empty.
    End,
}

/// A scanner that finds record boundaries in delimited text.
///
/// The scanner tracks a single bit of state while it walks the input:
/// whether it is inside a quoted region. Each quote byte flips that bit. A
/// newline marker found outside of quotes ends a record, while a newline
/// marker inside quotes is ordinary content. This is what permits fields
/// that span several lines.
///
/// A scanner holds only configuration, so it may be shared freely and a
/// single scan never depends on a previous one.
///
/// The newline marker may be longer than one byte. It only ends a record
/// when all of its bytes are present outside of quotes. When a buffer ends
/// in the middle of a marker, the scanner asks for more input.
#[derive(Clone, Debug)]
pub struct Scanner {
    newline: Vec<u8>,
    quote: u8,
}

impl Default for Scanner {
    fn default() -> Scanner {
        Scanner::new(b"\n", b'"')
    }
}

impl Scanner {
    /// Create a scanner for the given newline marker and quote byte.
    ///
    /// An empty newline marker never matches, which means the entire input
    /// is yielded as one record at the end of input.
    pub fn new(newline: &[u8], quote: u8) -> Scanner {
        Scanner { newline: newline.to_vec(), quote: quote }
    }

    /// The newline marker that separates records.
    pub fn newline(&self) -> &[u8] {
        &self.newline
    }

    /// The quote byte.
    pub fn quote(&self) -> u8 {
        self.quote
    }

    /// Scan `input` for the next complete record.
    ///
    /// `eof` indicates that no bytes follow `input`. When it is false and no
    /// boundary is found, `ScanResult::NeedMore` is returned. When it is
    /// true, any remaining bytes form the final record, which does not need
    /// a newline marker. An empty `input` at end of input yields
    /// `ScanResult::End`.
    pub fn scan<'a>(&self, input: &'a [u8], eof: bool) -> ScanResult<'a> {
        if eof && input.is_empty() {
            return ScanResult::End;
        }
        if let Some(i) = self.find_boundary(input) {
            return ScanResult::Record {
                record: drop_cr(&input[..i]),
                consumed: i + self.newline.len(),
            };
        }
        if eof {
            return ScanResult::Record {
                record: drop_cr(input),
                consumed: input.len(),
            };
        }
        ScanResult::NeedMore
    }

    /// Return the index of the first newline marker in `input` that is not
    /// inside a quoted region.
    ///
    /// The index points at the first byte of the marker.
    pub fn find_boundary(&self, input: &[u8]) -> Option<usize> {
        let lead = match self.newline.first() {
            None => return None,
            Some(&b) => b,
        };
        let mut quoted = false;
        let mut pos = 0;
        while pos < input.len() {
            let rest = &input[pos..];
            let i = pos
                + if quoted {
                    memchr(self.quote, rest)?
                } else {
                    memchr2(lead, self.quote, rest)?
                };
            if input[i] == self.quote {
                quoted = !quoted;
            } else if input[i..].starts_with(&self.newline) {
                return Some(i);
            }
            pos = i + 1;
        }
        None
    }
}

fn drop_cr(record: &[u8]) -> &[u8] {
    match record.split_last() {
        Some((&b'\r', rest)) => rest,
        _ => record,
    }
}

#[cfg(test)]
mod tests {
    use super::{ScanResult, Scanner};

    fn record(record: &str, consumed: usize) -> ScanResult {
        ScanResult::Record { record: record.as_bytes(), consumed: consumed }
    }

    macro_rules! boundary {
        ($name:ident, $data:expr, $index:expr, $first:expr) => {
            #[test]
            fn $name() {
                let scanner = Scanner::default();
                let data: &[u8] = $data.as_bytes();
                assert_eq!(scanner.find_boundary(data), $index);
                let got = match scanner.scan(data, true) {
                    ScanResult::Record { record, .. } => record,
                    ScanResult::End => &b""[..],
                    ScanResult::NeedMore => panic!("need more at eof"),
                };
                assert_eq!(got, $first.as_bytes());
            }
        };
    }

    boundary!(boundary_empty, "", None, "");
    boundary!(boundary_only_newline, "\n", Some(0), "");
    boundary!(boundary_plain, "01234\n", Some(5), "01234");
    boundary!(boundary_empty_quotes, "\"\"234\n", Some(5), "\"\"234");
    boundary!(boundary_quoted_unterminated, "\"234\n\"", None, "\"234\n\"");
    boundary!(boundary_quoted_newline, "\"234\n\"\n", Some(6), "\"234\n\"");
    boundary!(
        boundary_quoted_newline_more,
        "\"234\n\"\n12345",
        Some(6),
        "\"234\n\""
    );
    boundary!(
        boundary_quoted_delimiter,
        "\"Hel,lo\",World\nWelcome,Mars",
        Some(14),
        "\"Hel,lo\",World"
    );

    #[test]
    fn multi_line_quoted_field() {
        let scanner = Scanner::default();
        let data = b"Hello world,\"Column\n2\",\"\"\n";
        assert_eq!(
            scanner.scan(data, false),
            record("Hello world,\"Column\n2\",\"\"", data.len())
        );
    }

    #[test]
    fn two_records() {
        let scanner = Scanner::default();
        let data = b"\"Hel,lo\",World\nWelcome,Mars";
        assert_eq!(scanner.scan(data, false), record("\"Hel,lo\",World", 15));
        assert_eq!(scanner.scan(&data[15..], false), ScanResult::NeedMore);
        assert_eq!(scanner.scan(&data[15..], true), record("Welcome,Mars", 12));
        assert_eq!(scanner.scan(&data[27..], true), ScanResult::End);
    }

    #[test]
    fn need_more_inside_quotes() {
        let scanner = Scanner::default();
        assert_eq!(scanner.scan(b"a,\"b\nc", false), ScanResult::NeedMore);
        assert_eq!(scanner.scan(b"", false), ScanResult::NeedMore);
    }

    #[test]
    fn end_of_input() {
        let scanner = Scanner::default();
        assert_eq!(scanner.scan(b"", true), ScanResult::End);
    }

    #[test]
    fn crlf_stripped() {
        let scanner = Scanner::default();
        assert_eq!(scanner.scan(b"a,b\r\nc", false), record("a,b", 5));
        assert_eq!(scanner.scan(b"a,b\r", true), record("a,b", 4));
    }

    #[test]
    fn only_one_cr_stripped() {
        let scanner = Scanner::default();
        assert_eq!(scanner.scan(b"a\r\r\n", false), record("a\r", 4));
    }

    #[test]
    fn multi_byte_newline() {
        let scanner = Scanner::new(b"||", b'"');
        assert_eq!(scanner.find_boundary(b"a|b||c"), Some(3));
        assert_eq!(scanner.scan(b"a|b||c", false), record("a|b", 5));
        // A marker split across buffers must wait for the rest of it.
        assert_eq!(scanner.scan(b"a|b|", false), ScanResult::NeedMore);
        // At the end of input a dangling partial marker is content.
        assert_eq!(scanner.scan(b"a|b|", true), record("a|b|", 4));
        assert_eq!(scanner.find_boundary(b"\"x||y\"||z"), Some(6));
    }

    #[test]
    fn other_quote() {
        let scanner = Scanner::new(b"\n", b'\'');
        assert_eq!(scanner.find_boundary(b"'a\nb'\nc"), Some(5));
        assert_eq!(scanner.find_boundary(b"\"a\nb\"\nc"), Some(2));
    }

    #[test]
    fn empty_newline_never_matches() {
        let scanner = Scanner::new(b"", b'"');
        assert_eq!(scanner.find_boundary(b"a\nb"), None);
        assert_eq!(scanner.scan(b"a\nb", false), ScanResult::NeedMore);
        assert_eq!(scanner.scan(b"a\nb", true), record("a\nb", 3));
    }
}
