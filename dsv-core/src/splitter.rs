use core::fmt;
use core::ops::Range;

/// An error that occurs while splitting a record into fields.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SplitError {
    /// A byte other than the delimiter followed a closing quote.
    ///
    /// Quotes inside a quoted field cannot be escaped (not even by doubling
    /// them), so this always means the record is malformed.
    MalformedQuote {
        /// The offset of the offending byte in the record.
        offset: usize,
    },
}

impl SplitError {
    /// The byte offset in the record at which splitting failed.
    pub fn offset(&self) -> usize {
        match *self {
            SplitError::MalformedQuote { offset } => offset,
        }
    }
}

impl fmt::Display for SplitError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            SplitError::MalformedQuote { offset } => write!(
                f,
                "expected delimiter or end of record after closing quote \
                 at byte {} (escaped quotes are not supported)",
                offset
            ),
        }
    }
}

impl std::error::Error for SplitError {}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    /// The start of a field. This is the initial state.
    ColumnStart,
    /// Inside an open quote.
    QuotedInner,
    /// Just after a closing quote.
    SecondQuote,
    /// Inside an unquoted field.
    InnerCol,
}

/// Splits the raw text of one record into fields.
///
/// Splitting is driven by a small finite state machine. A quote is only
/// special at the very start of a field; a quoted field runs until the next
/// quote, which must then be followed by the delimiter or by the end of the
/// record. Inside quotes the delimiter and newline markers are ordinary
/// content.
///
/// Since quotes are never unescaped, every field is a contiguous sub-slice
/// of the record. The splitter therefore reports fields as ranges into the
/// record and never copies field data.
#[derive(Clone, Debug)]
pub struct Splitter {
    delimiter: Vec<u8>,
    quote: u8,
}

impl Default for Splitter {
    fn default() -> Splitter {
        Splitter::new(b",", b'"')
    }
}

impl Splitter {
    /// Create a splitter for the given delimiter and quote byte.
    ///
    /// An empty delimiter never matches, so every record has exactly one
    /// field.
    pub fn new(delimiter: &[u8], quote: u8) -> Splitter {
        Splitter { delimiter: delimiter.to_vec(), quote: quote }
    }

    /// The delimiter that separates fields.
    pub fn delimiter(&self) -> &[u8] {
        &self.delimiter
    }

    /// The quote byte.
    pub fn quote(&self) -> u8 {
        self.quote
    }

    /// Split `record` and write the bounds of each field to `fields`.
    ///
    /// `fields` is cleared first. On success, the number of fields is
    /// returned. A record with `k` delimiters outside of quotes always has
    /// `k + 1` fields; in particular, an empty record has one empty field.
    ///
    /// The quotes surrounding a quoted field are not part of its bounds.
    pub fn split_into(
        &self,
        record: &[u8],
        fields: &mut Vec<Range<usize>>,
    ) -> Result<usize, SplitError> {
        fields.clear();
        let mut state = State::ColumnStart;
        let (mut start, mut end) = (0, 0);
        let mut i = 0;
        while i < record.len() {
            let b = record[i];
            match state {
                State::ColumnStart => {
                    if self.is_delimiter_at(record, i) {
                        fields.push(start..end);
                        i += self.delimiter.len();
                        start = i;
                        end = i;
                        continue;
                    } else if b == self.quote {
                        start = i + 1;
                        end = i + 1;
                        state = State::QuotedInner;
                    } else {
                        end = i + 1;
                        state = State::InnerCol;
                    }
                }
                State::QuotedInner => {
                    if b == self.quote {
                        state = State::SecondQuote;
                    } else {
                        end = i + 1;
                    }
                }
                State::SecondQuote => {
                    if !self.is_delimiter_at(record, i) {
                        return Err(SplitError::MalformedQuote { offset: i });
                    }
                    fields.push(start..end);
                    i += self.delimiter.len();
                    start = i;
                    end = i;
                    state = State::ColumnStart;
                    continue;
                }
                State::InnerCol => {
                    if self.is_delimiter_at(record, i) {
                        fields.push(start..end);
                        i += self.delimiter.len();
                        start = i;
                        end = i;
                        state = State::ColumnStart;
                        continue;
                    }
                    end = i + 1;
                }
            }
            i += 1;
        }
        fields.push(start..end);
        Ok(fields.len())
    }

    /// Split `record` into owned fields.
    pub fn split(&self, record: &[u8]) -> Result<Vec<Vec<u8>>, SplitError> {
        let mut bounds = vec![];
        self.split_into(record, &mut bounds)?;
        Ok(bounds.into_iter().map(|r| record[r].to_vec()).collect())
    }

    #[inline]
    fn is_delimiter_at(&self, record: &[u8], i: usize) -> bool {
        !self.delimiter.is_empty() && record[i..].starts_with(&self.delimiter)
    }
}

/// Split one record of text into fields using `delimiter` and the default
/// quote, `"`.
///
/// ```
/// let fields = dsv_core::split("\"Hel,lo\",World", ",").unwrap();
/// assert_eq!(fields, vec!["Hel,lo", "World"]);
/// ```
pub fn split(record: &str, delimiter: &str) -> Result<Vec<String>, SplitError> {
    let splitter = Splitter::new(delimiter.as_bytes(), b'"');
    let mut bounds = vec![];
    splitter.split_into(record.as_bytes(), &mut bounds)?;
    // Field bounds always fall on ASCII quotes or on whole delimiters, so
    // they are valid char boundaries.
    Ok(bounds
        .into_iter()
        .map(|r| String::from_utf8_lossy(&record.as_bytes()[r]).into_owned())
        .collect())
}
