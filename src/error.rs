use std::error;
use std::fmt;
use std::io;
use std::result;

use dsv_core::SplitError;

use crate::decoder::Position;
#[cfg(feature = "serde")]
use crate::deserializer::DeserializeError;
use crate::record::FieldError;

/// A type alias for `Result<T, dsv::Error>`.
pub type Result<T> = result::Result<T, Error>;

/// An error that can occur when processing delimited data.
///
/// Errors fall into two groups. Some leave the underlying stream in a state
/// where reading more records makes sense, e.g., a record with the wrong
/// number of fields. Others do not, e.g., an I/O error or a record whose
/// quoting is malformed. Use `is_fatal` to tell them apart.
#[derive(Debug)]
pub enum Error {
    /// An I/O error that occurred while reading or writing data.
    Io(io::Error),
    /// A closing quote was followed by something other than a delimiter or
    /// the end of the record.
    MalformedQuote {
        /// The position of the record in which this error occurred.
        pos: Position,
        /// The underlying split error, which carries the byte offset of the
        /// offending byte within the record.
        err: SplitError,
    },
    /// The number of fields in a record did not match the number of slots
    /// in the record type it was decoded into.
    SchemaMismatch {
        /// The position of the offending record.
        pos: Position,
        /// The number of slots in the target record type.
        expected: u64,
        /// The number of fields in the record.
        len: u64,
    },
    /// A single field could not be converted to the type of its slot.
    Field {
        /// The position of the record containing the field.
        pos: Position,
        /// The index of the field, starting at 0.
        field: u64,
        /// The underlying conversion error.
        err: FieldError,
    },
    /// A field was not valid UTF-8.
    Utf8 {
        /// The position of the record in which this error occurred, if
        /// available.
        pos: Option<Position>,
        /// The corresponding UTF-8 error.
        err: Utf8Error,
    },
    /// An error that occurred while deserializing a record with serde.
    #[cfg(feature = "serde")]
    Deserialize {
        /// The position of the record in which this error occurred, if
        /// available.
        pos: Option<Position>,
        /// The deserialization error.
        err: DeserializeError,
    },
    /// An error that occurred while serializing a value with serde.
    Serialize(String),
    /// A decoder or encoder was configured in a way that cannot work, e.g.,
    /// with an empty delimiter.
    Config(String),
}

impl Error {
    /// Returns true if this error leaves the stream in a state where no
    /// further records can be trusted.
    ///
    /// I/O errors and malformed quoting are fatal. All other errors are
    /// confined to a single record.
    pub fn is_fatal(&self) -> bool {
        match *self {
            Error::Io(_) | Error::MalformedQuote { .. } => true,
            _ => false,
        }
    }

    /// The position of the record this error refers to, if one is known.
    pub fn position(&self) -> Option<&Position> {
        match *self {
            Error::MalformedQuote { ref pos, .. }
            | Error::SchemaMismatch { ref pos, .. }
            | Error::Field { ref pos, .. } => Some(pos),
            Error::Utf8 { ref pos, .. } => pos.as_ref(),
            #[cfg(feature = "serde")]
            Error::Deserialize { ref pos, .. } => pos.as_ref(),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Io(ref err) => Some(err),
            Error::MalformedQuote { ref err, .. } => Some(err),
            Error::Field { ref err, .. } => Some(err),
            Error::Utf8 { ref err, .. } => Some(err),
            #[cfg(feature = "serde")]
            Error::Deserialize { ref err, .. } => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Io(ref err) => err.fmt(f),
            Error::MalformedQuote { ref pos, ref err } => write!(
                f,
                "parse error: record {} (byte {}, line {}): {}",
                pos.record(),
                pos.byte(),
                pos.line(),
                err
            ),
            Error::SchemaMismatch { ref pos, expected, len } => write!(
                f,
                "schema error: record {} (byte {}, line {}): \
                 found record with {} fields, but the record type \
                 has {} fields",
                pos.record(),
                pos.byte(),
                pos.line(),
                len,
                expected
            ),
            Error::Field { ref pos, field, ref err } => write!(
                f,
                "field error: record {} (line {}, field {}): {}",
                pos.record(),
                pos.line(),
                field,
                err
            ),
            Error::Utf8 { pos: None, ref err } => {
                write!(f, "parse error: field {}: {}", err.field(), err)
            }
            Error::Utf8 { pos: Some(ref pos), ref err } => write!(
                f,
                "parse error: record {} \
                 (byte {}, line {}, field: {}): {}",
                pos.record(),
                pos.byte(),
                pos.line(),
                err.field(),
                err
            ),
            #[cfg(feature = "serde")]
            Error::Deserialize { pos: None, ref err } => {
                write!(f, "deserialize error: {}", err)
            }
            #[cfg(feature = "serde")]
            Error::Deserialize { pos: Some(ref pos), ref err } => write!(
                f,
                "deserialize error: record {} (byte {}, line {}): {}",
                pos.record(),
                pos.byte(),
                pos.line(),
                err
            ),
            Error::Serialize(ref msg) => write!(f, "serialize error: {}", msg),
            Error::Config(ref msg) => write!(f, "config error: {}", msg),
        }
    }
}

/// A UTF-8 validation error for a single field.
///
/// The error includes the index of the field that failed validation, and the
/// last byte at which valid UTF-8 was verified.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Utf8Error {
    /// The field index of a record in which UTF-8 validation failed.
    field: usize,
    /// The index into the given field up to which valid UTF-8 was verified.
    valid_up_to: usize,
}

/// Create a new UTF-8 error.
pub(crate) fn new_utf8_error(field: usize, valid_up_to: usize) -> Utf8Error {
    Utf8Error { field: field, valid_up_to: valid_up_to }
}

impl Utf8Error {
    /// The field index of a record in which UTF-8 validation failed.
    pub fn field(&self) -> usize {
        self.field
    }
    /// The index into the given field up to which valid UTF-8 was verified.
    pub fn valid_up_to(&self) -> usize {
        self.valid_up_to
    }
}

impl fmt::Display for Utf8Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "invalid utf-8: invalid UTF-8 in field {} near byte index {}",
            self.field, self.valid_up_to
        )
    }
}

impl error::Error for Utf8Error {}
