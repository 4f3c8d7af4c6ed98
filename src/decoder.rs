use std::fs::File;
use std::io;
use std::marker::PhantomData;
use std::ops::Range;
use std::path::Path;

use bstr::{BStr, ByteSlice};
use dsv_core::{ScanResult, Scanner, Splitter};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::record::Record;
use crate::row::Row;

const DEFAULT_BUF_SIZE: usize = 8 * (1 << 10);

/// Builds a decoder with various configuration knobs.
///
/// This builder can be used to tweak the field delimiter, newline marker
/// and more. Once a `Decoder` is built, its configuration cannot be
/// changed.
#[derive(Clone, Debug)]
pub struct DecoderBuilder {
    delimiter: Vec<u8>,
    newline: Vec<u8>,
    quote: u8,
    has_headers: bool,
    capacity: usize,
}

impl Default for DecoderBuilder {
    fn default() -> DecoderBuilder {
        DecoderBuilder {
            delimiter: b",".to_vec(),
            newline: b"\n".to_vec(),
            quote: b'"',
            has_headers: false,
            capacity: DEFAULT_BUF_SIZE,
        }
    }
}

impl DecoderBuilder {
    /// Create a new builder with a default configuration.
    pub fn new() -> DecoderBuilder {
        DecoderBuilder::default()
    }

    /// Build a decoder from this configuration that reads from `rdr`.
    ///
    /// This returns an error if the configuration is unusable. See
    /// [`Error::Config`](crate::Error::Config).
    pub fn from_reader<R: io::Read>(&self, rdr: R) -> Result<Decoder<R>> {
        self.validate()?;
        Ok(Decoder::new(self, rdr))
    }

    /// Build a decoder from this configuration that reads from the file at
    /// `path`.
    pub fn from_path<P: AsRef<Path>>(&self, path: P) -> Result<Decoder<File>> {
        self.validate()?;
        Ok(Decoder::new(self, File::open(path)?))
    }

    /// The field delimiter. It may be longer than one byte.
    ///
    /// The default is `","`.
    pub fn delimiter<D: AsRef<[u8]>>(&mut self, delimiter: D) -> &mut DecoderBuilder {
        self.delimiter = delimiter.as_ref().to_vec();
        self
    }

    /// The newline marker that separates records. It may be longer than one
    /// byte.
    ///
    /// Whatever the marker, a single `\r` right before it is dropped from
    /// the record. The default is `"\n"`, which therefore reads both LF and
    /// CRLF terminated data.
    pub fn newline<N: AsRef<[u8]>>(&mut self, newline: N) -> &mut DecoderBuilder {
        self.newline = newline.as_ref().to_vec();
        self
    }

    /// The quote byte.
    ///
    /// The default is `b'"'`.
    pub fn quote(&mut self, quote: u8) -> &mut DecoderBuilder {
        self.quote = quote;
        self
    }

    /// Whether to treat the first record as a row of header labels.
    ///
    /// When enabled, the first record is never returned by `advance`.
    /// Instead, it is available from `headers` and, with the `serde`
    /// feature, used to match fields to struct members by name.
    ///
    /// This is disabled by default.
    pub fn has_headers(&mut self, yes: bool) -> &mut DecoderBuilder {
        self.has_headers = yes;
        self
    }

    /// The initial capacity of the read buffer, in bytes.
    ///
    /// The buffer grows as needed to hold a single record, so this only
    /// tunes performance.
    pub fn buffer_capacity(&mut self, capacity: usize) -> &mut DecoderBuilder {
        self.capacity = capacity;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        validate_markers(&self.delimiter, &self.newline, self.quote)
    }
}

/// Check a delimiter, newline marker and quote for consistency.
pub(crate) fn validate_markers(
    delimiter: &[u8],
    newline: &[u8],
    quote: u8,
) -> Result<()> {
    if delimiter.is_empty() {
        return Err(Error::Config("delimiter must not be empty".into()));
    }
    if newline.is_empty() {
        return Err(Error::Config("newline marker must not be empty".into()));
    }
    if delimiter == newline {
        return Err(Error::Config(format!(
            "delimiter and newline marker must differ (both are {:?})",
            delimiter.as_bstr()
        )));
    }
    if delimiter.contains(&quote) || newline.contains(&quote) {
        return Err(Error::Config(format!(
            "quote {:?} must not occur in the delimiter or newline marker",
            [quote].as_bstr()
        )));
    }
    Ok(())
}

/// The position of a record in delimited data.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Position {
    byte: u64,
    line: u64,
    record: u64,
}

impl Default for Position {
    fn default() -> Position {
        Position::new()
    }
}

impl Position {
    /// Returns a new position initialized to the start value.
    pub fn new() -> Position {
        Position { byte: 0, line: 1, record: 0 }
    }

    /// The byte offset, starting at `0`, of this position.
    pub fn byte(&self) -> u64 {
        self.byte
    }

    /// The line number, starting at `1`, of this position.
    ///
    /// Lines are counted by occurrences of `\n`, whatever the configured
    /// newline marker is.
    pub fn line(&self) -> u64 {
        self.line
    }

    /// The record index, starting with the first record at `0`.
    ///
    /// A header row counts as a record.
    pub fn record(&self) -> u64 {
        self.record
    }

    /// Set the byte offset of this position.
    pub fn set_byte(&mut self, byte: u64) -> &mut Position {
        self.byte = byte;
        self
    }

    /// Set the line number of this position.
    pub fn set_line(&mut self, line: u64) -> &mut Position {
        self.line = line;
        self
    }

    /// Set the record index of this position.
    pub fn set_record(&mut self, record: u64) -> &mut Position {
        self.record = record;
        self
    }
}

/// A pull based decoder for delimited data.
///
/// Call `advance` to move to the next record, then `decode_into`, `fields`
/// or (with the `serde` feature) `deserialize` to get at its contents.
/// The raw text of the current record is kept until the next call to
/// `advance`.
///
/// A decoder reads from its source in large chunks, so it does not need to
/// be wrapped in a `BufReader`.
///
/// # Example
///
/// ```
/// #[derive(Debug, Default)]
/// struct Greeting {
///     hello: String,
///     who: String,
/// }
///
/// dsv::impl_record!(Greeting { hello => "hello", who => "who" });
///
/// let data = "\"Hel,lo\",World\nWelcome,Mars";
/// let mut dec = dsv::Decoder::from_reader(data.as_bytes());
/// let mut greeting = Greeting::default();
///
/// assert!(dec.advance().unwrap());
/// dec.decode_into(&mut greeting).unwrap();
/// assert_eq!(greeting.hello, "Hel,lo");
///
/// assert!(dec.advance().unwrap());
/// dec.decode_into(&mut greeting).unwrap();
/// assert_eq!(greeting.who, "Mars");
///
/// assert!(!dec.advance().unwrap());
/// ```
#[derive(Debug)]
pub struct Decoder<R> {
    rdr: R,
    scanner: Scanner,
    splitter: Splitter,
    /// Bytes read from `rdr`; `buf[start..end]` is not yet consumed.
    buf: Vec<u8>,
    start: usize,
    end: usize,
    eof: bool,
    /// The raw text of the current record.
    raw: Vec<u8>,
    /// Field bounds in `raw`, valid when `nfields` is set.
    bounds: Vec<Range<usize>>,
    nfields: Option<usize>,
    /// The position of the current record.
    pos: Position,
    /// The position at which the next record starts.
    next_pos: Position,
    has_headers: bool,
    headers: Option<Vec<String>>,
    headers_done: bool,
}

impl<R: io::Read> Decoder<R> {
    /// Create a new decoder with a default configuration for the given
    /// reader.
    ///
    /// To customize the delimiter, newline marker or quote, use a
    /// `DecoderBuilder`.
    pub fn from_reader(rdr: R) -> Decoder<R> {
        Decoder::new(&DecoderBuilder::new(), rdr)
    }

    fn new(builder: &DecoderBuilder, rdr: R) -> Decoder<R> {
        Decoder {
            rdr: rdr,
            scanner: Scanner::new(&builder.newline, builder.quote),
            splitter: Splitter::new(&builder.delimiter, builder.quote),
            buf: vec![0; builder.capacity.max(1)],
            start: 0,
            end: 0,
            eof: false,
            raw: vec![],
            bounds: vec![],
            nfields: None,
            pos: Position::new(),
            next_pos: Position::new(),
            has_headers: builder.has_headers,
            headers: None,
            headers_done: false,
        }
    }

    /// Move to the next record.
    ///
    /// This returns `true` if a record was found and `false` at the end of
    /// the data. End of data is not an error. If a header row is
    /// configured and has not been read yet, it is read first.
    ///
    /// The record is not split into fields until its contents are asked
    /// for, so malformed quoting is reported by `decode_into`, `fields` and
    /// friends rather than here.
    pub fn advance(&mut self) -> Result<bool> {
        self.read_headers()?;
        self.read_raw()
    }

    /// Split the current record and assign its fields, in order, to the
    /// slots of `target`.
    ///
    /// This fails with `Error::SchemaMismatch` when the number of fields
    /// differs from the number of slots, and with `Error::MalformedQuote`
    /// when the record cannot be split. If a single field cannot be
    /// converted, `Error::Field` is returned and the slots before it have
    /// already been assigned.
    pub fn decode_into<T: Record + ?Sized>(&mut self, target: &mut T) -> Result<()> {
        let n = self.split_raw()?;
        let mut slots = target.slots();
        if slots.len() != n {
            return Err(Error::SchemaMismatch {
                pos: self.pos.clone(),
                expected: slots.len() as u64,
                len: n as u64,
            });
        }
        let row = Row::new(&self.raw, &self.bounds);
        for (i, slot) in slots.iter_mut().enumerate() {
            let field = row.get_str(i).map_err(|err| Error::Utf8 {
                pos: Some(self.pos.clone()),
                err: err,
            })?;
            slot.set_field(field.unwrap_or_default()).map_err(|err| {
                Error::Field { pos: self.pos.clone(), field: i as u64, err: err }
            })?;
        }
        Ok(())
    }

    /// Split the current record and return its fields.
    pub fn fields(&mut self) -> Result<Row<'_>> {
        self.split_raw()?;
        Ok(Row::new(&self.raw, &self.bounds))
    }

    /// The raw text of the current record, for diagnostics.
    ///
    /// This excludes the newline marker and a trailing `\r`. Before the
    /// first call to `advance`, it is empty.
    pub fn raw_record(&self) -> &BStr {
        self.raw.as_bstr()
    }

    /// The position of the current record.
    pub fn position(&self) -> &Position {
        &self.pos
    }

    /// Return the header labels, reading them first if necessary.
    ///
    /// This returns `None` when the decoder was not configured with
    /// `has_headers` or when the data is empty.
    pub fn headers(&mut self) -> Result<Option<&[String]>> {
        self.read_headers()?;
        Ok(self.headers.as_deref())
    }

    /// Returns an iterator that decodes each remaining record into a fresh
    /// value of type `T`.
    ///
    /// The iterator stops after the first fatal error (see
    /// [`Error::is_fatal`](crate::Error::is_fatal)). Other errors are
    /// yielded and iteration continues with the next record.
    pub fn records<T: Record + Default>(&mut self) -> DecodedRecords<'_, R, T> {
        DecodedRecords { dec: self, done: false, _phantom: PhantomData }
    }

    /// Returns a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.rdr
    }

    /// Returns a mutable reference to the underlying reader.
    ///
    /// Reading from it directly will confuse the decoder.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.rdr
    }

    /// Unwraps this decoder, returning the underlying reader.
    ///
    /// Any data that was read but not yet decoded is lost.
    pub fn into_inner(self) -> R {
        self.rdr
    }

    fn read_headers(&mut self) -> Result<()> {
        if self.headers_done {
            return Ok(());
        }
        self.headers_done = true;
        if !self.has_headers || !self.read_raw()? {
            return Ok(());
        }
        self.split_raw()?;
        let labels = Row::new(&self.raw, &self.bounds).to_strings().map_err(
            |err| Error::Utf8 { pos: Some(self.pos.clone()), err: err },
        )?;
        self.headers = Some(labels);
        Ok(())
    }

    fn read_raw(&mut self) -> Result<bool> {
        self.nfields = None;
        self.bounds.clear();
        loop {
            let input = &self.buf[self.start..self.end];
            match self.scanner.scan(input, self.eof) {
                ScanResult::Record { record, consumed } => {
                    self.raw.clear();
                    self.raw.extend_from_slice(record);
                    let lines = memchr_count(b'\n', &input[..consumed]);
                    self.pos = self.next_pos.clone();
                    let next = &mut self.next_pos;
                    next.byte += consumed as u64;
                    next.line += lines as u64;
                    next.record += 1;
                    self.start += consumed;
                    trace!(
                        record = self.pos.record,
                        byte = self.pos.byte,
                        len = self.raw.len(),
                        "found record"
                    );
                    return Ok(true);
                }
                ScanResult::NeedMore => self.fill()?,
                ScanResult::End => {
                    self.raw.clear();
                    debug!(records = self.next_pos.record, "end of data");
                    return Ok(false);
                }
            }
        }
    }

    /// Read more data, growing the buffer if the unconsumed data fills it.
    fn fill(&mut self) -> Result<()> {
        if self.start > 0 {
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }
        if self.end == self.buf.len() {
            let len = self.buf.len() * 2;
            trace!(from = self.buf.len(), to = len, "growing read buffer");
            self.buf.resize(len, 0);
        }
        loop {
            match self.rdr.read(&mut self.buf[self.end..]) {
                Ok(0) => {
                    self.eof = true;
                    return Ok(());
                }
                Ok(n) => {
                    self.end += n;
                    return Ok(());
                }
                Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(Error::Io(err)),
            }
        }
    }

    fn split_raw(&mut self) -> Result<usize> {
        if let Some(n) = self.nfields {
            return Ok(n);
        }
        match self.splitter.split_into(&self.raw, &mut self.bounds) {
            Ok(n) => {
                self.nfields = Some(n);
                Ok(n)
            }
            Err(err) => {
                self.bounds.clear();
                Err(Error::MalformedQuote { pos: self.pos.clone(), err: err })
            }
        }
    }
}

#[cfg(feature = "serde")]
impl<R: io::Read> Decoder<R> {
    /// Deserialize the current record into a value of type `D`.
    ///
    /// When the decoder has read a header row, struct members and map keys
    /// are matched to fields by header label. Otherwise, fields are
    /// matched by position.
    ///
    /// ```
    /// use serde::Deserialize;
    ///
    /// #[derive(Debug, Deserialize, PartialEq)]
    /// struct Row {
    ///     city: String,
    ///     pop: Option<u64>,
    /// }
    ///
    /// let data = "pop,city\n9000,Boston\n,\"Oslo, Norway\"\n";
    /// let mut dec = dsv::DecoderBuilder::new()
    ///     .has_headers(true)
    ///     .from_reader(data.as_bytes())
    ///     .unwrap();
    /// let mut rows = vec![];
    /// while dec.advance().unwrap() {
    ///     rows.push(dec.deserialize::<Row>().unwrap());
    /// }
    /// assert_eq!(rows[0], Row { city: "Boston".into(), pop: Some(9000) });
    /// assert_eq!(rows[1], Row { city: "Oslo, Norway".into(), pop: None });
    /// ```
    pub fn deserialize<D>(&mut self) -> Result<D>
    where
        D: serde::de::DeserializeOwned,
    {
        self.split_raw()?;
        let row = Row::new(&self.raw, &self.bounds);
        let fields = row.to_strs().map_err(|err| Error::Utf8 {
            pos: Some(self.pos.clone()),
            err: err,
        })?;
        crate::deserializer::deserialize_fields(
            &fields,
            self.headers.as_deref(),
        )
        .map_err(|err| Error::Deserialize { pos: Some(self.pos.clone()), err: err })
    }
}

/// An iterator over records decoded into values of type `T`.
///
/// The lifetime parameter `'d` refers to the lifetime of the decoder.
#[derive(Debug)]
pub struct DecodedRecords<'d, R: 'd, T> {
    dec: &'d mut Decoder<R>,
    done: bool,
    _phantom: PhantomData<T>,
}

impl<'d, R: io::Read, T: Record + Default> Iterator for DecodedRecords<'d, R, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        if self.done {
            return None;
        }
        let res = match self.dec.advance() {
            Ok(false) => {
                self.done = true;
                return None;
            }
            Ok(true) => {
                let mut record = T::default();
                self.dec.decode_into(&mut record).map(|()| record)
            }
            Err(err) => Err(err),
        };
        if let Err(ref err) = res {
            self.done = err.is_fatal();
        }
        Some(res)
    }
}

fn memchr_count(needle: u8, haystack: &[u8]) -> usize {
    memchr::memchr_iter(needle, haystack).count()
}

#[cfg(test)]
mod tests {
    use std::io;

    use dsv_core::SplitError;

    use super::{Decoder, DecoderBuilder, Position};
    use crate::error::Error;

    #[derive(Debug, Default, PartialEq)]
    struct Pair {
        field1: String,
        field2: String,
    }

    crate::impl_record!(Pair { field1 => "field1", field2 => "field2" });

    fn pair(a: &str, b: &str) -> Pair {
        Pair { field1: a.into(), field2: b.into() }
    }

    fn decode(data: &str) -> Vec<Pair> {
        let mut dec = Decoder::from_reader(data.as_bytes());
        let mut got = vec![];
        while dec.advance().unwrap() {
            let mut p = Pair::default();
            dec.decode_into(&mut p).unwrap();
            got.push(p);
        }
        got
    }

    #[test]
    fn one_simple_record() {
        assert_eq!(decode("Hello,World"), vec![pair("Hello", "World")]);
    }

    #[test]
    fn two_simple_records() {
        assert_eq!(
            decode("Hello,World\nWelcome,Mars"),
            vec![pair("Hello", "World"), pair("Welcome", "Mars")]
        );
    }

    #[test]
    fn two_quoted_records() {
        assert_eq!(
            decode("\"Hel,lo\",World\nWelcome,Mars"),
            vec![pair("Hel,lo", "World"), pair("Welcome", "Mars")]
        );
    }

    #[test]
    fn crlf_and_trailing_newline() {
        assert_eq!(
            decode("a,b\r\nc,d\r\n"),
            vec![pair("a", "b"), pair("c", "d")]
        );
    }

    #[test]
    fn multi_line_field() {
        assert_eq!(
            decode("\"x\ny\",z\nw,v\n"),
            vec![pair("x\ny", "z"), pair("w", "v")]
        );
    }

    #[test]
    fn empty_input() {
        let mut dec = Decoder::from_reader(&b""[..]);
        assert!(!dec.advance().unwrap());
        assert!(!dec.advance().unwrap());
    }

    #[test]
    fn schema_mismatch_is_recoverable() {
        let mut dec = Decoder::from_reader(&b"a,b,c\nd,e\n"[..]);
        let mut p = Pair::default();
        assert!(dec.advance().unwrap());
        match dec.decode_into(&mut p) {
            Err(Error::SchemaMismatch { expected: 2, len: 3, .. }) => {}
            x => panic!("expected schema mismatch, got {:?}", x),
        }
        assert_eq!(dec.raw_record(), "a,b,c");
        assert!(dec.advance().unwrap());
        dec.decode_into(&mut p).unwrap();
        assert_eq!(p, pair("d", "e"));
    }

    #[test]
    fn malformed_quote_reported() {
        let mut dec = Decoder::from_reader(&b"ok,ok\n\"ab\"x,c\n"[..]);
        let mut p = Pair::default();
        assert!(dec.advance().unwrap());
        assert!(dec.advance().unwrap());
        let err = dec.decode_into(&mut p).unwrap_err();
        assert!(err.is_fatal());
        match err {
            Error::MalformedQuote { pos, err } => {
                assert_eq!(err, SplitError::MalformedQuote { offset: 4 });
                assert_eq!(pos.record(), 1);
                assert_eq!(pos.line(), 2);
                assert_eq!(pos.byte(), 6);
            }
            x => panic!("expected malformed quote, got {:?}", x),
        }
    }

    #[test]
    fn positions() {
        let mut dec = Decoder::from_reader(&b"a,\"b\nc\"\nd,e\n"[..]);
        assert!(dec.advance().unwrap());
        assert_eq!(dec.position(), &Position::new());
        assert!(dec.advance().unwrap());
        let mut expected = Position::new();
        expected.set_byte(8).set_line(3).set_record(1);
        assert_eq!(dec.position(), &expected);
    }

    #[test]
    fn fields_of_current_record() {
        let mut dec = Decoder::from_reader(&b"Hello world,\"Column\n2\",\"\"\n"[..]);
        assert!(dec.advance().unwrap());
        assert_eq!(dec.raw_record(), "Hello world,\"Column\n2\",\"\"");
        let row = dec.fields().unwrap();
        assert_eq!(row, vec!["Hello world", "Column\n2", ""]);
    }

    #[test]
    fn headers_consumed() {
        let mut dec = DecoderBuilder::new()
            .has_headers(true)
            .from_reader(&b"field1,field2\nx,y\n"[..])
            .unwrap();
        assert_eq!(
            dec.headers().unwrap(),
            Some(&["field1".to_string(), "field2".to_string()][..])
        );
        let got: Vec<Pair> = dec.records().collect::<Result<_, _>>().unwrap();
        assert_eq!(got, vec![pair("x", "y")]);
    }

    #[test]
    fn headers_on_empty_input() {
        let mut dec =
            DecoderBuilder::new().has_headers(true).from_reader(&b""[..]).unwrap();
        assert_eq!(dec.headers().unwrap(), None);
        assert!(!dec.advance().unwrap());
    }

    #[test]
    fn custom_markers() {
        let mut dec = DecoderBuilder::new()
            .delimiter("::")
            .newline("\r\n")
            .quote(b'\'')
            .from_reader(&b"a::'b::c'\r\n'd\r\ne'::f"[..])
            .unwrap();
        let got: Vec<Pair> = dec.records().collect::<Result<_, _>>().unwrap();
        assert_eq!(got, vec![pair("a", "b::c"), pair("d\r\ne", "f")]);
    }

    #[test]
    fn small_buffer_grows() {
        let long = "x".repeat(100);
        let data = format!("{},\"{}\n{}\"\nq,r", long, long, long);
        let mut dec = DecoderBuilder::new()
            .buffer_capacity(3)
            .from_reader(data.as_bytes())
            .unwrap();
        let got: Vec<Pair> = dec.records().collect::<Result<_, _>>().unwrap();
        assert_eq!(
            got,
            vec![
                pair(&long, &format!("{}\n{}", long, long)),
                pair("q", "r"),
            ]
        );
    }

    #[test]
    fn bad_config() {
        let bad = |b: &mut DecoderBuilder| b.from_reader(&b""[..]).is_err();
        assert!(bad(DecoderBuilder::new().delimiter("")));
        assert!(bad(DecoderBuilder::new().newline("")));
        assert!(bad(DecoderBuilder::new().delimiter("\n")));
        assert!(bad(DecoderBuilder::new().delimiter("\"")));
        assert!(!bad(&mut DecoderBuilder::new()));
    }

    struct FailingReader;

    impl io::Read for FailingReader {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn io_error_stops_records() {
        let mut dec = Decoder::from_reader(FailingReader);
        let got: Vec<_> = dec.records::<Pair>().collect();
        assert_eq!(got.len(), 1);
        assert!(matches!(got[0], Err(Error::Io(_))));
    }

    #[test]
    fn records_continue_after_schema_mismatch() {
        let mut dec = Decoder::from_reader(&b"a\nb,c\n"[..]);
        let got: Vec<_> = dec.records::<Pair>().collect();
        assert_eq!(got.len(), 2);
        assert!(matches!(got[0], Err(Error::SchemaMismatch { .. })));
        assert_eq!(got[1].as_ref().unwrap(), &pair("b", "c"));
    }
}
