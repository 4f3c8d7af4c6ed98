use std::fs::File;
use std::io;
use std::path::Path;

use dsv_core::Composer;
use tracing::trace;

use crate::decoder::validate_markers;
use crate::error::Result;
use crate::record::Record;

/// Builds an encoder with various configuration knobs.
///
/// The delimiter, newline marker and quote must match those of the decoder
/// that will read the output back.
#[derive(Clone, Debug)]
pub struct EncoderBuilder {
    delimiter: Vec<u8>,
    newline: Vec<u8>,
    quote: u8,
}

impl Default for EncoderBuilder {
    fn default() -> EncoderBuilder {
        EncoderBuilder {
            delimiter: b",".to_vec(),
            newline: b"\n".to_vec(),
            quote: b'"',
        }
    }
}

impl EncoderBuilder {
    /// Create a new builder with a default configuration.
    pub fn new() -> EncoderBuilder {
        EncoderBuilder::default()
    }

    /// Build an encoder from this configuration that writes to `wtr`.
    pub fn from_writer<W: io::Write>(&self, wtr: W) -> Result<Encoder<W>> {
        validate_markers(&self.delimiter, &self.newline, self.quote)?;
        Ok(Encoder::new(self, wtr))
    }

    /// Build an encoder from this configuration that writes to the file at
    /// `path`. The file is created or truncated.
    pub fn from_path<P: AsRef<Path>>(&self, path: P) -> Result<Encoder<File>> {
        validate_markers(&self.delimiter, &self.newline, self.quote)?;
        Ok(Encoder::new(self, File::create(path)?))
    }

    /// The field delimiter. The default is `","`.
    pub fn delimiter<D: AsRef<[u8]>>(&mut self, delimiter: D) -> &mut EncoderBuilder {
        self.delimiter = delimiter.as_ref().to_vec();
        self
    }

    /// The newline marker written after every record. The default is
    /// `"\n"`.
    pub fn newline<N: AsRef<[u8]>>(&mut self, newline: N) -> &mut EncoderBuilder {
        self.newline = newline.as_ref().to_vec();
        self
    }

    /// The quote byte. The default is `b'"'`.
    pub fn quote(&mut self, quote: u8) -> &mut EncoderBuilder {
        self.quote = quote;
        self
    }
}

/// An encoder that writes delimited data.
///
/// Each record is composed in memory, newline marker included, and handed
/// to the underlying writer with a single `write_all` call. The
/// encoder does no buffering of its own, so wrap the writer in a
/// `BufWriter` when writing many small records to a file or socket.
///
/// Fields are quoted only when they contain the delimiter or the newline
/// marker. Quotes inside fields are written as is.
#[derive(Debug)]
pub struct Encoder<W> {
    wtr: W,
    composer: Composer,
    row: Vec<u8>,
    #[cfg(feature = "serde")]
    fields: Vec<Vec<u8>>,
    records: u64,
}

impl<W: io::Write> Encoder<W> {
    /// Create a new encoder with a default configuration for the given
    /// writer.
    pub fn from_writer(wtr: W) -> Encoder<W> {
        Encoder::new(&EncoderBuilder::new(), wtr)
    }

    fn new(builder: &EncoderBuilder, wtr: W) -> Encoder<W> {
        Encoder {
            wtr: wtr,
            composer: Composer::new(
                &builder.delimiter,
                &builder.newline,
                builder.quote,
            ),
            row: vec![],
            #[cfg(feature = "serde")]
            fields: vec![],
            records: 0,
        }
    }

    /// Write a row of header labels.
    ///
    /// This is the same as `write_record`. It exists to make call sites
    /// read better.
    pub fn write_header<I, T>(&mut self, labels: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.write_record(labels)
    }

    /// Write the header labels of the record type `T`.
    pub fn write_headers_for<T: Record>(&mut self) -> Result<()> {
        self.write_record(T::labels())
    }

    /// Write a single record made of `fields`.
    ///
    /// ```
    /// let mut enc = dsv::EncoderBuilder::new()
    ///     .delimiter("|")
    ///     .from_writer(vec![])
    ///     .unwrap();
    /// enc.write_record(&["a", "b|c", "say \"hi\""]).unwrap();
    /// assert_eq!(enc.into_inner(), b"a|\"b|c\"|say \"hi\"\n".to_vec());
    /// ```
    pub fn write_record<I, T>(&mut self, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.row.clear();
        self.composer.compose_into(fields, &mut self.row);
        self.composer.terminate(&mut self.row);
        self.wtr.write_all(&self.row)?;
        trace!(record = self.records, len = self.row.len(), "wrote record");
        self.records += 1;
        Ok(())
    }

    /// Write the values of `record`, in field order.
    pub fn encode<T: Record + ?Sized>(&mut self, record: &T) -> Result<()> {
        let values = record.values();
        self.write_record(values.iter().map(|v| v.as_bytes()))
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> io::Result<()> {
        self.wtr.flush()
    }

    /// Returns a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.wtr
    }

    /// Returns a mutable reference to the underlying writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.wtr
    }

    /// Unwraps this encoder, returning the underlying writer.
    ///
    /// Every record has already been handed to the writer, so nothing is
    /// lost. The writer itself is not flushed.
    pub fn into_inner(self) -> W {
        self.wtr
    }
}

#[cfg(feature = "serde")]
impl<W: io::Write> Encoder<W> {
    /// Serialize a single record using serde.
    ///
    /// Structs, tuples, sequences and scalars are supported. Nested
    /// containers are flattened into the same row. Maps and enum variants
    /// with data are not supported.
    ///
    /// ```
    /// use serde::Serialize;
    ///
    /// #[derive(Serialize)]
    /// struct Row<'a> {
    ///     city: &'a str,
    ///     pop: u64,
    /// }
    ///
    /// let mut enc = dsv::Encoder::from_writer(vec![]);
    /// enc.serialize_header(&Row { city: "", pop: 0 }).unwrap();
    /// enc.serialize(Row { city: "Boston", pop: 4628910 }).unwrap();
    /// enc.serialize(("Oslo, Norway", 700000)).unwrap();
    /// assert_eq!(
    ///     String::from_utf8(enc.into_inner()).unwrap(),
    ///     "city,pop\nBoston,4628910\n\"Oslo, Norway\",700000\n"
    /// );
    /// ```
    pub fn serialize<S: serde::Serialize>(&mut self, record: S) -> Result<()> {
        let mut fields = std::mem::take(&mut self.fields);
        fields.clear();
        let res = crate::serializer::serialize(&mut fields, &record, false)
            .and_then(|_| self.write_record(&fields));
        self.fields = fields;
        res
    }

    /// Write the field names of `record` as a header row.
    ///
    /// Only structs have field names. For any other value, nothing is
    /// written and `false` is returned.
    pub fn serialize_header<S: serde::Serialize + ?Sized>(
        &mut self,
        record: &S,
    ) -> Result<bool> {
        let mut fields = vec![];
        if !crate::serializer::serialize(&mut fields, record, true)? {
            return Ok(false);
        }
        self.write_record(&fields)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::{Encoder, EncoderBuilder};
    use crate::error::Error;

    fn encode_rows(rows: &[&[&str]]) -> String {
        let mut enc = Encoder::from_writer(vec![]);
        for row in rows {
            enc.write_record(*row).unwrap();
        }
        String::from_utf8(enc.into_inner()).unwrap()
    }

    #[test]
    fn plain_rows() {
        assert_eq!(
            encode_rows(&[&["Hello", "World"], &["Welcome", "Mars"]]),
            "Hello,World\nWelcome,Mars\n"
        );
    }

    #[test]
    fn quoted_delimiter() {
        assert_eq!(encode_rows(&[&["Hel,lo", "World"]]), "\"Hel,lo\",World\n");
    }

    #[test]
    fn quoted_newline() {
        assert_eq!(encode_rows(&[&["a\nb", "c"]]), "\"a\nb\",c\n");
    }

    #[test]
    fn empty_fields() {
        assert_eq!(encode_rows(&[&["", ""], &[""]]), ",\n\n");
    }

    #[derive(Debug, Default)]
    struct Pair {
        name: String,
        n: i32,
    }

    crate::impl_record!(Pair { name => "Name", n => "N" });

    #[test]
    fn typed_records() {
        let mut enc = Encoder::from_writer(vec![]);
        enc.write_headers_for::<Pair>().unwrap();
        enc.encode(&Pair { name: "x".into(), n: -4 }).unwrap();
        assert_eq!(enc.into_inner(), b"Name,N\nx,-4\n".to_vec());
    }

    #[test]
    fn custom_markers() {
        let mut enc = EncoderBuilder::new()
            .delimiter("::")
            .newline("\r\n")
            .quote(b'\'')
            .from_writer(vec![])
            .unwrap();
        enc.write_record(&["a", "b::c", "d\r\ne"]).unwrap();
        assert_eq!(enc.into_inner(), b"a::'b::c'::'d\r\ne'\r\n".to_vec());
    }

    #[test]
    fn bad_config() {
        let res = EncoderBuilder::new().newline("").from_writer(vec![]);
        assert!(matches!(res, Err(Error::Config(_))));
    }

    /// A writer that counts calls to `write`.
    struct CountingWriter {
        calls: usize,
        buf: Vec<u8>,
    }

    impl io::Write for CountingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.calls += 1;
            self.buf.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn one_write_per_record() {
        let wtr = CountingWriter { calls: 0, buf: vec![] };
        let mut enc = Encoder::from_writer(wtr);
        enc.write_record(&["a", "b", "c"]).unwrap();
        enc.write_record(&["d", "e", "f"]).unwrap();
        let wtr = enc.into_inner();
        assert_eq!(wtr.calls, 2);
        assert_eq!(wtr.buf, b"a,b,c\nd,e,f\n".to_vec());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serialize_tuple() {
        let mut enc = Encoder::from_writer(vec![]);
        enc.serialize((1u8, "x,y", Some(2.5f64), None::<i32>)).unwrap();
        assert_eq!(enc.into_inner(), b"1,\"x,y\",2.5,\n".to_vec());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serialize_header_needs_struct() {
        let mut enc = Encoder::from_writer(vec![]);
        assert!(!enc.serialize_header(&(1, 2)).unwrap());
        assert!(enc.get_ref().is_empty());
    }
}
