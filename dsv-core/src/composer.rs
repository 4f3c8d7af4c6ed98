use memchr::memmem;

/// Composes fields into the raw text of one record.
///
/// A field is written verbatim unless it contains the delimiter or the
/// newline marker, or ends with `\r`, in which case it is wrapped in a
/// single pair of quotes. Quoting on the newline marker keeps multi-line
/// fields intact when the output is read back with a `Splitter` and a
/// `Scanner`, and quoting a trailing `\r` keeps the scanner from dropping
/// it as part of a `\r\n` line ending.
///
/// Quote bytes inside a field are never escaped. A quoted field that
/// contains a quote cannot be read back faithfully. Worse, an unquoted
/// field with an odd number of quotes (such as `"x`) leaves the scanner
/// inside a quoted section, so every following record is merged into one
/// until another quote turns up. The stream is out of sync from there on.
#[derive(Clone, Debug)]
pub struct Composer {
    delimiter: Vec<u8>,
    newline: Vec<u8>,
    quote: u8,
}

impl Default for Composer {
    fn default() -> Composer {
        Composer::new(b",", b"\n", b'"')
    }
}

impl Composer {
    /// Create a composer for the given delimiter, newline marker and quote.
    pub fn new(delimiter: &[u8], newline: &[u8], quote: u8) -> Composer {
        Composer {
            delimiter: delimiter.to_vec(),
            newline: newline.to_vec(),
            quote: quote,
        }
    }

    /// The delimiter written between fields.
    pub fn delimiter(&self) -> &[u8] {
        &self.delimiter
    }

    /// The newline marker written by `terminate`.
    pub fn newline(&self) -> &[u8] {
        &self.newline
    }

    /// Returns true if and only if `field` must be quoted.
    pub fn needs_quotes(&self, field: &[u8]) -> bool {
        contains(field, &self.delimiter)
            || contains(field, &self.newline)
            || field.last() == Some(&b'\r')
    }

    /// Append one record made of `fields` to `out`.
    ///
    /// No newline marker is written. An empty sequence of fields appends
    /// nothing.
    pub fn compose_into<I, T>(&self, fields: I, out: &mut Vec<u8>)
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        for (i, field) in fields.into_iter().enumerate() {
            if i > 0 {
                out.extend_from_slice(&self.delimiter);
            }
            let field = field.as_ref();
            if self.needs_quotes(field) {
                out.push(self.quote);
                out.extend_from_slice(field);
                out.push(self.quote);
            } else {
                out.extend_from_slice(field);
            }
        }
    }

    /// Append the newline marker to `out`.
    pub fn terminate(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.newline);
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    match needle.len() {
        0 => false,
        1 => memchr::memchr(needle[0], haystack).is_some(),
        _ => memmem::find(haystack, needle).is_some(),
    }
}

/// Compose one record of text from `fields`, separated by `delimiter`.
///
/// Fields that contain the delimiter or a `\n`, or that end with `\r`, are
/// wrapped in `"`.
///
/// ```
/// assert_eq!(dsv_core::compose(&["a,b", "c"], ","), "\"a,b\",c");
/// assert_eq!(dsv_core::compose(&["ab", "c"], ","), "ab,c");
/// ```
pub fn compose<T: AsRef<str>>(fields: &[T], delimiter: &str) -> String {
    let composer = Composer::new(delimiter.as_bytes(), b"\n", b'"');
    let mut out = vec![];
    composer.compose_into(fields.iter().map(|f| f.as_ref().as_bytes()), &mut out);
    // Only whole fields, whole delimiters and ASCII quotes were written.
    String::from_utf8_lossy(&out).into_owned()
}
