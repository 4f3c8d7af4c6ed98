/*!
The `dsv` crate reads and writes delimited text, such as CSV, with a
configurable (and possibly multi-byte) delimiter and newline marker.

# Brief overview

The primary types in this crate are [`Decoder`](struct.Decoder.html) and
[`Encoder`](struct.Encoder.html), for reading and writing delimited data
respectively. Correspondingly, to support custom configuration, they are
built with [`DecoderBuilder`](struct.DecoderBuilder.html) and
[`EncoderBuilder`](struct.EncoderBuilder.html).

Records are mapped to and from Rust structs through the
[`Record`](trait.Record.html) trait, which is usually implemented with the
[`impl_record!`](macro.impl_record.html) macro. With the `serde` feature
(enabled by default), `Decoder::deserialize` and `Encoder::serialize` work
with any type that derives `Deserialize` or `Serialize`.

The format is deliberately simple:

* A field that contains the delimiter or the newline marker is wrapped in a
  pair of quotes. Quotes inside a field are never escaped.
* A newline marker inside quotes is part of the field.
* A single carriage return before the newline marker is dropped.
* After a closing quote, only a delimiter or the end of the record may
  follow. Anything else is a malformed record.

To decode many files at once, use [`LoaderBuilder`](struct.LoaderBuilder.html).

# Example

```
#[derive(Debug, Default, PartialEq)]
struct City {
    name: String,
    population: Option<u64>,
}

dsv::impl_record!(City { name => "city", population => "pop" });

# fn main() -> Result<(), dsv::Error> {
let data = "city;pop\r\n\"Kinshasa; DRC\";17000000\r\nNowhere;\r\n";
let mut dec = dsv::DecoderBuilder::new()
    .delimiter(";")
    .newline("\r\n")
    .has_headers(true)
    .from_reader(data.as_bytes())?;
let cities = dec.records::<City>().collect::<Result<Vec<_>, _>>()?;
assert_eq!(cities[0].name, "Kinshasa; DRC");
assert_eq!(cities[1].population, None);

let mut enc = dsv::EncoderBuilder::new()
    .delimiter(";")
    .newline("\r\n")
    .from_writer(vec![])?;
enc.write_headers_for::<City>()?;
for city in &cities {
    enc.encode(city)?;
}
assert_eq!(enc.into_inner(), data.as_bytes());
# Ok(())
# }
```
*/

#![deny(missing_docs)]

pub use dsv_core::{compose, split, SplitError};

pub use crate::decoder::{DecodedRecords, Decoder, DecoderBuilder, Position};
#[cfg(feature = "serde")]
pub use crate::deserializer::{DeserializeError, DeserializeErrorKind};
pub use crate::encoder::{Encoder, EncoderBuilder};
pub use crate::error::{Error, Result, Utf8Error};
pub use crate::loader::{Load, LoadError, Loaded, LoaderBuilder};
pub use crate::record::{FieldError, FieldSlot, Record, ToField};
pub use crate::row::{Row, RowIter};

mod decoder;
#[cfg(feature = "serde")]
mod deserializer;
mod encoder;
mod error;
mod loader;
mod record;
mod row;
#[cfg(feature = "serde")]
mod serializer;
