use std::borrow::Cow;
use std::error;
use std::fmt;
use std::num;
use std::result;
use std::str;

/// A typed record that can be written to and read from delimited text.
///
/// This describes the shape of a record: its header labels, its values in
/// field order and a mutable slot for each field. Implementations are
/// usually generated with the [`impl_record!`](crate::impl_record) macro.
///
/// The three methods must agree with one another: `labels`, `values` and
/// `slots` each return one entry per field, in the same order.
///
/// # Example
///
/// ```
/// #[derive(Debug, Default, PartialEq)]
/// struct Reading {
///     station: String,
///     celsius: f64,
///     note: Option<String>,
/// }
///
/// dsv::impl_record!(Reading {
///     station => "Station",
///     celsius => "Temperature (C)",
///     note => "note",
/// });
///
/// let mut enc = dsv::Encoder::from_writer(vec![]);
/// enc.write_headers_for::<Reading>().unwrap();
/// enc.encode(&Reading {
///     station: "Oslo, Blindern".to_string(),
///     celsius: -3.5,
///     note: None,
/// }).unwrap();
/// let data = enc.into_inner();
/// assert_eq!(
///     data,
///     b"Station,Temperature (C),note\n\"Oslo, Blindern\",-3.5,\n".to_vec()
/// );
///
/// let mut dec = dsv::DecoderBuilder::new()
///     .has_headers(true)
///     .from_reader(&data[..])
///     .unwrap();
/// let mut got = Reading::default();
/// assert!(dec.advance().unwrap());
/// dec.decode_into(&mut got).unwrap();
/// assert_eq!(got.station, "Oslo, Blindern");
/// assert_eq!(got.celsius, -3.5);
/// assert_eq!(got.note, None);
/// ```
pub trait Record {
    /// The header labels of this record type, in field order.
    fn labels() -> &'static [&'static str]
    where
        Self: Sized;

    /// The textual value of each field, in field order.
    fn values(&self) -> Vec<Cow<'_, str>>;

    /// A mutable slot for each field, in field order.
    fn slots(&mut self) -> Vec<&mut dyn FieldSlot>;
}

/// Implement [`Record`](crate::Record) for a struct.
///
/// Each entry maps a struct field to its header label. Fields must
/// implement both [`ToField`](crate::ToField) and
/// [`FieldSlot`](crate::FieldSlot).
#[macro_export]
macro_rules! impl_record {
    ($ty:ty { $($field:ident => $label:expr),* $(,)? }) => {
        impl $crate::Record for $ty {
            fn labels() -> &'static [&'static str] {
                &[$($label),*]
            }

            fn values(&self) -> ::std::vec::Vec<::std::borrow::Cow<'_, str>> {
                vec![$($crate::ToField::to_field(&self.$field)),*]
            }

            fn slots(
                &mut self,
            ) -> ::std::vec::Vec<&mut dyn $crate::FieldSlot> {
                vec![$(&mut self.$field as &mut dyn $crate::FieldSlot),*]
            }
        }
    };
}

/// A value that can be written as a single field.
pub trait ToField {
    /// Return the textual representation of this value.
    fn to_field(&self) -> Cow<'_, str>;
}

/// A slot that can be assigned from a single field.
pub trait FieldSlot {
    /// Parse `field` and store the result in this slot.
    fn set_field(&mut self, field: &str) -> result::Result<(), FieldError>;
}

impl ToField for String {
    fn to_field(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl ToField for str {
    fn to_field(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl<'a, T: ToField + ?Sized> ToField for &'a T {
    fn to_field(&self) -> Cow<'_, str> {
        (**self).to_field()
    }
}

impl ToField for bool {
    fn to_field(&self) -> Cow<'_, str> {
        Cow::Borrowed(if *self { "true" } else { "false" })
    }
}

impl ToField for char {
    fn to_field(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }
}

impl<T: ToField> ToField for Option<T> {
    fn to_field(&self) -> Cow<'_, str> {
        match *self {
            None => Cow::Borrowed(""),
            Some(ref v) => v.to_field(),
        }
    }
}

impl FieldSlot for String {
    fn set_field(&mut self, field: &str) -> result::Result<(), FieldError> {
        self.clear();
        self.push_str(field);
        Ok(())
    }
}

impl FieldSlot for bool {
    fn set_field(&mut self, field: &str) -> result::Result<(), FieldError> {
        *self = field.parse().map_err(FieldError::ParseBool)?;
        Ok(())
    }
}

impl FieldSlot for char {
    fn set_field(&mut self, field: &str) -> result::Result<(), FieldError> {
        let mut chars = field.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                *self = c;
                Ok(())
            }
            _ => Err(FieldError::Char { len: field.chars().count() }),
        }
    }
}

/// An empty field is `None`.
impl<T: FieldSlot + Default> FieldSlot for Option<T> {
    fn set_field(&mut self, field: &str) -> result::Result<(), FieldError> {
        if field.is_empty() {
            *self = None;
            return Ok(());
        }
        let mut value = T::default();
        value.set_field(field)?;
        *self = Some(value);
        Ok(())
    }
}

macro_rules! integer {
    ($($ty:ty),*) => {$(
        impl ToField for $ty {
            fn to_field(&self) -> Cow<'_, str> {
                Cow::Owned(itoa::Buffer::new().format(*self).to_string())
            }
        }

        impl FieldSlot for $ty {
            fn set_field(
                &mut self,
                field: &str,
            ) -> result::Result<(), FieldError> {
                *self = field.parse().map_err(FieldError::ParseInt)?;
                Ok(())
            }
        }
    )*};
}

integer!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

macro_rules! float {
    ($($ty:ty),*) => {$(
        impl ToField for $ty {
            fn to_field(&self) -> Cow<'_, str> {
                Cow::Owned(ryu::Buffer::new().format(*self).to_string())
            }
        }

        impl FieldSlot for $ty {
            fn set_field(
                &mut self,
                field: &str,
            ) -> result::Result<(), FieldError> {
                *self = field.parse().map_err(FieldError::ParseFloat)?;
                Ok(())
            }
        }
    )*};
}

float!(f32, f64);

/// An error converting a single field into a typed slot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FieldError {
    /// The field is not a valid boolean.
    ParseBool(str::ParseBoolError),
    /// The field is not a valid integer.
    ParseInt(num::ParseIntError),
    /// The field is not a valid float.
    ParseFloat(num::ParseFloatError),
    /// The field does not hold exactly one character.
    Char {
        /// The number of characters found.
        len: usize,
    },
    /// A custom error reported by a user defined slot.
    Message(String),
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            FieldError::ParseBool(ref err) => err.fmt(f),
            FieldError::ParseInt(ref err) => err.fmt(f),
            FieldError::ParseFloat(ref err) => err.fmt(f),
            FieldError::Char { len } => write!(
                f,
                "expected single character but got {} characters",
                len
            ),
            FieldError::Message(ref msg) => write!(f, "{}", msg),
        }
    }
}

impl error::Error for FieldError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            FieldError::ParseBool(ref err) => Some(err),
            FieldError::ParseInt(ref err) => Some(err),
            FieldError::ParseFloat(ref err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldError, FieldSlot, Record, ToField};

    #[derive(Debug, Default, PartialEq)]
    struct Pair {
        field1: String,
        field2: u32,
    }

    crate::impl_record!(Pair { field1 => "My Field 1", field2 => "Field2" });

    #[test]
    fn labels_honor_overrides() {
        assert_eq!(Pair::labels(), &["My Field 1", "Field2"]);
    }

    #[test]
    fn values_in_order() {
        let p = Pair { field1: "Hello".into(), field2: 42 };
        let got: Vec<String> =
            p.values().into_iter().map(|v| v.into_owned()).collect();
        assert_eq!(got, vec!["Hello", "42"]);
    }

    #[test]
    fn slots_assign_in_order() {
        let mut p = Pair::default();
        {
            let mut slots = p.slots();
            assert_eq!(slots.len(), 2);
            slots[0].set_field("World").unwrap();
            slots[1].set_field("7").unwrap();
        }
        assert_eq!(p, Pair { field1: "World".into(), field2: 7 });
    }

    #[test]
    fn numbers_format() {
        assert_eq!(12345u64.to_field(), "12345");
        assert_eq!((-7i8).to_field(), "-7");
        assert_eq!(1.5f64.to_field(), "1.5");
        assert_eq!(1.0f32.to_field(), "1.0");
        assert_eq!(true.to_field(), "true");
        assert_eq!(None::<i32>.to_field(), "");
        assert_eq!(Some('☃').to_field(), "☃");
    }

    #[test]
    fn option_slot() {
        let mut x: Option<i32> = Some(1);
        x.set_field("").unwrap();
        assert_eq!(x, None);
        x.set_field("5").unwrap();
        assert_eq!(x, Some(5));
    }

    #[test]
    fn bad_fields() {
        let mut n = 0i32;
        assert!(matches!(n.set_field("x"), Err(FieldError::ParseInt(_))));
        let mut f = 0f64;
        assert!(matches!(f.set_field(""), Err(FieldError::ParseFloat(_))));
        let mut b = false;
        assert!(matches!(b.set_field("yes"), Err(FieldError::ParseBool(_))));
        let mut c = ' ';
        assert_eq!(c.set_field("ab"), Err(FieldError::Char { len: 2 }));
        assert_eq!(c.set_field(""), Err(FieldError::Char { len: 0 }));
    }
}
