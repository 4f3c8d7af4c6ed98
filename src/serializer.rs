use std::fmt;

use serde::ser::{
    Error as SerdeError, Serialize, SerializeMap, SerializeSeq,
    SerializeStruct, SerializeStructVariant, SerializeTuple,
    SerializeTupleStruct, SerializeTupleVariant, Serializer,
};

use crate::error::Error;

impl SerdeError for Error {
    fn custom<T: fmt::Display>(msg: T) -> Error {
        Error::Serialize(msg.to_string())
    }
}

/// Serialize `value` as one row of fields, appended to `fields`.
///
/// If `header_only` is true, then the field names of a struct are collected
/// instead of its values, and `true` is returned when any were found. Values
/// other than structs have no header row, so `false` is returned for them
/// and nothing is collected.
pub(crate) fn serialize<S: Serialize + ?Sized>(
    fields: &mut Vec<Vec<u8>>,
    value: &S,
    header_only: bool,
) -> Result<bool, Error> {
    let mut ser =
        SeRow { fields: fields, header_only: header_only, did_headers: false };
    value.serialize(&mut ser)?;
    Ok(ser.did_headers)
}

struct SeRow<'f> {
    fields: &'f mut Vec<Vec<u8>>,
    header_only: bool,
    did_headers: bool,
}

impl<'f> SeRow<'f> {
    fn field<T: AsRef<[u8]>>(&mut self, field: T) -> Result<(), Error> {
        if !self.header_only {
            self.fields.push(field.as_ref().to_vec());
        }
        Ok(())
    }
}

macro_rules! serialize_int {
    ($method:ident, $ty:ty) => {
        fn $method(self, v: $ty) -> Result<Self::Ok, Self::Error> {
            let mut buf = itoa::Buffer::new();
            self.field(buf.format(v))
        }
    };
}

macro_rules! serialize_float {
    ($method:ident, $ty:ty) => {
        fn $method(self, v: $ty) -> Result<Self::Ok, Self::Error> {
            let mut buf = ryu::Buffer::new();
            self.field(buf.format(v))
        }
    };
}

impl<'a, 'f> Serializer for &'a mut SeRow<'f> {
    type Ok = ();
    type Error = Error;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_bool(self, v: bool) -> Result<Self::Ok, Self::Error> {
        self.field(if v { "true" } else { "false" })
    }

    serialize_int!(serialize_i8, i8);
    serialize_int!(serialize_i16, i16);
    serialize_int!(serialize_i32, i32);
    serialize_int!(serialize_i64, i64);
    serialize_int!(serialize_u8, u8);
    serialize_int!(serialize_u16, u16);
    serialize_int!(serialize_u32, u32);
    serialize_int!(serialize_u64, u64);
    serialize_float!(serialize_f32, f32);
    serialize_float!(serialize_f64, f64);

    fn serialize_char(self, v: char) -> Result<Self::Ok, Self::Error> {
        self.field(v.encode_utf8(&mut [0; 4]))
    }

    fn serialize_str(self, value: &str) -> Result<Self::Ok, Self::Error> {
        self.field(value)
    }

    fn serialize_bytes(self, value: &[u8]) -> Result<Self::Ok, Self::Error> {
        self.field(value)
    }

    fn serialize_none(self) -> Result<Self::Ok, Self::Error> {
        self.field(b"")
    }

    fn serialize_some<T: ?Sized + Serialize>(
        self,
        value: &T,
    ) -> Result<Self::Ok, Self::Error> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Self::Ok, Self::Error> {
        None::<()>.serialize(self)
    }

    fn serialize_unit_struct(
        self,
        name: &'static str,
    ) -> Result<Self::Ok, Self::Error> {
        self.field(name)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Self::Ok, Self::Error> {
        self.field(variant)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<Self::Ok, Self::Error> {
        value.serialize(self)
    }

    fn serialize_seq(
        self,
        _len: Option<usize>,
    ) -> Result<Self::SerializeSeq, Self::Error> {
        Ok(self)
    }

    fn serialize_tuple(
        self,
        _len: usize,
    ) -> Result<Self::SerializeTuple, Self::Error> {
        Ok(self)
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        Ok(self)
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        Err(Error::custom("serializing enum tuple variants is not supported"))
    }

    fn serialize_map(
        self,
        _len: Option<usize>,
    ) -> Result<Self::SerializeMap, Self::Error> {
        // The right behavior for serializing maps isn't clear.
        Err(Error::custom("serializing maps is not supported"))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        Ok(self)
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        Err(Error::custom("serializing enum struct variants is not supported"))
    }
}

impl<'a, 'f> SerializeSeq for &'a mut SeRow<'f> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(
        &mut self,
        value: &T,
    ) -> Result<(), Self::Error> {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}

impl<'a, 'f> SerializeTuple for &'a mut SeRow<'f> {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(
        &mut self,
        value: &T,
    ) -> Result<(), Self::Error> {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}

impl<'a, 'f> SerializeTupleStruct for &'a mut SeRow<'f> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        value: &T,
    ) -> Result<(), Self::Error> {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}

// Tuple variants, maps and struct variants are refused before any of the
// following impls are reached.

impl<'a, 'f> SerializeTupleVariant for &'a mut SeRow<'f> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _value: &T,
    ) -> Result<(), Self::Error> {
        unreachable!()
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        unreachable!()
    }
}

impl<'a, 'f> SerializeMap for &'a mut SeRow<'f> {
    type Ok = ();
    type Error = Error;

    fn serialize_key<T: ?Sized + Serialize>(
        &mut self,
        _key: &T,
    ) -> Result<(), Self::Error> {
        unreachable!()
    }

    fn serialize_value<T: ?Sized + Serialize>(
        &mut self,
        _value: &T,
    ) -> Result<(), Self::Error> {
        unreachable!()
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        unreachable!()
    }
}

impl<'a, 'f> SerializeStruct for &'a mut SeRow<'f> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        if self.header_only {
            self.did_headers = true;
            self.fields.push(key.as_bytes().to_vec());
            Ok(())
        } else {
            value.serialize(&mut **self)
        }
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        Ok(())
    }
}

impl<'a, 'f> SerializeStructVariant for &'a mut SeRow<'f> {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        _key: &'static str,
        _value: &T,
    ) -> Result<(), Self::Error> {
        unreachable!()
    }

    fn end(self) -> Result<Self::Ok, Self::Error> {
        unreachable!()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde::Serialize;

    use super::serialize;

    fn row<S: Serialize>(value: S) -> Vec<String> {
        let mut fields = vec![];
        serialize(&mut fields, &value, false).unwrap();
        fields.into_iter().map(|f| String::from_utf8(f).unwrap()).collect()
    }

    fn header<S: Serialize>(value: S) -> (bool, Vec<String>) {
        let mut fields = vec![];
        let wrote = serialize(&mut fields, &value, true).unwrap();
        let labels =
            fields.into_iter().map(|f| String::from_utf8(f).unwrap()).collect();
        (wrote, labels)
    }

    #[derive(Serialize)]
    struct Foo {
        label: String,
        #[serde(rename = "Count")]
        count: u32,
        ratio: Option<f64>,
    }

    fn foo() -> Foo {
        Foo { label: "a,b".into(), count: 42, ratio: None }
    }

    #[test]
    fn struct_values() {
        assert_eq!(row(foo()), vec!["a,b", "42", ""]);
    }

    #[test]
    fn struct_header() {
        let labels = vec!["label".to_string(), "Count".into(), "ratio".into()];
        assert_eq!(header(foo()), (true, labels));
    }

    #[test]
    fn scalars_have_no_header() {
        assert_eq!(header(5i32), (false, vec![]));
        assert_eq!(header(("a", 1)), (false, vec![]));
    }

    #[test]
    fn tuples_and_seqs() {
        assert_eq!(row((1.5f64, true, 'x')), vec!["1.5", "true", "x"]);
        assert_eq!(row(vec![-1i64, 2]), vec!["-1", "2"]);
    }

    #[test]
    fn unit_enum_variant() {
        #[derive(Serialize)]
        enum Kind {
            Alpha,
        }
        assert_eq!(row(Kind::Alpha), vec!["Alpha"]);
    }

    #[test]
    fn maps_unsupported() {
        let mut map = HashMap::new();
        map.insert("a", 1);
        let mut fields = vec![];
        assert!(serialize(&mut fields, &map, false).is_err());
    }
}
