use std::fmt;
use std::ops::Range;
use std::str;

use bstr::ByteSlice;

use crate::error::{new_utf8_error, Utf8Error};

/// The fields of one record, borrowed from the decoder that split them.
///
/// A `Row` is a view into the decoder's record buffer. Fields are raw bytes
/// with their surrounding quotes removed. Use `get_str` or `to_strs` for
/// UTF-8 validated access.
#[derive(Clone, Copy)]
pub struct Row<'r> {
    raw: &'r [u8],
    bounds: &'r [Range<usize>],
}

impl<'r> Row<'r> {
    pub(crate) fn new(raw: &'r [u8], bounds: &'r [Range<usize>]) -> Row<'r> {
        Row { raw: raw, bounds: bounds }
    }

    /// Returns the number of fields in this row.
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    /// Returns true if and only if this row has no fields.
    ///
    /// A row produced by splitting a record always has at least one field.
    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// Return the field at index `i`.
    ///
    /// If no field at index `i` exists, then this returns `None`.
    pub fn get(&self, i: usize) -> Option<&'r [u8]> {
        self.bounds.get(i).map(|r| &self.raw[r.clone()])
    }

    /// Return the field at index `i` as a string.
    pub fn get_str(&self, i: usize) -> Result<Option<&'r str>, Utf8Error> {
        match self.get(i) {
            None => Ok(None),
            Some(field) => str::from_utf8(field)
                .map(Some)
                .map_err(|err| new_utf8_error(i, err.valid_up_to())),
        }
    }

    /// Returns an iterator over all fields in this row.
    pub fn iter(&self) -> RowIter<'r> {
        RowIter { row: *self, i: 0 }
    }

    /// Return every field as a string, or the first UTF-8 error found.
    pub fn to_strs(&self) -> Result<Vec<&'r str>, Utf8Error> {
        if self.raw.is_ascii() {
            // Slicing pure ASCII never splits a character.
            return Ok(self
                .iter()
                .map(|f| str::from_utf8(f).unwrap_or_default())
                .collect());
        }
        (0..self.len())
            .map(|i| self.get_str(i).map(Option::unwrap_or_default))
            .collect()
    }

    /// Return every field as an owned string.
    pub fn to_strings(&self) -> Result<Vec<String>, Utf8Error> {
        Ok(self.to_strs()?.into_iter().map(String::from).collect())
    }
}

impl<'r> fmt::Debug for Row<'r> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.iter().map(|field| field.as_bstr())).finish()
    }
}

impl<'r> PartialEq<[&str]> for Row<'r> {
    fn eq(&self, other: &[&str]) -> bool {
        self.len() == other.len()
            && self.iter().zip(other).all(|(a, b)| a == b.as_bytes())
    }
}

impl<'r, 'a> PartialEq<Vec<&'a str>> for Row<'r> {
    fn eq(&self, other: &Vec<&'a str>) -> bool {
        *self == other[..]
    }
}

impl<'r> IntoIterator for Row<'r> {
    type Item = &'r [u8];
    type IntoIter = RowIter<'r>;

    fn into_iter(self) -> RowIter<'r> {
        self.iter()
    }
}

/// An iterator over the fields in a row.
#[derive(Clone, Debug)]
pub struct RowIter<'r> {
    row: Row<'r>,
    i: usize,
}

impl<'r> Iterator for RowIter<'r> {
    type Item = &'r [u8];

    fn next(&mut self) -> Option<&'r [u8]> {
        let field = self.row.get(self.i)?;
        self.i += 1;
        Some(field)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.row.len() - self.i;
        (n, Some(n))
    }
}

impl<'r> ExactSizeIterator for RowIter<'r> {}
