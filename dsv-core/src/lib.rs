/*!
`dsv-core` provides the state machines behind delimited text: finding
record boundaries in a stream of bytes, splitting a record into fields and
composing fields back into a record.

Nothing in this crate performs I/O. Callers own their buffers and hand
slices of them to a [`Scanner`], [`Splitter`] or [`Composer`]. See the
`dsv` crate for readers and writers built on top of these.

# Example

This finds each record in a buffer and splits it into fields.

```
use dsv_core::{ScanResult, Scanner, Splitter};

let scanner = Scanner::default();
let splitter = Splitter::default();

let mut data: &[u8] = b"\"Hel,lo\",World\nWelcome,Mars";
let mut bounds = vec![];
let mut count = 0;
loop {
    match scanner.scan(data, true) {
        ScanResult::Record { record, consumed } => {
            count += splitter.split_into(record, &mut bounds).unwrap();
            data = &data[consumed..];
        }
        ScanResult::NeedMore => unreachable!("all input is available"),
        ScanResult::End => break,
    }
}
assert_eq!(count, 4);
```
*/

#![deny(missing_docs)]

pub use crate::composer::{compose, Composer};
pub use crate::scanner::{ScanResult, Scanner};
pub use crate::splitter::{split, SplitError, Splitter};

mod composer;
mod scanner;
mod splitter;
