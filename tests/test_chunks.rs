use std::io::{self, Read};

use dsv::{Decoder, DecoderBuilder};
use proptest::prelude::*;

/// A reader that hands out its data a few bytes at a time.
struct ChunkReader<'a> {
    data: &'a [u8],
    chunk: usize,
}

impl<'a> Read for ChunkReader<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.chunk.min(buf.len()).min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }
}

fn collect<R: Read>(mut dec: Decoder<R>) -> Vec<Vec<String>> {
    let mut rows = vec![];
    while dec.advance().unwrap() {
        rows.push(dec.fields().unwrap().to_strings().unwrap());
    }
    rows
}

#[test]
fn test_chunks() {
    let data = b"col_a,col_b,col_c\n0aaaa,\"0b\nbbb\",0cccc\r\n1aaaa,1bbbb,1cccc";
    for chunk in 1..8 {
        let rdr = ChunkReader { data: &data[..], chunk: chunk };
        let dec = DecoderBuilder::new()
            .buffer_capacity(4)
            .from_reader(rdr)
            .unwrap();
        let rows = collect(dec);
        assert_eq!(rows.len(), 3, "chunk size {}", chunk);
        assert_eq!(rows[0], vec!["col_a", "col_b", "col_c"]);
        assert_eq!(rows[1], vec!["0aaaa", "0b\nbbb", "0cccc"]);
        assert_eq!(rows[2], vec!["1aaaa", "1bbbb", "1cccc"]);
    }
}

#[test]
fn newline_marker_split_across_reads() {
    let data = b"a<>b<>\"c<>d\"<>e";
    let rdr = ChunkReader { data: &data[..], chunk: 1 };
    let dec = DecoderBuilder::new()
        .newline("<>")
        .buffer_capacity(1)
        .from_reader(rdr)
        .unwrap();
    assert_eq!(
        collect(dec),
        vec![vec!["a"], vec!["b"], vec!["c<>d"], vec!["e"]]
    );
}

#[test]
fn positions_across_reads() {
    let data = b"aa,bb\ncc,\"d\nd\"\nee,ff\n";
    let rdr = ChunkReader { data: &data[..], chunk: 2 };
    let mut dec = Decoder::from_reader(rdr);
    let mut got = vec![];
    while dec.advance().unwrap() {
        let pos = dec.position();
        got.push((pos.record(), pos.line(), pos.byte()));
    }
    assert_eq!(got, vec![(0, 1, 0), (1, 2, 6), (2, 4, 15)]);
}

proptest! {
    #[test]
    fn chunk_size_does_not_matter(chunk in 1usize..16, capacity in 1usize..16) {
        let data = b"x,\"y\r\nz\",w\r\n\r\n\"q,r\",s";
        let whole = collect(Decoder::from_reader(&data[..]));
        let rdr = ChunkReader { data: &data[..], chunk: chunk };
        let dec = DecoderBuilder::new()
            .buffer_capacity(capacity)
            .from_reader(rdr)
            .unwrap();
        prop_assert_eq!(collect(dec), whole);
    }
}
