//! Chunked file loading
//!
//! Reads a file in fixed-size chunks, carrying any trailing partial
//! UTF-8 sequence over to the next read so every chunk handed to the
//! builder is valid text. Each chunk becomes one original buffer.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{BufferError, ErrorKind, Result};
use crate::piece_tree::{PieceTree, TreeBuilder};

const CHUNK_SIZE: usize = 64 * 1024;

/// Load a UTF-8 file into a `PieceTree`.
pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<PieceTree> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut builder = TreeBuilder::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut carry: Vec<u8> = Vec::new();

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        carry.extend_from_slice(&buf[..n]);

        // Hand off the longest valid prefix; keep the rest (at most a
        // partial code point) for the next read.
        let valid_len = match std::str::from_utf8(&carry) {
            Ok(_) => carry.len(),
            Err(e) => e.valid_up_to(),
        };
        if valid_len > 0 {
            let chunk = std::str::from_utf8(&carry[..valid_len]).expect("valid UTF-8 prefix");
            builder.accept_str(chunk);
            carry.drain(..valid_len);
        }
    }

    if !carry.is_empty() {
        // The file ended in the middle of a code point.
        return Err(BufferError::new(
            ErrorKind::Encoding,
            "file ends with an incomplete UTF-8 sequence",
        ));
    }

    Ok(builder.create())
}
