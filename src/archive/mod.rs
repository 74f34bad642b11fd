//! Chunked tar archive container.
//!
//! A chunked archive is an ordinary tar file whose entries carry names of
//! the form `<logical>.<NNNNNNNNNNNN>`: the logical file name followed by a
//! chunk index zero-padded to exactly twelve decimal digits. Chunks of one
//! logical file are contiguous and numbered from zero; tar entries whose
//! names do not match the chunk pattern are surfaced as single-chunk
//! logical files. Any tar tool can unpack the archive; only this crate
//! reassembles the logical streams.
//!
//! ## Chunk sizing
//!
//! The writer buffers producer bytes and cuts a chunk whenever the buffer
//! crosses [`BUFFER_THRESHOLD`]; a single chunk body never exceeds
//! [`BUFFER_LIMIT`]. These are constants of the on-disk format, shared by
//! writer and reader.
//!
//! ## Concurrency
//!
//! [`ChunkWriter`] is double-buffered: the producer fills one buffer while a
//! background thread appends the other to the tar sink, so a producer write
//! blocks for at most one buffer swap. [`ChunkReader`] is a plain
//! single-threaded pull reader.

pub mod error;
pub mod reader;
pub mod writer;

pub use error::{ArchiveError, ArchiveResult};
pub use reader::ChunkReader;
pub use writer::ChunkWriter;

use std::fs::File;
use std::io::{self, Read};

/// Buffered input above this size forces the writer to cut a chunk.
pub const BUFFER_THRESHOLD: usize = 4 * 1024 * 1024;

/// Hard cap on a chunk body; oversized producer writes are split here.
pub const BUFFER_LIMIT: usize = 2 * BUFFER_THRESHOLD;

/// Tar block granularity; headers and payload padding are block-sized.
pub(crate) const BLOCK_SIZE: usize = 512;

/// Open an archive byte source by path, `-` meaning stdin.
pub fn open_source(path: &str) -> io::Result<Box<dyn Read>> {
    if path == "-" {
        Ok(Box::new(io::stdin()))
    } else {
        Ok(Box::new(File::open(path)?))
    }
}
