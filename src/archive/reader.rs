//! Chunked archive reader.
//!
//! The reader consumes a tar stream strictly forward and re-presents it as
//! a sequence of named logical files. [`ChunkReader::next_file`] advances to
//! the next logical file; the [`Read`] implementation yields the current
//! file's bytes, continuing transparently across its chunk entries and
//! stopping (with `Ok(0)`) at the file boundary.
//!
//! Tar headers are parsed block-by-block rather than through a tar
//! unpacker so the source never needs to be seekable: one 512-byte header,
//! the payload, the padding, repeat. Chunk ordering is validated as entries
//! stream past; a violation poisons the read.

use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{self, Read};
use tracing::debug;

use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::archive::BLOCK_SIZE;

/// Chunk entry names: logical name, a dot, exactly twelve decimal digits.
static CHUNK_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+)\.(\d{12})$").expect("chunk name regex"));

/// Outcome of consuming one tar entry header.
enum ChunkStep {
    /// The entry is the next chunk of the current logical file.
    Continued,
    /// The entry starts a new logical file, queued for `next_file`.
    NewFile,
    /// End of the tar archive.
    EndOfArchive,
}

/// Streaming reader that reassembles the logical files of a chunked tar
/// archive.
///
/// Alternate [`next_file`](ChunkReader::next_file) with reads; chunks not
/// consumed before the next `next_file` call are skipped (their ordering is
/// still validated).
pub struct ChunkReader<R> {
    source: R,
    /// Active logical file; empty when between files.
    name: String,
    /// Chunk index last seen for the active file.
    number: u64,
    /// One-entry lookahead filled when a new logical file's header is seen.
    pending_name: Option<String>,
    /// Unread payload bytes of the current tar entry.
    remaining: u64,
    /// Block padding following the current tar entry.
    padding: u64,
    done: bool,
}

impl<R: Read> ChunkReader<R> {
    /// Create a reader over a tar byte source.
    pub fn new(source: R) -> Self {
        ChunkReader {
            source,
            name: String::new(),
            number: 0,
            pending_name: None,
            remaining: 0,
            padding: 0,
            done: false,
        }
    }

    /// Advance to the next logical file, returning its name, or `Ok(None)`
    /// at the end of the archive.
    ///
    /// Any unread chunks of the current file are skipped on the way.
    pub fn next_file(&mut self) -> ArchiveResult<Option<String>> {
        while self.pending_name.is_none() {
            if let ChunkStep::EndOfArchive = self.next_chunk()? {
                return Ok(None);
            }
        }
        let name = self.pending_name.take().unwrap_or_default();
        self.name = name.clone();
        self.number = 0;
        Ok(Some(name))
    }

    /// Consume the next tar entry header and classify it against the
    /// current logical file.
    fn next_chunk(&mut self) -> ArchiveResult<ChunkStep> {
        if self.done {
            return Ok(ChunkStep::EndOfArchive);
        }
        self.discard_entry_remainder()?;

        let (entry_name, size) = match self.read_header()? {
            Some(header) => header,
            None => {
                self.done = true;
                return Ok(ChunkStep::EndOfArchive);
            }
        };
        self.remaining = size;
        self.padding = (BLOCK_SIZE as u64 - size % BLOCK_SIZE as u64) % BLOCK_SIZE as u64;
        debug!(entry = %entry_name, size, "read tar header");

        let Some((base, index)) = parse_chunk_name(&entry_name) else {
            // Not a chunk entry: surface it as a single-chunk logical file.
            self.pending_name = Some(entry_name);
            self.name.clear();
            return Ok(ChunkStep::NewFile);
        };

        if base == self.name {
            if index != self.number + 1 {
                return Err(ArchiveError::ChunkOutOfOrder {
                    name: base,
                    expected: self.number + 1,
                    actual: index,
                });
            }
            self.number = index;
            Ok(ChunkStep::Continued)
        } else {
            if index != 0 {
                return Err(ArchiveError::MissingFirstChunk {
                    name: base,
                    actual: index,
                });
            }
            self.pending_name = Some(base);
            self.name.clear();
            Ok(ChunkStep::NewFile)
        }
    }

    /// Drain whatever is left of the current tar entry, padding included.
    fn discard_entry_remainder(&mut self) -> ArchiveResult<()> {
        let skip = self.remaining + self.padding;
        if skip > 0 {
            let copied = io::copy(&mut (&mut self.source).take(skip), &mut io::sink())?;
            if copied < skip {
                return Err(ArchiveError::malformed("archive truncated inside an entry"));
            }
            self.remaining = 0;
            self.padding = 0;
        }
        Ok(())
    }

    /// Read one header block; `Ok(None)` on a zero block or clean EOF.
    fn read_header(&mut self) -> ArchiveResult<Option<(String, u64)>> {
        let mut block = [0u8; BLOCK_SIZE];
        let mut filled = 0;
        while filled < BLOCK_SIZE {
            let n = self.source.read(&mut block[filled..])?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(ArchiveError::malformed("truncated tar header block"));
            }
            filled += n;
        }
        if block.iter().all(|&b| b == 0) {
            return Ok(None);
        }

        let mut header = tar::Header::new_old();
        header.as_mut_bytes().copy_from_slice(&block);
        verify_checksum(&header)?;

        let path = header.path_bytes();
        let name = std::str::from_utf8(path.as_ref())
            .map_err(|_| ArchiveError::malformed("entry name is not valid UTF-8"))?
            .to_string();
        let size = header
            .entry_size()
            .map_err(|err| ArchiveError::malformed(format!("bad size field: {err}")))?;
        Ok(Some((name, size)))
    }
}

impl<R: Read> Read for ChunkReader<R> {
    /// Read bytes of the current logical file.
    ///
    /// Returns `Ok(0)` at the end of the logical file; call
    /// [`next_file`](ChunkReader::next_file) to advance. Structural archive
    /// errors surface as [`io::ErrorKind::InvalidData`] wrapping the
    /// [`ArchiveError`].
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending_name.is_some() || self.name.is_empty() {
            return Ok(0);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.remaining > 0 {
                let want = (self.remaining).min(buf.len() as u64) as usize;
                let n = self.source.read(&mut buf[..want])?;
                if n == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "archive truncated inside an entry",
                    ));
                }
                self.remaining -= n as u64;
                return Ok(n);
            }
            match self.next_chunk()? {
                ChunkStep::Continued => continue,
                ChunkStep::NewFile | ChunkStep::EndOfArchive => return Ok(0),
            }
        }
    }
}

/// Split a chunk entry name into its logical name and chunk index; `None`
/// for names that are not chunk entries.
fn parse_chunk_name(entry_name: &str) -> Option<(String, u64)> {
    let captures = CHUNK_NAME.captures(entry_name)?;
    let base = captures.get(1)?.as_str().to_string();
    // Twelve decimal digits always fit in a u64.
    let index = captures.get(2)?.as_str().parse().ok()?;
    Some((base, index))
}

/// Validate the header checksum, accepting both the standard unsigned sum
/// and the legacy signed variant.
fn verify_checksum(header: &tar::Header) -> ArchiveResult<()> {
    let recorded = header
        .cksum()
        .map_err(|err| ArchiveError::malformed(format!("bad checksum field: {err}")))?;
    let mut unsigned: u64 = 0;
    let mut signed: i64 = 0;
    for (i, &b) in header.as_bytes().iter().enumerate() {
        let b = if (148..156).contains(&i) { b' ' } else { b };
        unsigned += u64::from(b);
        signed += i64::from(b as i8);
    }
    if u64::from(recorded) != unsigned && i64::from(recorded) != signed {
        return Err(ArchiveError::malformed("tar header checksum mismatch"));
    }
    Ok(())
}
