//! # dumptar
//!
//! Streaming chunked tar archives for database dump and restore tooling.
//!
//! A collection dump can be far larger than the memory or scratch disk of
//! the machine producing it. This crate stores such dumps as **chunked tar
//! archives**: a standard tar file in which every logical file (a
//! collection's data or its metadata document) is split across numbered tar
//! entries that a reader reassembles transparently. Producers stream bytes
//! in, consumers stream bytes out, and no logical file is ever materialized
//! whole.
//!
//! Two layers:
//!
//! - [`archive`]: the container. [`archive::ChunkWriter`] turns named byte
//!   streams into chunk entries using a double buffer and a background flush
//!   thread; [`archive::ChunkReader`] re-presents the archive as a sequence
//!   of named byte streams, validating chunk ordering.
//! - [`restore`]: the single-pass restore driver.
//!   [`restore::RestoreDriver`] walks the archive once, deciding when to
//!   begin a collection and when to apply its metadata and indexes,
//!   delegating the actual database work to a [`restore::RestoreTarget`]
//!   collaborator.
//!
//! # Quick Start
//!
//! ```
//! use dumptar::archive::{ChunkReader, ChunkWriter};
//! use std::io::Read;
//!
//! # fn main() -> dumptar::archive::ArchiveResult<()> {
//! let mut writer = ChunkWriter::new(Vec::new());
//! writer.open_entry("db1/users.bson")?;
//! writer.write(b"raw collection bytes")?;
//! writer.close()?;
//! let archive = writer.into_inner()?;
//!
//! let mut reader = ChunkReader::new(&archive[..]);
//! while let Some(name) = reader.next_file()? {
//!     let mut payload = Vec::new();
//!     reader.read_to_end(&mut payload)?;
//!     assert_eq!(name, "db1/users.bson");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Restoring is driven the same way, one forward pass:
//!
//! ```ignore
//! let mut reader = ChunkReader::new(dumptar::archive::open_source("dump.tar")?);
//! let driver = RestoreDriver::new(RestoreOptions::default());
//! driver.run(&mut reader, &mut my_target)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod archive;
pub mod restore;

pub use archive::{ArchiveError, ArchiveResult, ChunkReader, ChunkWriter};
pub use restore::{RestoreDriver, RestoreError, RestoreOptions, RestoreResult, RestoreTarget};
