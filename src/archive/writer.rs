//! Chunked archive writer.
//!
//! The writer accepts an unbounded byte stream grouped into named logical
//! files and emits a standard tar archive of numbered chunk entries. It is
//! double-buffered: the producer fills the *input* buffer while a dedicated
//! flush thread appends the *output* buffer to the tar sink, so a producer
//! write blocks for at most one buffer swap.
//!
//! ## Swap protocol
//!
//! A swap (1) waits for the in-flight chunk, latching any failure, (2)
//! derives the next chunk name `<entry>.<index:012>`, (3) exchanges the two
//! buffers by identity, and (4) hands the full buffer to the flush thread,
//! which writes a tar header and the body, clears the buffer, and returns
//! it. At most one chunk is ever in flight; the job/done channel pair is the
//! task-completion barrier, and the latched error string is the error cell.
//! Twelve digits of chunk index cover roughly 4 × 10^18 chunks per entry
//! before the padding would widen.
//!
//! A flush-thread failure is terminal: it is surfaced by the next writer
//! operation and every operation after that, and the archive must be
//! considered truncated.

use std::io::{self, Write};
use std::mem;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};
use tar::{Builder, Header};
use tracing::debug;

use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::archive::{BUFFER_LIMIT, BUFFER_THRESHOLD};

enum ChunkJob {
    /// Append one chunk entry; the buffer comes back through the done channel.
    Chunk { name: String, data: Vec<u8> },
    /// Flush the underlying sink.
    Sync,
    /// Finish the tar archive (end-of-archive padding) and flush.
    Finish,
}

struct ChunkDone {
    buffer: Option<Vec<u8>>,
    result: io::Result<()>,
}

/// Streaming writer that splits named logical files into chunk entries of a
/// tar archive.
///
/// Chunks are cut whenever the buffered input crosses
/// [`BUFFER_THRESHOLD`](crate::archive::BUFFER_THRESHOLD); a single chunk
/// body never exceeds [`BUFFER_LIMIT`](crate::archive::BUFFER_LIMIT).
/// An entry closed without any data still gets one zero-size chunk so the
/// logical file survives the round trip.
pub struct ChunkWriter<W> {
    jobs: Option<SyncSender<ChunkJob>>,
    done: Receiver<ChunkDone>,
    worker: Option<JoinHandle<Option<W>>>,
    /// Producer-owned buffer; its twin is either parked here or in flight.
    input: Vec<u8>,
    parked: Option<Vec<u8>>,
    in_flight: bool,
    failed: Option<String>,
    name: String,
    chunk_count: u64,
    open: bool,
    finished: Option<W>,
}

impl<W: Write + Send + 'static> ChunkWriter<W> {
    /// Create a writer emitting a tar archive into `sink` and spawn its
    /// flush thread.
    pub fn new(sink: W) -> Self {
        let (job_tx, job_rx) = mpsc::sync_channel(1);
        let (done_tx, done_rx) = mpsc::sync_channel(1);
        let builder = Builder::new(sink);
        let worker = thread::Builder::new()
            .name("dumptar-flush".to_string())
            .spawn(move || run_flush_worker(builder, job_rx, done_tx))
            .expect("failed to spawn archive flush thread");

        ChunkWriter {
            jobs: Some(job_tx),
            done: done_rx,
            worker: Some(worker),
            input: Vec::new(),
            parked: Some(Vec::new()),
            in_flight: false,
            failed: None,
            name: String::new(),
            chunk_count: 0,
            open: true,
            finished: None,
        }
    }

    /// Declare that subsequent writes belong to the logical file `name`.
    ///
    /// Finishes the previous entry first: any buffered bytes are emitted as
    /// its final chunk, or a zero-size chunk if the entry never produced
    /// one. The chunk counter restarts at zero for the new entry.
    pub fn open_entry(&mut self, name: &str) -> ArchiveResult<()> {
        self.ensure_open()?;
        self.ensure_healthy()?;
        self.finish_entry()?;
        self.name = name.to_string();
        self.chunk_count = 0;
        debug!(entry = %self.name, "now writing chunks");
        Ok(())
    }

    /// Append bytes to the current entry, returning the number accepted
    /// (always all of them on success).
    ///
    /// A write that would overfill the input buffer is split at
    /// [`BUFFER_LIMIT`](crate::archive::BUFFER_LIMIT) with intermediate
    /// swaps; afterwards one swap is forced if the buffer crossed
    /// [`BUFFER_THRESHOLD`](crate::archive::BUFFER_THRESHOLD).
    pub fn write(&mut self, bytes: &[u8]) -> ArchiveResult<usize> {
        self.ensure_open()?;
        self.ensure_healthy()?;

        let total = bytes.len();
        let mut start = 0;
        let mut stop = total.min(BUFFER_LIMIT - self.input.len());
        while start < total {
            if start > 0 {
                self.swap()?;
            }
            self.input.extend_from_slice(&bytes[start..stop]);
            start = stop;
            stop = total.min(stop + BUFFER_LIMIT);
        }

        if self.input.len() > BUFFER_THRESHOLD {
            self.swap()?;
        }
        Ok(total)
    }

    /// Emit any buffered bytes as the next chunk, wait for the flush thread,
    /// then flush the underlying sink.
    ///
    /// Idempotent when nothing is buffered and nothing is in flight.
    pub fn flush(&mut self) -> ArchiveResult<()> {
        self.ensure_open()?;
        self.ensure_healthy()?;
        if !self.input.is_empty() {
            self.swap()?;
        }
        self.barrier()?;
        self.control(ChunkJob::Sync)
    }

    /// Finish the current entry and the archive (writing tar end-of-archive
    /// padding), flush the sink, and join the flush thread.
    ///
    /// Every operation after `close` fails with
    /// [`ArchiveError::WriterClosed`].
    pub fn close(&mut self) -> ArchiveResult<()> {
        self.ensure_open()?;
        self.open = false;
        self.ensure_healthy()?;
        self.finish_entry()?;
        self.control(ChunkJob::Finish)?;
        self.jobs = None;
        if let Some(handle) = self.worker.take() {
            if let Ok(inner) = handle.join() {
                self.finished = inner;
            }
        }
        Ok(())
    }

    /// Recover the sink, closing the writer first if needed.
    pub fn into_inner(mut self) -> ArchiveResult<W> {
        if self.open {
            self.close()?;
        }
        self.finished.take().ok_or_else(|| {
            ArchiveError::Background("archive sink was lost after a background failure".to_string())
        })
    }

    fn ensure_open(&self) -> ArchiveResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(ArchiveError::WriterClosed)
        }
    }

    fn ensure_healthy(&self) -> ArchiveResult<()> {
        match &self.failed {
            Some(msg) => Err(ArchiveError::Background(msg.clone())),
            None => Ok(()),
        }
    }

    /// Close out the current entry: emit leftover bytes, or a zero-size
    /// chunk if the entry emitted none, then wait for the flush thread.
    fn finish_entry(&mut self) -> ArchiveResult<()> {
        if !self.name.is_empty() && (!self.input.is_empty() || self.chunk_count == 0) {
            self.swap()?;
        }
        self.barrier()
    }

    /// Exchange the buffers and hand the full one to the flush thread.
    fn swap(&mut self) -> ArchiveResult<()> {
        self.barrier()?;
        let chunk = format!("{}.{:012}", self.name, self.chunk_count);
        self.chunk_count += 1;
        let data = mem::replace(&mut self.input, self.parked.take().unwrap_or_default());
        debug!(chunk = %chunk, bytes = data.len(), "writing chunk");
        let sent = match &self.jobs {
            Some(jobs) => jobs.send(ChunkJob::Chunk { name: chunk, data }).is_ok(),
            None => false,
        };
        if !sent {
            return Err(self.latch_gone());
        }
        self.in_flight = true;
        Ok(())
    }

    /// Wait for the in-flight chunk, repossess its buffer, and latch any
    /// failure.
    fn barrier(&mut self) -> ArchiveResult<()> {
        if !self.in_flight {
            return Ok(());
        }
        self.in_flight = false;
        match self.done.recv() {
            Ok(done) => {
                if let Some(buffer) = done.buffer {
                    self.parked = Some(buffer);
                }
                match done.result {
                    Ok(()) => Ok(()),
                    Err(err) => Err(self.latch(err)),
                }
            }
            Err(_) => Err(self.latch_gone()),
        }
    }

    /// Run a synchronous control job (sync/finish) on the flush thread.
    fn control(&mut self, job: ChunkJob) -> ArchiveResult<()> {
        let sent = match &self.jobs {
            Some(jobs) => jobs.send(job).is_ok(),
            None => false,
        };
        if !sent {
            return Err(self.latch_gone());
        }
        match self.done.recv() {
            Ok(done) => match done.result {
                Ok(()) => Ok(()),
                Err(err) => Err(self.latch(err)),
            },
            Err(_) => Err(self.latch_gone()),
        }
    }

    fn latch(&mut self, err: io::Error) -> ArchiveError {
        let msg = err.to_string();
        self.failed = Some(msg.clone());
        ArchiveError::Background(msg)
    }

    fn latch_gone(&mut self) -> ArchiveError {
        let msg = "archive flush thread terminated unexpectedly".to_string();
        self.failed = Some(msg.clone());
        ArchiveError::Background(msg)
    }
}

impl<W> Drop for ChunkWriter<W> {
    fn drop(&mut self) {
        // Closing the job channel stops the flush thread; an abandoned
        // writer leaves the archive logically truncated.
        self.jobs = None;
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

/// Flush thread body: owns the tar builder and serves jobs until `Finish`
/// or channel close, then yields the sink back.
fn run_flush_worker<W: Write>(
    mut builder: Builder<W>,
    jobs: Receiver<ChunkJob>,
    done: SyncSender<ChunkDone>,
) -> Option<W> {
    while let Ok(job) = jobs.recv() {
        match job {
            ChunkJob::Chunk { name, mut data } => {
                let result = append_chunk(&mut builder, &name, &data);
                data.clear();
                if done
                    .send(ChunkDone {
                        buffer: Some(data),
                        result,
                    })
                    .is_err()
                {
                    return None;
                }
            }
            ChunkJob::Sync => {
                let result = builder.get_mut().flush();
                if done
                    .send(ChunkDone {
                        buffer: None,
                        result,
                    })
                    .is_err()
                {
                    return None;
                }
            }
            ChunkJob::Finish => {
                let result = builder.finish().and_then(|()| builder.get_mut().flush());
                let _ = done.send(ChunkDone {
                    buffer: None,
                    result,
                });
                break;
            }
        }
    }
    builder.into_inner().ok()
}

fn append_chunk<W: Write>(builder: &mut Builder<W>, name: &str, data: &[u8]) -> io::Result<()> {
    let mut header = Header::new_gnu();
    header.set_path(name)?;
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    // Zero mtime keeps identical producer streams byte-identical on disk.
    header.set_mtime(0);
    header.set_cksum();
    builder.append(&header, data)
}
