//! Pull-based streaming readers
//!
//! A reader wraps a source and satisfies bounded `read` requests by pulling
//! chunks from the source on demand, feeding them through the codec engine
//! and writing straight into the caller's buffer. Input that did not fit is
//! kept for the next call, so no request ever waits for more output than it
//! asked for.

use crate::codec::{BoxedEngine, CodecEngine, Directive, InCursor, OutCursor, StreamState};
use crate::config::{ReaderOptions, DECOMPRESSION_RECOMMENDED_OUTPUT_SIZE};
use crate::error::{Result, SZStreamError};
use std::io::{ErrorKind, Read, Seek, SeekFrom};

/// Source state and buffering shared by both reader directions
struct PullCore<R: Read> {
    state: StreamState,
    source: R,
    engine: Option<BoxedEngine>,
    options: ReaderOptions,
    /// Input pulled from the source but not yet consumed by the engine
    pending: Vec<u8>,
    pending_pos: usize,
    finished_input: bool,
    finished_output: bool,
    bytes_read: u64,
    /// Compression readers pledge an unknown size before the first step
    needs_pledge: bool,
    /// A completed frame ends the stream unless `read_across_frames` is set
    stop_at_frame_end: bool,
}

impl<R: Read> PullCore<R> {
    fn new(
        source: R,
        engine: BoxedEngine,
        options: ReaderOptions,
        compress: bool,
    ) -> Result<Self> {
        if options.read_size == 0 {
            return Err(SZStreamError::misuse("read_size must be positive"));
        }
        Ok(Self {
            state: StreamState::NotEntered,
            source,
            engine: Some(engine),
            options,
            pending: Vec::new(),
            pending_pos: 0,
            finished_input: false,
            finished_output: false,
            bytes_read: 0,
            needs_pledge: compress,
            stop_at_frame_end: !compress && !options.read_across_frames,
        })
    }

    fn enter(&mut self) -> Result<()> {
        self.state.enter()?;
        tracing::debug!(
            engine = self.engine.as_ref().map_or("released", |e| e.name()),
            read_size = self.options.read_size,
            "reader entered"
        );
        Ok(())
    }

    fn close(&mut self) {
        if self.state != StreamState::Closed {
            tracing::debug!(bytes_read = self.bytes_read, "reader closed");
        }
        self.state = StreamState::Closed;
        self.engine = None;
        self.pending = Vec::new();
        self.pending_pos = 0;
    }

    fn has_pending(&self) -> bool {
        self.pending_pos < self.pending.len()
    }

    /// Pull up to `read_size` more bytes from the source onto `pending`
    fn pull(&mut self) -> Result<()> {
        if self.pending_pos > 0 {
            self.pending.drain(..self.pending_pos);
            self.pending_pos = 0;
        }
        let start = self.pending.len();
        self.pending.resize(start + self.options.read_size, 0);
        let count = loop {
            match self.source.read(&mut self.pending[start..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.pending.truncate(start);
                    return Err(e.into());
                }
            }
        };
        self.pending.truncate(start + count);
        if count == 0 {
            self.finished_input = true;
        }
        tracing::trace!(count, pending = self.pending.len(), "pulled from source");
        Ok(())
    }

    /// Fill `buf` as far as the stream allows
    fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.fill(buf, false)
    }

    /// Like `read_into`, but return as soon as any output was produced
    fn read_into1(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.fill(buf, true)
    }

    fn fill(&mut self, buf: &mut [u8], eager: bool) -> Result<usize> {
        if self.state == StreamState::Closed {
            return Err(SZStreamError::misuse("stream is closed"));
        }
        if self.finished_output || buf.is_empty() {
            return Ok(0);
        }

        if self.needs_pledge {
            if let Some(engine) = self.engine.as_mut() {
                engine.pledge_source_size(None)?;
            }
            self.needs_pledge = false;
        }

        let mut output = OutCursor::new(buf);
        loop {
            if self.has_pending() {
                let engine = self
                    .engine
                    .as_mut()
                    .ok_or_else(|| SZStreamError::misuse("stream is closed"))?;
                let mut input = InCursor::new(&self.pending[self.pending_pos..]);
                let before = output.pos();
                let ret = engine.step(&mut input, &mut output, Directive::Continue)?;
                let consumed = input.pos();
                self.pending_pos += consumed;
                if !self.has_pending() {
                    self.pending.clear();
                    self.pending_pos = 0;
                }

                if ret == 0 && self.stop_at_frame_end {
                    self.finished_output = true;
                    break;
                }
                if output.is_full() || (eager && output.pos() > 0) {
                    break;
                }
                if consumed > 0 || output.pos() > before {
                    continue;
                }
            }

            if self.finished_input {
                break;
            }
            self.pull()?;
        }

        if self.finished_input && !self.finished_output && !output.is_full() && !self.has_pending()
        {
            self.drain(&mut output)?;
        }

        let produced = output.pos();
        self.bytes_read += produced as u64;
        Ok(produced)
    }

    /// Collect buffered engine output once the source is exhausted
    fn drain(&mut self, output: &mut OutCursor<'_>) -> Result<()> {
        let engine = self
            .engine
            .as_mut()
            .ok_or_else(|| SZStreamError::misuse("stream is closed"))?;
        let mut input = InCursor::empty();
        loop {
            let before = output.pos();
            let ret = engine.step(&mut input, output, Directive::End)?;
            tracing::trace!(
                engine = engine.name(),
                ret,
                produced = output.pos() - before,
                "drain step"
            );
            if ret == 0 || output.pos() == before {
                self.finished_output = true;
                return Ok(());
            }
            if output.is_full() {
                return Ok(());
            }
        }
    }

    /// Drop the first `count` bytes of the source without decoding them
    fn skip_input(&mut self, count: usize) -> Result<()> {
        while self.pending.len() - self.pending_pos < count {
            if self.finished_input {
                return Err(SZStreamError::misuse("cannot skip past the end of the source"));
            }
            self.pull()?;
        }
        self.pending_pos += count;
        Ok(())
    }

    fn read1(&mut self, size: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; size];
        let count = self.read_into1(&mut buf)?;
        buf.truncate(count);
        Ok(buf)
    }

    fn read(&mut self, size: usize) -> Result<Vec<u8>> {
        if size == 0 {
            return Err(SZStreamError::misuse(
                "cannot read negative or size 0 amounts",
            ));
        }
        let mut buf = vec![0u8; size];
        let count = self.read_into(&mut buf)?;
        buf.truncate(count);
        Ok(buf)
    }

    fn readall(&mut self) -> Result<Vec<u8>> {
        let mut result = Vec::new();
        let mut chunk = vec![0u8; DECOMPRESSION_RECOMMENDED_OUTPUT_SIZE];
        loop {
            let count = self.read_into(&mut chunk)?;
            if count == 0 {
                return Ok(result);
            }
            result.extend_from_slice(&chunk[..count]);
        }
    }
}

macro_rules! reader_common_ops {
    () => {
        /// Start the scope
        pub fn enter(&mut self) -> Result<()> {
            self.core.enter()
        }

        /// Leave the scope, releasing the engine
        pub fn exit(&mut self) -> Result<()> {
            self.core.state.require_active("exit")?;
            self.core.close();
            Ok(())
        }

        /// Release the engine; safe to call any number of times
        pub fn close(&mut self) {
            self.core.close()
        }

        pub fn is_closed(&self) -> bool {
            self.core.state == StreamState::Closed
        }

        /// Read up to `size` bytes; an empty result means end of stream
        pub fn read(&mut self, size: usize) -> Result<Vec<u8>> {
            self.core.read(size)
        }

        /// Fill `buf` as far as possible, returning the byte count
        pub fn read_into(&mut self, buf: &mut [u8]) -> Result<usize> {
            self.core.read_into(buf)
        }

        /// Read at most `size` bytes, returning once any output is available
        ///
        /// May pull from the source more than once when input produces no
        /// output. A zero `size` yields an empty result.
        pub fn read1(&mut self, size: usize) -> Result<Vec<u8>> {
            self.core.read1(size)
        }

        /// [`read1`](Self::read1) into a caller buffer
        pub fn read_into1(&mut self, buf: &mut [u8]) -> Result<usize> {
            self.core.read_into1(buf)
        }

        /// Read until end of stream
        pub fn readall(&mut self) -> Result<Vec<u8>> {
            self.core.readall()
        }

        /// Bytes delivered so far
        pub fn tell(&self) -> u64 {
            self.core.bytes_read
        }

        pub fn into_inner(self) -> R {
            self.core.source
        }

        pub fn get_ref(&self) -> &R {
            &self.core.source
        }

        pub fn readline(&mut self) -> Result<Vec<u8>> {
            Err(SZStreamError::Unsupported("readline"))
        }

        pub fn readlines(&mut self) -> Result<Vec<Vec<u8>>> {
            Err(SZStreamError::Unsupported("readlines"))
        }

        /// Line iteration is not offered
        pub fn lines(&mut self) -> Result<std::vec::IntoIter<Vec<u8>>> {
            Err(SZStreamError::Unsupported("iteration"))
        }

        pub fn write(&mut self, _data: &[u8]) -> Result<usize> {
            Err(SZStreamError::Unsupported("write"))
        }

        pub fn writelines(&mut self, _lines: &[&[u8]]) -> Result<()> {
            Err(SZStreamError::Unsupported("writelines"))
        }

        pub fn readable(&self) -> bool {
            true
        }

        pub fn writable(&self) -> bool {
            false
        }
    };
}

/// Reader producing compressed bytes from an uncompressed source
pub struct CompressionReader<R: Read> {
    core: PullCore<R>,
}

impl<R: Read> CompressionReader<R> {
    pub fn new(source: R, engine: BoxedEngine, options: ReaderOptions) -> Result<Self> {
        Ok(Self {
            core: PullCore::new(source, engine, options, true)?,
        })
    }

    reader_common_ops!();

    pub fn seekable(&self) -> bool {
        false
    }

    pub fn seek(&mut self, _pos: SeekFrom) -> Result<u64> {
        Err(SZStreamError::Unsupported("seek"))
    }
}

impl<R: Read> Read for CompressionReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(self.core.read_into(buf)?)
    }
}

/// Reader producing decompressed bytes from a compressed source
pub struct DecompressionReader<R: Read> {
    core: PullCore<R>,
}

impl<R: Read> DecompressionReader<R> {
    pub fn new(source: R, engine: BoxedEngine, options: ReaderOptions) -> Result<Self> {
        Ok(Self {
            core: PullCore::new(source, engine, options, false)?,
        })
    }

    reader_common_ops!();

    pub fn seekable(&self) -> bool {
        true
    }

    /// Move forward by decompressing and discarding output
    ///
    /// Lands on the target or at end of stream, whichever comes first.
    /// Backward targets are rejected; so are offsets from the end, since the
    /// decompressed length is unknown.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        if self.core.state == StreamState::Closed {
            return Err(SZStreamError::misuse("stream is closed"));
        }
        let current = self.core.bytes_read;
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) if delta >= 0 => current.checked_add(delta as u64),
            SeekFrom::Current(delta) => current.checked_sub(delta.unsigned_abs()),
            SeekFrom::End(_) => {
                return Err(SZStreamError::Unsupported("seek relative to end of stream"))
            }
        };
        let target = match target {
            Some(target) if target >= current => target,
            _ => {
                return Err(SZStreamError::misuse(
                    "cannot seek backwards in a decompression reader",
                ))
            }
        };

        let window = (target - current).min(DECOMPRESSION_RECOMMENDED_OUTPUT_SIZE as u64);
        let mut scratch = vec![0u8; window as usize];
        while self.core.bytes_read < target {
            let want = (target - self.core.bytes_read).min(scratch.len() as u64) as usize;
            if self.core.read_into(&mut scratch[..want])? == 0 {
                break;
            }
        }
        tracing::trace!(target, position = self.core.bytes_read, "seek finished");
        Ok(self.core.bytes_read)
    }
}

impl<R: Read> DecompressionReader<R> {
    pub(crate) fn skip_input(&mut self, count: usize) -> Result<()> {
        self.core.skip_input(count)
    }
}

impl<R: Read> Read for DecompressionReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(self.core.read_into(buf)?)
    }
}

impl<R: Read> Seek for DecompressionReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        Ok(DecompressionReader::seek(self, pos)?)
    }
}

/// Compressed form of a source, one piece per item as soon as output is ready
pub struct CompressedChunks<R: Read> {
    reader: CompressionReader<R>,
    write_size: usize,
    done: bool,
}

impl<R: Read> CompressedChunks<R> {
    pub(crate) fn new(reader: CompressionReader<R>, write_size: usize) -> Result<Self> {
        if write_size == 0 {
            return Err(SZStreamError::misuse("write_size must be positive"));
        }
        Ok(Self {
            reader,
            write_size,
            done: false,
        })
    }
}

impl<R: Read> Iterator for CompressedChunks<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let chunk = self.reader.read1(self.write_size);
        next_chunk(chunk, &mut self.done)
    }
}

/// Decompressed form of a source in pieces of `write_size` bytes
///
/// Every item but the last is exactly `write_size` long. Decoding continues
/// across frame boundaries.
pub struct DecompressedChunks<R: Read> {
    reader: DecompressionReader<R>,
    write_size: usize,
    done: bool,
}

impl<R: Read> DecompressedChunks<R> {
    pub(crate) fn new(reader: DecompressionReader<R>, write_size: usize) -> Result<Self> {
        if write_size == 0 {
            return Err(SZStreamError::misuse("write_size must be positive"));
        }
        Ok(Self {
            reader,
            write_size,
            done: false,
        })
    }
}

impl<R: Read> Iterator for DecompressedChunks<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let chunk = self.reader.read(self.write_size);
        next_chunk(chunk, &mut self.done)
    }
}

/// End iteration on an empty chunk or the first error
fn next_chunk(chunk: Result<Vec<u8>>, done: &mut bool) -> Option<Result<Vec<u8>>> {
    match chunk {
        Ok(chunk) if chunk.is_empty() => {
            *done = true;
            None
        }
        Ok(chunk) => Some(Ok(chunk)),
        Err(e) => {
            *done = true;
            Some(Err(e))
        }
    }
}
