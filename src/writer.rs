//! Push-based streaming writers
//!
//! Callers push chunks into a writer; every chunk is run through the codec
//! engine and whatever the engine produces is drained to the sink right away,
//! so memory use is bounded by the output window size no matter how much data
//! flows through.
//!
//! Writers follow a scoped lifecycle:
//!
//! ```no_run
//! use s_zstream::{Compressor, CompressionParameters, FlushMode, WriterOptions};
//!
//! # fn example() -> s_zstream::Result<()> {
//! let compressor = Compressor::new(CompressionParameters::zstd(3));
//! let mut writer = compressor.stream_writer(Vec::new(), WriterOptions::for_compression())?;
//! writer.enter()?;
//! writer.write(b"some data")?;
//! writer.flush(FlushMode::Block)?;
//! writer.write(b"more data")?;
//! writer.exit(true)?;
//! let frame = writer.into_inner()?;
//! # Ok(())
//! # }
//! ```

use crate::codec::{BoxedEngine, CodecEngine, Directive, InCursor, OutCursor, StreamState};
use crate::config::WriterOptions;
use crate::error::{Result, SZStreamError};
use std::io::{SeekFrom, Write};

/// How far a compression flush goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushMode {
    /// Emit buffered data; the current frame stays open for more writes
    Block,
    /// Emit buffered data and end the frame
    Frame,
}

/// State shared by both writer directions
struct PushCore<W: Write> {
    state: StreamState,
    sink: Option<W>,
    engine: Option<BoxedEngine>,
    window: Vec<u8>,
    options: WriterOptions,
    bytes_written: u64,
    /// Whether a normal exit ends the current frame
    end_frame_on_exit: bool,
}

impl<W: Write> PushCore<W> {
    fn new(
        sink: W,
        engine: BoxedEngine,
        options: WriterOptions,
        end_frame_on_exit: bool,
    ) -> Result<Self> {
        if options.write_size == 0 {
            return Err(SZStreamError::misuse("write_size must be positive"));
        }
        Ok(Self {
            state: StreamState::NotEntered,
            sink: Some(sink),
            engine: Some(engine),
            window: vec![0u8; options.write_size],
            options,
            bytes_written: 0,
            end_frame_on_exit,
        })
    }

    fn enter(&mut self, pledge: bool) -> Result<()> {
        self.state.enter()?;
        if pledge {
            if let Some(engine) = self.engine.as_mut() {
                engine.pledge_source_size(self.options.source_size)?;
            }
        }
        tracing::debug!(
            engine = self.engine.as_ref().map_or("released", |e| e.name()),
            write_size = self.window.len(),
            source_size = ?self.options.source_size,
            "writer entered"
        );
        Ok(())
    }

    /// Step the engine over `input` until `done` says so, draining after each step
    ///
    /// Returns the number of bytes pushed to the sink.
    fn pump(
        &mut self,
        input: &mut InCursor<'_>,
        directive: Directive,
        done: impl Fn(usize, &InCursor<'_>, bool) -> bool,
    ) -> Result<usize> {
        let Self {
            sink,
            engine,
            window,
            bytes_written,
            ..
        } = self;
        let sink = sink
            .as_mut()
            .ok_or_else(|| SZStreamError::misuse("sink already released"))?;
        let engine = engine
            .as_mut()
            .ok_or_else(|| SZStreamError::misuse("stream is closed"))?;

        let mut total = 0;
        loop {
            let mut output = OutCursor::new(&mut window[..]);
            let ret = engine.step(input, &mut output, directive)?;
            let produced = output.pos();
            let window_full = output.is_full();
            tracing::trace!(
                engine = engine.name(),
                ?directive,
                consumed = input.pos(),
                produced,
                ret,
                "writer step"
            );
            if produced > 0 {
                sink.write_all(&window[..produced])?;
                total += produced;
                *bytes_written += produced as u64;
            }
            if done(ret, input, window_full) {
                return Ok(total);
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.state.require_active("write")?;
        let mut input = InCursor::new(data);
        let written = self
            .pump(&mut input, Directive::Continue, |_, input, full| {
                input.is_consumed() && !full
            })
            .map_err(|e| self.fail(e))?;
        if self.options.write_return_read {
            Ok(data.len())
        } else {
            Ok(written)
        }
    }

    fn finish_step(&mut self, directive: Directive) -> Result<usize> {
        let mut input = InCursor::empty();
        let written = self
            .pump(&mut input, directive, |ret, _, _| ret == 0)
            .map_err(|e| self.fail(e))?;
        self.flush_sink()?;
        Ok(written)
    }

    /// Give up on a stream whose engine or sink failed mid-step
    fn fail(&mut self, err: SZStreamError) -> SZStreamError {
        tracing::debug!(error = %err, bytes_written = self.bytes_written, "writer failed");
        self.state = StreamState::Closed;
        self.engine = None;
        self.window = Vec::new();
        err
    }

    fn flush_sink(&mut self) -> Result<()> {
        if let Some(sink) = self.sink.as_mut() {
            sink.flush()?;
        }
        Ok(())
    }

    fn exit(&mut self, normal_exit: bool) -> Result<()> {
        self.state.require_active("exit")?;
        let result = if normal_exit {
            if self.end_frame_on_exit {
                self.finish_step(Directive::End).map(|_| ())
            } else {
                self.flush_sink()
            }
        } else {
            Ok(())
        };
        self.state = StreamState::Closed;
        self.engine = None;
        self.window = Vec::new();
        tracing::debug!(
            bytes_written = self.bytes_written,
            normal_exit,
            ok = result.is_ok(),
            "writer exited"
        );
        result
    }

    fn close(&mut self) -> Result<()> {
        match self.state {
            StreamState::Active => self.exit(true),
            _ => {
                self.state = StreamState::Closed;
                self.engine = None;
                Ok(())
            }
        }
    }

    fn into_inner(&mut self) -> Result<W> {
        if self.state == StreamState::Active {
            self.exit(true)?;
        }
        self.state = StreamState::Closed;
        self.engine = None;
        self.sink
            .take()
            .ok_or_else(|| SZStreamError::misuse("sink already released"))
    }
}

impl<W: Write> Drop for PushCore<W> {
    fn drop(&mut self) {
        if self.state == StreamState::Active {
            if let Err(e) = self.exit(true) {
                tracing::warn!(error = %e, "failed to finish writer on drop");
            }
        }
    }
}

macro_rules! unsupported_writer_ops {
    () => {
        pub fn read(&mut self, _size: usize) -> Result<Vec<u8>> {
            Err(SZStreamError::Unsupported("read"))
        }

        pub fn readline(&mut self) -> Result<Vec<u8>> {
            Err(SZStreamError::Unsupported("readline"))
        }

        pub fn readlines(&mut self) -> Result<Vec<Vec<u8>>> {
            Err(SZStreamError::Unsupported("readlines"))
        }

        pub fn seek(&mut self, _pos: SeekFrom) -> Result<u64> {
            Err(SZStreamError::Unsupported("seek"))
        }

        pub fn truncate(&mut self, _size: u64) -> Result<u64> {
            Err(SZStreamError::Unsupported("truncate"))
        }

        pub fn readable(&self) -> bool {
            false
        }

        pub fn writable(&self) -> bool {
            true
        }

        pub fn seekable(&self) -> bool {
            false
        }
    };
}

/// Writer that compresses pushed data into a sink
pub struct CompressionWriter<W: Write> {
    core: PushCore<W>,
}

impl<W: Write> CompressionWriter<W> {
    /// Wrap `sink` with a compression engine
    pub fn new(sink: W, engine: BoxedEngine, options: WriterOptions) -> Result<Self> {
        Ok(Self {
            core: PushCore::new(sink, engine, options, true)?,
        })
    }

    /// Start the scope, pledging `source_size` to the engine
    pub fn enter(&mut self) -> Result<()> {
        self.core.enter(true)
    }

    /// Compress `data`, pushing any produced output to the sink
    ///
    /// Returns bytes pushed to the sink, or `data.len()` when
    /// `write_return_read` is set.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.core.write(data)
    }

    /// Push everything the engine has buffered
    ///
    /// [`FlushMode::Frame`] ends the current frame; later writes start a new one.
    pub fn flush(&mut self, mode: FlushMode) -> Result<usize> {
        self.core.state.require_active("flush")?;
        let directive = match mode {
            FlushMode::Block => Directive::Flush,
            FlushMode::Frame => Directive::End,
        };
        self.core.finish_step(directive)
    }

    /// Leave the scope; a normal exit ends the frame first
    pub fn exit(&mut self, normal_exit: bool) -> Result<()> {
        self.core.exit(normal_exit)
    }

    /// Run `f` inside an entered scope, exiting on every path
    pub fn scope<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.enter()?;
        match f(self) {
            Ok(value) => {
                self.exit(true)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(exit_err) = self.exit(false) {
                    tracing::debug!(error = %exit_err, "writer already left its scope");
                }
                Err(e)
            }
        }
    }

    /// Finish if active, then release the engine
    pub fn close(&mut self) -> Result<()> {
        self.core.close()
    }

    pub fn is_closed(&self) -> bool {
        self.core.state == StreamState::Closed
    }

    /// Total compressed bytes pushed to the sink
    pub fn tell(&self) -> u64 {
        self.core.bytes_written
    }

    /// Finish if active and hand back the sink
    pub fn into_inner(mut self) -> Result<W> {
        self.core.into_inner()
    }

    pub fn get_ref(&self) -> Option<&W> {
        self.core.sink.as_ref()
    }

    unsupported_writer_ops!();
}

impl<W: Write> Write for CompressionWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.core.write(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        CompressionWriter::flush(self, FlushMode::Block)?;
        Ok(())
    }
}

/// Writer that decompresses pushed data into a sink
pub struct DecompressionWriter<W: Write> {
    core: PushCore<W>,
}

impl<W: Write> DecompressionWriter<W> {
    /// Wrap `sink` with a decompression engine
    pub fn new(sink: W, engine: BoxedEngine, options: WriterOptions) -> Result<Self> {
        Ok(Self {
            core: PushCore::new(sink, engine, options, false)?,
        })
    }

    pub fn enter(&mut self) -> Result<()> {
        self.core.enter(false)
    }

    /// Decompress `data`, pushing any produced output to the sink
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.core.write(data)
    }

    /// Flush the sink; decoded output is never held back by the engine
    pub fn flush(&mut self) -> Result<()> {
        self.core.state.require_active("flush")?;
        self.core.flush_sink()
    }

    pub fn exit(&mut self, normal_exit: bool) -> Result<()> {
        self.core.exit(normal_exit)
    }

    /// Run `f` inside an entered scope, exiting on every path
    pub fn scope<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.enter()?;
        match f(self) {
            Ok(value) => {
                self.exit(true)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(exit_err) = self.exit(false) {
                    tracing::debug!(error = %exit_err, "writer already left its scope");
                }
                Err(e)
            }
        }
    }

    pub fn close(&mut self) -> Result<()> {
        self.core.close()
    }

    pub fn is_closed(&self) -> bool {
        self.core.state == StreamState::Closed
    }

    /// Total decompressed bytes pushed to the sink
    pub fn tell(&self) -> u64 {
        self.core.bytes_written
    }

    pub fn into_inner(mut self) -> Result<W> {
        self.core.into_inner()
    }

    pub fn get_ref(&self) -> Option<&W> {
        self.core.sink.as_ref()
    }

    unsupported_writer_ops!();
}

impl<W: Write> Write for DecompressionWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.core.write(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        DecompressionWriter::flush(self)?;
        Ok(())
    }
}
