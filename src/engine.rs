//! Concrete codec engines
//!
//! Each engine adapts one codec library to the [`CodecEngine`] step contract:
//! - Stored: identity copy, no framing
//! - Deflate: raw DEFLATE through `flate2::Compress` / `flate2::Decompress`
//! - Zstd: Zstandard frames through `zstd::stream::raw`

use crate::codec::{BoxedEngine, CodecEngine, Directive, InCursor, OutCursor};
use crate::config::{CompressionMethod, CompressionParameters, DecompressionParameters};
use crate::error::{Result, SZStreamError};
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};
use zstd::stream::raw::{
    CParameter, DParameter, Decoder as RawDecoder, Encoder as RawEncoder, InBuffer, Operation,
    OutBuffer,
};

/// Build the compression engine selected by `params`
pub fn compression_engine(params: &CompressionParameters) -> Result<BoxedEngine> {
    let engine: BoxedEngine = match params.method {
        CompressionMethod::Stored => Box::new(StoredEngine::new()),
        CompressionMethod::Deflate => Box::new(DeflateCompressEngine::new(params.level)),
        CompressionMethod::Zstd => Box::new(ZstdCompressEngine::new(params)?),
    };
    Ok(engine)
}

/// Build the decompression engine selected by `params`
pub fn decompression_engine(params: &DecompressionParameters) -> Result<BoxedEngine> {
    let engine: BoxedEngine = match params.method {
        CompressionMethod::Stored => Box::new(StoredEngine::new()),
        CompressionMethod::Deflate => Box::new(DeflateDecompressEngine::new()),
        CompressionMethod::Zstd => Box::new(ZstdDecompressEngine::new(params)?),
    };
    Ok(engine)
}

/// Pass-through engine for stored (uncompressed) data
#[derive(Debug, Default)]
pub struct StoredEngine;

impl StoredEngine {
    pub fn new() -> Self {
        StoredEngine
    }
}

impl CodecEngine for StoredEngine {
    fn step(
        &mut self,
        input: &mut InCursor<'_>,
        output: &mut OutCursor<'_>,
        directive: Directive,
    ) -> Result<usize> {
        let src = input.unread();
        let dst = output.spare_mut();
        let len = src.len().min(dst.len());
        dst[..len].copy_from_slice(&src[..len]);
        input.advance(len);
        output.advance(len);

        // Stored data has no frame boundary, so only an explicit flush/end
        // with all input copied counts as complete.
        match directive {
            Directive::Continue => Ok(1),
            Directive::Flush | Directive::End => Ok(usize::from(!input.is_consumed())),
        }
    }

    fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stored"
    }
}

/// Raw DEFLATE compressor
pub struct DeflateCompressEngine {
    inner: Compress,
    frame_open: bool,
}

impl DeflateCompressEngine {
    pub fn new(level: i32) -> Self {
        let level = CompressionMethod::Deflate.clamp_level(level) as u32;
        Self {
            inner: Compress::new(Compression::new(level), false),
            frame_open: false,
        }
    }
}

impl CodecEngine for DeflateCompressEngine {
    fn step(
        &mut self,
        input: &mut InCursor<'_>,
        output: &mut OutCursor<'_>,
        directive: Directive,
    ) -> Result<usize> {
        if directive == Directive::End && !self.frame_open && input.is_consumed() {
            return Ok(0);
        }
        self.frame_open = true;

        let flush = match directive {
            Directive::Continue => FlushCompress::None,
            Directive::Flush => FlushCompress::Sync,
            Directive::End => FlushCompress::Finish,
        };

        let before_in = self.inner.total_in();
        let before_out = self.inner.total_out();
        let status = self
            .inner
            .compress(input.unread(), output.spare_mut(), flush)
            .map_err(|e| SZStreamError::codec(format!("deflate compress error: {}", e)))?;
        input.advance((self.inner.total_in() - before_in) as usize);
        output.advance((self.inner.total_out() - before_out) as usize);

        match directive {
            Directive::Continue => Ok(1),
            Directive::Flush => Ok(usize::from(!input.is_consumed() || output.is_full())),
            Directive::End => {
                if status == Status::StreamEnd {
                    self.inner.reset();
                    self.frame_open = false;
                    Ok(0)
                } else {
                    Ok(1)
                }
            }
        }
    }

    fn reset(&mut self) -> Result<()> {
        self.inner.reset();
        self.frame_open = false;
        Ok(())
    }

    fn pledge_source_size(&mut self, _size: Option<u64>) -> Result<()> {
        self.frame_open = true;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "deflate"
    }
}

/// Raw DEFLATE decompressor
pub struct DeflateDecompressEngine {
    inner: Decompress,
    frame_open: bool,
    ended: bool,
}

impl DeflateDecompressEngine {
    pub fn new() -> Self {
        Self {
            inner: Decompress::new(false),
            frame_open: false,
            ended: false,
        }
    }
}

impl Default for DeflateDecompressEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecEngine for DeflateDecompressEngine {
    fn step(
        &mut self,
        input: &mut InCursor<'_>,
        output: &mut OutCursor<'_>,
        directive: Directive,
    ) -> Result<usize> {
        if self.ended {
            if input.is_consumed() {
                return Ok(0);
            }
            // Another stream follows the one that just ended
            self.inner.reset(false);
            self.ended = false;
        }
        if !input.is_consumed() {
            self.frame_open = true;
        }

        let before_in = self.inner.total_in();
        let before_out = self.inner.total_out();
        let status = self
            .inner
            .decompress(input.unread(), output.spare_mut(), FlushDecompress::None)
            .map_err(|e| SZStreamError::codec(format!("deflate decompress error: {}", e)))?;
        input.advance((self.inner.total_in() - before_in) as usize);
        output.advance((self.inner.total_out() - before_out) as usize);

        if status == Status::StreamEnd {
            self.ended = true;
            self.frame_open = false;
            return Ok(0);
        }

        match directive {
            Directive::Continue => Ok(1),
            Directive::Flush => Ok(usize::from(output.is_full())),
            Directive::End => {
                if output.is_full() || !input.is_consumed() {
                    Ok(1)
                } else if self.frame_open {
                    Err(SZStreamError::codec(
                        "deflate decompress error: input ended before stream was complete",
                    ))
                } else {
                    Ok(0)
                }
            }
        }
    }

    fn reset(&mut self) -> Result<()> {
        self.inner.reset(false);
        self.frame_open = false;
        self.ended = false;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "deflate"
    }
}

/// Run a zstd operation over the cursors, advancing them by what was used
fn drive_zstd<F>(
    input: &mut InCursor<'_>,
    output: &mut OutCursor<'_>,
    op: F,
) -> (std::io::Result<usize>, usize, usize)
where
    F: FnOnce(&mut InBuffer<'_>, &mut OutBuffer<'_, [u8]>) -> std::io::Result<usize>,
{
    let (result, consumed, produced) = {
        let mut src = InBuffer::around(input.unread());
        let mut dst = OutBuffer::around(output.spare_mut());
        let result = op(&mut src, &mut dst);
        (result, src.pos(), dst.pos())
    };
    input.advance(consumed);
    output.advance(produced);
    (result, consumed, produced)
}

/// Zstandard frame compressor
pub struct ZstdCompressEngine {
    raw: RawEncoder<'static>,
    frame_open: bool,
}

impl ZstdCompressEngine {
    pub fn new(params: &CompressionParameters) -> Result<Self> {
        let mut raw = RawEncoder::new(params.level).map_err(zstd_setup_error)?;
        raw.set_parameter(CParameter::ChecksumFlag(params.write_checksum))
            .map_err(zstd_setup_error)?;
        raw.set_parameter(CParameter::ContentSizeFlag(params.write_content_size))
            .map_err(zstd_setup_error)?;
        if let Some(window_log) = params.window_log {
            raw.set_parameter(CParameter::WindowLog(window_log))
                .map_err(zstd_setup_error)?;
        }
        Ok(Self {
            raw,
            frame_open: false,
        })
    }
}

fn zstd_setup_error(e: std::io::Error) -> SZStreamError {
    SZStreamError::codec(format!("zstd parameter error: {}", e))
}

impl CodecEngine for ZstdCompressEngine {
    fn step(
        &mut self,
        input: &mut InCursor<'_>,
        output: &mut OutCursor<'_>,
        directive: Directive,
    ) -> Result<usize> {
        if directive == Directive::End && !self.frame_open && input.is_consumed() {
            return Ok(0);
        }
        self.frame_open = true;

        let raw = &mut self.raw;
        let len = input.unread().len();
        let (result, _, _) = drive_zstd(input, output, |src, dst| {
            match directive {
                Directive::Continue => raw.run(src, dst),
                Directive::Flush | Directive::End => {
                    if src.pos() < len {
                        raw.run(src, dst)?;
                        if src.pos() < len {
                            return Ok(1);
                        }
                    }
                    if directive == Directive::Flush {
                        raw.flush(dst)
                    } else {
                        raw.finish(dst, true)
                    }
                }
            }
        });
        let remaining =
            result.map_err(|e| SZStreamError::codec(format!("zstd compress error: {}", e)))?;

        if directive == Directive::End && remaining == 0 {
            self.frame_open = false;
            self.raw
                .reinit()
                .map_err(|e| SZStreamError::codec(format!("zstd compress error: {}", e)))?;
        }
        match directive {
            Directive::Continue => Ok(remaining.max(1)),
            _ => Ok(remaining),
        }
    }

    fn reset(&mut self) -> Result<()> {
        self.frame_open = false;
        self.raw
            .reinit()
            .map_err(|e| SZStreamError::codec(format!("zstd compress error: {}", e)))
    }

    fn pledge_source_size(&mut self, size: Option<u64>) -> Result<()> {
        self.raw
            .set_pledged_src_size(size)
            .map_err(|e| SZStreamError::codec(format!("error setting source size: {}", e)))?;
        self.frame_open = true;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "zstd"
    }
}

/// Zstandard frame decompressor
pub struct ZstdDecompressEngine {
    raw: RawDecoder<'static>,
    frame_open: bool,
}

impl ZstdDecompressEngine {
    pub fn new(params: &DecompressionParameters) -> Result<Self> {
        let mut raw = RawDecoder::new().map_err(zstd_setup_error)?;
        if let Some(window_log_max) = params.window_log_max {
            raw.set_parameter(DParameter::WindowLogMax(window_log_max))
                .map_err(zstd_setup_error)?;
        }
        Ok(Self {
            raw,
            frame_open: false,
        })
    }
}

impl CodecEngine for ZstdDecompressEngine {
    fn step(
        &mut self,
        input: &mut InCursor<'_>,
        output: &mut OutCursor<'_>,
        directive: Directive,
    ) -> Result<usize> {
        let raw = &mut self.raw;
        let (result, consumed, _) = drive_zstd(input, output, |src, dst| raw.run(src, dst));
        let hint =
            result.map_err(|e| SZStreamError::codec(format!("zstd decompress error: {}", e)))?;

        if consumed > 0 {
            self.frame_open = true;
        }
        if hint == 0 {
            self.frame_open = false;
            return Ok(0);
        }

        match directive {
            Directive::Continue => Ok(hint),
            Directive::Flush => Ok(usize::from(output.is_full())),
            Directive::End => {
                if output.is_full() || !input.is_consumed() {
                    Ok(1)
                } else if self.frame_open {
                    Err(SZStreamError::codec(
                        "zstd decompress error: input ended before frame was complete",
                    ))
                } else {
                    Ok(0)
                }
            }
        }
    }

    fn reset(&mut self) -> Result<()> {
        self.frame_open = false;
        self.raw
            .reinit()
            .map_err(|e| SZStreamError::codec(format!("zstd decompress error: {}", e)))
    }

    fn name(&self) -> &'static str {
        "zstd"
    }
}
