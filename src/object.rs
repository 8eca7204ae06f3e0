//! In-memory incremental codec objects
//!
//! These own neither a source nor a sink. Each call takes a chunk and returns
//! everything the engine produced for it.

use crate::codec::{BoxedEngine, CodecEngine, Directive, InCursor};
use crate::error::{Result, SZStreamError};
use crate::output::collect_steps;
use crate::writer::FlushMode;

/// Compresses chunks handed to it, one frame per object
pub struct CompressionObj {
    engine: BoxedEngine,
    finished: bool,
}

impl CompressionObj {
    pub(crate) fn new(mut engine: BoxedEngine, source_size: Option<u64>) -> Result<Self> {
        engine.pledge_source_size(source_size)?;
        Ok(Self {
            engine,
            finished: false,
        })
    }

    /// Feed `data`; returns whatever compressed output is ready, possibly nothing
    pub fn compress(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        if self.finished {
            return Err(SZStreamError::misuse(
                "cannot call compress() after compressor finished",
            ));
        }
        let mut input = InCursor::new(data);
        collect_steps(
            &mut self.engine,
            &mut input,
            Directive::Continue,
            |_, input, full| input.is_consumed() && !full,
        )
    }

    /// Emit buffered output
    ///
    /// [`FlushMode::Frame`] ends the frame, after which the object is spent.
    pub fn flush(&mut self, mode: FlushMode) -> Result<Vec<u8>> {
        if self.finished {
            return Err(SZStreamError::misuse("compressor object already finished"));
        }
        let directive = match mode {
            FlushMode::Block => Directive::Flush,
            FlushMode::Frame => {
                self.finished = true;
                Directive::End
            }
        };
        let mut input = InCursor::empty();
        let output = collect_steps(&mut self.engine, &mut input, directive, |ret, _, _| {
            ret == 0
        })?;
        tracing::trace!(?mode, size = output.len(), "compression object flushed");
        Ok(output)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Decompresses one frame fed to it in arbitrary pieces
pub struct DecompressionObj {
    engine: BoxedEngine,
    finished: bool,
    unused_data: Vec<u8>,
}

impl DecompressionObj {
    pub(crate) fn new(engine: BoxedEngine) -> Self {
        Self {
            engine,
            finished: false,
            unused_data: Vec::new(),
        }
    }

    /// Feed `data`; returns the output it decoded
    ///
    /// Bytes following the end of the frame are not decoded; they are kept
    /// in [`unused_data`](DecompressionObj::unused_data).
    pub fn decompress(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        if self.finished {
            return Err(SZStreamError::misuse(
                "cannot use a decompression object multiple times",
            ));
        }
        if data.is_empty() {
            return Ok(Vec::new());
        }

        let mut input = InCursor::new(data);
        let mut frame_done = false;
        let output = collect_steps(
            &mut self.engine,
            &mut input,
            Directive::Continue,
            |ret, input, full| {
                if ret == 0 {
                    frame_done = true;
                    return true;
                }
                input.is_consumed() && !full
            },
        )?;

        if frame_done {
            self.finished = true;
            self.unused_data.extend_from_slice(input.unread());
            tracing::trace!(unused = self.unused_data.len(), "decompression object finished");
        }
        Ok(output)
    }

    /// Decoded output is never held back, so there is nothing to flush
    pub fn flush(&mut self) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    /// Whether the end of the frame was reached
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn unused_data(&self) -> &[u8] {
        &self.unused_data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CompressionMethod, CompressionParameters, DecompressionParameters};
    use crate::engine::{compression_engine, decompression_engine};

    fn zstd_obj(source_size: Option<u64>) -> CompressionObj {
        let engine = compression_engine(&CompressionParameters::zstd(3)).unwrap();
        CompressionObj::new(engine, source_size).unwrap()
    }

    fn zstd_dobj() -> DecompressionObj {
        DecompressionObj::new(decompression_engine(&DecompressionParameters::default()).unwrap())
    }

    #[test]
    fn test_compression_obj_pieces_form_one_frame() {
        let mut obj = zstd_obj(None);
        let mut frame = Vec::new();
        for piece in [&b"alpha "[..], b"beta ", b"gamma"] {
            frame.extend(obj.compress(piece).unwrap());
        }
        frame.extend(obj.flush(FlushMode::Frame).unwrap());
        assert!(obj.is_finished());
        assert_eq!(zstd::decode_all(&frame[..]).unwrap(), b"alpha beta gamma");

        assert!(matches!(
            obj.compress(b"late").unwrap_err(),
            SZStreamError::Misuse(_)
        ));
        assert!(matches!(
            obj.flush(FlushMode::Block).unwrap_err(),
            SZStreamError::Misuse(_)
        ));
    }

    #[test]
    fn test_compression_obj_block_flush_keeps_frame_open() {
        let mut obj = zstd_obj(None);
        let mut sent = obj.compress(b"first half").unwrap();
        sent.extend(obj.flush(FlushMode::Block).unwrap());
        assert!(!obj.is_finished());

        let mut dobj = zstd_dobj();
        assert_eq!(dobj.decompress(&sent).unwrap(), b"first half");
        assert!(!dobj.is_finished());

        let mut rest = obj.compress(b", second half").unwrap();
        rest.extend(obj.flush(FlushMode::Frame).unwrap());
        assert_eq!(dobj.decompress(&rest).unwrap(), b", second half");
        assert!(dobj.is_finished());
    }

    #[test]
    fn test_compression_obj_records_pledged_size() {
        let mut obj = zstd_obj(Some(11));
        let mut frame = obj.compress(b"eleven byte").unwrap();
        frame.extend(obj.flush(FlushMode::Frame).unwrap());
        assert_eq!(
            zstd::zstd_safe::get_frame_content_size(&frame)
                .ok()
                .flatten(),
            Some(11)
        );
    }

    #[test]
    fn test_decompression_obj_byte_at_a_time() {
        let data: Vec<u8> = b"fed one byte at a time ".repeat(200);
        let frame = zstd::encode_all(&data[..], 3).unwrap();

        let mut dobj = zstd_dobj();
        let mut out = Vec::new();
        for byte in &frame {
            out.extend(dobj.decompress(std::slice::from_ref(byte)).unwrap());
        }
        assert_eq!(out, data);
        assert!(dobj.is_finished());
        assert!(dobj.unused_data().is_empty());
        assert!(dobj.flush().unwrap().is_empty());
    }

    #[test]
    fn test_decompression_obj_keeps_trailing_bytes() {
        let mut input = zstd::encode_all(&b"payload"[..], 3).unwrap();
        input.extend_from_slice(b"trailer");

        let mut dobj = zstd_dobj();
        assert_eq!(dobj.decompress(&input).unwrap(), b"payload");
        assert_eq!(dobj.unused_data(), b"trailer");
        assert!(matches!(
            dobj.decompress(b"more").unwrap_err(),
            SZStreamError::Misuse(_)
        ));
    }

    #[test]
    fn test_deflate_objects_roundtrip() {
        let engine = compression_engine(&CompressionParameters::deflate(6)).unwrap();
        let mut obj = CompressionObj::new(engine, None).unwrap();
        let data: Vec<u8> = b"deflate object ".repeat(1000);
        let mut stream = Vec::new();
        for piece in data.chunks(999) {
            stream.extend(obj.compress(piece).unwrap());
        }
        stream.extend(obj.flush(FlushMode::Frame).unwrap());

        let params = DecompressionParameters::new(CompressionMethod::Deflate);
        let mut dobj = DecompressionObj::new(decompression_engine(&params).unwrap());
        let mut out = Vec::new();
        for piece in stream.chunks(100) {
            out.extend(dobj.decompress(piece).unwrap());
        }
        assert_eq!(out, data);
        assert!(dobj.is_finished());
    }
}
