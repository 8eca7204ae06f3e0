//! Decompression front end: one-shot, streaming and batch operations

use crate::codec::{CodecEngine, Directive, InCursor};
use crate::config::{DecompressionParameters, ReaderOptions, WriterOptions};
use crate::engine::decompression_engine;
use crate::error::{Result, SZStreamError};
use crate::object::DecompressionObj;
use crate::output::OutputBlockList;
use crate::reader::{DecompressedChunks, DecompressionReader};
use crate::segments::{Segment, SegmentedBuffer};
use crate::writer::DecompressionWriter;
use bytes::Bytes;
use std::io::{Read, Write};

/// Restores data produced by a [`Compressor`](crate::Compressor)
#[derive(Debug, Clone, Default)]
pub struct Decompressor {
    params: DecompressionParameters,
}

impl Decompressor {
    pub fn new(params: DecompressionParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &DecompressionParameters {
        &self.params
    }

    /// Decompress one complete frame
    ///
    /// Output lands in growing blocks, so the frame header does not need to
    /// record the content size. With `max_output_size` set, no more than that
    /// many bytes are ever allocated and a larger frame is an error. A frame
    /// cut short is an error too. Data after the first frame is ignored.
    pub fn decompress(&self, data: &[u8], max_output_size: Option<usize>) -> Result<Vec<u8>> {
        let mut engine = decompression_engine(&self.params)?;
        decompress_frame(&mut engine, data, max_output_size)
    }

    /// Writer decompressing everything pushed into it onto `sink`
    pub fn stream_writer<W: Write>(
        &self,
        sink: W,
        options: WriterOptions,
    ) -> Result<DecompressionWriter<W>> {
        DecompressionWriter::new(sink, decompression_engine(&self.params)?, options)
    }

    /// Reader producing the decompressed form of `source`
    pub fn stream_reader<R: Read>(
        &self,
        source: R,
        options: ReaderOptions,
    ) -> Result<DecompressionReader<R>> {
        DecompressionReader::new(source, decompression_engine(&self.params)?, options)
    }

    /// In-memory incremental decompressor for a single frame
    pub fn decompressobj(&self) -> Result<DecompressionObj> {
        Ok(DecompressionObj::new(decompression_engine(&self.params)?))
    }

    /// Iterate over the decompressed form of `source` in `write_size` pieces
    ///
    /// The first `skip_bytes` bytes of the source are dropped before
    /// decoding; they must fit in the first `read_size` pull.
    pub fn read_to_iter<R: Read>(
        &self,
        source: R,
        read_size: usize,
        write_size: usize,
        skip_bytes: usize,
    ) -> Result<DecompressedChunks<R>> {
        if skip_bytes >= read_size {
            return Err(SZStreamError::misuse(
                "skip_bytes must be smaller than read_size",
            ));
        }
        let options = ReaderOptions::for_decompression()
            .with_read_size(read_size)
            .with_read_across_frames(true);
        let mut reader = self.stream_reader(source, options)?;
        reader.skip_input(skip_bytes)?;
        DecompressedChunks::new(reader, write_size)
    }

    /// Decompress every frame into one buffer, segment `i` holding frame `i`
    pub fn multi_decompress_to_buffer<I, T>(&self, frames: I) -> Result<SegmentedBuffer<'static>>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut engine = decompression_engine(&self.params)?;
        let mut data = Vec::new();
        let mut segments = Vec::new();

        for (index, frame) in frames.into_iter().enumerate() {
            engine.reset()?;
            let decoded =
                decompress_frame(&mut engine, frame.as_ref(), None).map_err(|e| match e {
                    SZStreamError::Codec(msg) => {
                        SZStreamError::Codec(format!("error decompressing item {}: {}", index, msg))
                    }
                    other => other,
                })?;
            segments.push(Segment::new(data.len() as u64, decoded.len() as u64));
            data.extend_from_slice(&decoded);
        }

        if segments.is_empty() {
            return Err(SZStreamError::misuse("no source elements found"));
        }

        tracing::debug!(
            frames = segments.len(),
            decompressed_size = data.len(),
            "batch decompression finished"
        );
        Ok(SegmentedBuffer::from_trusted(Bytes::from(data), segments))
    }

    /// Decompress everything read from `source` onto `sink`
    ///
    /// Returns `(bytes_read, bytes_written)`.
    pub fn copy_stream<R: Read, W: Write>(
        &self,
        mut source: R,
        sink: W,
        read_size: usize,
        write_size: usize,
    ) -> Result<(u64, u64)> {
        if read_size == 0 {
            return Err(SZStreamError::misuse("read_size must be positive"));
        }
        let options = WriterOptions::for_decompression().with_write_size(write_size);
        let mut writer = self.stream_writer(sink, options)?;
        let mut buf = vec![0u8; read_size];
        let mut total_read = 0u64;

        writer.scope(|w| loop {
            let count = match source.read(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            total_read += count as u64;
            w.write(&buf[..count])?;
        })?;

        Ok((total_read, writer.tell()))
    }
}

/// Decode one frame from `data` into growing blocks capped at `max_output_size`
pub(crate) fn decompress_frame(
    engine: &mut dyn CodecEngine,
    data: &[u8],
    max_output_size: Option<usize>,
) -> Result<Vec<u8>> {
    let mut output = OutputBlockList::init_and_grow(max_output_size)?;
    let mut input = InCursor::new(data);

    // Once the input is gone, End drains what is buffered and reports
    // a frame that never finished
    let directive_for = |input: &InCursor<'_>| {
        if input.is_consumed() {
            Directive::End
        } else {
            Directive::Continue
        }
    };

    loop {
        let directive = directive_for(&input);
        let step = output.with_active_cursor(|cursor| engine.step(&mut input, cursor, directive));
        match step {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                output.on_error();
                return Err(e);
            }
        }

        if output.active_is_full() {
            if output.reached_max_length() {
                // The frame may have ended exactly at the cap
                let directive = directive_for(&input);
                let at_cap =
                    output.with_active_cursor(|cursor| engine.step(&mut input, cursor, directive));
                if let Ok(0) = at_cap {
                    break;
                }
                let limit = output.allocated();
                output.on_error();
                return Err(SZStreamError::codec(format!(
                    "decompressed data exceeds max_output_size of {} bytes",
                    limit
                )));
            }
            output.grow()?;
        }
    }

    output.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compressor::Compressor;
    use crate::config::{CompressionMethod, CompressionParameters};

    fn text(len: usize) -> Vec<u8> {
        b"the quick brown fox jumps over the lazy dog "
            .iter()
            .cycle()
            .take(len)
            .copied()
            .collect()
    }

    #[test]
    fn test_decompress_without_content_size() {
        let data = text(100_000);
        let params = CompressionParameters::zstd(3).with_content_size(false);
        let frame = Compressor::new(params).compress(&data).unwrap();
        assert_eq!(
            zstd::zstd_safe::get_frame_content_size(&frame)
                .ok()
                .flatten(),
            None
        );

        let decoded = Decompressor::default().decompress(&frame, None).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_decompress_respects_max_output_size() {
        let data = text(50_000);
        let frame = Compressor::default().compress(&data).unwrap();
        let decompressor = Decompressor::default();

        assert_eq!(
            decompressor.decompress(&frame, Some(50_000)).unwrap(),
            data
        );
        let err = decompressor.decompress(&frame, Some(49_999)).unwrap_err();
        assert!(matches!(err, SZStreamError::Codec(_)));
    }

    #[test]
    fn test_output_exactly_at_cap_succeeds_for_every_method() {
        for (method, len) in [
            (CompressionMethod::Stored, 1000usize),
            (CompressionMethod::Deflate, 40_000),
            (CompressionMethod::Zstd, 40_000),
        ] {
            let data = text(len);
            let frame = Compressor::new(CompressionParameters::new(method))
                .compress(&data)
                .unwrap();
            let decompressor = Decompressor::new(DecompressionParameters::new(method));

            let decoded = decompressor.decompress(&frame, Some(len)).unwrap();
            assert_eq!(decoded, data, "{:?}", method);
            let err = decompressor.decompress(&frame, Some(len - 1)).unwrap_err();
            assert!(matches!(err, SZStreamError::Codec(_)), "{:?}", method);
        }
    }

    #[test]
    fn test_decompress_truncated_frame_fails() {
        let frame = Compressor::default().compress(&text(5000)).unwrap();
        let err = Decompressor::default()
            .decompress(&frame[..frame.len() / 2], None)
            .unwrap_err();
        assert!(matches!(err, SZStreamError::Codec(_)));
    }

    #[test]
    fn test_decompress_empty_frame() {
        let frame = Compressor::default().compress(b"").unwrap();
        let decoded = Decompressor::default().decompress(&frame, None).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_deflate_roundtrip() {
        let data = text(70_000);
        let frame = Compressor::new(CompressionParameters::deflate(6))
            .compress(&data)
            .unwrap();
        let decoded = Decompressor::new(DecompressionParameters::new(CompressionMethod::Deflate))
            .decompress(&frame, None)
            .unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_multi_decompress_reverses_multi_compress() {
        let items: Vec<Vec<u8>> = (1..6).map(|n| text(n * 1000)).collect();
        let compressed = Compressor::default()
            .multi_compress_to_buffer(&items)
            .unwrap();
        let decompressed = Decompressor::default()
            .multi_decompress_to_buffer(compressed.iter())
            .unwrap();

        assert_eq!(decompressed.len(), items.len());
        for (i, item) in items.iter().enumerate() {
            assert_eq!(decompressed.item_at(i).unwrap().as_bytes(), &item[..]);
        }
    }

    #[test]
    fn test_multi_decompress_reports_failing_item() {
        let good = Compressor::default().compress(b"fine").unwrap();
        let frames: [&[u8]; 2] = [&good, b"not a frame"];
        let err = Decompressor::default()
            .multi_decompress_to_buffer(frames)
            .unwrap_err();
        assert!(err.to_string().contains("item 1"));
    }

    #[test]
    fn test_read_to_iter_skips_prefix_and_spans_frames() {
        let compressor = Compressor::default();
        let mut input = b"MAGIC".to_vec();
        input.extend(compressor.compress(&text(20_000)).unwrap());
        input.extend(compressor.compress(b"tail frame").unwrap());

        let pieces = Decompressor::default()
            .read_to_iter(&input[..], 4096, 8192, 5)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert!(pieces[..pieces.len() - 1].iter().all(|p| p.len() == 8192));
        let mut expected = text(20_000);
        expected.extend_from_slice(b"tail frame");
        assert_eq!(pieces.concat(), expected);

        assert!(matches!(
            Decompressor::default()
                .read_to_iter(&input[..], 4, 8192, 5)
                .err(),
            Some(SZStreamError::Misuse(_))
        ));
    }

    #[test]
    fn test_decompressobj_matches_one_shot() {
        let data = text(90_000);
        let frame = Compressor::default().compress(&data).unwrap();
        let mut obj = Decompressor::default().decompressobj().unwrap();
        let mut out = Vec::new();
        for piece in frame.chunks(1234) {
            out.extend(obj.decompress(piece).unwrap());
        }
        assert!(obj.is_finished());
        assert_eq!(out, Decompressor::default().decompress(&frame, None).unwrap());
    }

    #[test]
    fn test_copy_stream() {
        let data = text(64_000);
        let frame = Compressor::default().compress(&data).unwrap();
        let mut sink = Vec::new();
        let (read, written) = Decompressor::default()
            .copy_stream(&frame[..], &mut sink, 1000, 777)
            .unwrap();
        assert_eq!(read, frame.len() as u64);
        assert_eq!(written, data.len() as u64);
        assert_eq!(sink, data);
    }
}
