//! Compression front end: one-shot, streaming and batch operations

use crate::chunker::CompressionChunker;
use crate::codec::{CodecEngine, Directive, InCursor};
use crate::config::{CompressionParameters, ReaderOptions, WriterOptions};
use crate::engine::compression_engine;
use crate::error::{Result, SZStreamError};
use crate::object::CompressionObj;
use crate::output::collect_steps;
use crate::reader::{CompressedChunks, CompressionReader};
use crate::segments::{Segment, SegmentedBuffer};
use crate::writer::CompressionWriter;
use bytes::Bytes;
use std::io::{Read, Write};

/// Produces compressed data with a fixed set of parameters
#[derive(Debug, Clone, Default)]
pub struct Compressor {
    params: CompressionParameters,
}

impl Compressor {
    pub fn new(params: CompressionParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &CompressionParameters {
        &self.params
    }

    /// Compress `data` into a single frame
    ///
    /// The input size is known up front, so it is recorded in the frame
    /// header when the method supports it.
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut engine = compression_engine(&self.params)?;
        compress_frame(&mut engine, data)
    }

    /// Writer compressing everything pushed into it onto `sink`
    pub fn stream_writer<W: Write>(
        &self,
        sink: W,
        options: WriterOptions,
    ) -> Result<CompressionWriter<W>> {
        CompressionWriter::new(sink, compression_engine(&self.params)?, options)
    }

    /// Reader producing the compressed form of `source`
    pub fn stream_reader<R: Read>(
        &self,
        source: R,
        options: ReaderOptions,
    ) -> Result<CompressionReader<R>> {
        CompressionReader::new(source, compression_engine(&self.params)?, options)
    }

    /// In-memory incremental compressor producing a single frame
    ///
    /// `source_size`, when known, is recorded in the frame header.
    pub fn compressobj(&self, source_size: Option<u64>) -> Result<CompressionObj> {
        CompressionObj::new(compression_engine(&self.params)?, source_size)
    }

    /// Incremental compressor that hands out output in `chunk_size` pieces
    pub fn chunker(
        &self,
        source_size: Option<u64>,
        chunk_size: usize,
    ) -> Result<CompressionChunker> {
        CompressionChunker::new(compression_engine(&self.params)?, source_size, chunk_size)
    }

    /// Iterate over the compressed form of `source`
    ///
    /// Pulls `read_size` bytes at a time and yields at most `write_size`
    /// bytes per item, as soon as the engine has output.
    pub fn read_to_iter<R: Read>(
        &self,
        source: R,
        read_size: usize,
        write_size: usize,
    ) -> Result<CompressedChunks<R>> {
        let options = ReaderOptions::for_compression().with_read_size(read_size);
        CompressedChunks::new(self.stream_reader(source, options)?, write_size)
    }

    /// Compress every item into its own frame, packed into one buffer
    ///
    /// Segment `i` of the result holds the frame for item `i`. Accepts byte
    /// slices as well as the segments of a [`SegmentedBuffer`] or
    /// [`BufferCollection`](crate::BufferCollection).
    pub fn multi_compress_to_buffer<I, T>(&self, items: I) -> Result<SegmentedBuffer<'static>>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut engine = compression_engine(&self.params)?;
        let mut data = Vec::new();
        let mut segments = Vec::new();
        let mut source_size = 0usize;

        for item in items {
            let item = item.as_ref();
            source_size += item.len();
            let frame = compress_frame(&mut engine, item)?;
            segments.push(Segment::new(data.len() as u64, frame.len() as u64));
            data.extend_from_slice(&frame);
        }

        if segments.is_empty() {
            return Err(SZStreamError::misuse("no source elements found"));
        }
        if source_size == 0 {
            return Err(SZStreamError::misuse("source elements are empty"));
        }

        tracing::debug!(
            frames = segments.len(),
            source_size,
            compressed_size = data.len(),
            "batch compression finished"
        );
        Ok(SegmentedBuffer::from_trusted(Bytes::from(data), segments))
    }

    /// Compress everything read from `source` onto `sink`
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
        let options = WriterOptions::for_compression().with_write_size(write_size);
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

/// Drive `engine` over `data` to the end of one frame, collecting output in blocks
pub(crate) fn compress_frame(engine: &mut dyn CodecEngine, data: &[u8]) -> Result<Vec<u8>> {
    engine.pledge_source_size(Some(data.len() as u64))?;
    let mut input = InCursor::new(data);
    collect_steps(engine, &mut input, Directive::End, |ret, _, _| ret == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompressionMethod;

    #[test]
    fn test_compress_records_content_size() {
        let compressor = Compressor::new(CompressionParameters::zstd(3));
        let frame = compressor.compress(b"content size").unwrap();
        assert_eq!(
            zstd::zstd_safe::get_frame_content_size(&frame)
                .ok()
                .flatten(),
            Some(12)
        );
        assert_eq!(zstd::decode_all(&frame[..]).unwrap(), b"content size");
    }

    #[test]
    fn test_compress_large_input_spans_blocks() {
        // Incompressible enough to push output past the first 32 KiB block
        let mut state = 0x2545_f491_4f6c_dd1du64;
        let data: Vec<u8> = (0..400_000)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state >> 32) as u8
            })
            .collect();
        let compressor = Compressor::new(CompressionParameters::zstd(1));
        let frame = compressor.compress(&data).unwrap();
        assert!(frame.len() > 32 * 1024);
        assert_eq!(zstd::decode_all(&frame[..]).unwrap(), data);
    }

    #[test]
    fn test_compress_each_method() {
        for method in [
            CompressionMethod::Stored,
            CompressionMethod::Deflate,
            CompressionMethod::Zstd,
        ] {
            let compressor = Compressor::new(CompressionParameters::new(method));
            let frame = compressor.compress(b"abcabcabcabc").unwrap();
            assert!(!frame.is_empty(), "{:?}", method);
        }
        let stored = Compressor::new(CompressionParameters::new(CompressionMethod::Stored));
        assert_eq!(stored.compress(b"as is").unwrap(), b"as is");
    }

    #[test]
    fn test_multi_compress_one_frame_per_item() {
        let compressor = Compressor::default();
        let items: [&[u8]; 3] = [b"one", b"", b"three"];
        let buffer = compressor.multi_compress_to_buffer(items).unwrap();
        assert_eq!(buffer.len(), 3);
        for (i, item) in items.iter().enumerate() {
            let frame = buffer.item_at(i).unwrap();
            assert_eq!(zstd::decode_all(frame.as_bytes()).unwrap(), *item);
        }
    }

    #[test]
    fn test_multi_compress_rejects_empty_sources() {
        let compressor = Compressor::default();
        let none: Vec<&[u8]> = Vec::new();
        assert!(matches!(
            compressor.multi_compress_to_buffer(none).unwrap_err(),
            SZStreamError::Misuse(_)
        ));
        let blank: [&[u8]; 2] = [b"", b""];
        assert!(matches!(
            compressor.multi_compress_to_buffer(blank).unwrap_err(),
            SZStreamError::Misuse(_)
        ));
    }

    #[test]
    fn test_incremental_front_ends_agree() {
        let data: Vec<u8> = b"incremental front end ".repeat(3000);
        let compressor = Compressor::default();

        let mut obj = compressor.compressobj(Some(data.len() as u64)).unwrap();
        let mut from_obj = Vec::new();
        for piece in data.chunks(5000) {
            from_obj.extend(obj.compress(piece).unwrap());
        }
        from_obj.extend(obj.flush(crate::FlushMode::Frame).unwrap());

        let mut chunker = compressor.chunker(None, 256).unwrap();
        let mut from_chunker = Vec::new();
        for piece in data.chunks(5000) {
            from_chunker.extend(chunker.compress(piece).unwrap().concat());
        }
        from_chunker.extend(chunker.finish().unwrap().concat());

        let from_iter: Vec<u8> = compressor
            .read_to_iter(&data[..], 4096, 512)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap()
            .concat();

        for frame in [from_obj, from_chunker, from_iter] {
            assert_eq!(zstd::decode_all(&frame[..]).unwrap(), data);
        }
        assert!(compressor.read_to_iter(&data[..], 4096, 0).is_err());
    }

    #[test]
    fn test_copy_stream() {
        let data = vec![b'z'; 100_000];
        let mut sink = Vec::new();
        let (read, written) = Compressor::default()
            .copy_stream(&data[..], &mut sink, 8192, 4096)
            .unwrap();
        assert_eq!(read, 100_000);
        assert_eq!(written, sink.len() as u64);
        assert_eq!(zstd::decode_all(&sink[..]).unwrap(), data);
    }
}
