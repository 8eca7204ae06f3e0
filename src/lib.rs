//! # s-zstream: Incremental Codec I/O
//!
//! `s-zstream` turns an incremental compression engine into file-like streaming
//! readers and writers with bounded memory use, plus zero-copy containers for
//! packing many independently addressable byte ranges into one allocation.
//!
//! ## Features
//!
//! - **Streaming Write**: Push chunks through a codec straight into any `Write` sink
//! - **Streaming Read**: Pull bounded reads from any `Read` source, forward seeking on decompression
//! - **One-shot**: Compress or decompress whole buffers without knowing the output size
//! - **Batch**: One frame per item, all packed into a single segmented buffer
//! - **Incremental objects**: Feed chunks in memory, get output back, with a
//!   fixed-size chunking variant and iterator adapters over readers
//! - **Codecs**: Zstandard (default), raw DEFLATE, or stored
//!
//! ## Quick Start
//!
//! ### Compressing with a writer
//!
//! ```no_run
//! use s_zstream::{CompressionParameters, Compressor, WriterOptions};
//! use std::fs::File;
//!
//! let compressor = Compressor::new(CompressionParameters::zstd(3));
//! let mut writer =
//!     compressor.stream_writer(File::create("data.zst")?, WriterOptions::for_compression())?;
//!
//! writer.scope(|w| {
//!     w.write(b"Hello, ")?;
//!     w.write(b"World!")?;
//!     Ok(())
//! })?;
//! # Ok::<(), s_zstream::SZStreamError>(())
//! ```
//!
//! ### Decompressing with a reader
//!
//! ```no_run
//! use s_zstream::{Decompressor, ReaderOptions};
//! use std::fs::File;
//!
//! let mut reader = Decompressor::default()
//!     .stream_reader(File::open("data.zst")?, ReaderOptions::for_decompression())?;
//! reader.enter()?;
//!
//! // Skip the greeting, then read the rest
//! reader.seek(std::io::SeekFrom::Start(7))?;
//! let rest = reader.readall()?;
//! assert_eq!(rest, b"World!");
//! # Ok::<(), s_zstream::SZStreamError>(())
//! ```
//!
//! ### Batch frames in one buffer
//!
//! ```
//! use s_zstream::{Compressor, Decompressor};
//!
//! let items: [&[u8]; 3] = [b"first", b"second", b"third"];
//! let frames = Compressor::default().multi_compress_to_buffer(items)?;
//! assert_eq!(frames.len(), 3);
//!
//! let restored = Decompressor::default().multi_decompress_to_buffer(frames.iter())?;
//! assert_eq!(restored.item_at(1)?.as_bytes(), b"second");
//! # Ok::<(), s_zstream::SZStreamError>(())
//! ```

pub mod chunker;
pub mod codec;
pub mod compressor;
pub mod config;
pub mod decompressor;
pub mod engine;
pub mod error;
pub mod object;
pub mod output;
pub mod reader;
pub mod segments;
pub mod writer;

pub use chunker::CompressionChunker;
pub use codec::{BoxedEngine, CodecEngine, Directive, InCursor, OutCursor, StreamState};
pub use compressor::Compressor;
pub use config::{
    CompressionMethod, CompressionParameters, DecompressionParameters, ReaderOptions,
    WriterOptions, COMPRESSION_RECOMMENDED_INPUT_SIZE, COMPRESSION_RECOMMENDED_OUTPUT_SIZE,
    DECOMPRESSION_RECOMMENDED_INPUT_SIZE, DECOMPRESSION_RECOMMENDED_OUTPUT_SIZE,
};
pub use decompressor::Decompressor;
pub use engine::{
    compression_engine, decompression_engine, DeflateCompressEngine, DeflateDecompressEngine,
    StoredEngine, ZstdCompressEngine, ZstdDecompressEngine,
};
pub use error::{Result, SZStreamError};
pub use object::{CompressionObj, DecompressionObj};
pub use output::OutputBlockList;
pub use reader::{
    CompressedChunks, CompressionReader, DecompressedChunks, DecompressionReader,
};
pub use segments::{Backing, BufferCollection, BufferSegment, Segment, SegmentedBuffer};
pub use writer::{CompressionWriter, DecompressionWriter, FlushMode};
