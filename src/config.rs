//! Codec selection, parameters and stream buffer sizing

/// Recommended input chunk size for compression streams
pub const COMPRESSION_RECOMMENDED_INPUT_SIZE: usize = 131_072;

/// Recommended output buffer size for compression streams
pub const COMPRESSION_RECOMMENDED_OUTPUT_SIZE: usize = 131_591;

/// Recommended input chunk size for decompression streams
pub const DECOMPRESSION_RECOMMENDED_INPUT_SIZE: usize = 131_075;

/// Recommended output buffer size for decompression streams
pub const DECOMPRESSION_RECOMMENDED_OUTPUT_SIZE: usize = 131_072;

/// Compression method used by an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    /// No compression (stored)
    Stored,
    /// Raw DEFLATE
    Deflate,
    /// Zstandard frames
    Zstd,
}

impl CompressionMethod {
    /// Default level for this method
    pub fn default_level(self) -> i32 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 6,
            CompressionMethod::Zstd => 3,
        }
    }

    /// Level accepted by the underlying codec
    pub(crate) fn clamp_level(self, level: i32) -> i32 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => level.clamp(0, 9),
            CompressionMethod::Zstd => level.clamp(-(1 << 17), 22),
        }
    }
}

impl Default for CompressionMethod {
    fn default() -> Self {
        CompressionMethod::Zstd
    }
}

/// Settings for producing compressed output
///
/// Options that a method does not understand are ignored: DEFLATE has no
/// frame checksum or content size, stored has neither levels nor windows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionParameters {
    pub method: CompressionMethod,
    pub level: i32,
    /// Append a content checksum to each frame
    pub write_checksum: bool,
    /// Record the source size in the frame header when it is known
    pub write_content_size: bool,
    /// Base-2 log of the match window; `None` keeps the level's default
    pub window_log: Option<u32>,
}

impl CompressionParameters {
    /// Parameters for `method` at its default level
    pub fn new(method: CompressionMethod) -> Self {
        Self {
            method,
            level: method.default_level(),
            write_checksum: false,
            write_content_size: true,
            window_log: None,
        }
    }

    /// Zstandard at `level`
    pub fn zstd(level: i32) -> Self {
        Self::new(CompressionMethod::Zstd).with_level(level)
    }

    /// DEFLATE at `level` (0-9)
    pub fn deflate(level: u32) -> Self {
        Self::new(CompressionMethod::Deflate).with_level(level as i32)
    }

    pub fn with_level(mut self, level: i32) -> Self {
        self.level = self.method.clamp_level(level);
        self
    }

    pub fn with_checksum(mut self, enabled: bool) -> Self {
        self.write_checksum = enabled;
        self
    }

    pub fn with_content_size(mut self, enabled: bool) -> Self {
        self.write_content_size = enabled;
        self
    }

    pub fn with_window_log(mut self, window_log: u32) -> Self {
        self.window_log = Some(window_log);
        self
    }
}

impl Default for CompressionParameters {
    fn default() -> Self {
        Self::new(CompressionMethod::default())
    }
}

/// Settings for consuming compressed input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecompressionParameters {
    pub method: CompressionMethod,
    /// Reject frames needing a window larger than `1 << window_log_max`
    pub window_log_max: Option<u32>,
}

impl DecompressionParameters {
    pub fn new(method: CompressionMethod) -> Self {
        Self {
            method,
            window_log_max: None,
        }
    }

    pub fn with_window_log_max(mut self, window_log_max: u32) -> Self {
        self.window_log_max = Some(window_log_max);
        self
    }
}

impl Default for DecompressionParameters {
    fn default() -> Self {
        Self::new(CompressionMethod::default())
    }
}

/// Buffering behaviour of pull-based readers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Bytes requested from the source per pull
    pub read_size: usize,
    /// Keep decoding after the first frame ends
    pub read_across_frames: bool,
}

impl ReaderOptions {
    pub fn for_compression() -> Self {
        Self {
            read_size: COMPRESSION_RECOMMENDED_INPUT_SIZE,
            read_across_frames: false,
        }
    }

    pub fn for_decompression() -> Self {
        Self {
            read_size: DECOMPRESSION_RECOMMENDED_INPUT_SIZE,
            read_across_frames: false,
        }
    }

    pub fn with_read_size(mut self, read_size: usize) -> Self {
        self.read_size = read_size;
        self
    }

    pub fn with_read_across_frames(mut self, enabled: bool) -> Self {
        self.read_across_frames = enabled;
        self
    }
}

/// Buffering behaviour of push-based writers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterOptions {
    /// Size of the output window drained to the sink after every step
    pub write_size: usize,
    /// `write` reports input bytes consumed instead of output bytes emitted
    pub write_return_read: bool,
    /// Total input size, pinned into the engine when the scope is entered
    pub source_size: Option<u64>,
}

impl WriterOptions {
    pub fn for_compression() -> Self {
        Self {
            write_size: COMPRESSION_RECOMMENDED_OUTPUT_SIZE,
            write_return_read: false,
            source_size: None,
        }
    }

    pub fn for_decompression() -> Self {
        Self {
            write_size: DECOMPRESSION_RECOMMENDED_OUTPUT_SIZE,
            write_return_read: false,
            source_size: None,
        }
    }

    pub fn with_write_size(mut self, write_size: usize) -> Self {
        self.write_size = write_size;
        self
    }

    pub fn with_write_return_read(mut self, enabled: bool) -> Self {
        self.write_return_read = enabled;
        self
    }

    pub fn with_source_size(mut self, size: u64) -> Self {
        self.source_size = Some(size);
        self
    }
}
