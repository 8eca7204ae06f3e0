//! Compression into fixed-size chunks
//!
//! Output is collected into a buffer of exactly `chunk_size` bytes and handed
//! out only once that buffer is full, so every chunk returned by
//! [`CompressionChunker::compress`] has the same length. Only the last chunk
//! of a [`flush`](CompressionChunker::flush) or
//! [`finish`](CompressionChunker::finish) may be shorter.

use crate::codec::{BoxedEngine, CodecEngine, Directive, InCursor, OutCursor};
use crate::error::{Result, SZStreamError};

pub struct CompressionChunker {
    engine: BoxedEngine,
    chunk: Vec<u8>,
    filled: usize,
    finished: bool,
}

impl CompressionChunker {
    pub(crate) fn new(
        mut engine: BoxedEngine,
        source_size: Option<u64>,
        chunk_size: usize,
    ) -> Result<Self> {
        if chunk_size == 0 {
            return Err(SZStreamError::misuse("chunk_size must be positive"));
        }
        engine.pledge_source_size(source_size)?;
        Ok(Self {
            engine,
            chunk: vec![0u8; chunk_size],
            filled: 0,
            finished: false,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk.len()
    }

    /// Feed `data`, returning every chunk that filled up
    pub fn compress(&mut self, data: &[u8]) -> Result<Vec<Vec<u8>>> {
        self.require_open("compress")?;
        if data.is_empty() {
            return Ok(Vec::new());
        }
        let mut input = InCursor::new(data);
        self.run(&mut input, Directive::Continue, |_, input| input.is_consumed())
    }

    /// Emit everything buffered so far; the frame stays open
    pub fn flush(&mut self) -> Result<Vec<Vec<u8>>> {
        self.require_open("flush")?;
        let mut chunks = self.run(&mut InCursor::empty(), Directive::Flush, |ret, _| ret == 0)?;
        self.take_partial(&mut chunks);
        Ok(chunks)
    }

    /// End the frame and emit the remaining chunks
    pub fn finish(&mut self) -> Result<Vec<Vec<u8>>> {
        self.require_open("finish")?;
        let mut chunks = self.run(&mut InCursor::empty(), Directive::End, |ret, _| ret == 0)?;
        self.take_partial(&mut chunks);
        self.finished = true;
        tracing::debug!(chunk_size = self.chunk.len(), "chunker finished");
        Ok(chunks)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn require_open(&self, op: &str) -> Result<()> {
        if self.finished {
            return Err(SZStreamError::misuse(format!(
                "cannot call {}() after compression finished",
                op
            )));
        }
        Ok(())
    }

    fn run(
        &mut self,
        input: &mut InCursor<'_>,
        directive: Directive,
        done: impl Fn(usize, &InCursor<'_>) -> bool,
    ) -> Result<Vec<Vec<u8>>> {
        let mut chunks = Vec::new();
        loop {
            let mut output = OutCursor::with_pos(&mut self.chunk[..], self.filled);
            let ret = self.engine.step(input, &mut output, directive)?;
            self.filled = output.pos();
            if output.is_full() {
                chunks.push(self.chunk.clone());
                self.filled = 0;
            } else if done(ret, input) {
                return Ok(chunks);
            }
        }
    }

    fn take_partial(&mut self, chunks: &mut Vec<Vec<u8>>) {
        if self.filled > 0 {
            chunks.push(self.chunk[..self.filled].to_vec());
            self.filled = 0;
        }
    }
}
