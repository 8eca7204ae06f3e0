//! Codec engine interface shared by readers, writers and bulk operations
//!
//! An engine is anything exposing an incremental `step`: consume bytes from an
//! input cursor, produce bytes into an output cursor, and report whether more
//! steps are needed. Engines never allocate output space themselves; callers
//! hand them a fixed window and drain it.

use crate::error::Result;

/// What the engine should do with its buffered state during a step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Consume input, emit whatever is ready
    Continue,
    /// Emit all buffered output; further input is still accepted afterwards
    Flush,
    /// Emit all buffered output and close the current frame
    End,
}

/// Read position over a borrowed input slice
#[derive(Debug)]
pub struct InCursor<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> InCursor<'a> {
    pub fn new(src: &'a [u8]) -> Self {
        Self { src, pos: 0 }
    }

    /// An input cursor with nothing to read
    pub fn empty() -> Self {
        Self::new(&[])
    }

    /// Bytes not consumed yet
    pub fn unread(&self) -> &'a [u8] {
        let src: &'a [u8] = self.src;
        &src[self.pos..]
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn len(&self) -> usize {
        self.src.len()
    }

    pub fn is_empty(&self) -> bool {
        self.src.is_empty()
    }

    pub fn is_consumed(&self) -> bool {
        self.pos >= self.src.len()
    }

    /// Record that `count` bytes were consumed
    pub fn advance(&mut self, count: usize) {
        debug_assert!(self.pos + count <= self.src.len());
        self.pos = (self.pos + count).min(self.src.len());
    }
}

/// Write position over a borrowed, fixed-capacity output window
#[derive(Debug)]
pub struct OutCursor<'a> {
    dst: &'a mut [u8],
    pos: usize,
}

impl<'a> OutCursor<'a> {
    pub fn new(dst: &'a mut [u8]) -> Self {
        Self { dst, pos: 0 }
    }

    /// Resume writing into `dst` after `pos` bytes already written
    pub fn with_pos(dst: &'a mut [u8], pos: usize) -> Self {
        debug_assert!(pos <= dst.len());
        let pos = pos.min(dst.len());
        Self { dst, pos }
    }

    /// Space left to write into
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.dst[self.pos..]
    }

    /// Bytes produced so far
    pub fn written(&self) -> &[u8] {
        &self.dst[..self.pos]
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn capacity(&self) -> usize {
        self.dst.len()
    }

    pub fn is_full(&self) -> bool {
        self.pos >= self.dst.len()
    }

    /// Record that `count` bytes were produced
    pub fn advance(&mut self, count: usize) {
        debug_assert!(self.pos + count <= self.dst.len());
        self.pos = (self.pos + count).min(self.dst.len());
    }

    /// Forget produced bytes so the window can be reused
    pub fn reset(&mut self) {
        self.pos = 0;
    }
}

/// Incremental transform consumed by the streaming adapters
///
/// `step` returns `0` once the directive has been fully honored (frame
/// finished, nothing left to flush) and a positive value when another step is
/// required. Failures surface as [`SZStreamError::Codec`](crate::SZStreamError).
pub trait CodecEngine {
    fn step(
        &mut self,
        input: &mut InCursor<'_>,
        output: &mut OutCursor<'_>,
        directive: Directive,
    ) -> Result<usize>;

    /// Forget any partially processed frame
    fn reset(&mut self) -> Result<()>;

    /// Declare the total input size of the next frame, when known
    fn pledge_source_size(&mut self, _size: Option<u64>) -> Result<()> {
        Ok(())
    }

    /// Short name used in diagnostics
    fn name(&self) -> &'static str;
}

impl<E: CodecEngine + ?Sized> CodecEngine for Box<E> {
    fn step(
        &mut self,
        input: &mut InCursor<'_>,
        output: &mut OutCursor<'_>,
        directive: Directive,
    ) -> Result<usize> {
        (**self).step(input, output, directive)
    }

    fn reset(&mut self) -> Result<()> {
        (**self).reset()
    }

    fn pledge_source_size(&mut self, size: Option<u64>) -> Result<()> {
        (**self).pledge_source_size(size)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Boxed engine as stored by readers and writers
pub type BoxedEngine = Box<dyn CodecEngine + Send>;

/// Lifecycle of a streaming reader or writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    NotEntered,
    Active,
    Closed,
}

impl StreamState {
    /// Fail unless the stream is inside an active scope
    pub(crate) fn require_active(self, op: &str) -> Result<()> {
        match self {
            StreamState::Active => Ok(()),
            StreamState::NotEntered => Err(crate::SZStreamError::misuse(format!(
                "{}() must be called from an active scope",
                op
            ))),
            StreamState::Closed => Err(crate::SZStreamError::misuse("stream is closed")),
        }
    }

    /// Transition `NotEntered -> Active`
    pub(crate) fn enter(&mut self) -> Result<()> {
        match self {
            StreamState::NotEntered => {
                *self = StreamState::Active;
                Ok(())
            }
            StreamState::Active => Err(crate::SZStreamError::misuse(
                "cannot enter multiple times",
            )),
            StreamState::Closed => Err(crate::SZStreamError::misuse("stream is closed")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_advance() {
        let data = b"abcdef";
        let mut input = InCursor::new(data);
        input.advance(2);
        assert_eq!(input.unread(), b"cdef");
        assert!(!input.is_consumed());
        input.advance(4);
        assert!(input.is_consumed());

        let mut buf = [0u8; 4];
        let mut output = OutCursor::new(&mut buf);
        output.spare_mut()[..3].copy_from_slice(b"xyz");
        output.advance(3);
        assert_eq!(output.written(), b"xyz");
        assert!(!output.is_full());
        output.advance(1);
        assert!(output.is_full());
    }

    #[test]
    fn test_state_transitions() {
        let mut state = StreamState::NotEntered;
        assert!(state.require_active("write").is_err());
        state.enter().unwrap();
        assert!(state.require_active("write").is_ok());
        assert!(state.enter().is_err());

        state = StreamState::Closed;
        assert!(state.enter().is_err());
        assert!(state.require_active("write").is_err());
    }
}
