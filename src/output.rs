//! Block-based output accumulator for codec calls of unknown output size
//!
//! Output lands in a list of fixed-capacity blocks that are never resized, so
//! a cursor handed to the engine stays valid until the block is full. Block
//! sizes start small and grow:
//!
//! | block | size    | allocated total |
//! |-------|---------|-----------------|
//! | 1     | 32 KiB  | 32 KiB          |
//! | 2     | 64 KiB  | 96 KiB          |
//! | 3     | 256 KiB | 352 KiB         |
//! | 4     | 1 MiB   | 1.34 MiB        |
//! | 5     | 4 MiB   | 5.34 MiB        |
//! | ...   | ...     | ...             |
//! | 17+   | 256 MiB | +256 MiB each   |

use crate::codec::{CodecEngine, Directive, InCursor, OutCursor};
use crate::error::{Result, SZStreamError};

const KIB: usize = 1024;
const MIB: usize = 1024 * 1024;

/// Capacity of the n-th block; the last entry repeats
const BLOCK_SIZES: [usize; 17] = [
    32 * KIB,
    64 * KIB,
    256 * KIB,
    MIB,
    4 * MIB,
    8 * MIB,
    16 * MIB,
    16 * MIB,
    32 * MIB,
    32 * MIB,
    32 * MIB,
    32 * MIB,
    64 * MIB,
    64 * MIB,
    128 * MIB,
    128 * MIB,
    256 * MIB,
];

fn block_size_for(index: usize) -> usize {
    BLOCK_SIZES[index.min(BLOCK_SIZES.len() - 1)]
}

/// Fixed-capacity owned buffer plus write cursor
struct Block {
    data: Box<[u8]>,
    len: usize,
}

impl Block {
    fn allocate(size: usize) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|e| SZStreamError::Allocation(format!("{} byte block: {}", size, e)))?;
        data.resize(size, 0);
        Ok(Self {
            data: data.into_boxed_slice(),
            len: 0,
        })
    }

    fn capacity(&self) -> usize {
        self.data.len()
    }

    fn is_full(&self) -> bool {
        self.len == self.data.len()
    }
}

/// Growable list of output blocks
pub struct OutputBlockList {
    blocks: Vec<Block>,
    allocated: usize,
    max_length: Option<usize>,
}

impl OutputBlockList {
    /// Start with a single block of exactly `initial_size` bytes and no cap
    pub fn with_capacity(initial_size: usize) -> Result<Self> {
        let first = Block::allocate(initial_size)?;
        Ok(Self {
            blocks: vec![first],
            allocated: initial_size,
            max_length: None,
        })
    }

    /// Start with the first table-sized block, never allocating past `max_length`
    pub fn init_and_grow(max_length: Option<usize>) -> Result<Self> {
        let block_size = match max_length {
            Some(max) if max < BLOCK_SIZES[0] => max,
            _ => BLOCK_SIZES[0],
        };
        let first = Block::allocate(block_size)?;
        Ok(Self {
            blocks: vec![first],
            allocated: block_size,
            max_length,
        })
    }

    /// Append the next block; the active block must be full
    ///
    /// At the cap this is a no-op, so callers check [`reached_max_length`]
    /// before growing when they still have output to place.
    ///
    /// [`reached_max_length`]: OutputBlockList::reached_max_length
    pub fn grow(&mut self) -> Result<()> {
        debug_assert!(self.active_is_full(), "grow() with space left in block");

        let mut block_size = block_size_for(self.blocks.len());
        if let Some(max) = self.max_length {
            let room = max.saturating_sub(self.allocated);
            if room == 0 {
                return Ok(());
            }
            block_size = block_size.min(room);
        }

        let allocated = self.allocated.checked_add(block_size).ok_or_else(|| {
            SZStreamError::Allocation("cumulative output size overflow".to_string())
        })?;
        if allocated > isize::MAX as usize {
            return Err(SZStreamError::Allocation(
                "cumulative output size overflow".to_string(),
            ));
        }

        let block = Block::allocate(block_size)?;
        self.blocks.push(block);
        self.allocated = allocated;
        tracing::trace!(
            blocks = self.blocks.len(),
            block_size,
            allocated = self.allocated,
            "grew output buffer"
        );
        Ok(())
    }

    /// Whether cumulative capacity equals the configured cap
    pub fn reached_max_length(&self) -> bool {
        self.max_length == Some(self.allocated)
    }

    /// Whether the block currently written to has no space left
    pub fn active_is_full(&self) -> bool {
        self.blocks.last().map_or(true, Block::is_full)
    }

    /// Total capacity across all blocks
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    pub fn max_length(&self) -> Option<usize> {
        self.max_length
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Bytes written so far
    pub fn written(&self) -> usize {
        self.blocks.iter().map(|b| b.len).sum()
    }

    /// Run `f` with a cursor over the active block, keeping its position
    pub fn with_active_cursor<T>(&mut self, f: impl FnOnce(&mut OutCursor<'_>) -> T) -> T {
        let mut empty: [u8; 0] = [];
        match self.blocks.last_mut() {
            Some(block) => {
                let mut cursor = OutCursor::with_pos(&mut block.data, block.len);
                let result = f(&mut cursor);
                block.len = cursor.pos();
                result
            }
            None => f(&mut OutCursor::new(&mut empty)),
        }
    }

    /// Copy `data` in, growing as needed
    pub fn extend_from_slice(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            if self.active_is_full() {
                if self.reached_max_length() {
                    return Err(SZStreamError::Allocation(format!(
                        "output exceeds maximum length of {} bytes",
                        self.allocated
                    )));
                }
                self.grow()?;
            }
            let copied = self.with_active_cursor(|cursor| {
                let spare = cursor.spare_mut();
                let count = spare.len().min(data.len());
                spare[..count].copy_from_slice(&data[..count]);
                cursor.advance(count);
                count
            });
            data = &data[copied..];
        }
        Ok(())
    }

    /// Materialize the written bytes as one contiguous buffer
    pub fn finish(mut self) -> Result<Vec<u8>> {
        let single_block = match self.blocks.len() {
            1 => self.blocks[0].is_full(),
            2 => self.blocks[1].len == 0,
            _ => false,
        };
        if single_block && self.blocks[0].is_full() {
            let block = self.blocks.swap_remove(0);
            tracing::debug!(size = block.len, "output finished without copy");
            return Ok(block.data.into_vec());
        }

        let total = self.written();
        let mut result = Vec::new();
        result
            .try_reserve_exact(total)
            .map_err(|e| SZStreamError::Allocation(format!("{} byte result: {}", total, e)))?;
        for block in self.blocks.drain(..) {
            result.extend_from_slice(&block.data[..block.len]);
        }
        tracing::debug!(size = total, "output finished by joining blocks");
        Ok(result)
    }

    /// Release every block after a failure
    pub fn on_error(mut self) {
        self.blocks.clear();
        self.allocated = 0;
    }
}

/// Step `engine` over `input` until `done` agrees, collecting all output
///
/// `done(ret, input, block_full)` is asked after every step; a full block
/// grows before the next step.
pub(crate) fn collect_steps(
    engine: &mut dyn CodecEngine,
    input: &mut InCursor<'_>,
    directive: Directive,
    mut done: impl FnMut(usize, &InCursor<'_>, bool) -> bool,
) -> Result<Vec<u8>> {
    let mut output = OutputBlockList::init_and_grow(None)?;
    loop {
        let step = output.with_active_cursor(|cursor| engine.step(input, cursor, directive));
        let ret = match step {
            Ok(ret) => ret,
            Err(e) => {
                output.on_error();
                return Err(e);
            }
        };
        let full = output.active_is_full();
        if done(ret, input, full) {
            break;
        }
        if full {
            output.grow()?;
        }
    }
    output.finish()
}

impl std::fmt::Debug for OutputBlockList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputBlockList")
            .field("blocks", &self.blocks.iter().map(Block::capacity).collect::<Vec<_>>())
            .field("allocated", &self.allocated)
            .field("max_length", &self.max_length)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill_active(list: &mut OutputBlockList, byte: u8) {
        list.with_active_cursor(|cursor| {
            let spare = cursor.spare_mut();
            let count = spare.len();
            spare.fill(byte);
            cursor.advance(count);
        });
    }

    #[test]
    fn test_block_size_table() {
        assert_eq!(block_size_for(0), 32 * KIB);
        assert_eq!(block_size_for(3), MIB);
        assert_eq!(block_size_for(16), 256 * MIB);
        assert_eq!(block_size_for(40), 256 * MIB);
    }

    #[test]
    fn test_single_full_block_is_returned_without_copy() {
        let mut list = OutputBlockList::with_capacity(16).unwrap();
        fill_active(&mut list, 0xAB);
        let block_ptr = list.blocks[0].data.as_ptr();

        let result = list.finish().unwrap();
        assert_eq!(result.as_ptr(), block_ptr);
        assert_eq!(result, vec![0xAB; 16]);
    }

    #[test]
    fn test_full_block_followed_by_empty_block_skips_copy() {
        let mut list = OutputBlockList::init_and_grow(None).unwrap();
        fill_active(&mut list, 1);
        list.grow().unwrap();
        let block_ptr = list.blocks[0].data.as_ptr();

        let result = list.finish().unwrap();
        assert_eq!(result.as_ptr(), block_ptr);
        assert_eq!(result.len(), 32 * KIB);
    }

    #[test]
    fn test_partial_blocks_are_joined_in_order() {
        let mut list = OutputBlockList::with_capacity(4).unwrap();
        list.extend_from_slice(b"hello world").unwrap();
        assert!(list.block_count() > 1);
        assert_eq!(list.finish().unwrap(), b"hello world");
    }

    #[test]
    fn test_partially_written_single_block_is_trimmed() {
        let mut list = OutputBlockList::with_capacity(64).unwrap();
        list.extend_from_slice(b"abc").unwrap();
        assert_eq!(list.finish().unwrap(), b"abc");
    }

    #[test]
    fn test_max_length_caps_allocation() {
        for max in [0usize, 1, 100, 32 * KIB, 32 * KIB + 7, 200 * KIB] {
            let mut list = OutputBlockList::init_and_grow(Some(max)).unwrap();
            while !list.reached_max_length() {
                fill_active(&mut list, 0);
                list.grow().unwrap();
                assert!(list.allocated() <= max);
            }
            assert_eq!(list.allocated(), max);

            // Growing at the cap does not add capacity
            fill_active(&mut list, 0);
            list.grow().unwrap();
            assert_eq!(list.allocated(), max);
        }
    }

    #[test]
    fn test_extend_past_max_length_fails() {
        let mut list = OutputBlockList::init_and_grow(Some(8)).unwrap();
        let err = list.extend_from_slice(&[0u8; 9]).unwrap_err();
        assert!(matches!(err, SZStreamError::Allocation(_)));
    }

    #[test]
    fn test_collect_steps_spans_blocks() {
        let data = vec![3u8; 100_000];
        let mut engine = crate::engine::StoredEngine::new();
        let mut input = InCursor::new(&data);
        let out = collect_steps(&mut engine, &mut input, Directive::End, |ret, _, _| ret == 0)
            .unwrap();
        assert_eq!(out, data);
        assert!(input.is_consumed());
    }

    #[test]
    fn test_allocated_matches_block_capacities() {
        let mut list = OutputBlockList::init_and_grow(None).unwrap();
        for _ in 0..3 {
            fill_active(&mut list, 0);
            list.grow().unwrap();
        }
        let sum: usize = list.blocks.iter().map(Block::capacity).sum();
        assert_eq!(list.allocated(), sum);
        assert_eq!(list.allocated(), (32 + 64 + 256 + 1024) * KIB);
    }
}
