//! First-fit block management over a [`RawSpan`].
//!
//! [`Arena`] is the unsynchronized core of the region allocator. It deals
//! only in byte offsets: a payload offset is the offset of the word that
//! follows a block's header. The public [`RegionAllocator`] wraps it in a
//! spin lock and converts offsets to pointers.
//!
//! Blocks tile the span exactly: walking from offset 0 and advancing by each
//! block's extent lands on the end of the span. Freed blocks are never
//! merged with their neighbours during `deallocate`; adjacent free runs are
//! only joined by an explicit [`Arena::merge_free_runs`] pass.
//!
//! [`RegionAllocator`]: crate::RegionAllocator

use spanpool_core::align::is_aligned;
use spanpool_core::WORD;

use crate::block::Block;
use crate::raw::RawSpan;
use crate::stats::RegionStats;

pub(crate) struct Arena {
    span: RawSpan,
    /// Bytes held by allocated blocks, headers included.
    allocated: usize,
}

impl Arena {
    /// Initialize `span` as a single free run.
    ///
    /// A span too small to hold [`Block::MIN_SIZE`] bytes yields an arena
    /// with no blocks, on which every allocation fails.
    pub(crate) fn new(mut span: RawSpan) -> Self {
        let capacity = span.len();
        if capacity >= Block::MIN_SIZE {
            write_block(&mut span, 0, Block::Free { run: capacity });
        }
        Self { span, allocated: 0 }
    }

    pub(crate) fn span(&self) -> &RawSpan {
        &self.span
    }

    pub(crate) fn capacity(&self) -> usize {
        if self.span.len() >= Block::MIN_SIZE {
            self.span.len()
        } else {
            0
        }
    }

    pub(crate) fn allocated(&self) -> usize {
        self.allocated
    }

    /// Decode the block at `offset`, panicking if the header is corrupt.
    fn block_at(&self, offset: usize) -> Block {
        let block = Block::decode(self.span.read_word(offset), || {
            self.span.read_word(offset + Block::HEADER)
        });
        let extent = block.extent();
        assert!(
            extent != 0,
            "region corrupted: zero-length free run at offset {offset}"
        );
        assert!(
            extent >= Block::MIN_SIZE && is_aligned(extent, WORD),
            "region corrupted: malformed block of {extent} bytes at offset {offset}"
        );
        assert!(
            offset
                .checked_add(extent)
                .is_some_and(|end| end <= self.capacity()),
            "region corrupted: block at offset {offset} overruns the arena ({extent} bytes)"
        );
        block
    }

    fn write(&mut self, offset: usize, block: Block) {
        write_block(&mut self.span, offset, block);
    }

    /// Walk every block from the start of the span.
    pub(crate) fn blocks(&self) -> Blocks<'_> {
        Blocks {
            arena: self,
            cursor: 0,
        }
    }

    /// First-fit allocation. Returns the payload offset.
    pub(crate) fn allocate(&mut self, bytes: usize) -> Option<usize> {
        let need = Block::size_for(bytes)?;
        let (offset, run) = self.blocks().find_map(|(offset, block)| match block {
            Block::Free { run } if run >= need => Some((offset, run)),
            _ => None,
        })?;

        // A leftover too small for its own header would be an unusable sliver.
        let len = if run - need < Block::MIN_SIZE {
            run
        } else {
            self.write(offset + need, Block::Free { run: run - need });
            need
        };
        self.write(offset, Block::Allocated { len });
        self.allocated += len;
        Some(offset + Block::HEADER)
    }

    /// Header offset and length of the allocated block owning `payload`.
    fn allocated_block(&self, payload: usize) -> (usize, usize) {
        assert!(
            payload >= Block::HEADER && payload < self.capacity() && is_aligned(payload, WORD),
            "offset {payload} is not a payload in this region"
        );
        let offset = payload - Block::HEADER;
        match self.block_at(offset) {
            Block::Allocated { len } => (offset, len),
            Block::Free { .. } => panic!("double free of block at offset {offset}"),
        }
    }

    /// Release the block owning `payload`. Returns the bytes freed.
    pub(crate) fn deallocate(&mut self, payload: usize) -> usize {
        let (offset, len) = self.allocated_block(payload);
        debug_assert!(self.allocated >= len, "allocated byte count underflow");
        self.write(offset, Block::Free { run: len });
        self.allocated -= len;
        len
    }

    /// Resize the block owning `payload`, moving it if it cannot fit.
    ///
    /// Returns the (possibly unchanged) payload offset, or `None` with the
    /// original block left intact.
    pub(crate) fn reallocate(&mut self, payload: usize, bytes: usize) -> Option<usize> {
        let (offset, len) = self.allocated_block(payload);
        let need = Block::size_for(bytes)?;

        if need <= len {
            let slack = len - need;
            // Without room for a free header the slack stays inside the block.
            if slack >= Block::MIN_SIZE {
                self.write(offset, Block::Allocated { len: need });
                self.write(offset + need, Block::Free { run: slack });
                self.allocated -= slack;
            }
            return Some(payload);
        }

        let moved = self.allocate(bytes)?;
        self.span
            .copy_nonoverlapping(payload, moved, len - Block::HEADER);
        self.deallocate(payload);
        Some(moved)
    }

    /// Join every run of adjacent free blocks into one block.
    ///
    /// Returns the number of headers removed.
    pub(crate) fn merge_free_runs(&mut self) -> usize {
        let capacity = self.capacity();
        let mut merged = 0;
        let mut cursor = 0;
        while cursor < capacity {
            let block = self.block_at(cursor);
            let Block::Free { mut run } = block else {
                cursor += block.extent();
                continue;
            };
            let mut absorbed = 0;
            while cursor + run < capacity {
                match self.block_at(cursor + run) {
                    Block::Free { run: next } => {
                        run += next;
                        absorbed += 1;
                    }
                    Block::Allocated { .. } => break,
                }
            }
            if absorbed > 0 {
                self.write(cursor, Block::Free { run });
                merged += absorbed;
            }
            cursor += run;
        }
        merged
    }

    /// Walk the block list and summarize it.
    pub(crate) fn stats(&self) -> RegionStats {
        let mut stats = RegionStats {
            capacity: self.capacity(),
            ..RegionStats::default()
        };
        for (_, block) in self.blocks() {
            match block {
                Block::Allocated { len } => {
                    stats.allocated += len;
                    stats.allocated_blocks += 1;
                }
                Block::Free { run } => {
                    stats.free += run;
                    stats.free_blocks += 1;
                    stats.largest_free_run = stats.largest_free_run.max(run);
                }
            }
        }
        debug_assert_eq!(stats.allocated, self.allocated);
        stats
    }
}

fn write_block(span: &mut RawSpan, offset: usize, block: Block) {
    let (header, run) = block.encode();
    span.write_word(offset, header);
    if let Some(run) = run {
        span.write_word(offset + Block::HEADER, run);
    }
}

/// Iterator over `(header offset, block)` pairs in address order.
pub(crate) struct Blocks<'a> {
    arena: &'a Arena,
    cursor: usize,
}

impl Iterator for Blocks<'_> {
    type Item = (usize, Block);

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.arena.capacity() {
            return None;
        }
        let offset = self.cursor;
        let block = self.arena.block_at(offset);
        self.cursor += block.extent();
        Some((offset, block))
    }
}
