//! In-place block headers.
//!
//! Every allocation and every free run starts with a one-word header. The
//! header word holds the block's length when allocated and zero when free;
//! a free block stores its run length in the following word, which is the
//! first payload word of an allocated block. [`Block`] makes that dual use
//! explicit instead of interpreting the second word by convention.
//!
//! ```text
//!   allocated                      free
//!   ┌────────┬──────────────┐      ┌────────┬────────┬──────────┐
//!   │ len    │ payload ...  │      │ 0      │ run    │ stale    │
//!   └────────┴──────────────┘      └────────┴────────┴──────────┘
//!            ▲                     ◄────────── run bytes ────────►
//!            └── pointer handed to the caller
//! ```

use spanpool_core::align::word_align;
use spanpool_core::WORD;

/// A decoded block header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Block {
    /// A free run of `run` bytes, header included.
    Free {
        /// Length of the contiguous free run starting at this header.
        run: usize,
    },
    /// An allocation of `len` bytes, header included.
    Allocated {
        /// Total block length, header included.
        len: usize,
    },
}

impl Block {
    /// Bytes occupied by the header in front of every payload.
    pub const HEADER: usize = WORD;

    /// Smallest block: a header plus one word, so a freed block can always
    /// record its own run length.
    pub const MIN_SIZE: usize = 2 * WORD;

    /// Block length required to serve a request for `bytes` payload bytes.
    ///
    /// Returns `None` if the arithmetic overflows.
    pub fn size_for(bytes: usize) -> Option<usize> {
        word_align(bytes.max(WORD).checked_add(Self::HEADER)?)
    }

    /// Distance from this header to the next one.
    pub fn extent(self) -> usize {
        match self {
            Self::Free { run } => run,
            Self::Allocated { len } => len,
        }
    }

    /// Whether this block is free.
    pub fn is_free(self) -> bool {
        matches!(self, Self::Free { .. })
    }

    /// Decode a header word; `run` is read only when the block is free.
    pub(crate) fn decode(header: usize, run: impl FnOnce() -> usize) -> Self {
        if header == 0 {
            Self::Free { run: run() }
        } else {
            Self::Allocated { len: header }
        }
    }

    /// The header word and, for free blocks, the run word that follows it.
    pub(crate) fn encode(self) -> (usize, Option<usize>) {
        match self {
            Self::Free { run } => (0, Some(run)),
            Self::Allocated { len } => (len, None),
        }
    }
}
