use std::io;
use thiserror::Error;

/// Possible errors that arise from compressing or decompressing chunks, or
/// from reading and patching a container file.
#[derive(Debug, Error)]
pub enum LzssError {
    #[error("Chunk header declares a compressed size of zero")]
    EmptyStream,

    #[error("Chunk stream ended mid-entry with {remaining_bits} bits of budget left")]
    TruncatedStream { remaining_bits: usize },

    #[error("Back-reference to offset {distance}, but only {available} bytes were decoded")]
    BadLookBack { distance: usize, available: usize },

    #[error("Compressed chunk is {size} bytes, which does not fit the 16-bit size header")]
    ChunkTooLarge { size: usize },

    #[error("Chunk size must be greater than zero")]
    InvalidChunkSize,

    #[error(
        "Compressed block is {packed:#x} bytes, larger than the {target:#x} byte block space by {overflow:#x} bytes"
    )]
    BudgetExceeded {
        packed: usize,
        target: usize,
        overflow: usize,
    },

    #[error("Pointer {pointer:#010x} lies below the base address {base:#010x}")]
    PointerBelowBase { pointer: u32, base: u32 },

    #[error("Address {base:#x} + {block_start:#x} + {offset:#x} does not fit in 32 bits")]
    AddressOverflow {
        base: u32,
        block_start: u64,
        offset: usize,
    },

    #[error("Range {offset:#x}..+{len:#x} lies outside of the {file_len:#x} byte container")]
    OutOfBounds {
        offset: u64,
        len: usize,
        file_len: u64,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}
