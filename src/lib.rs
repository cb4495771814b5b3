//! Compression and decompression of the chunked LZSS graphics data in Einhander (PSX).
//!
//! Graphics lines are compressed chunk by chunk. Each chunk is a small LZSS stream
//! (see [`format`]) found through a table of pointers into the game's memory.
//! Single chunks are handled by [`compress`] and [`decompress`], or by an
//! [`EncoderBuilder`] and [`Decoder`] for more control. Whole blocks of lines are
//! handled by [`pack_chunks`] and [`unpack_chunks`], and a packed block is written
//! back into its container file with [`patch_container`].
//!
//! ```
//! # use einlzss::{pack_chunks, patch_container, unpack_chunks, ContainerLayout, PointerTable};
//! # use std::io::Cursor;
//! let lines = [[0x00u8; 8], [0x12; 8], [0x34; 8]].concat();
//! let block = pack_chunks(&lines, 8).unwrap();
//!
//! let layout = ContainerLayout {
//!     table: PointerTable::new(0x8001_0000, 0x00),
//!     block_start: 0x60,
//!     target_size: 0x40,
//! };
//! let mut container = Cursor::new(vec![0u8; 0x100]);
//! patch_container(&mut container, &block, &layout).unwrap();
//!
//! let unpacked = unpack_chunks(&mut container, 0x8001_0000, 0x00, 3).unwrap();
//! assert_eq!(unpacked, lines);
//! ```

mod block;
mod container;
mod decode;
mod encode;
mod errors;
pub mod format;

pub use block::{pack_chunks, unpack_chunks, PackedBlock, Packer, Unpacker};
pub use container::{patch_container, patch_file, ContainerLayout, PointerTable, TABLE_STRIDE};
pub use decode::{decode, decode_entries, decompress, Decoder, Deserialized, StreamEnd};
pub use encode::{
    compress, encode, serialize, EncoderBuilder, LzssBackend, Progress, ProgressFn, Stage,
};
pub use errors::LzssError;
pub use format::Entry;
