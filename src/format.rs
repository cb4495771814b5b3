//! Information and structures for compressed line chunks.
//!
//! Every chunk of graphics data is compressed on its own into a byte aligned stream:
//!
//! | Byte Num | Description |
//! | :------: | ----------- |
//! | 0..2     | size in big endian bytes of the compressed body |
//! | 2..      | bit packed body of raw and lz entries |
//!
//! ## Entries
//! The body is read most significant bit first. Each entry starts with a flag bit:
//!
//! | Flag | Fields | Meaning |
//! | :--: | ------ | ------- |
//! | `1`  | 8 bit value | copy the value to the output |
//! | `0`  | 12 bit `distance + 1`, 4 bit `length - 2` | copy `length` bytes starting at output offset `distance` |
//!
//! `distance` is an offset from the start of the chunk's output, not from the
//! output cursor, so an lz entry can only copy from the first [`WINDOW_SIZE`] bytes.
//! A stored distance field of `0` ends the stream early. Otherwise the stream
//! ends when the size from the header runs out; the last byte is padded with zero bits.
//!
//! An lz entry may copy past the end of the output it started from. The copy happens
//! one byte at a time, so the bytes written at the start of the copy are read again at its end.
//!
//! ## An Example
//! Ten bytes of ascii `A` are encoded as a raw `A` followed by an lz entry that
//! copies nine bytes (stored length `7`) from offset zero (stored distance `1`):
//! ```text
//! Header
//! 0004     <- body is four bytes long
//!
//! Body
//! 1 01000001            <- raw 'A'
//! 0 000000000001 0111   <- lz: distance 0, length 9
//! 000000                <- padding
//! ```
//! which gives the chunk `00 04 A0 80 05 C0`.

use bitstream_io::{BitWriter, BE};
use std::fmt;
use std::io::{self, Write};

/// Number of output offsets, counted from the chunk start, that an lz entry can copy from
pub const WINDOW_SIZE: usize = 0xFFE;
/// Largest distance value that fits the 12 bit field after adding one
pub const MAX_DISTANCE: usize = WINDOW_SIZE - 1;
/// Shortest lz entry worth encoding over raw bytes
pub const MIN_MATCH: usize = 2;
/// Longest lz entry that fits the 4 bit length field
pub const MAX_MATCH: usize = 0x11;

/// Size in bytes of the chunk header
pub const HEADER_SIZE: usize = 2;

pub(crate) const RAW_FLAG: bool = true;
pub(crate) const LZ_FLAG: bool = false;

pub(crate) const VALUE_BITS: u32 = 8;
pub(crate) const DISTANCE_BITS: u32 = 12;
pub(crate) const LENGTH_BITS: u32 = 4;
pub(crate) const SIZE_BITS: u32 = 16;

/// A single compression command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entry {
    /// A literal byte
    Raw(u8),
    /// Copy `length` bytes starting at offset `distance` of the chunk's output
    Lz { distance: usize, length: usize },
}

impl Entry {
    /// Create a back-reference entry.
    ///
    /// # Panics
    /// Panics if `distance` or `length` do not fit their bit fields.
    pub fn lz(distance: usize, length: usize) -> Self {
        assert!(
            distance <= MAX_DISTANCE,
            "lz distance {} is larger than {}",
            distance,
            MAX_DISTANCE
        );
        assert!(
            (MIN_MATCH..=MAX_MATCH).contains(&length),
            "lz length {} is outside of {}..={}",
            length,
            MIN_MATCH,
            MAX_MATCH
        );

        Self::Lz { distance, length }
    }

    /// Number of decompressed bytes this entry produces
    pub fn size(&self) -> usize {
        match self {
            Self::Raw(..) => 1,
            Self::Lz { length, .. } => *length,
        }
    }

    /// Number of bits this entry takes up in a chunk body
    pub fn bit_len(&self) -> usize {
        let fields = match self {
            Self::Raw(..) => VALUE_BITS,
            Self::Lz { .. } => DISTANCE_BITS + LENGTH_BITS,
        };

        1 + fields as usize
    }

    /// Write `self` to the big endian `BitWriter` in the chunk body format
    pub(crate) fn write<W: Write>(&self, wtr: &mut BitWriter<W, BE>) -> io::Result<()> {
        match *self {
            Self::Raw(value) => {
                wtr.write_bit(RAW_FLAG)?;
                wtr.write(VALUE_BITS, value)
            }
            Self::Lz { distance, length } => {
                // an out of range field would silently corrupt its neighbours
                assert!(distance <= MAX_DISTANCE && (MIN_MATCH..=MAX_MATCH).contains(&length));

                wtr.write_bit(LZ_FLAG)?;
                wtr.write(DISTANCE_BITS, (distance + 1) as u16)?;
                wtr.write(LENGTH_BITS, (length - MIN_MATCH) as u8)
            }
        }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Raw(value) => write!(f, "Raw: {:02x}", value),
            Self::Lz { distance, length } => {
                write!(f, "Lz [Copyback]: distance: {} length: {}", distance, length)
            }
        }
    }
}

/// Number of bytes needed for a body of `bits` bits
pub(crate) const fn body_size(bits: usize) -> usize {
    (bits + 7) / 8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn written(entries: &[Entry]) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut out = BitWriter::endian(&mut buf, bitstream_io::BigEndian);
        for entry in entries {
            entry.write(&mut out).unwrap();
        }
        out.byte_align().unwrap();
        drop(out);

        buf
    }

    #[test]
    fn raw_layout() {
        assert_eq!(written(&[Entry::Raw(0xFF)]), [0xFF, 0x80]);
        assert_eq!(Entry::Raw(0).bit_len(), 9);
    }

    #[test]
    fn lz_layout() {
        let entries = [Entry::Raw(0x41), Entry::lz(0, 9)];
        assert_eq!(written(&entries), [0xA0, 0x80, 0x05, 0xC0]);
        assert_eq!(entries[1].bit_len(), 17);
        assert_eq!(entries[1].size(), 9);
    }

    #[test]
    fn largest_fields() {
        // 0 111111111110 1111
        let bytes = written(&[Entry::lz(MAX_DISTANCE, MAX_MATCH)]);
        assert_eq!(bytes, [0x7F, 0xF7, 0x80]);
    }

    #[test]
    #[should_panic]
    fn distance_out_of_range() {
        Entry::lz(WINDOW_SIZE, 2);
    }

    #[test]
    #[should_panic]
    fn length_out_of_range() {
        Entry::lz(0, MAX_MATCH + 1);
    }

    #[test]
    fn sizes() {
        assert_eq!(body_size(0), 0);
        assert_eq!(body_size(9), 2);
        assert_eq!(body_size(16), 2);
        assert_eq!(body_size(26), 4);
    }
}
