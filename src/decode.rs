use crate::errors::LzssError;
use crate::format::{Entry, DISTANCE_BITS, LENGTH_BITS, MIN_MATCH, SIZE_BITS, VALUE_BITS};
use bitstream_io::{BigEndian, BitReader};
use std::{
    fs::File,
    io::{BufReader, Cursor, Read, Write},
    path::Path,
};

type LogWtr<'a> = &'a mut dyn Write;

/// How the entries of a chunk body came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The size from the header was used up, leaving at most the zero padding of the last byte
    Exhausted,
    /// A stored distance of zero ended the stream
    Terminator,
    /// The size from the header ran out in the middle of an entry.
    /// The partial entry has been dropped.
    Truncated { remaining_bits: usize },
}

/// The entries read out of a single chunk, and how the chunk ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deserialized {
    pub entries: Vec<Entry>,
    pub end: StreamEnd,
}

impl Deserialized {
    #[inline]
    pub fn is_truncated(&self) -> bool {
        matches!(self.end, StreamEnd::Truncated { .. })
    }
}

/// Specify the decoding settings, such as logging, strictness, and input.
///
/// To create a new `Decoder`, use [`for_reader()`], [`for_bytes()`], or
/// [`for_file()`]. Then, change any of the decoder settings.
/// Finally, decode the chunk with [`decode()`], or stop at the entries with [`deserialize()`].
/// ```
/// # use einlzss::Decoder;
/// let compressed = [0x00, 0x04, 0xA0, 0x80, 0x05, 0xC0];
/// let decompressed = Decoder::for_bytes(&compressed)
///     .decode()
///     .unwrap();
/// assert_eq!(decompressed, b"AAAAAAAAAA");
/// ```
/// A chunk whose size runs out in the middle of an entry is decoded up to the last
/// whole entry. Use [`strict()`] to turn that into [`LzssError::TruncatedStream`]:
/// ```
/// # use einlzss::{Decoder, LzssError};
/// // one raw 'A', then a raw flag with only six bits left for its value
/// let truncated = [0x00, 0x02, 0xA0, 0xC0];
/// assert_eq!(Decoder::for_bytes(&truncated).decode().unwrap(), b"A");
///
/// let err = Decoder::for_bytes(&truncated).strict().decode().unwrap_err();
/// assert!(matches!(err, LzssError::TruncatedStream { .. }));
/// ```
/// [`for_reader()`]: Decoder::for_reader
/// [`for_bytes()`]: Decoder::for_bytes
/// [`for_file()`]: Decoder::for_file
/// [`decode()`]: Decoder::decode
/// [`deserialize()`]: Decoder::deserialize
/// [`strict()`]: Decoder::strict
pub struct Decoder<'a, R: Read> {
    src: BitReader<R, BigEndian>,
    log: Option<LogWtr<'a>>,
    strict: bool,
}

impl<'a, R: Read> Decoder<'a, R> {
    /// Create a new `Decoder` for a chunk that starts at the current position of `rdr`
    #[inline]
    pub fn for_reader(rdr: R) -> Self {
        Self {
            src: BitReader::endian(rdr, BigEndian),
            log: None,
            strict: false,
        }
    }

    /// Write every decoded entry to `wtr`
    #[inline]
    pub fn with_logging<W: Write>(&mut self, wtr: &'a mut W) -> &mut Self {
        self.log = Some(wtr as LogWtr);
        self
    }

    /// Same as [`with_logging`](Decoder::with_logging), for an optional log
    #[inline]
    pub fn optional_logging(&mut self, log: Option<&'a mut dyn Write>) -> &mut Self {
        self.log = log;
        self
    }

    /// Fail with [`LzssError::TruncatedStream`] instead of dropping a partial final entry
    #[inline]
    pub fn strict(&mut self) -> &mut Self {
        self.strict = true;
        self
    }

    /// Read the chunk's entries without replaying them
    #[inline]
    pub fn deserialize(&mut self) -> Result<Deserialized, LzssError> {
        do_deserialize(&mut self.src, &mut self.log)
    }

    /// Read and replay the chunk into its decompressed bytes
    #[inline]
    pub fn decode(&mut self) -> Result<Vec<u8>, LzssError> {
        let chunk = self.deserialize()?;

        if let StreamEnd::Truncated { remaining_bits } = chunk.end {
            if let Some(wtr) = self.log.as_mut() {
                writeln!(wtr, "truncated entry with {} bits left", remaining_bits)?;
            }
            if self.strict {
                return Err(LzssError::TruncatedStream { remaining_bits });
            }
        }

        decode_entries(&chunk.entries)
    }
}

impl<'a> Decoder<'a, Cursor<&'a [u8]>> {
    #[inline]
    pub fn for_bytes(bytes: &'a [u8]) -> Self {
        let rdr = Cursor::new(bytes);
        Self::for_reader(rdr)
    }
}

impl<'a> Decoder<'a, BufReader<File>> {
    #[inline]
    pub fn for_file<P: AsRef<Path>>(p: P) -> Result<Self, LzssError> {
        File::open(p)
            .map(BufReader::new)
            .map(Self::for_reader)
            .map_err(Into::into)
    }
}

/// Decompress a single chunk into a `Vec<u8>`
///
/// This is a convenience function to decode a `Read`er without
/// having to set up a [`Decoder`]
pub fn decode<R: Read>(rdr: R) -> Result<Vec<u8>, LzssError> {
    Decoder::for_reader(rdr).decode()
}

/// Decompress a single chunk stored at the start of `packed`
pub fn decompress(packed: &[u8]) -> Result<Vec<u8>, LzssError> {
    Decoder::for_bytes(packed).decode()
}

/// Replay `entries` into the bytes they encode.
///
/// Lz entries copy from the offset `distance` of the output, one byte at a time.
/// A copy that runs into the bytes it is writing repeats them, so
/// `output[distance..]` is cycled until `length` bytes have been written.
pub fn decode_entries(entries: &[Entry]) -> Result<Vec<u8>, LzssError> {
    let output_size = entries.iter().map(Entry::size).sum();
    let mut output: Vec<u8> = Vec::with_capacity(output_size);

    for entry in entries {
        match *entry {
            Entry::Raw(byte) => output.push(byte),
            Entry::Lz { distance, length } => {
                if distance >= output.len() {
                    return Err(LzssError::BadLookBack {
                        distance,
                        available: output.len(),
                    });
                }

                for i in distance..distance + length {
                    let byte = output[i];
                    output.push(byte);
                }
            }
        }
    }

    Ok(output)
}

fn do_deserialize<R: Read>(
    src: &mut BitReader<R, BigEndian>,
    log: &mut Option<LogWtr>,
) -> Result<Deserialized, LzssError> {
    let size: u16 = src.read(SIZE_BITS)?;
    if size == 0 {
        return Err(LzssError::EmptyStream);
    }

    if let Some(wtr) = log.as_mut() {
        writeln!(wtr, "# Chunk of {:#x} bytes", size)?;
    }

    // budget is signed so a field that overruns it can be detected after subtracting
    let mut budget = size as isize * 8;
    let mut entries = Vec::new();
    let mut position = 0;

    let end = loop {
        if budget <= 0 {
            break StreamEnd::Exhausted;
        }
        let at_flag = budget as usize;

        let is_raw = src.read_bit()?;
        budget -= 1;

        let entry = if is_raw {
            budget -= VALUE_BITS as isize;
            if budget < 0 {
                break StreamEnd::Truncated {
                    remaining_bits: at_flag,
                };
            }
            Entry::Raw(src.read(VALUE_BITS)?)
        } else {
            budget -= DISTANCE_BITS as isize;
            if budget < 0 {
                // a zero flag in the last byte is the serializer's padding
                break if at_flag < 8 {
                    StreamEnd::Exhausted
                } else {
                    StreamEnd::Truncated {
                        remaining_bits: at_flag,
                    }
                };
            }
            let stored: u16 = src.read(DISTANCE_BITS)?;
            if stored == 0 {
                break StreamEnd::Terminator;
            }

            budget -= LENGTH_BITS as isize;
            if budget < 0 {
                break StreamEnd::Truncated {
                    remaining_bits: at_flag,
                };
            }
            let length: u8 = src.read(LENGTH_BITS)?;

            Entry::Lz {
                distance: stored as usize - 1,
                length: length as usize + MIN_MATCH,
            }
        };

        if let Some(wtr) = log.as_mut() {
            writeln!(wtr, "{:04x} - {}", position, entry)?;
        }
        position += entry.size();
        entries.push(entry);
    };

    if let Some(wtr) = log.as_mut() {
        writeln!(wtr, "{} entries, {:?}", entries.len(), end)?;
    }

    Ok(Deserialized { entries, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_header() {
        let err = decompress(&[0x00, 0x00]).unwrap_err();
        assert!(matches!(err, LzssError::EmptyStream));
    }

    #[test]
    fn immediate_terminator() {
        let chunk = Decoder::for_bytes(&[0x00, 0x02, 0x00, 0x00])
            .deserialize()
            .unwrap();
        assert!(chunk.entries.is_empty());
        assert_eq!(chunk.end, StreamEnd::Terminator);
        assert_eq!(decompress(&[0x00, 0x02, 0x00, 0x00]).unwrap(), b"");
    }

    #[test]
    fn terminator_stops_before_later_data() {
        // raw 'A', terminator, then a raw 'B' that must never be read
        // 1 01000001 0 000000000000 1 01000010
        let chunk = [0x00, 0x04, 0xA0, 0x80, 0x02, 0x84];
        let decoded = Decoder::for_bytes(&chunk).deserialize().unwrap();
        assert_eq!(decoded.entries, [Entry::Raw(b'A')]);
        assert_eq!(decoded.end, StreamEnd::Terminator);
    }

    #[test]
    fn padding_is_not_truncation() {
        let chunk = Decoder::for_bytes(&[0x00, 0x04, 0xA0, 0x80, 0x05, 0xC0])
            .deserialize()
            .unwrap();
        assert_eq!(chunk.entries, [Entry::Raw(0x41), Entry::lz(0, 9)]);
        assert_eq!(chunk.end, StreamEnd::Exhausted);
        assert!(!chunk.is_truncated());
    }

    #[test]
    fn truncated_raw() {
        let chunk = Decoder::for_bytes(&[0x00, 0x02, 0xA0, 0xC0])
            .deserialize()
            .unwrap();
        assert_eq!(chunk.entries, [Entry::Raw(0x41)]);
        assert_eq!(chunk.end, StreamEnd::Truncated { remaining_bits: 7 });
    }

    #[test]
    fn truncated_length_field() {
        // raw 'A', then an lz flag and distance with only two bits left for the length
        // 1 01000001 0 000000000001 00
        let bytes = [0x00, 0x03, 0xA0, 0x80, 0x04];
        let chunk = Decoder::for_bytes(&bytes).deserialize().unwrap();
        assert_eq!(chunk.entries, [Entry::Raw(0x41)]);
        assert_eq!(chunk.end, StreamEnd::Truncated { remaining_bits: 15 });

        assert_eq!(decompress(&bytes).unwrap(), b"A");
        assert!(Decoder::for_bytes(&bytes).strict().decode().is_err());
    }

    #[test]
    fn overlapping_copy() {
        let entries = [Entry::Raw(1), Entry::Raw(2), Entry::lz(0, 7)];
        assert_eq!(decode_entries(&entries).unwrap(), [1, 2, 1, 2, 1, 2, 1, 2, 1]);

        // only the bytes from the offset onwards are cycled
        let entries = [Entry::Raw(1), Entry::Raw(2), Entry::Raw(3), Entry::lz(1, 5)];
        assert_eq!(decode_entries(&entries).unwrap(), [1, 2, 3, 2, 3, 2, 3, 2]);
    }

    #[test]
    fn copy_from_chunk_start() {
        let entries = [
            Entry::Raw(1),
            Entry::Raw(2),
            Entry::Raw(3),
            Entry::Raw(4),
            Entry::lz(0, 2),
            Entry::lz(2, 2),
        ];
        assert_eq!(decode_entries(&entries).unwrap(), [1, 2, 3, 4, 1, 2, 3, 4]);
    }

    #[test]
    fn copy_from_past_output() {
        let err = decode_entries(&[Entry::Raw(1), Entry::lz(1, 2)]).unwrap_err();
        assert!(matches!(
            err,
            LzssError::BadLookBack {
                distance: 1,
                available: 1
            }
        ));
    }

    #[test]
    fn decode_known_chunks() {
        assert_eq!(
            decompress(&[0x00, 0x06, 0xA0, 0xD0, 0xA8, 0x60, 0x01, 0x10]).unwrap(),
            b"ABCABC"
        );

        let chunk = [
            0x00, 0x0E, 0xB1, 0x58, 0xEC, 0x95, 0x80, 0x01, 0x05, 0x96, 0xCD, 0x67, 0xB1, 0x00,
            0x14, 0xC0,
        ];
        let read = Decoder::for_bytes(&chunk).deserialize().unwrap();
        assert_eq!(read.entries[4], Entry::lz(1, 2));
        assert_eq!(read.entries[9], Entry::lz(4, 5));
        assert_eq!(decode_entries(&read.entries).unwrap(), b"bcdXcdefgbcdefg");
    }

    #[test]
    fn header_past_end_of_data() {
        let err = decompress(&[0x00, 0x10, 0xA0]).unwrap_err();
        assert!(matches!(err, LzssError::Io(_)));
    }

    #[test]
    fn logging() {
        let mut log = Vec::new();
        Decoder::for_bytes(&[0x00, 0x04, 0xA0, 0x80, 0x05, 0xC0])
            .with_logging(&mut log)
            .decode()
            .unwrap();
        let log = String::from_utf8(log).unwrap();
        assert!(log.contains("0000 - Raw: 41"));
        assert!(log.contains("0001 - Lz [Copyback]: distance: 0 length: 9"));
    }
}
