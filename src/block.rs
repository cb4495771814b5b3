use crate::{
    container::PointerTable,
    decode::Decoder,
    encode::{encode_chunk, LzssBackend, Progress, ProgressFn, Stage},
    errors::LzssError,
};
use std::{
    fs::File,
    io::{BufReader, Cursor, Read, Seek, SeekFrom, Write},
    path::Path,
};

type LogWtr<'a> = &'a mut dyn Write;

/// Independently compressed chunks, back to back, with where each one starts
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackedBlock {
    /// byte offset of each chunk within `bytes`, in chunk order
    pub offsets: Vec<usize>,
    pub bytes: Vec<u8>,
}

impl PackedBlock {
    /// Split into the chunk offsets and the block bytes
    pub fn into_parts(self) -> (Vec<usize>, Vec<u8>) {
        (self.offsets, self.bytes)
    }
}

/// Split plain data into fixed size chunks and compress them into a [`PackedBlock`]
///
/// ```
/// # use einlzss::Packer;
/// let lines = [[0x11u8; 16], [0x22; 16], [0x33; 16]].concat();
/// let block = Packer::new(16).pack(&lines).unwrap();
/// assert_eq!(block.offsets.len(), 3);
/// ```
pub struct Packer<'a> {
    chunk_size: usize,
    backend: LzssBackend,
    log: Option<LogWtr<'a>>,
    progress: Option<ProgressFn<'a>>,
}

impl<'a> Packer<'a> {
    /// Create a `Packer` that compresses every `chunk_size` bytes as a separate chunk.
    #[inline]
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            backend: LzssBackend::default(),
            log: None,
            progress: None,
        }
    }

    /// Set the algorithm used to search for LZSS matches in each chunk
    #[inline]
    pub fn lzss_backend(&mut self, backend: LzssBackend) -> &mut Self {
        self.backend = backend;
        self
    }

    /// Write the entries of every chunk to `log`
    #[inline]
    pub fn with_logging<L: Write>(&mut self, log: &'a mut L) -> &mut Self {
        self.log = Some(log as LogWtr<'a>);
        self
    }

    /// Same as [`with_logging`](Packer::with_logging), for an optional log
    #[inline]
    pub fn optional_logging(&mut self, log: Option<&'a mut dyn Write>) -> &mut Self {
        self.log = log;
        self
    }

    /// Report [`Stage::Packing`] progress to `observer` after every chunk
    #[inline]
    pub fn with_progress<F: FnMut(Progress)>(&mut self, observer: &'a mut F) -> &mut Self {
        self.progress = Some(observer as ProgressFn<'a>);
        self
    }

    /// Compress `plain` chunk by chunk. The last chunk may be shorter than the rest.
    pub fn pack(&mut self, plain: &[u8]) -> Result<PackedBlock, LzssError> {
        if self.chunk_size == 0 {
            return Err(LzssError::InvalidChunkSize);
        }

        let total = (plain.len() + self.chunk_size - 1) / self.chunk_size;
        let mut block = PackedBlock::default();

        for (index, chunk) in plain.chunks(self.chunk_size).enumerate() {
            if let Some(wtr) = self.log.as_mut() {
                writeln!(
                    wtr,
                    "# Chunk {} at block offset {:#x}",
                    index,
                    block.bytes.len()
                )?;
            }

            let serialized = encode_chunk(chunk, self.backend, &mut self.log)?;
            block.offsets.push(block.bytes.len());
            block.bytes.extend_from_slice(&serialized);

            if let Some(report) = self.progress.as_mut() {
                report(Stage::Packing.at(index + 1, total));
            }
        }

        if let Some(wtr) = self.log.as_mut() {
            writeln!(
                wtr,
                "{} chunks packed into {:#x} bytes",
                block.offsets.len(),
                block.bytes.len()
            )?;
        }

        Ok(block)
    }
}

/// Compress `plain` into a block of `chunk_size` chunks
///
/// This is a convenience function to pack data without having to set up a [`Packer`]
pub fn pack_chunks(plain: &[u8], chunk_size: usize) -> Result<PackedBlock, LzssError> {
    Packer::new(chunk_size).pack(plain)
}

/// Decompress the chunks listed in a pointer table and merge them in table order
///
/// ```
/// # use einlzss::{compress, PointerTable, Unpacker};
/// let chunk = compress(b"AAAAAAAA").unwrap();
/// let mut container = vec![0u8; 0x40];
/// container[..4].copy_from_slice(&0x8001_0020u32.to_le_bytes());
/// container[0x20..0x20 + chunk.len()].copy_from_slice(&chunk);
///
/// let table = PointerTable::new(0x8001_0000, 0);
/// let plain = Unpacker::new(table, 1).unpack_bytes(&container).unwrap();
/// assert_eq!(plain, b"AAAAAAAA");
/// ```
pub struct Unpacker<'a> {
    table: PointerTable,
    count: usize,
    strict: bool,
    log: Option<LogWtr<'a>>,
}

impl<'a> Unpacker<'a> {
    #[inline]
    pub fn new(table: PointerTable, count: usize) -> Self {
        Self {
            table,
            count,
            strict: false,
            log: None,
        }
    }

    /// Fail on any chunk that ends in the middle of an entry
    #[inline]
    pub fn strict(&mut self) -> &mut Self {
        self.strict = true;
        self
    }

    #[inline]
    pub fn with_logging<L: Write>(&mut self, log: &'a mut L) -> &mut Self {
        self.log = Some(log as LogWtr<'a>);
        self
    }

    #[inline]
    pub fn optional_logging(&mut self, log: Option<&'a mut dyn Write>) -> &mut Self {
        self.log = log;
        self
    }

    pub fn unpack<R: Read + Seek>(&mut self, rdr: &mut R) -> Result<Vec<u8>, LzssError> {
        let offsets = self.table.read_offsets(rdr, self.count)?;
        let file_len = rdr.seek(SeekFrom::End(0))?;
        let mut merged = Vec::new();

        for (index, offset) in offsets.into_iter().enumerate() {
            if offset >= file_len {
                return Err(LzssError::OutOfBounds {
                    offset,
                    len: 0,
                    file_len,
                });
            }

            if let Some(wtr) = self.log.as_mut() {
                writeln!(wtr, "# Line {} at file offset {:#x}", index, offset)?;
            }

            rdr.seek(SeekFrom::Start(offset))?;
            let mut decoder = Decoder::for_reader(&mut *rdr);
            if self.strict {
                decoder.strict();
            }
            if let Some(wtr) = self.log.as_mut() {
                decoder.with_logging(wtr);
            }

            merged.extend(decoder.decode()?);
        }

        Ok(merged)
    }

    #[inline]
    pub fn unpack_bytes(&mut self, container: &[u8]) -> Result<Vec<u8>, LzssError> {
        self.unpack(&mut Cursor::new(container))
    }

    #[inline]
    pub fn unpack_file<P: AsRef<Path>>(&mut self, p: P) -> Result<Vec<u8>, LzssError> {
        let mut rdr = BufReader::new(File::open(p)?);
        self.unpack(&mut rdr)
    }
}

/// Decompress `count` chunks through the pointer table at `table_offset`, and merge them
///
/// This is a convenience function to unpack a container without having to set up an [`Unpacker`]
pub fn unpack_chunks<R: Read + Seek>(
    rdr: &mut R,
    base_address: u32,
    table_offset: u64,
    count: usize,
) -> Result<Vec<u8>, LzssError> {
    Unpacker::new(PointerTable::new(base_address, table_offset), count).unpack(rdr)
}
