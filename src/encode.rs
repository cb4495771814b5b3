use crate::{
    errors::LzssError,
    format::{body_size, Entry, SIZE_BITS},
};
use bitstream_io::{BigEndian, BitWriter};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Cursor, Read, Write},
    path::Path,
};

pub(crate) mod lzss;

type LogWtr<'a> = &'a mut dyn Write;
/// Observer for the progress of a long running encode
pub type ProgressFn<'a> = &'a mut dyn FnMut(Progress);

/// The algorithm used to find matches when encoding a chunk
///
/// Both backends pick the same matches, so their output is identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LzssBackend {
    /// Naive, brute force search through the whole window
    Brute,
    /// Only search earlier positions that share the next two bytes
    HashChain,
}

impl Default for LzssBackend {
    fn default() -> Self {
        Self::Brute
    }
}

/// The part of the work a [`Progress`] report is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Searching for matches; counted in input bytes
    Encoding,
    /// Writing entries to the bitstream; counted in entries
    Serializing,
    /// Compressing a block of chunks; counted in chunks
    Packing,
}

impl Stage {
    pub(crate) fn at(self, done: usize, total: usize) -> Progress {
        Progress {
            stage: self,
            done,
            total,
        }
    }
}

/// A progress report handed to the observer set with `with_progress`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub stage: Stage,
    pub done: usize,
    pub total: usize,
}

/// Specify the encoding settings, such as match backend, logging, input, and output
///
/// To create a new `EncoderBuilder`, use [`for_reader()`], [`for_file()`], or [`for_bytes()`].
/// Then, change any of the encoding settings with `EncoderBuilder`'s helper methods.
/// Finally, encode the input data with [`encode_to_writer()`], [`encode_to_file()`], or [`encode_to_vec()`].
/// The whole input is compressed as one chunk.
/// ```
/// # use einlzss::{EncoderBuilder, LzssBackend};
/// let input = b"ABBACABBCADFEGABA";
/// let compressed = EncoderBuilder::for_bytes(input)
///     .lzss_backend(LzssBackend::HashChain)
///     .with_logging(&mut ::std::io::stdout())
///     .encode_to_vec()
///     .unwrap();
/// assert_eq!(einlzss::decompress(&compressed).unwrap(), input);
/// ```
///
/// The default encoding settings are:
/// * No logging
/// * No progress reports
/// * [`Brute`] match searching
///
/// [`for_reader()`]: EncoderBuilder::for_reader
/// [`for_file()`]: EncoderBuilder::for_file
/// [`for_bytes()`]: EncoderBuilder::for_bytes
/// [`encode_to_writer()`]: EncoderBuilder::encode_to_writer
/// [`encode_to_file()`]: EncoderBuilder::encode_to_file
/// [`encode_to_vec()`]: EncoderBuilder::encode_to_vec
/// [`Brute`]: LzssBackend::Brute
pub struct EncoderBuilder<'a, R> {
    rdr: R,
    backend: LzssBackend,
    log: Option<LogWtr<'a>>,
    progress: Option<ProgressFn<'a>>,
}

impl<'a, R: Read> EncoderBuilder<'a, R> {
    /// Create a new `EncoderBuilder` for the data in `rdr`.
    #[inline]
    pub fn for_reader(rdr: R) -> Self {
        Self {
            rdr,
            backend: LzssBackend::default(),
            log: None,
            progress: None,
        }
    }

    /// Set the algorithm used to search for LZSS matches when encoding
    #[inline]
    pub fn lzss_backend(&mut self, backend: LzssBackend) -> &mut Self {
        self.backend = backend;
        self
    }

    /// Write debugging and diagnostic information to `log` while the input is
    /// being encoded.
    #[inline]
    pub fn with_logging<L: Write>(&mut self, log: &'a mut L) -> &mut Self {
        let log = Some(log as &'a mut dyn Write);
        self.log = log;
        self
    }

    /// Report progress to `observer` while the input is being encoded and serialized.
    #[inline]
    pub fn with_progress<F: FnMut(Progress)>(&mut self, observer: &'a mut F) -> &mut Self {
        self.progress = Some(observer as ProgressFn<'a>);
        self
    }

    /// Start the encoding and write the compressed chunk out to `wtr`
    #[inline]
    pub fn encode_to_writer<W: Write>(&mut self, wtr: W) -> Result<(), LzssError> {
        do_encode(self, wtr)
    }

    /// Start the encoding and write the compressed chunk out to the newly created
    /// `File` `f`
    #[inline]
    pub fn encode_to_file<P: AsRef<Path>>(&mut self, f: P) -> Result<(), LzssError> {
        let mut wtr = BufWriter::new(File::create(f)?);
        self.encode_to_writer(&mut wtr)?;
        wtr.flush().map_err(Into::into)
    }

    /// Start the encoding and return the compressed chunk in a `Vec<u8>`.
    #[inline]
    pub fn encode_to_vec(&mut self) -> Result<Vec<u8>, LzssError> {
        let data = Vec::new();
        let mut csr = Cursor::new(data);
        self.encode_to_writer(&mut csr).map(|_| csr.into_inner())
    }

    /// Start the encoding, but stop at the list of entries instead of serializing them
    pub fn encode_to_entries(&mut self) -> Result<Vec<Entry>, LzssError> {
        let mut input = Vec::new();
        self.rdr.read_to_end(&mut input)?;

        lzss::compress_chunk(&input, self.backend, &mut self.log, &mut self.progress)
            .map_err(Into::into)
    }
}

impl<'a> EncoderBuilder<'a, BufReader<File>> {
    /// Create a new `EncoderBuilder` for the file at `p`.
    #[inline]
    pub fn for_file<P: AsRef<Path>>(p: P) -> Result<Self, LzssError> {
        let rdr = BufReader::new(File::open(p)?);
        Ok(Self::for_reader(rdr))
    }
}

impl<'a> EncoderBuilder<'a, Cursor<&'a [u8]>> {
    /// Create a new `EncoderBuilder` for the data the `bytes` slice.
    #[inline]
    pub fn for_bytes(bytes: &'a [u8]) -> Self {
        let rdr = Cursor::new(bytes);
        Self::for_reader(rdr)
    }
}

/// Compress data into a single chunk `Vec<u8>`
///
/// This is a convenience function to encode a `Read`er without having to
/// set up an [`EncoderBuilder`].
pub fn encode<R: Read>(rdr: R) -> Result<Vec<u8>, LzssError> {
    EncoderBuilder::for_reader(rdr).encode_to_vec()
}

/// Compress `plain` into a single chunk
pub fn compress(plain: &[u8]) -> Result<Vec<u8>, LzssError> {
    EncoderBuilder::for_bytes(plain).encode_to_vec()
}

/// Serialize `entries` into a chunk: a big endian size header followed by the bit packed entries
pub fn serialize(entries: &[Entry]) -> Result<Vec<u8>, LzssError> {
    let mut out = Vec::new();
    write_chunk(&mut out, entries, &mut None)?;
    Ok(out)
}

fn do_encode<R: Read, W: Write>(
    opts: &mut EncoderBuilder<'_, R>,
    mut wtr: W,
) -> Result<(), LzssError> {
    let entries = opts.encode_to_entries()?;

    if let Some(wtr) = opts.log.as_mut() {
        let input_size: usize = entries.iter().map(Entry::size).sum();
        writeln!(wtr, "{} entries for {:#x} input bytes", entries.len(), input_size)?;
    }

    write_chunk(&mut wtr, &entries, &mut opts.progress)
}

/// Compress `data` as one chunk with `backend`, returning the serialized chunk
pub(crate) fn encode_chunk(
    data: &[u8],
    backend: LzssBackend,
    log: &mut Option<&mut dyn Write>,
) -> Result<Vec<u8>, LzssError> {
    let entries = lzss::compress_chunk(data, backend, log, &mut None)?;
    let mut out = Vec::new();
    write_chunk(&mut out, &entries, &mut None)?;

    Ok(out)
}

fn write_chunk(
    wtr: &mut dyn Write,
    entries: &[Entry],
    progress: &mut Option<ProgressFn>,
) -> Result<(), LzssError> {
    let bits: usize = entries.iter().map(Entry::bit_len).sum();
    let size = body_size(bits);
    if size > u16::MAX as usize {
        return Err(LzssError::ChunkTooLarge { size });
    }

    let mut out = BitWriter::endian(wtr, BigEndian);
    out.write(SIZE_BITS, size as u16)?;

    for (done, entry) in entries.iter().enumerate() {
        entry.write(&mut out)?;

        if let Some(report) = progress.as_mut() {
            report(Stage::Serializing.at(done + 1, entries.len()));
        }
    }

    out.byte_align()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decompress;

    #[test]
    fn empty_input() {
        let entries = EncoderBuilder::for_bytes(&[]).encode_to_entries().unwrap();
        assert!(entries.is_empty());
        assert_eq!(compress(&[]).unwrap(), [0x00, 0x00]);
    }

    #[test]
    fn run_of_repeats() {
        let input = [0x41; 10];
        let entries = EncoderBuilder::for_bytes(&input)
            .encode_to_entries()
            .unwrap();
        assert_eq!(entries, [Entry::Raw(0x41), Entry::lz(0, 9)]);
        assert_eq!(
            compress(&input).unwrap(),
            [0x00, 0x04, 0xA0, 0x80, 0x05, 0xC0]
        );
    }

    #[test]
    fn header_counts_padded_body() {
        let entries = [Entry::Raw(1), Entry::Raw(2), Entry::Raw(3)];
        let chunk = serialize(&entries).unwrap();
        // 27 bits
        assert_eq!(&chunk[..2], &[0x00, 0x04]);
        assert_eq!(chunk.len(), 2 + 4);
    }

    #[test]
    fn chunk_too_large() {
        let entries = vec![Entry::Raw(0); 0x10000 * 8 / 9 + 1];
        assert!(matches!(
            serialize(&entries),
            Err(LzssError::ChunkTooLarge { .. })
        ));
    }

    #[test]
    fn encode_to_file_round_trip() {
        let path = std::env::temp_dir().join("einlzss-encode-to-file.bin");
        let input = b"line line line of pixels";
        EncoderBuilder::for_bytes(input)
            .encode_to_file(&path)
            .unwrap();
        let chunk = std::fs::read(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(decompress(&chunk).unwrap(), input);
    }

    #[test]
    fn progress_stages() {
        let mut reports = Vec::new();
        let mut observer = |p: Progress| reports.push(p);
        EncoderBuilder::for_bytes(b"abcabcabc")
            .with_progress(&mut observer)
            .encode_to_vec()
            .unwrap();

        let first = reports.first().unwrap();
        let last = reports.last().unwrap();
        assert_eq!(first.stage, Stage::Encoding);
        assert_eq!(last.stage, Stage::Serializing);
        assert_eq!(last.done, last.total);
    }
}
