use anyhow::{Context, Result};
use clap::{Args, Parser};
use einlzss::{ContainerLayout, LzssBackend, Packer, PointerTable, Unpacker};
use std::{
    convert::TryFrom,
    fs,
    io::{stderr, Write},
    path::PathBuf,
};

/// A tool for compressing and decompressing graphics data in Einhander
#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
enum Cli {
    Unpack(UnpackArgs),
    Pack(PackArgs),
}

/// Decompress the lines of a packed file and merge them into one output file
#[derive(Args)]
struct UnpackArgs {
    /// The packed file
    input: PathBuf,

    /// Hex RAM address the file is mapped to
    #[clap(parse(try_from_str = parse_hex))]
    base: u64,

    /// Hex file offset of the first pointer in the table
    #[clap(parse(try_from_str = parse_hex))]
    start_offset: u64,

    /// Hex number of chunk pointers to process
    #[clap(parse(try_from_str = parse_hex))]
    count: u64,

    /// Where to write the merged lines
    #[clap(short, long, default_value = "decompressed.bin")]
    output: PathBuf,

    /// Fail on chunks that end in the middle of an entry
    #[clap(short, long)]
    strict: bool,

    /// Write every decoded entry to stderr
    #[clap(short, long)]
    verbose: bool,
}

/// Compress a plain file and patch it into an existing packed file
#[derive(Args)]
struct PackArgs {
    /// The plain file of merged lines
    input: PathBuf,

    /// Hex RAM address the packed file is mapped to
    #[clap(parse(try_from_str = parse_hex))]
    base: u64,

    /// Hex file offset of the first pointer in the table
    #[clap(parse(try_from_str = parse_hex))]
    ptr_table_offset: u64,

    /// Hex file offset of the block space to place the chunks in
    #[clap(parse(try_from_str = parse_hex))]
    block_start_offset: u64,

    /// Hex size in bytes of each plain chunk
    #[clap(parse(try_from_str = parse_hex))]
    plain_chunk_size: u64,

    /// Hex size of the original block space, which the packed chunks must fit in
    #[clap(parse(try_from_str = parse_hex))]
    target_size: u64,

    /// The existing packed file to patch
    #[clap(short, long, default_value = "compressed.bin")]
    output: PathBuf,

    /// Search matches with a hash chain instead of a full window scan
    #[clap(long)]
    fast: bool,

    /// Write every encoded entry to stderr
    #[clap(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    match Cli::parse() {
        Cli::Unpack(args) => unpack(args),
        Cli::Pack(args) => pack(args),
    }
}

fn unpack(args: UnpackArgs) -> Result<()> {
    let table = PointerTable::new(to_u32(args.base, "base")?, args.start_offset);
    let count = usize::try_from(args.count).context("Chunk count is too large")?;

    let mut log = stderr();
    let mut unpacker = Unpacker::new(table, count);
    if args.strict {
        unpacker.strict();
    }
    if args.verbose {
        unpacker.with_logging(&mut log);
    }

    let lines = unpacker
        .unpack_file(&args.input)
        .with_context(|| format!("Unpacking {} failed", args.input.display()))?;

    fs::write(&args.output, &lines)
        .with_context(|| format!("Could not write {}", args.output.display()))
}

fn pack(args: PackArgs) -> Result<()> {
    let plain = fs::read(&args.input)
        .with_context(|| format!("Could not read {}", args.input.display()))?;
    let chunk_size = usize::try_from(args.plain_chunk_size).context("Chunk size is too large")?;

    let mut log = stderr();
    let mut done = |p: einlzss::Progress| {
        eprint!("\rPacking chunk {}/{}", p.done, p.total);
        if p.done == p.total {
            eprintln!();
        }
    };

    let mut packer = Packer::new(chunk_size);
    packer.with_progress(&mut done);
    if args.fast {
        packer.lzss_backend(LzssBackend::HashChain);
    }
    if args.verbose {
        packer.with_logging(&mut log);
    }
    let block = packer.pack(&plain).context("Compressing the chunks failed")?;

    let layout = ContainerLayout {
        table: PointerTable::new(to_u32(args.base, "base")?, args.ptr_table_offset),
        block_start: args.block_start_offset,
        target_size: usize::try_from(args.target_size).context("Target size is too large")?,
    };
    einlzss::patch_file(&args.output, &block, &layout)
        .with_context(|| format!("Patching {} failed", args.output.display()))?;

    log.flush()?;
    Ok(())
}

fn parse_hex(s: &str) -> Result<u64, std::num::ParseIntError> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u64::from_str_radix(digits, 16)
}

fn to_u32(value: u64, name: &str) -> Result<u32> {
    u32::try_from(value).with_context(|| format!("The {} {:#x} does not fit in 32 bits", name, value))
}
