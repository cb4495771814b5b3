//! Pointer tables and reserved block space inside a container file.
//!
//! A container is an existing file that is loaded into target memory at a base
//! address. It holds a table of line structs, each `0x20` bytes long, whose first
//! four bytes are a little endian pointer to that line's compressed chunk:
//!
//! | Offset | Description |
//! | :----: | ----------- |
//! | `table + 0x20 * n` | absolute address of chunk `n` |
//!
//! The chunks themselves live in a reserved block of the container. Patching
//! rewrites the pointers and the block, and nothing else.

use crate::{block::PackedBlock, errors::LzssError};
use std::{
    convert::TryFrom,
    fs::OpenOptions,
    io::{Read, Seek, SeekFrom, Write},
    path::Path,
};

/// Distance in bytes between two pointers in a pointer table
pub const TABLE_STRIDE: u64 = 0x20;
const POINTER_SIZE: usize = 4;

/// Location of a pointer table in a container loaded at `base_address`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerTable {
    /// address in target memory that the start of the container is loaded to
    pub base_address: u32,
    /// file offset of the first pointer
    pub offset: u64,
}

impl PointerTable {
    pub fn new(base_address: u32, offset: u64) -> Self {
        Self {
            base_address,
            offset,
        }
    }

    /// File offset of the pointer for chunk `index`, or `None` if it does not fit a `u64`
    #[inline]
    pub fn slot(&self, index: usize) -> Option<u64> {
        TABLE_STRIDE
            .checked_mul(index as u64)
            .and_then(|rel| rel.checked_add(self.offset))
    }

    /// Read `count` pointers and convert them into file offsets
    pub fn read_offsets<R: Read + Seek>(
        &self,
        rdr: &mut R,
        count: usize,
    ) -> Result<Vec<u64>, LzssError> {
        let file_len = rdr.seek(SeekFrom::End(0))?;
        let slots = self.slots(count, file_len)?;

        slots
            .into_iter()
            .map(|slot| {
                rdr.seek(SeekFrom::Start(slot))?;
                let mut ptr = [0u8; POINTER_SIZE];
                rdr.read_exact(&mut ptr)?;

                let pointer = u32::from_le_bytes(ptr);
                pointer
                    .checked_sub(self.base_address)
                    .map(u64::from)
                    .ok_or(LzssError::PointerBelowBase {
                        pointer,
                        base: self.base_address,
                    })
            })
            .collect()
    }

    /// File offsets of the first `count` pointers, each checked to fit in `file_len`
    fn slots(&self, count: usize, file_len: u64) -> Result<Vec<u64>, LzssError> {
        (0..count)
            .map(|index| {
                let slot = self.slot(index).ok_or(LzssError::OutOfBounds {
                    offset: self.offset,
                    len: usize::MAX,
                    file_len,
                })?;
                check_bounds(slot, POINTER_SIZE, file_len)?;
                Ok(slot)
            })
            .collect()
    }
}

/// Where a packed block and its pointers go in a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerLayout {
    pub table: PointerTable,
    /// file offset of the reserved block space
    pub block_start: u64,
    /// size of the reserved block space; the packed block must fit in it
    pub target_size: usize,
}

impl ContainerLayout {
    /// Absolute addresses of the chunks at `offsets` once the block is placed at `block_start`
    pub fn pointers(&self, offsets: &[usize]) -> Result<Vec<u32>, LzssError> {
        let base = self.table.base_address;
        offsets
            .iter()
            .map(|&offset| {
                u64::from(base)
                    .checked_add(self.block_start)
                    .and_then(|start| start.checked_add(offset as u64))
                    .and_then(|address| u32::try_from(address).ok())
                    .ok_or(LzssError::AddressOverflow {
                        base,
                        block_start: self.block_start,
                        offset,
                    })
            })
            .collect()
    }
}

/// Write `block` and pointers to its chunks into the container `file`.
///
/// Every pointer for the block's chunks is overwritten in the table, then the block is
/// written to its reserved space with the rest of that space zeroed. All checks happen
/// before the first write, so a failed patch leaves `file` as it was.
///
/// The table and the whole reserved space must already be part of `file`. A layout that
/// reaches past the end fails with [`LzssError::OutOfBounds`] instead of growing the file.
pub fn patch_container<F>(
    file: &mut F,
    block: &PackedBlock,
    layout: &ContainerLayout,
) -> Result<(), LzssError>
where
    F: Read + Write + Seek,
{
    let packed = block.bytes.len();
    let target = layout.target_size;
    if packed > target {
        return Err(LzssError::BudgetExceeded {
            packed,
            target,
            overflow: packed - target,
        });
    }

    let pointers = layout.pointers(&block.offsets)?;
    let file_len = file.seek(SeekFrom::End(0))?;
    let slots = layout.table.slots(pointers.len(), file_len)?;
    check_bounds(layout.block_start, target, file_len)?;

    for (slot, pointer) in slots.into_iter().zip(&pointers) {
        file.seek(SeekFrom::Start(slot))?;
        file.write_all(&pointer.to_le_bytes())?;
    }

    file.seek(SeekFrom::Start(layout.block_start))?;
    file.write_all(&block.bytes)?;
    file.write_all(&vec![0; target - packed])?;
    file.flush()?;

    Ok(())
}

/// Patch the container file at `path` in place. See [`patch_container`].
pub fn patch_file<P: AsRef<Path>>(
    path: P,
    block: &PackedBlock,
    layout: &ContainerLayout,
) -> Result<(), LzssError> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    patch_container(&mut file, block, layout)
}

fn check_bounds(offset: u64, len: usize, file_len: u64) -> Result<(), LzssError> {
    let fits = offset
        .checked_add(len as u64)
        .map_or(false, |end| end <= file_len);

    if fits {
        Ok(())
    } else {
        Err(LzssError::OutOfBounds {
            offset,
            len,
            file_len,
        })
    }
}
