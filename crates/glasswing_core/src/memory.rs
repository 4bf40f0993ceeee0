//! # Memory Bridge
//!
//! Transient, bounds-checked views over the module's linear memory.
//!
//! ```text
//! module memory  [................|#### region ####|..........]
//!                 0               addr        addr+len     memory_len
//! ```
//!
//! Views borrow the memory slice they were derived from, so the borrow
//! checker rejects any attempt to keep one alive across the next call into
//! the module (which needs the store mutably and may grow memory). Callers
//! re-derive the slice at the start of every host call.
//!
//! There are no partial reads: a range that does not fit is a contract
//! violation and returns [`BridgeError::OutOfBounds`].

use std::borrow::Cow;

use crate::error::{BridgeError, BridgeResult};

/// A byte range inside module memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    /// Start address.
    pub addr: u32,
    /// Length in bytes.
    pub len: u32,
}

impl Region {
    /// Creates a region.
    #[inline]
    #[must_use]
    pub const fn new(addr: u32, len: u32) -> Self {
        Self { addr, len }
    }

    /// Resolves the region to a `start..end` range within `memory_len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::OutOfBounds`] if the end overflows or exceeds memory.
    pub fn resolve(self, memory_len: usize) -> BridgeResult<std::ops::Range<usize>> {
        let start = self.addr as usize;
        let end = start
            .checked_add(self.len as usize)
            .filter(|&end| end <= memory_len)
            .ok_or(BridgeError::OutOfBounds {
                addr: self.addr,
                len: self.len,
                memory_len,
            })?;
        Ok(start..end)
    }
}

/// Borrows `region` as raw bytes.
///
/// # Errors
///
/// [`BridgeError::OutOfBounds`] if the region does not fit in `memory`.
#[inline]
pub fn view_bytes(memory: &[u8], region: Region) -> BridgeResult<&[u8]> {
    let range = region.resolve(memory.len())?;
    Ok(&memory[range])
}

/// Borrows `region` as mutable raw bytes.
///
/// # Errors
///
/// [`BridgeError::OutOfBounds`] if the region does not fit in `memory`.
#[inline]
pub fn view_bytes_mut(memory: &mut [u8], region: Region) -> BridgeResult<&mut [u8]> {
    let range = region.resolve(memory.len())?;
    Ok(&mut memory[range])
}

/// Views `region` as little-endian `u32` values.
///
/// The element count is `len / 4`; trailing bytes are ignored. The address
/// must be 4-byte aligned in module space. When the host slice happens to be
/// unaligned (test buffers) the values are copied instead of borrowed.
///
/// # Errors
///
/// [`BridgeError::Misaligned`] for an unaligned address,
/// [`BridgeError::OutOfBounds`] if the region does not fit.
pub fn view_u32(memory: &[u8], region: Region) -> BridgeResult<Cow<'_, [u32]>> {
    const ELEMENT: usize = std::mem::size_of::<u32>();

    if region.addr as usize % ELEMENT != 0 {
        return Err(BridgeError::Misaligned {
            addr: region.addr,
            element: ELEMENT,
        });
    }
    let whole = Region::new(region.addr, region.len - region.len % ELEMENT as u32);
    let bytes = view_bytes(memory, whole)?;

    Ok(match bytemuck::try_cast_slice::<u8, u32>(bytes) {
        Ok(values) => Cow::Borrowed(values),
        Err(_) => Cow::Owned(
            bytes
                .chunks_exact(ELEMENT)
                .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect(),
        ),
    })
}

/// Copies `data` into module memory at `addr`.
///
/// # Errors
///
/// [`BridgeError::OutOfBounds`] if the destination does not fit.
pub fn write_bytes(memory: &mut [u8], addr: u32, data: &[u8]) -> BridgeResult<()> {
    let len = u32::try_from(data.len()).map_err(|_| BridgeError::OutOfBounds {
        addr,
        len: u32::MAX,
        memory_len: memory.len(),
    })?;
    view_bytes_mut(memory, Region::new(addr, len))?.copy_from_slice(data);
    Ok(())
}

/// Decodes `region` as UTF-8, replacing invalid sequences.
///
/// # Errors
///
/// [`BridgeError::OutOfBounds`] if the region does not fit.
pub fn read_utf8(memory: &[u8], region: Region) -> BridgeResult<String> {
    view_bytes(memory, region).map(|bytes| String::from_utf8_lossy(bytes).into_owned())
}
