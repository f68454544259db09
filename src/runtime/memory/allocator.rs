//! Fallible buffer allocation
//!
//! Pool and arena buffers are sized once, before execution starts. Every
//! allocation goes through [`alloc_bytes`] so that running out of memory is
//! reported as an [`AllocError`] instead of aborting the process.
//!
//! # Design Principles
//! - All-or-nothing: a failed request leaves nothing allocated
//! - Size arithmetic is checked, overflow is an allocation failure
//! - Buffers are zero-initialized

use std::collections::TryReserveError;

use thiserror::Error;

/// Memory allocation error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocError {
    /// The allocator could not satisfy the request
    #[error("out of memory allocating {bytes} bytes")]
    OutOfMemory {
        bytes: usize,
        #[source]
        source: TryReserveError,
    },
    /// Size computation overflowed `usize`
    #[error("allocation size overflow: {count} x {size} bytes")]
    SizeOverflow { count: usize, size: usize },
}

/// Allocate a zeroed byte buffer of exactly `len` bytes.
pub fn alloc_bytes(len: usize) -> Result<Box<[u8]>, AllocError> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|source| AllocError::OutOfMemory { bytes: len, source })?;
    buffer.resize(len, 0);
    Ok(buffer.into_boxed_slice())
}

/// Allocate room for `count` elements, without initializing them.
pub fn alloc_vec<T>(count: usize) -> Result<Vec<T>, AllocError> {
    let mut items = Vec::new();
    items
        .try_reserve_exact(count)
        .map_err(|source| AllocError::OutOfMemory {
            bytes: count.saturating_mul(std::mem::size_of::<T>()),
            source,
        })?;
    Ok(items)
}

/// `count * size`, or [`AllocError::SizeOverflow`].
pub fn checked_size(
    count: usize,
    size: usize,
) -> Result<usize, AllocError> {
    count
        .checked_mul(size)
        .ok_or(AllocError::SizeOverflow { count, size })
}
