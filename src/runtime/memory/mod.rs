//! Buffer ownership for the execution engine
//!
//! All memory a run touches is allocated up front and released at teardown:
//!
//! - [`TilePool`] owns the `M x N` output buffers of one graph. Timestep `t`
//!   writes row `t mod M`, so rows are recycled every `M` timesteps.
//! - [`ScratchArena`] is the single working buffer shared by every kernel
//!   invocation of a run.
//!
//! Nothing here allocates once execution has started.

mod allocator;

pub use allocator::{alloc_bytes, alloc_vec, checked_size, AllocError};

use thiserror::Error;

/// One reusable output buffer.
#[derive(Debug)]
pub struct Tile {
    /// Output bytes of the point that last wrote this slot
    output: Box<[u8]>,
    /// Accumulated value used by scalar (non-verifying) execution
    scalar: Option<f32>,
}

impl Tile {
    fn with_buffer(output: Box<[u8]>) -> Self {
        Self {
            output,
            scalar: None,
        }
    }

    #[inline]
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    #[inline]
    pub fn output_mut(&mut self) -> &mut [u8] {
        &mut self.output
    }

    #[inline]
    pub fn scalar(&self) -> Option<f32> {
        self.scalar
    }

    #[inline]
    pub fn set_scalar(
        &mut self,
        value: f32,
    ) {
        self.scalar = Some(value);
    }
}

/// Addressing failure inside a [`TilePool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SlotError {
    #[error("timestep {0} is negative")]
    NegativeTimestep(i64),
    #[error("index {index} outside [0, {width})")]
    IndexOutOfRange { index: i64, width: usize },
    #[error("slot {slot} outside pool of {len} tiles")]
    SlotOutOfRange { slot: usize, len: usize },
}

/// Circular pool of `field_slots x max_width` tiles for one graph.
#[derive(Debug)]
pub struct TilePool {
    tiles: Vec<Tile>,
    /// M: timestep rows kept resident
    field_slots: usize,
    /// N: tiles per row
    max_width: usize,
    /// Size of every tile's output buffer
    output_bytes: usize,
}

impl TilePool {
    /// Allocate `field_slots * max_width` tiles of `output_bytes` each.
    ///
    /// Fails as a whole: on error every buffer allocated so far is freed.
    pub fn allocate(
        field_slots: usize,
        max_width: usize,
        output_bytes: usize,
    ) -> Result<Self, AllocError> {
        let count = checked_size(field_slots, max_width)?;
        checked_size(count, output_bytes)?;

        let mut tiles = alloc_vec::<Tile>(count)?;
        for _ in 0..count {
            tiles.push(Tile::with_buffer(alloc_bytes(output_bytes)?));
        }

        Ok(Self {
            tiles,
            field_slots,
            max_width,
            output_bytes,
        })
    }

    /// Flat slot of `(t, x)`: `(t mod M) * N + x`, bounds-checked.
    pub fn slot(
        &self,
        t: i64,
        x: i64,
    ) -> Result<usize, SlotError> {
        if t < 0 {
            return Err(SlotError::NegativeTimestep(t));
        }
        let index = usize::try_from(x)
            .ok()
            .filter(|i| *i < self.max_width)
            .ok_or(SlotError::IndexOutOfRange {
                index: x,
                width: self.max_width,
            })?;
        if self.field_slots == 0 {
            return Err(SlotError::SlotOutOfRange { slot: index, len: 0 });
        }
        let row = (t as u64 % self.field_slots as u64) as usize;
        let slot = row
            .checked_mul(self.max_width)
            .and_then(|base| base.checked_add(index))
            .unwrap_or(usize::MAX);
        if slot >= self.tiles.len() {
            return Err(SlotError::SlotOutOfRange {
                slot,
                len: self.tiles.len(),
            });
        }
        Ok(slot)
    }

    #[inline]
    pub fn tile(
        &self,
        slot: usize,
    ) -> Option<&Tile> {
        self.tiles.get(slot)
    }

    #[inline]
    pub fn tile_mut(
        &mut self,
        slot: usize,
    ) -> Option<&mut Tile> {
        self.tiles.get_mut(slot)
    }

    /// Tile at `(t, x)`, if the coordinate is addressable.
    pub fn tile_at(
        &self,
        t: i64,
        x: i64,
    ) -> Option<&Tile> {
        self.slot(t, x).ok().and_then(|slot| self.tile(slot))
    }

    /// Move a tile's output buffer out so it can be written while other
    /// tiles are read. Must be handed back with [`restore_output`].
    ///
    /// [`restore_output`]: TilePool::restore_output
    pub(crate) fn take_output(
        &mut self,
        slot: usize,
    ) -> Option<Box<[u8]>> {
        self.tiles
            .get_mut(slot)
            .map(|tile| std::mem::take(&mut tile.output))
    }

    pub(crate) fn restore_output(
        &mut self,
        slot: usize,
        output: Box<[u8]>,
    ) {
        if let Some(tile) = self.tiles.get_mut(slot) {
            tile.output = output;
        }
    }

    /// Number of tiles (M * N).
    #[inline]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    #[inline]
    pub fn field_slots(&self) -> usize {
        self.field_slots
    }

    #[inline]
    pub fn max_width(&self) -> usize {
        self.max_width
    }

    #[inline]
    pub fn output_bytes(&self) -> usize {
        self.output_bytes
    }

    /// Bytes held by all output buffers.
    pub fn total_bytes(&self) -> usize {
        self.tiles.iter().map(|t| t.output.len()).sum()
    }

    /// Free every buffer. Returns how many tile buffers were released.
    pub fn release(mut self) -> usize {
        let released = self.tiles.len();
        self.tiles.clear();
        released
    }
}

/// Shared working memory for kernel invocations.
#[derive(Debug, Default)]
pub struct ScratchArena {
    buffer: Box<[u8]>,
}

impl ScratchArena {
    /// Largest scratch requirement among the given per-task sizes.
    pub fn required_size<I>(sizes: I) -> usize
    where
        I: IntoIterator<Item = usize>,
    {
        sizes.into_iter().max().unwrap_or(0)
    }

    /// Allocate `size` bytes and run `prepare` over them once.
    ///
    /// `prepare` is not called for an empty arena.
    pub fn allocate<F>(
        size: usize,
        prepare: F,
    ) -> Result<Self, AllocError>
    where
        F: FnOnce(&mut [u8]),
    {
        let mut buffer = alloc_bytes(size)?;
        if size > 0 {
            prepare(&mut buffer);
        }
        Ok(Self { buffer })
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// The leading `len` bytes, clamped to the arena size.
    #[inline]
    pub fn slice_mut(
        &mut self,
        len: usize,
    ) -> &mut [u8] {
        let len = len.min(self.buffer.len());
        &mut self.buffer[..len]
    }

    /// Free the buffer. Returns how many bytes were released.
    pub fn release(self) -> usize {
        self.buffer.len()
    }
}
