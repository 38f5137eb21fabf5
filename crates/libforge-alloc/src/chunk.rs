//! Chunk header and tail guard.
//!
//! Every allocation handed out by a bucket is backed by `header | data |
//! guard`. The header's magic distinguishes a live chunk from one already
//! returned to the free list (catching double-free), and the guard byte at
//! the end of the data region is derived from the chunk's own address, so
//! an overrun that stomps the guard is detectable without a process-wide
//! canary table.

use std::alloc::Layout;
use std::ptr::NonNull;

/// XOR'd into both magic values; arbitrary but fixed so the two states
/// stay distinguishable across process restarts without being predictable
/// zero/one patterns.
const MAGIC_SEED: u64 = 0x9E37_79B9_7F4A_7C15;
pub(crate) const MAGIC_LIVE: u64 = MAGIC_SEED;
pub(crate) const MAGIC_FREED: u64 = MAGIC_SEED.rotate_left(32);

#[repr(C)]
pub(crate) struct ChunkHeader {
    pub(crate) magic: u64,
    pub(crate) size_class: usize,
    pub(crate) requested: usize,
}

/// Layout of one bucket chunk: header, `size_class` bytes of usable data,
/// and an 8-byte tail guard.
pub(crate) fn chunk_layout(size_class: usize) -> Layout {
    let header = Layout::new::<ChunkHeader>();
    let data = Layout::array::<u8>(size_class).expect("bucket size class too large");
    let guard = Layout::new::<u64>();
    let (l, _) = header.extend(data).expect("chunk layout overflow");
    let (l, _) = l.extend(guard).expect("chunk layout overflow");
    l.pad_to_align()
}

/// Derives the expected guard pattern for a chunk living at `header_addr`.
/// Address-derived rather than a constant so that one stray write of a
/// fixed byte pattern elsewhere in memory can't coincidentally "pass".
pub(crate) fn guard_pattern(header_addr: usize) -> u64 {
    (header_addr as u64).wrapping_mul(MAGIC_SEED) ^ MAGIC_LIVE
}

/// A chunk allocated fresh from the system allocator, not yet handed to a
/// caller.
pub(crate) struct Chunk {
    pub(crate) base: NonNull<u8>,
    pub(crate) size_class: usize,
}

impl Chunk {
    /// Allocates a fresh chunk backed by `size_class` usable bytes and
    /// stamps its header as freed (the reset state a newly-built chunk and
    /// one returned to the free list share).
    pub(crate) fn alloc(size_class: usize) -> Option<Self> {
        let layout = chunk_layout(size_class);
        // SAFETY: layout is non-zero-sized (header alone guarantees that).
        let ptr = unsafe { std::alloc::alloc(layout) };
        let base = NonNull::new(ptr)?;
        let chunk = Self { base, size_class };
        // SAFETY: freshly allocated, uniquely owned.
        unsafe {
            chunk.header_mut().magic = MAGIC_FREED;
            chunk.header_mut().size_class = size_class;
        }
        Some(chunk)
    }

    /// # Safety
    /// `self.base` must point at a `ChunkHeader`-aligned allocation of at
    /// least `chunk_layout(self.size_class)` bytes, exclusively owned by
    /// the caller for the duration of the borrow.
    unsafe fn header_mut(&self) -> &mut ChunkHeader {
        &mut *self.base.as_ptr().cast::<ChunkHeader>()
    }

    fn data_offset() -> usize {
        Layout::new::<ChunkHeader>().size()
    }

    fn guard_offset(size_class: usize) -> usize {
        Self::data_offset() + size_class
    }

    pub(crate) fn data_ptr(&self) -> NonNull<u8> {
        // SAFETY: within the chunk's allocation.
        unsafe { NonNull::new_unchecked(self.base.as_ptr().add(Self::data_offset())) }
    }

    /// Marks the chunk live, requested for `requested` bytes, and stamps
    /// the tail guard.
    ///
    /// # Safety
    /// Caller must hold exclusive access to the chunk (it must not be on
    /// any free list concurrently).
    pub(crate) unsafe fn activate(&self, requested: usize) {
        let header = self.header_mut();
        header.magic = MAGIC_LIVE;
        header.requested = requested;
        let guard_ptr = self.base.as_ptr().add(Self::guard_offset(self.size_class)).cast::<u64>();
        guard_ptr.write_unaligned(guard_pattern(self.base.as_ptr() as usize));
    }

    /// Validates the live magic and (optionally) the tail guard, then
    /// marks the chunk freed.
    ///
    /// # Safety
    /// `data` must be the pointer previously returned by `activate` on
    /// this exact chunk.
    pub(crate) unsafe fn deactivate(&self, validate_guard: bool) -> Result<(), &'static str> {
        let header = self.header_mut();
        if header.magic == MAGIC_FREED {
            return Err("double free");
        }
        if header.magic != MAGIC_LIVE {
            return Err("corrupted chunk header");
        }
        if validate_guard {
            let guard_ptr = self.base.as_ptr().add(Self::guard_offset(self.size_class)).cast::<u64>();
            let observed = guard_ptr.read_unaligned();
            if observed != guard_pattern(self.base.as_ptr() as usize) {
                return Err("tail guard overwritten");
            }
        }
        header.magic = MAGIC_FREED;
        Ok(())
    }

    /// Reconstructs the owning chunk from a pointer previously returned by
    /// `data_ptr`/`activate`.
    ///
    /// # Safety
    /// `data` must have been produced by `Chunk::data_ptr` on a chunk of
    /// exactly `size_class`.
    pub(crate) unsafe fn from_data_ptr(data: NonNull<u8>, size_class: usize) -> Self {
        let base = NonNull::new_unchecked(data.as_ptr().sub(Self::data_offset()));
        Self { base, size_class }
    }

    /// Releases the chunk's backing memory entirely (used when a bucket is
    /// torn down; not the hot "return to free list" path).
    ///
    /// # Safety
    /// The chunk must not be referenced by any free list or live pointer
    /// afterward.
    pub(crate) unsafe fn release(self) {
        let layout = chunk_layout(self.size_class);
        std::alloc::dealloc(self.base.as_ptr(), layout);
    }
}
