//! Raw backing storage with explicit ownership
//!
//! A block is either unallocated, owned (freed by this module), or borrowed
//! (externally owned, never freed or reallocated here). All size changes go
//! through a single grow routine so the ownership rules live in one place.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use serde::{Deserialize, Serialize};

use super::{BufferError, BufferResult};

/// Diagnostic pattern written over owned memory before it is freed.
///
/// Debug aid only: stale reads of released storage show up as 0xAB garbage
/// instead of plausible data. Not a security measure.
pub(crate) const POISON_BYTE: u8 = 0xAB;

/// How an owned block is resized.
///
/// Selected once at construction instead of per-platform conditional
/// compilation. `Realloc` lets the allocator grow or shrink in place when it
/// can. `AllocCopyFree` always allocates a fresh block, copies, and frees the
/// old one; use it on platforms where shrink-in-place is known to strand
/// memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GrowStrategy {
    Realloc,
    AllocCopyFree,
}

impl Default for GrowStrategy {
    fn default() -> Self {
        GrowStrategy::Realloc
    }
}

/// Ownership-tagged contiguous block of `T`.
pub(crate) enum RawBlock<T> {
    /// No storage. The state after construction with zero elements or a
    /// resize to zero.
    Unallocated,
    /// Heap storage allocated and freed by this block.
    Owned { ptr: NonNull<T>, len: usize },
    /// Externally owned storage. Never freed or reallocated here; a resize
    /// copies into a fresh owned block and leaves the source untouched.
    Borrowed { ptr: NonNull<T>, len: usize },
}

impl<T: Copy> RawBlock<T> {
    pub(crate) fn len(&self) -> usize {
        match self {
            RawBlock::Unallocated => 0,
            RawBlock::Owned { len, .. } | RawBlock::Borrowed { len, .. } => *len,
        }
    }

    pub(crate) fn is_allocated(&self) -> bool {
        !matches!(self, RawBlock::Unallocated)
    }

    pub(crate) fn is_owned(&self) -> bool {
        matches!(self, RawBlock::Owned { .. })
    }

    /// Base pointer; dangling (valid for zero-length access only) when
    /// unallocated.
    pub(crate) fn as_non_null(&self) -> NonNull<T> {
        match self {
            RawBlock::Unallocated => NonNull::dangling(),
            RawBlock::Owned { ptr, .. } | RawBlock::Borrowed { ptr, .. } => *ptr,
        }
    }

    /// Resize to `new_len` elements.
    ///
    /// Preserves the first `min(old, new)` elements and writes `fill` into
    /// every element past the old length. On allocation failure the block is
    /// left exactly as it was: old storage, old length, old ownership.
    pub(crate) fn resize(
        &mut self,
        new_len: usize,
        strategy: GrowStrategy,
        fill: T,
        poison: bool,
    ) -> BufferResult<()> {
        let old_len = self.len();
        if new_len == old_len {
            return Ok(());
        }
        if new_len == 0 {
            self.release(poison);
            return Ok(());
        }

        match self {
            RawBlock::Unallocated => {
                let ptr = alloc_block::<T>(new_len)?;
                // Safety: freshly allocated block of new_len elements.
                unsafe { write_fill(ptr, 0, new_len, fill) };
                *self = RawBlock::Owned { ptr, len: new_len };
                Ok(())
            }
            RawBlock::Borrowed { ptr: src, len } => {
                let ptr = alloc_block::<T>(new_len)?;
                let keep = (*len).min(new_len);
                // Safety: src is valid for len elements per the borrow
                // contract; ptr is a fresh disjoint allocation.
                unsafe {
                    std::ptr::copy_nonoverlapping(src.as_ptr(), ptr.as_ptr(), keep);
                    write_fill(ptr, keep, new_len, fill);
                }
                *self = RawBlock::Owned { ptr, len: new_len };
                Ok(())
            }
            RawBlock::Owned { ptr, len } => {
                let new_ptr = match strategy {
                    GrowStrategy::Realloc => {
                        let old_layout = layout_for::<T>(*len)?;
                        let new_layout = layout_for::<T>(new_len)?;
                        // Safety: ptr was allocated by this block with
                        // old_layout. On failure realloc returns null and
                        // leaves the original allocation valid.
                        let raw = unsafe {
                            alloc::realloc(ptr.as_ptr() as *mut u8, old_layout, new_layout.size())
                        };
                        NonNull::new(raw as *mut T)
                            .ok_or(BufferError::AllocationFailed { elements: new_len })?
                    }
                    GrowStrategy::AllocCopyFree => {
                        let fresh = alloc_block::<T>(new_len)?;
                        let keep = (*len).min(new_len);
                        // Safety: both blocks are valid for keep elements and
                        // disjoint; the old block is freed only after the
                        // copy, so a failed allocation above left it intact.
                        unsafe {
                            std::ptr::copy_nonoverlapping(ptr.as_ptr(), fresh.as_ptr(), keep);
                            free_block(*ptr, *len, poison);
                        }
                        fresh
                    }
                };
                if new_len > old_len {
                    // Safety: new_ptr is valid for new_len elements.
                    unsafe { write_fill(new_ptr, old_len, new_len, fill) };
                }
                *self = RawBlock::Owned {
                    ptr: new_ptr,
                    len: new_len,
                };
                Ok(())
            }
        }
    }

    /// Drop storage and reset to `Unallocated`. Owned memory is poisoned
    /// (when enabled) and freed; borrowed memory is forgotten untouched.
    pub(crate) fn release(&mut self, poison: bool) {
        if let RawBlock::Owned { ptr, len } = self {
            // Safety: ptr/len describe the live owned allocation.
            unsafe { free_block(*ptr, *len, poison) };
        }
        *self = RawBlock::Unallocated;
    }
}

fn layout_for<T>(len: usize) -> BufferResult<Layout> {
    Layout::array::<T>(len).map_err(|_| BufferError::AllocationFailed { elements: len })
}

fn alloc_block<T>(len: usize) -> BufferResult<NonNull<T>> {
    let layout = layout_for::<T>(len)?;
    // Safety: layout has non-zero size (len > 0 and T is a sized primitive).
    let raw = unsafe { alloc::alloc(layout) };
    NonNull::new(raw as *mut T).ok_or(BufferError::AllocationFailed { elements: len })
}

/// Write `fill` into elements `[start, end)`.
///
/// # Safety
///
/// `ptr` must be valid for writes of `end` elements.
unsafe fn write_fill<T: Copy>(ptr: NonNull<T>, start: usize, end: usize, fill: T) {
    for i in start..end {
        ptr.as_ptr().add(i).write(fill);
    }
}

/// Poison (optionally) and free an owned block.
///
/// # Safety
///
/// `ptr` must have been allocated by `alloc_block::<T>(len)` and not freed.
unsafe fn free_block<T>(ptr: NonNull<T>, len: usize, poison: bool) {
    let bytes = len * std::mem::size_of::<T>();
    if poison && bytes > 0 {
        std::ptr::write_bytes(ptr.as_ptr() as *mut u8, POISON_BYTE, bytes);
    }
    // Layout::array succeeded at allocation time, so it succeeds here too.
    let layout = Layout::array::<T>(len).unwrap_or_else(|_| unreachable!());
    alloc::dealloc(ptr.as_ptr() as *mut u8, layout);
}
