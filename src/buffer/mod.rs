//! Typed tuple/component buffers
//!
//! Contiguous, resizable storage for fixed-width numeric data grouped into
//! tuples of N components each. A buffer either owns its backing block or
//! borrows externally owned memory; borrowed memory is never freed or
//! reallocated here, only copied from on growth.

pub mod iter;
mod raw;
mod typed;

pub use iter::{TupleIter, TupleIterMut, TupleRef, TupleRefMut};
pub use raw::GrowStrategy;
pub use typed::{Element, TypedBuffer};

use thiserror::Error;

/// Buffer errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("Failed to allocate storage for {elements} elements")]
    AllocationFailed { elements: usize },

    #[error("Component dimensions must be non-empty and non-zero")]
    InvalidComponents,

    #[error("Element count {elements} is not a multiple of {components} components per tuple")]
    ComponentMismatch { elements: usize, components: usize },
}

/// Result type for buffer operations.
pub type BufferResult<T> = Result<T, BufferError>;

/// Element-wise range equality. False immediately on a length mismatch.
pub fn ranges_equal<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

/// Raw pointer wrapper for fanning disjoint slices of one buffer out to
/// parallel tasks.
///
/// The caller must partition the index space into disjoint ranges before
/// dispatch and must not resize the buffer while any task holding this
/// pointer is in flight. Overlapping writes or a concurrent resize are
/// undefined behavior.
#[derive(Clone, Copy, Debug)]
pub struct SharedPtr<T>(*mut T);

impl<T> SharedPtr<T> {
    pub fn new(ptr: *mut T) -> Self {
        Self(ptr)
    }

    pub fn as_ptr(self) -> *mut T {
        self.0
    }

    /// Write `value` at `index`.
    ///
    /// # Safety
    ///
    /// `index` must be in bounds of the original buffer and no other task
    /// may access the same index concurrently.
    pub unsafe fn write(self, index: usize, value: T) {
        self.0.add(index).write(value);
    }

    /// Read the value at `index`.
    ///
    /// # Safety
    ///
    /// `index` must be in bounds of the original buffer and no other task
    /// may write the same index concurrently.
    pub unsafe fn read(self, index: usize) -> T
    where
        T: Copy,
    {
        self.0.add(index).read()
    }
}

// Safety: SharedPtr hands out raw access under the disjoint-range contract
// documented above; the pointee type itself must be sendable.
unsafe impl<T: Send> Send for SharedPtr<T> {}
unsafe impl<T: Send> Sync for SharedPtr<T> {}
