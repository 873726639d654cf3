//! Component-aware typed buffer
//!
//! `TypedBuffer<T>` stores `tuple_count * components_per_tuple` elements of a
//! primitive type in one contiguous block. The component count is fixed at
//! construction; all size changes move in whole tuples (or whole elements for
//! single-component buffers). Indexed access is unchecked in release builds
//! and asserted in debug builds.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::ptr::NonNull;

use super::iter::{TupleIter, TupleIterMut};
use super::raw::RawBlock;
use super::{BufferError, BufferResult, GrowStrategy};
use crate::config::CoreConfig;

/// Marker for primitive element types a buffer can hold.
///
/// The default value of the type doubles as the zero fill written into newly
/// grown elements unless overridden with [`TypedBuffer::set_fill_value`].
pub trait Element: Copy + Default + PartialEq + Send + Sync + 'static {}

macro_rules! impl_element {
    ($($ty:ty),* $(,)?) => {
        $(impl Element for $ty {})*
    };
}

impl_element!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, usize, bool);

/// Contiguous, resizable store of tuples of fixed-width components.
///
/// Concurrent access contract: multiple tasks may read and write the backing
/// storage simultaneously only over disjoint index ranges, and the buffer
/// must not be resized while any such task is in flight. Neither rule is
/// enforced here; violating them is undefined behavior.
pub struct TypedBuffer<T: Element> {
    name: String,
    block: RawBlock<T>,
    tuple_count: usize,
    components: usize,
    fill: T,
    strategy: GrowStrategy,
    poison: bool,
}

impl<T: Element> TypedBuffer<T> {
    /// Create a buffer of `tuple_count` single-component tuples, zero-filled.
    pub fn new(tuple_count: usize, name: &str) -> BufferResult<Self> {
        Self::with_components(tuple_count, &[1], name)
    }

    /// Create a buffer with `components_per_tuple = product(component_dims)`,
    /// zero-filled. Empty dims or a zero dim is an error.
    pub fn with_components(
        tuple_count: usize,
        component_dims: &[usize],
        name: &str,
    ) -> BufferResult<Self> {
        Self::with_config(tuple_count, component_dims, name, &CoreConfig::default())
    }

    /// Create a buffer using the memory settings from `config`.
    pub fn with_config(
        tuple_count: usize,
        component_dims: &[usize],
        name: &str,
        config: &CoreConfig,
    ) -> BufferResult<Self> {
        let components = checked_components(component_dims)?;
        let mut buffer = Self {
            name: name.to_string(),
            block: RawBlock::Unallocated,
            tuple_count: 0,
            components,
            fill: T::default(),
            strategy: config.memory.grow_strategy,
            poison: config.memory.poison_enabled(),
        };
        buffer.resize_tuples(tuple_count)?;
        Ok(buffer)
    }

    /// Wrap externally owned memory of `tuple_count * product(component_dims)`
    /// elements. The buffer reports `owns_buffer() == false` and will never
    /// free or reallocate the memory; the first resize copies into a fresh
    /// owned block and leaves the source untouched.
    ///
    /// # Safety
    ///
    /// `ptr` must be non-null, valid for reads and writes of the full element
    /// count, and must outlive every access made through this buffer.
    pub unsafe fn from_borrowed(
        ptr: *mut T,
        tuple_count: usize,
        component_dims: &[usize],
        name: &str,
    ) -> BufferResult<Self> {
        let components = checked_components(component_dims)?;
        debug_assert!(!ptr.is_null() || tuple_count == 0);
        let len = tuple_count * components;
        let block = if len == 0 {
            RawBlock::Unallocated
        } else {
            RawBlock::Borrowed {
                ptr: NonNull::new_unchecked(ptr),
                len,
            }
        };
        Ok(Self {
            name: name.to_string(),
            block,
            tuple_count,
            components,
            fill: T::default(),
            strategy: GrowStrategy::default(),
            poison: cfg!(debug_assertions),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Total number of element slots (`tuple_count * components_per_tuple`).
    pub fn element_count(&self) -> usize {
        self.block.len()
    }

    pub fn tuple_count(&self) -> usize {
        self.tuple_count
    }

    pub fn components_per_tuple(&self) -> usize {
        self.components
    }

    pub fn is_empty(&self) -> bool {
        self.block.len() == 0
    }

    pub fn is_allocated(&self) -> bool {
        self.block.is_allocated()
    }

    /// True when this buffer frees its own backing memory. False only for a
    /// borrowed buffer that has not yet been resized.
    pub fn owns_buffer(&self) -> bool {
        !self.block.is_allocated() || self.block.is_owned()
    }

    /// Value written into newly grown elements. Defaults to the type's zero.
    pub fn fill_value(&self) -> T {
        self.fill
    }

    pub fn set_fill_value(&mut self, fill: T) {
        self.fill = fill;
    }

    pub fn grow_strategy(&self) -> GrowStrategy {
        self.strategy
    }

    /// Resize to `new_tuple_count` tuples. Existing elements within the new
    /// size keep their values; new elements take the fill value. On failure
    /// the buffer is left exactly as it was.
    pub fn resize_tuples(&mut self, new_tuple_count: usize) -> BufferResult<()> {
        // An overflowing request saturates and fails layout computation.
        let elements = new_tuple_count.saturating_mul(self.components);
        self.block
            .resize(elements, self.strategy, self.fill, self.poison)?;
        self.tuple_count = new_tuple_count;
        Ok(())
    }

    /// Resize to `new_element_count` elements, which must be a whole number
    /// of tuples.
    pub fn resize_elements(&mut self, new_element_count: usize) -> BufferResult<()> {
        if new_element_count % self.components != 0 {
            return Err(BufferError::ComponentMismatch {
                elements: new_element_count,
                components: self.components,
            });
        }
        self.block
            .resize(new_element_count, self.strategy, self.fill, self.poison)?;
        self.tuple_count = new_element_count / self.components;
        Ok(())
    }

    /// Release all storage and reset to the empty state.
    pub fn clear(&mut self) {
        self.block.release(self.poison);
        self.tuple_count = 0;
    }

    /// Resize to the iterator's length, then copy its values in flat order.
    pub fn assign_range<I>(&mut self, values: I) -> BufferResult<()>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: ExactSizeIterator,
    {
        let values = values.into_iter();
        self.resize_elements(values.len())?;
        for (slot, value) in self.as_mut_slice().iter_mut().zip(values) {
            *slot = value;
        }
        Ok(())
    }

    /// Resize to `count` elements, all set to `value`.
    pub fn assign_fill(&mut self, count: usize, value: T) -> BufferResult<()> {
        self.resize_elements(count)?;
        self.as_mut_slice().fill(value);
        Ok(())
    }

    /// Grow by one element and write `value` at the new back. Only valid for
    /// single-component buffers; a multi-component buffer cannot grow by a
    /// fraction of a tuple.
    pub fn push_back(&mut self, value: T) -> BufferResult<()> {
        let new_len = self.element_count() + 1;
        self.resize_elements(new_len)?;
        // Safety: resize_elements just established new_len elements.
        unsafe { *self.ptr().add(new_len - 1) = value };
        Ok(())
    }

    /// Overwrite every element with `value` without changing the size.
    pub fn initialize_with_value(&mut self, value: T) {
        self.as_mut_slice().fill(value);
    }

    pub fn front(&self) -> Option<&T> {
        self.as_slice().first()
    }

    pub fn back(&self) -> Option<&T> {
        self.as_slice().last()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.as_mut_slice().get_mut(index)
    }

    /// Read component `component` of tuple `tuple`. Unchecked in release.
    pub fn component(&self, tuple: usize, component: usize) -> T {
        debug_assert!(tuple < self.tuple_count, "tuple {tuple} out of range");
        debug_assert!(component < self.components, "component {component} out of range");
        // Safety: debug-asserted above; in release this is the caller's
        // contract, matching flat indexed access.
        unsafe { *self.ptr().add(tuple * self.components + component) }
    }

    /// Write component `component` of tuple `tuple`. Unchecked in release.
    pub fn set_component(&mut self, tuple: usize, component: usize, value: T) {
        debug_assert!(tuple < self.tuple_count, "tuple {tuple} out of range");
        debug_assert!(component < self.components, "component {component} out of range");
        // Safety: see component().
        unsafe { *self.ptr().add(tuple * self.components + component) = value };
    }

    /// Backing pointer for bulk or parallel access. Invalidated by any
    /// resize; callers must not retain it across one.
    pub fn as_ptr(&self) -> *const T {
        self.block.as_non_null().as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.block.as_non_null().as_ptr()
    }

    pub fn as_slice(&self) -> &[T] {
        // Safety: the block holds element_count() initialized elements; a
        // dangling base pointer is valid for the zero-length case.
        unsafe { std::slice::from_raw_parts(self.ptr(), self.element_count()) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // Safety: see as_slice(); &mut self guarantees exclusivity.
        unsafe { std::slice::from_raw_parts_mut(self.ptr(), self.element_count()) }
    }

    /// Flat traversal over every element in storage order (tuple-major,
    /// component-minor). Re-obtaining the iterator starts a fresh pass.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.as_mut_slice().iter_mut()
    }

    /// Tuple-stride traversal; each step yields one whole tuple.
    pub fn tuples(&self) -> TupleIter<'_, T> {
        TupleIter::new(self.as_slice(), self.components)
    }

    pub fn tuples_mut(&mut self) -> TupleIterMut<'_, T> {
        let components = self.components;
        TupleIterMut::new(self.as_mut_slice(), components)
    }

    fn ptr(&self) -> *mut T {
        self.block.as_non_null().as_ptr()
    }
}

impl<T: Element> Index<usize> for TypedBuffer<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: usize) -> &T {
        debug_assert!(
            index < self.element_count(),
            "index {index} out of range ({} elements)",
            self.element_count()
        );
        // Safety: debug-asserted above; unchecked in release per the access
        // contract.
        unsafe { &*self.ptr().add(index) }
    }
}

impl<T: Element> IndexMut<usize> for TypedBuffer<T> {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut T {
        debug_assert!(
            index < self.element_count(),
            "index {index} out of range ({} elements)",
            self.element_count()
        );
        // Safety: see Index.
        unsafe { &mut *self.ptr().add(index) }
    }
}

impl<T: Element> Drop for TypedBuffer<T> {
    fn drop(&mut self) {
        self.block.release(self.poison);
    }
}

impl<T: Element> fmt::Debug for TypedBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedBuffer")
            .field("name", &self.name)
            .field("tuple_count", &self.tuple_count)
            .field("components_per_tuple", &self.components)
            .field("owns_buffer", &self.owns_buffer())
            .finish()
    }
}

// Safety: the backing storage is plain memory and T is Send + Sync; cross-
// thread use is governed by the disjoint-range contract documented on the
// type.
unsafe impl<T: Element> Send for TypedBuffer<T> {}
unsafe impl<T: Element> Sync for TypedBuffer<T> {}

fn checked_components(component_dims: &[usize]) -> BufferResult<usize> {
    if component_dims.is_empty() || component_dims.contains(&0) {
        return Err(BufferError::InvalidComponents);
    }
    component_dims
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or(BufferError::InvalidComponents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size_invariant_holds<T: Element>(buf: &TypedBuffer<T>) -> bool {
        buf.element_count() == buf.tuple_count() * buf.components_per_tuple()
            && buf.element_count() % buf.components_per_tuple() == 0
    }

    #[test]
    fn test_construct_zero_filled() {
        let buf = TypedBuffer::<i32>::new(100, "scalars").unwrap();
        assert_eq!(buf.element_count(), 100);
        assert_eq!(buf.tuple_count(), 100);
        assert_eq!(buf.components_per_tuple(), 1);
        assert!(buf.owns_buffer());
        assert!(buf.is_allocated());
        assert!(buf.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_component_dims_product() {
        let buf = TypedBuffer::<f32>::with_components(10, &[2, 3], "tensor").unwrap();
        assert_eq!(buf.components_per_tuple(), 6);
        assert_eq!(buf.element_count(), 60);
        assert!(size_invariant_holds(&buf));
    }

    #[test]
    fn test_invalid_component_dims() {
        assert_eq!(
            TypedBuffer::<u8>::with_components(4, &[], "bad").unwrap_err(),
            BufferError::InvalidComponents
        );
        assert_eq!(
            TypedBuffer::<u8>::with_components(4, &[3, 0], "bad").unwrap_err(),
            BufferError::InvalidComponents
        );
    }

    #[test]
    fn test_size_invariant_across_mutations() {
        let mut buf = TypedBuffer::<u16>::with_components(5, &[4], "rgba").unwrap();
        assert!(size_invariant_holds(&buf));

        buf.resize_tuples(12).unwrap();
        assert!(size_invariant_holds(&buf));
        assert_eq!(buf.tuple_count(), 12);

        buf.resize_elements(8).unwrap();
        assert!(size_invariant_holds(&buf));
        assert_eq!(buf.tuple_count(), 2);

        buf.assign_fill(16, 9).unwrap();
        assert!(size_invariant_holds(&buf));
        assert_eq!(buf.tuple_count(), 4);

        buf.clear();
        assert!(size_invariant_holds(&buf));
        assert_eq!(buf.tuple_count(), 0);
        assert!(!buf.is_allocated());
    }

    #[test]
    fn test_resize_elements_rejects_partial_tuple() {
        let mut buf = TypedBuffer::<i32>::with_components(3, &[4], "quads").unwrap();
        let err = buf.resize_elements(10).unwrap_err();
        assert_eq!(
            err,
            BufferError::ComponentMismatch {
                elements: 10,
                components: 4
            }
        );
        // Failed resize leaves the buffer untouched.
        assert_eq!(buf.element_count(), 12);
        assert_eq!(buf.tuple_count(), 3);
    }

    #[test]
    fn test_growth_fill_preserves_prefix() {
        let mut buf = TypedBuffer::<i64>::new(4, "grow").unwrap();
        for i in 0..4 {
            buf[i] = (i + 1) as i64;
        }
        buf.resize_tuples(9).unwrap();
        assert_eq!(&buf.as_slice()[..4], &[1, 2, 3, 4]);
        assert!(buf.as_slice()[4..].iter().all(|&v| v == 0));
    }

    #[test]
    fn test_custom_fill_value() {
        let mut buf = TypedBuffer::<f64>::new(2, "nanfill").unwrap();
        buf.set_fill_value(f64::NAN);
        buf.resize_tuples(5).unwrap();
        assert_eq!(buf[0], 0.0);
        assert!(buf.as_slice()[2..].iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_shrink_then_grow_no_stale_data() {
        let mut buf = TypedBuffer::<u32>::new(64, "roundtrip").unwrap();
        buf.initialize_with_value(0xDEAD_BEEF);
        buf.resize_tuples(0).unwrap();
        assert!(!buf.is_allocated());
        buf.resize_tuples(64).unwrap();
        assert!(buf.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_borrowed_resize_flips_ownership() {
        let mut source = vec![1i32, 2, 3, 4, 5, 6];
        let snapshot = source.clone();
        let mut buf = unsafe {
            TypedBuffer::<i32>::from_borrowed(source.as_mut_ptr(), 3, &[2], "view").unwrap()
        };
        assert!(!buf.owns_buffer());
        assert_eq!(buf.as_slice(), &snapshot[..]);

        buf.resize_tuples(5).unwrap();
        assert!(buf.owns_buffer());
        assert_eq!(&buf.as_slice()[..6], &snapshot[..]);
        assert!(buf.as_slice()[6..].iter().all(|&v| v == 0));
        drop(buf);
        // Source memory is byte-for-byte unchanged.
        assert_eq!(source, snapshot);
    }

    #[test]
    fn test_tuple_component_addressing() {
        let mut buf = TypedBuffer::<i32>::with_components(10, &[4], "addr").unwrap();
        for t in 0..10 {
            for c in 0..4 {
                buf.set_component(t, c, (t * 4 + c) as i32);
            }
        }
        for t in 0..10 {
            for c in 0..4 {
                assert_eq!(buf[t * 4 + c], (t * 4 + c) as i32);
                assert_eq!(buf.component(t, c), (t * 4 + c) as i32);
            }
        }
    }

    #[test]
    fn test_assign_range() {
        let mut buf = TypedBuffer::<u8>::new(2, "assign").unwrap();
        buf.assign_range(vec![7u8, 8, 9]).unwrap();
        assert_eq!(buf.as_slice(), &[7, 8, 9]);
        assert_eq!(buf.tuple_count(), 3);
    }

    #[test]
    fn test_push_back() {
        let mut buf = TypedBuffer::<f32>::new(0, "stack").unwrap();
        for i in 0..5 {
            buf.push_back(i as f32).unwrap();
        }
        assert_eq!(buf.element_count(), 5);
        assert_eq!(buf.back(), Some(&4.0));
        assert_eq!(buf.front(), Some(&0.0));
    }

    #[test]
    fn test_push_back_rejects_multi_component() {
        let mut buf = TypedBuffer::<f32>::with_components(2, &[3], "vecs").unwrap();
        assert!(buf.push_back(1.0).is_err());
        assert_eq!(buf.element_count(), 6);
    }

    #[test]
    fn test_empty_buffer_accessors() {
        let buf = TypedBuffer::<i16>::new(0, "empty").unwrap();
        assert!(buf.is_empty());
        assert!(!buf.is_allocated());
        assert!(buf.owns_buffer());
        assert_eq!(buf.front(), None);
        assert_eq!(buf.back(), None);
        assert_eq!(buf.iter().count(), 0);
        assert_eq!(buf.as_slice().len(), 0);
    }

    #[test]
    fn test_alloc_copy_free_strategy() {
        let config = CoreConfig::from_str("[memory]\ngrow_strategy = \"alloc-copy-free\"").unwrap();
        let mut buf = TypedBuffer::<u64>::with_config(8, &[1], "copying", &config).unwrap();
        assert_eq!(buf.grow_strategy(), GrowStrategy::AllocCopyFree);
        for i in 0..8 {
            buf[i] = i as u64;
        }
        buf.resize_tuples(20).unwrap();
        for i in 0..8 {
            assert_eq!(buf[i], i as u64);
        }
        assert!(buf.as_slice()[8..].iter().all(|&v| v == 0));
    }
}
