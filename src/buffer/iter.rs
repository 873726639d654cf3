//! Tuple-stride traversal
//!
//! Flat traversal is plain slice iteration; these iterators advance one whole
//! tuple per step and hand out a per-tuple component accessor. Re-obtaining
//! an iterator starts a fresh pass. Like the flat iterators, they are not
//! safe against concurrent structural mutation of the buffer.

/// Shared view of one tuple.
#[derive(Clone, Copy, Debug)]
pub struct TupleRef<'a, T> {
    components: &'a [T],
}

impl<'a, T: Copy> TupleRef<'a, T> {
    /// Component `i` of this tuple. `i` must be below the component count.
    #[inline]
    pub fn component(&self, i: usize) -> T {
        debug_assert!(i < self.components.len(), "component {i} out of range");
        self.components[i]
    }

    /// First component, the dereference value of the stride iterator.
    #[inline]
    pub fn first(&self) -> T {
        self.components[0]
    }

    pub fn components(&self) -> &'a [T] {
        self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Mutable view of one tuple.
#[derive(Debug)]
pub struct TupleRefMut<'a, T> {
    components: &'a mut [T],
}

impl<'a, T: Copy> TupleRefMut<'a, T> {
    #[inline]
    pub fn component(&self, i: usize) -> T {
        debug_assert!(i < self.components.len(), "component {i} out of range");
        self.components[i]
    }

    #[inline]
    pub fn set_component(&mut self, i: usize, value: T) {
        debug_assert!(i < self.components.len(), "component {i} out of range");
        self.components[i] = value;
    }

    #[inline]
    pub fn first(&self) -> T {
        self.components[0]
    }

    pub fn components_mut(&mut self) -> &mut [T] {
        self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Forward iterator stepping one tuple (`components` elements) at a time.
pub struct TupleIter<'a, T> {
    rest: &'a [T],
    components: usize,
}

impl<'a, T> TupleIter<'a, T> {
    pub(crate) fn new(slice: &'a [T], components: usize) -> Self {
        debug_assert!(components > 0);
        debug_assert!(slice.len() % components == 0);
        Self {
            rest: slice,
            components,
        }
    }
}

impl<'a, T> Iterator for TupleIter<'a, T> {
    type Item = TupleRef<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let (head, tail) = self.rest.split_at(self.components);
        self.rest = tail;
        Some(TupleRef { components: head })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.rest.len() / self.components;
        (n, Some(n))
    }
}

impl<'a, T> ExactSizeIterator for TupleIter<'a, T> {}

/// Mutable counterpart of [`TupleIter`].
pub struct TupleIterMut<'a, T> {
    rest: &'a mut [T],
    components: usize,
}

impl<'a, T> TupleIterMut<'a, T> {
    pub(crate) fn new(slice: &'a mut [T], components: usize) -> Self {
        debug_assert!(components > 0);
        debug_assert!(slice.len() % components == 0);
        Self {
            rest: slice,
            components,
        }
    }
}

impl<'a, T> Iterator for TupleIterMut<'a, T> {
    type Item = TupleRefMut<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.rest);
        let (head, tail) = rest.split_at_mut(self.components);
        self.rest = tail;
        Some(TupleRefMut { components: head })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.rest.len() / self.components;
        (n, Some(n))
    }
}

impl<'a, T> ExactSizeIterator for TupleIterMut<'a, T> {}

#[cfg(test)]
mod tests {
    use crate::buffer::TypedBuffer;

    #[test]
    fn test_flat_iteration_order() {
        let mut buf = TypedBuffer::<i32>::with_components(3, &[2], "pairs").unwrap();
        for i in 0..6 {
            buf[i] = i as i32 * 10;
        }
        let collected: Vec<i32> = buf.iter().copied().collect();
        assert_eq!(collected, vec![0, 10, 20, 30, 40, 50]);
    }

    #[test]
    fn test_flat_iteration_restartable() {
        let buf = TypedBuffer::<u8>::new(4, "again").unwrap();
        assert_eq!(buf.iter().count(), 4);
        assert_eq!(buf.iter().count(), 4);
    }

    #[test]
    fn test_tuple_iteration_stride() {
        let mut buf = TypedBuffer::<i32>::with_components(4, &[3], "triples").unwrap();
        for t in 0..4 {
            for c in 0..3 {
                buf.set_component(t, c, (t * 3 + c) as i32);
            }
        }

        let mut iter = buf.tuples();
        assert_eq!(iter.len(), 4);
        for t in 0..4 {
            let tuple = iter.next().unwrap();
            assert_eq!(tuple.first(), (t * 3) as i32);
            for c in 0..3 {
                assert_eq!(tuple.component(c), (t * 3 + c) as i32);
            }
        }
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_tuple_iteration_mut() {
        let mut buf = TypedBuffer::<f32>::with_components(5, &[2], "uv").unwrap();
        for (t, mut tuple) in buf.tuples_mut().enumerate() {
            tuple.set_component(0, t as f32);
            tuple.set_component(1, t as f32 + 0.5);
        }
        for t in 0..5 {
            assert_eq!(buf.component(t, 0), t as f32);
            assert_eq!(buf.component(t, 1), t as f32 + 0.5);
        }
    }

    #[test]
    fn test_tuple_iteration_empty() {
        let buf = TypedBuffer::<u64>::with_components(0, &[4], "none").unwrap();
        assert_eq!(buf.tuples().count(), 0);
    }
}
