use std::alloc::Layout;
use std::fmt;

use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;

use crate::{HistogramError, Result};

/// Bump arena backing bucket storage and duplicated string payloads.
///
/// Everything allocated here is released together when the arena is dropped;
/// nothing is freed per object.
pub struct Arena(Bump);

impl Arena {
    pub fn new() -> Self {
        Arena(Bump::new())
    }

    /// Arena that refuses to grow beyond `bytes` of chunk memory.
    pub fn with_limit(bytes: usize) -> Self {
        let bump = Bump::new();
        bump.set_allocation_limit(Some(bytes));
        Arena(bump)
    }

    pub fn allocated_bytes(&self) -> usize {
        self.0.allocated_bytes()
    }

    /// Empty arena vector with room for exactly `capacity` elements.
    pub(crate) fn vec_with_capacity<T>(&self, capacity: usize) -> Result<BumpVec<'_, T>> {
        let mut vec = BumpVec::new_in(&self.0);
        vec.try_reserve(capacity)
            .map_err(|_| HistogramError::Allocation)?;
        Ok(vec)
    }

    /// Copies `data` into the arena.
    pub(crate) fn alloc_bytes(&self, data: &[u8]) -> Result<&[u8]> {
        if data.is_empty() {
            return Ok(&[]);
        }
        let layout = Layout::array::<u8>(data.len()).map_err(|_| HistogramError::Allocation)?;
        let ptr = self
            .0
            .try_alloc_layout(layout)
            .map_err(|_| HistogramError::Allocation)?;
        // SAFETY: `ptr` points to a fresh allocation of `data.len()` bytes owned by the
        // arena, which cannot overlap `data` and lives as long as `&self`.
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.as_ptr(), data.len());
            Ok(std::slice::from_raw_parts(ptr.as_ptr(), data.len()))
        }
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("allocated_bytes", &self.allocated_bytes())
            .field("limit", &self.0.allocation_limit())
            .finish()
    }
}

/// Pushes into a vector whose capacity was reserved up front, growing it
/// fallibly if the reservation turns out to be short.
pub(crate) fn push_reserved<T>(vec: &mut BumpVec<'_, T>, item: T) -> Result<()> {
    if vec.len() == vec.capacity() {
        vec.try_reserve(1).map_err(|_| HistogramError::Allocation)?;
    }
    vec.push(item);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_bytes_copies_payload() {
        let arena = Arena::new();
        let source = b"histogram".to_vec();
        let copy = arena.alloc_bytes(&source).expect("allocation succeeds");
        assert_eq!(copy, b"histogram");
        assert_ne!(copy.as_ptr(), source.as_ptr());
    }

    #[test]
    fn empty_payload_needs_no_allocation() {
        let arena = Arena::with_limit(0);
        assert_eq!(arena.alloc_bytes(b"").unwrap(), b"");
    }

    #[test]
    fn limited_arena_reports_allocation_failure() {
        let arena = Arena::with_limit(0);
        assert_eq!(arena.alloc_bytes(b"abc"), Err(HistogramError::Allocation));
        assert!(matches!(
            arena.vec_with_capacity::<u64>(16),
            Err(HistogramError::Allocation)
        ));
    }

    #[test]
    fn reserved_vector_accepts_pushes() {
        let arena = Arena::new();
        let mut vec = arena.vec_with_capacity::<u32>(2).unwrap();
        push_reserved(&mut vec, 1).unwrap();
        push_reserved(&mut vec, 2).unwrap();
        push_reserved(&mut vec, 3).unwrap();
        assert_eq!(vec.into_bump_slice(), &[1, 2, 3]);
    }
}
