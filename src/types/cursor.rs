//! Handles into the block arena.
//!
//! Blocks live in a [`slab::Slab`] and are addressed by their slab key, so a
//! position inside a segmented container is a `(block key, offset)` pair
//! instead of a pointer.
//!
//! ## Invalidation
//!
//! A cursor is a plain value. It does not borrow the container and it is not
//! updated by later mutations: any structural change (push, pop, erase) may
//! invalidate outstanding cursors, except that `erase(cursor)` returns a
//! valid cursor to the following record. Using a stale cursor never causes
//! memory unsafety; the container either returns `None` or some other live
//! record.

/// Position of a record in a segmented container, or the end position.
///
/// ## Example
///
/// ```
/// use block_order_book::types::Cursor;
///
/// let end = Cursor::end();
/// assert!(end.is_end());
/// assert_eq!(end, Cursor::default());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Cursor {
    /// Slab key of the block, None at the end position
    pub(crate) block: Option<usize>,

    /// Offset within the block
    pub(crate) index: usize,
}

impl Cursor {
    /// Cursor pointing at a slot of a block
    #[inline]
    pub(crate) const fn at(block: usize, index: usize) -> Self {
        Self {
            block: Some(block),
            index,
        }
    }

    /// The past-the-end cursor
    #[inline]
    pub const fn end() -> Self {
        Self {
            block: None,
            index: 0,
        }
    }

    /// Check if this is the past-the-end cursor
    #[inline]
    pub fn is_end(&self) -> bool {
        self.block.is_none()
    }

    /// Slab key of the block this cursor points into
    #[inline]
    pub fn block(&self) -> Option<usize> {
        self.block
    }

    /// Offset within the block
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Where a live identifier currently sits: block key plus slot offset.
///
/// Stored in the identifier index and rewritten whenever the slot changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    /// Slab key of the block
    pub block: usize,

    /// Slot offset within the block
    pub index: usize,
}

impl Location {
    #[inline]
    pub const fn new(block: usize, index: usize) -> Self {
        Self { block, index }
    }

    #[inline]
    pub fn cursor(self) -> Cursor {
        Cursor::at(self.block, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_end() {
        let end = Cursor::end();
        assert!(end.is_end());
        assert!(end.block().is_none());
        assert_eq!(end.index(), 0);
    }

    #[test]
    fn test_cursor_equality() {
        assert_eq!(Cursor::at(3, 5), Cursor::at(3, 5));
        assert_ne!(Cursor::at(3, 5), Cursor::at(3, 6));
        assert_ne!(Cursor::at(0, 0), Cursor::end());
    }

    #[test]
    fn test_location_cursor() {
        let loc = Location::new(2, 17);
        let cursor = loc.cursor();
        assert_eq!(cursor.block(), Some(2));
        assert_eq!(cursor.index(), 17);
        assert!(!cursor.is_end());
    }
}
