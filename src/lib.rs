//! An in-memory, height-balanced (AVL) ordered index over record handles.
//!
//! The tree stores *handles* to records (`Box<T>`, `Rc<T>`, `&T`, or any
//! other [`Deref`] type) ordered by a caller-supplied three-way comparator.
//! Whether the tree owns the record payloads is decided by the handle type:
//! dropping a `Box<T>` handle destroys the record, dropping a `&T` handle
//! does not.
//!
//! [`Deref`]: std::ops::Deref

use std::cmp::Ordering;

pub mod avl;

pub use avl::AvlTree;
pub use avl::Iter;
pub use avl::Node;

/// Three-way comparison capability over records of type `T`.
///
/// All tree operations are parametric over this capability. The comparison
/// must be a strict total order and must stay consistent for the lifetime of
/// the tree; an order that changes its answer for a fixed pair of records
/// breaks the balance invariant silently.
pub trait Compare<T: ?Sized> {
    fn compare(&self, lhs: &T, rhs: &T) -> Ordering;
}

impl<T: ?Sized, F> Compare<T> for F
where
    F: Fn(&T, &T) -> Ordering,
{
    fn compare(&self, lhs: &T, rhs: &T) -> Ordering {
        self(lhs, rhs)
    }
}

/// Comparator delegating to the record type's `Ord` implementation.
///
/// This is the default comparator of [`AvlTree`].
#[derive(Copy, Clone, Debug, Default)]
pub struct NaturalOrder;

impl<T: Ord + ?Sized> Compare<T> for NaturalOrder {
    fn compare(&self, lhs: &T, rhs: &T) -> Ordering {
        lhs.cmp(rhs)
    }
}
