use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

use slab::Slab;

/// A typed index into a `HandleSet`.
pub trait Handle: Copy + Eq {
    /// Builds a handle from a raw slab key.
    fn from_key(key: usize) -> Self;
    /// The raw slab key of this handle.
    fn key(self) -> usize;
}

macro_rules! define_handle(
    ($name: ident, $doc: expr) => {
        #[doc = $doc]
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde-serialize", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(pub(crate) usize);

        impl $crate::utils::Handle for $name {
            #[inline]
            fn from_key(key: usize) -> Self {
                $name(key)
            }

            #[inline]
            fn key(self) -> usize {
                self.0
            }
        }
    }
);

/// A set of objects identified by typed handles, backed by a slab.
///
/// Insertion and removal are O(1); handles of removed objects may be reused.
pub struct HandleSet<H: Handle, T> {
    slab: Slab<T>,
    phantom: PhantomData<H>,
}

impl<H: Handle, T> Default for HandleSet<H, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Handle, T> HandleSet<H, T> {
    /// Creates an empty set.
    pub fn new() -> Self {
        HandleSet {
            slab: Slab::new(),
            phantom: PhantomData,
        }
    }

    /// The number of objects in this set.
    #[inline]
    pub fn len(&self) -> usize {
        self.slab.len()
    }

    /// Whether this set is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slab.is_empty()
    }

    /// The handle the next call to `insert` will return.
    #[inline]
    pub fn next_handle(&self) -> H {
        H::from_key(self.slab.vacant_key())
    }

    /// Adds an object to this set.
    #[inline]
    pub fn insert(&mut self, value: T) -> H {
        H::from_key(self.slab.insert(value))
    }

    /// Removes an object from this set.
    #[inline]
    pub fn remove(&mut self, handle: H) -> Option<T> {
        if self.slab.contains(handle.key()) {
            Some(self.slab.remove(handle.key()))
        } else {
            None
        }
    }

    /// Whether `handle` identifies an object of this set.
    #[inline]
    pub fn contains(&self, handle: H) -> bool {
        self.slab.contains(handle.key())
    }

    /// Gets a reference to the object identified by `handle`.
    #[inline]
    pub fn get(&self, handle: H) -> Option<&T> {
        self.slab.get(handle.key())
    }

    /// Gets a mutable reference to the object identified by `handle`.
    #[inline]
    pub fn get_mut(&mut self, handle: H) -> Option<&mut T> {
        self.slab.get_mut(handle.key())
    }

    /// Gets mutable references to two distinct objects.
    #[inline]
    pub fn get2_mut(&mut self, a: H, b: H) -> Option<(&mut T, &mut T)> {
        self.slab.get2_mut(a.key(), b.key())
    }

    /// Iterates through the objects of this set and their handles.
    pub fn iter(&self) -> impl Iterator<Item = (H, &T)> {
        self.slab.iter().map(|(k, v)| (H::from_key(k), v))
    }

    /// Mutably iterates through the objects of this set and their handles.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (H, &mut T)> {
        self.slab.iter_mut().map(|(k, v)| (H::from_key(k), v))
    }

    /// Collects the handles of all the objects of this set.
    pub fn handles(&self) -> Vec<H> {
        self.slab.iter().map(|(k, _)| H::from_key(k)).collect()
    }
}

impl<H: Handle, T> Index<H> for HandleSet<H, T> {
    type Output = T;

    #[inline]
    fn index(&self, handle: H) -> &T {
        &self.slab[handle.key()]
    }
}

impl<H: Handle, T> IndexMut<H> for HandleSet<H, T> {
    #[inline]
    fn index_mut(&mut self, handle: H) -> &mut T {
        &mut self.slab[handle.key()]
    }
}

#[cfg(test)]
mod test {
    use super::HandleSet;

    define_handle!(TestHandle, "A handle used by the tests.");

    #[test]
    fn handles_are_stable_across_removals() {
        let mut set = HandleSet::<TestHandle, &str>::new();
        let a = set.insert("a");
        let b = set.insert("b");
        let c = set.insert("c");

        assert_eq!(set.remove(b), Some("b"));
        assert_eq!(set.remove(b), None);
        assert_eq!(set[a], "a");
        assert_eq!(set[c], "c");
        assert_eq!(set.len(), 2);
        assert_eq!(set.next_handle(), b);
    }
}
