use std::borrow::Borrow;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An item stored in a [`SortedSet`], ordered by the key it exposes.
pub trait Keyed {
    type Key: Ord + Debug;

    fn key(&self) -> &Self::Key;
}

/// Vector kept sorted by [`Keyed::key`].
///
/// Lookups are binary searches. Inserts and removals shift the tail.
/// `add` accepts duplicate keys; they are reported by [`SortedSet::check`].
/// Serialized as a plain JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortedSet<T> {
    items: Vec<T>,
}

impl<T> Default for SortedSet<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Keyed> SortedSet<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn position<Q>(&self, key: &Q) -> std::result::Result<usize, usize>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.items.binary_search_by(|item| item.key().borrow().cmp(key))
    }

    /// Insert keeping the order; lands after any item with an equal key.
    pub fn add(&mut self, item: T) {
        let at = self.items.partition_point(|x| x.key() <= item.key());
        self.items.insert(at, item);
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.position(key).ok().map(|i| &self.items[i])
    }

    /// Mutable access. Callers must not change the key.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match self.position(key) {
            Ok(i) => Some(&mut self.items[i]),
            Err(_) => None,
        }
    }

    pub fn has<Q>(&self, key: &Q) -> bool
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.position(key).is_ok()
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<T>
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        match self.position(key) {
            Ok(i) => Some(self.items.remove(i)),
            Err(_) => None,
        }
    }

    /// Up to `max` items whose key is strictly greater than `marker`, in order.
    pub fn slice<Q>(&self, marker: &Q, max: usize) -> &[T]
    where
        T::Key: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let start = self.items.partition_point(|x| x.key().borrow() <= marker);
        let end = start.saturating_add(max).min(self.items.len());
        &self.items[start..end]
    }

    /// Up to `max` items from the start.
    pub fn first(&self, max: usize) -> &[T] {
        &self.items[..max.min(self.items.len())]
    }

    /// Sorted and free of duplicate keys.
    pub fn check(&self) -> Result<()> {
        for pair in self.items.windows(2) {
            let (a, b) = (pair[0].key(), pair[1].key());
            if a == b {
                return Err(Error::NotValid(format!("duplicate key {a:?}")));
            }
            if a > b {
                return Err(Error::NotValid(format!("unsorted keys {a:?} > {b:?}")));
            }
        }
        Ok(())
    }

    /// Restore the order after a bulk load.
    pub fn sort(&mut self) {
        self.items.sort_by(|a, b| a.key().cmp(b.key()));
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Mutable iteration. Callers must not change keys.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn keys(&self) -> impl Iterator<Item = &T::Key> {
        self.items.iter().map(Keyed::key)
    }

    pub fn retain(&mut self, f: impl FnMut(&T) -> bool) {
        self.items.retain(f);
    }

    /// Remove every item, in order.
    pub fn drain(&mut self) -> std::vec::Drain<'_, T> {
        self.items.drain(..)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<T: Keyed> FromIterator<T> for SortedSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = SortedSet {
            items: iter.into_iter().collect(),
        };
        set.sort();
        set
    }
}

impl<T: Keyed> Extend<T> for SortedSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.add(item);
        }
    }
}

impl<T> IntoIterator for SortedSet<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a SortedSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
