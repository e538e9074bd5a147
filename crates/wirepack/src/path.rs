//! # Index Paths
//!
//! Out-of-band payloads are addressed by a path of indices from the root of a
//! message: `/0` is the payload of the first deferred position, `/1/0` the first
//! position nested inside the second, and so on.
//!
//! ## Invariants
//! - Paths registered in one [`Worklist`] are pairwise disjoint: no path is equal
//!   to, or a prefix of, another.
//! - Items keep their registration order.

use crate::Error;
use crate::Result;

/// An ordered sequence of indices identifying a sub-channel.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexPath(Vec<usize>);

impl IndexPath {
    /// The empty path, addressing the message itself.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Returns this path extended by `index`.
    pub fn child(&self, index: usize) -> Self {
        let mut indices = Vec::with_capacity(self.0.len() + 1);
        indices.extend_from_slice(&self.0);
        indices.push(index);
        Self(indices)
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// True if `prefix` is equal to or an ancestor of this path.
    pub fn starts_with(&self, prefix: &IndexPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// True if neither path is equal to or an ancestor of the other.
    pub fn is_disjoint(&self, other: &IndexPath) -> bool {
        !self.starts_with(other) && !other.starts_with(self)
    }

    /// Strips `base` off the front of this path.
    ///
    /// Returns `None` if `base` is not a prefix.
    pub fn relative_to(&self, base: &IndexPath) -> Option<&[usize]> {
        self.0.strip_prefix(base.0.as_slice())
    }

    fn push(&mut self, index: usize) {
        self.0.push(index);
    }

    fn pop(&mut self) -> Option<usize> {
        self.0.pop()
    }
}

impl From<Vec<usize>> for IndexPath {
    fn from(indices: Vec<usize>) -> Self {
        Self(indices)
    }
}

impl From<&[usize]> for IndexPath {
    fn from(indices: &[usize]) -> Self {
        Self(indices.to_vec())
    }
}

impl std::fmt::Display for IndexPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for index in &self.0 {
            write!(f, "/{}", index)?;
        }
        Ok(())
    }
}

/// A deferred item and the path it was assigned at encode (or decode) time.
#[derive(Debug)]
pub struct Deferred<T> {
    pub path: IndexPath,
    pub item: T,
}

/// An ordered collection of deferred items, built while a value is encoded or decoded.
///
/// The worklist tracks a current base path. Encoders descend into nested payload
/// positions with [`Worklist::with_index`] and register work at the current base
/// with [`Worklist::defer`].
#[derive(Debug)]
pub struct Worklist<T> {
    base: IndexPath,
    items: Vec<Deferred<T>>,
}

impl<T> Worklist<T> {
    /// Creates an empty worklist rooted at the message itself.
    pub fn new() -> Self {
        Self::at(IndexPath::root())
    }

    /// Creates an empty worklist whose registrations land under `base`.
    pub fn at(base: IndexPath) -> Self {
        Self { base, items: Vec::new() }
    }

    /// The path that the next `defer` would register.
    pub fn base(&self) -> &IndexPath {
        &self.base
    }

    /// Runs `f` with the base path extended by `index`.
    pub fn with_index<R>(&mut self, index: usize, f: impl FnOnce(&mut Self) -> R) -> R {
        self.base.push(index);
        let out = f(self);
        self.base.pop();
        out
    }

    /// Registers `item` at the current base path.
    ///
    /// # Errors
    /// Returns `Error::PathConflict` if the base overlaps an already registered path.
    pub fn defer(&mut self, item: T) -> Result<()> {
        if self.items.iter().any(|d| !d.path.is_disjoint(&self.base)) {
            return Err(Error::PathConflict(self.base.clone()));
        }
        self.items.push(Deferred { path: self.base.clone(), item });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Registered paths in registration order.
    pub fn paths(&self) -> impl Iterator<Item = &IndexPath> {
        self.items.iter().map(|d| &d.path)
    }

    pub fn into_items(self) -> Vec<Deferred<T>> {
        self.items
    }
}

impl<T> Default for Worklist<T> {
    fn default() -> Self {
        Self::new()
    }
}
