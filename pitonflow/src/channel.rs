//! Forward and backward signals of hardware channels.
//!
//! A channel is a bundle of a forward signal (producer to consumer) and a backward signal (consumer to producer):
//!
//! - Valid-ready channel: `Valid<V>` forward, [`Ready`] backward. A transfer happens in a cycle where both `valid`
//!   and `ready` are asserted.
//! - Valid-credit channel: `Valid<V>` forward, [`Credit`] backward. The producer may assert `valid` only while it
//!   holds a credit, and every `credit` pulse returns one.

use crate::*;

/// Channel's forward signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Signal)]
pub struct Valid<V: Signal> {
    /// Inner data
    pub inner: V,

    /// Valid bit
    pub valid: bool,
}

impl<V: Signal> Valid<V> {
    /// Creates a new value.
    pub fn new(valid: bool, inner: V) -> Self { Self { inner, valid } }

    /// Creates a valid value.
    pub fn valid(inner: V) -> Self { Self::new(true, inner) }

    /// Creates an invalid value.
    pub fn invalid() -> Self
    where V: Default {
        Self::new(false, V::default())
    }

    /// Returns the inner data if valid.
    pub fn into_option(self) -> Option<V> { self.valid.then_some(self.inner) }

    /// Returns a reference to the inner data if valid.
    pub fn as_option(&self) -> Option<&V> { self.valid.then_some(&self.inner) }

    /// Maps the inner value.
    pub fn map_inner<W: Signal, F: FnOnce(V) -> W>(self, f: F) -> Valid<W> { Valid::new(self.valid, f(self.inner)) }

    /// Returns whether a valid-ready transfer happens with the given backward signal.
    pub fn fire(&self, ready: Ready) -> bool { self.valid && ready.ready }
}

impl<V: Signal + Default> From<Option<V>> for Valid<V> {
    fn from(value: Option<V>) -> Self {
        match value {
            Some(inner) => Self::valid(inner),
            None => Self::invalid(),
        }
    }
}

/// Ready signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Signal)]
pub struct Ready {
    /// Ready bit
    pub ready: bool,
}

impl Ready {
    /// Creates a new value.
    pub fn new(ready: bool) -> Self { Self { ready } }
}

/// Credit signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Signal)]
pub struct Credit {
    /// Credit bit
    pub credit: bool,
}

impl Credit {
    /// Creates a new value.
    pub fn new(credit: bool) -> Self { Self { credit } }
}
