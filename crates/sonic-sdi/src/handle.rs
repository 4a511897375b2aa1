//! Generation-checked handles for resources and entities.
//!
//! A handle is an index into an append-only arena plus the generation of
//! the arena that issued it. Handles are `Copy`, comparable and hashable,
//! and can never be confused across kinds: a [`ResourceHandle`] cannot be
//! passed where an [`EntityHandle`] is expected. A handle presented to an
//! arena other than the one that issued it is rejected as stale.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};

/// Marker trait for handle kinds.
pub trait HandleKind: Send + Sync + 'static {
    /// Returns the kind name for debugging.
    fn kind_name() -> &'static str;
}

/// A typed arena handle.
pub struct Handle<K: HandleKind> {
    index: u32,
    generation: u32,
    _marker: PhantomData<K>,
}

impl<K: HandleKind> Handle<K> {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    /// Position in the issuing arena.
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the issuing arena.
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

impl<K: HandleKind> Clone for Handle<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: HandleKind> Copy for Handle<K> {}

impl<K: HandleKind> PartialEq for Handle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<K: HandleKind> Eq for Handle<K> {}

impl<K: HandleKind> Hash for Handle<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<K: HandleKind> PartialOrd for Handle<K> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: HandleKind> Ord for Handle<K> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.generation, self.index).cmp(&(other.generation, other.index))
    }
}

impl<K: HandleKind> fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}@{})", K::kind_name(), self.index, self.generation)
    }
}

impl<K: HandleKind> fmt::Display for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", K::kind_name(), self.index)
    }
}

static NEXT_GENERATION: AtomicU32 = AtomicU32::new(1);

/// Allocates a generation unique within the process.
pub(crate) fn next_generation() -> u32 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

macro_rules! define_handle_kind {
    ($name:ident, $kind_name:literal, $alias:ident) => {
        #[doc = concat!("Marker type for ", $kind_name, " handles.")]
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl HandleKind for $name {
            fn kind_name() -> &'static str {
                $kind_name
            }
        }

        #[doc = concat!("Handle to a registered ", $kind_name, ".")]
        pub type $alias = Handle<$name>;
    };
}

define_handle_kind!(ResourceKind, "Resource", ResourceHandle);
define_handle_kind!(EntityKind, "Entity", EntityHandle);
