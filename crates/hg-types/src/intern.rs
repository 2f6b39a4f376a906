//! Value-keyed interning for repeated byte strings.
//!
//! Changelogs repeat the same user names thousands of times and
//! manifests repeat directory-heavy paths; interning collapses those to
//! shared handles. This is purely a memory optimization: equality of
//! interned values never depends on pointer identity.

use std::borrow::Borrow;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bstr::{BStr, BString, ByteSlice};

/// A shared interned byte string.
pub type Interned = Arc<BString>;

#[derive(Clone, Eq)]
struct Slot(Interned);

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_slice() == other.0.as_slice()
    }
}

impl Hash for Slot {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.as_slice().hash(state);
    }
}

impl Borrow<[u8]> for Slot {
    fn borrow(&self) -> &[u8] {
        self.0.as_slice()
    }
}

/// Deduplicating pool of byte strings.
#[derive(Default)]
pub struct InternPool {
    slots: HashSet<Slot>,
}

impl InternPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the shared handle for `value`, allocating it on first
    /// sight.
    pub fn intern(&mut self, value: &[u8]) -> Interned {
        if let Some(slot) = self.slots.get(value) {
            return Arc::clone(&slot.0);
        }
        let handle: Interned = Arc::new(BString::from(value));
        self.slots.insert(Slot(Arc::clone(&handle)));
        handle
    }

    pub fn intern_bstr(&mut self, value: &BStr) -> Interned {
        self.intern(value.as_bytes())
    }

    /// Number of distinct values interned.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
