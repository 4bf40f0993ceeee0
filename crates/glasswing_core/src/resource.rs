//! # Resource Table
//!
//! Maps opaque texture handles handed to the module onto host-owned native
//! objects.
//!
//! Handles come from a counter that starts at 1 and only moves forward, so
//! a handle is never reissued within a session. Storage is a slot arena with
//! a free list; every slot carries a generation that is bumped on release,
//! and the handle index resolves to a generation-checked [`SlotKey`]. A
//! stale handle can therefore never reach the object that later reuses its
//! slot.

use std::collections::HashMap;
use std::num::NonZeroU32;

use crate::diagnostics::{Diagnostic, DiagnosticSender};

/// Opaque texture handle visible to the module.
///
/// `0` is reserved for "no texture" and never allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(NonZeroU32);

impl TextureHandle {
    /// Interprets a raw ABI value; `0` means "no texture".
    #[inline]
    #[must_use]
    pub fn from_raw(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    /// The raw ABI value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0.get()
    }
}

impl std::fmt::Display for TextureHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tex#{}", self.0)
    }
}

/// Generation-checked index into the slot arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey {
    index: u32,
    generation: u32,
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Handle table owning native resources of type `T`.
pub struct ResourceTable<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: HashMap<TextureHandle, SlotKey>,
    next_handle: Option<NonZeroU32>,
}

impl<T> ResourceTable<T> {
    /// Creates an empty table; the first handle issued is 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: HashMap::new(),
            next_handle: Some(NonZeroU32::MIN),
        }
    }

    /// Takes ownership of `value` and returns a fresh handle for it.
    ///
    /// Returns `None`, dropping `value`, once the 32-bit handle space is
    /// used up; handles are never recycled, so the table stays full.
    pub fn insert(&mut self, value: T) -> Option<TextureHandle> {
        let handle = TextureHandle(self.next_handle?);
        self.next_handle = handle.0.checked_add(1);

        let key = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.value = Some(value);
                SlotKey {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    value: Some(value),
                });
                SlotKey {
                    index,
                    generation: 0,
                }
            }
        };
        self.live.insert(handle, key);
        Some(handle)
    }

    /// Looks up a live handle.
    #[must_use]
    pub fn get(&self, handle: TextureHandle) -> Option<&T> {
        let key = self.live.get(&handle)?;
        self.resolve(*key)
    }

    /// Resolves a slot key, failing if the slot has been recycled since.
    fn resolve(&self, key: SlotKey) -> Option<&T> {
        let slot = self.slots.get(key.index as usize)?;
        if slot.generation == key.generation {
            slot.value.as_ref()
        } else {
            None
        }
    }

    #[cfg(test)]
    fn key_of(&self, handle: TextureHandle) -> Option<SlotKey> {
        self.live.get(&handle).copied()
    }

    /// Removes `handle` and returns its object so the caller can release it.
    ///
    /// Unknown or already removed handles return `None`.
    pub fn remove(&mut self, handle: TextureHandle) -> Option<T> {
        let key = self.live.remove(&handle)?;
        let slot = &mut self.slots[key.index as usize];
        let value = slot.value.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
        value
    }

    /// Number of live handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// True when no handle is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Removes every entry and returns the objects. The counter keeps going.
    pub fn drain(&mut self) -> Vec<(TextureHandle, T)> {
        let mut out = Vec::with_capacity(self.live.len());
        for (handle, key) in self.live.drain() {
            let slot = &mut self.slots[key.index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            if let Some(value) = slot.value.take() {
                out.push((handle, value));
            }
            self.free.push(key.index);
        }
        out
    }
}

impl<T> Default for ResourceTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves the texture a draw asked for.
///
/// A live handle is returned as is. An unknown or destroyed handle yields
/// `None`, so the draw goes out untextured, and reports one
/// [`Diagnostic::UnknownTextureOnDraw`].
pub fn resolve_texture<T>(
    table: &ResourceTable<T>,
    requested: Option<TextureHandle>,
    diagnostics: &DiagnosticSender,
) -> Option<TextureHandle> {
    let handle = requested?;
    if table.get(handle).is_some() {
        return Some(handle);
    }
    diagnostics.report(Diagnostic::UnknownTextureOnDraw {
        handle: handle.raw(),
    });
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics;

    #[test]
    fn test_handles_start_at_one_and_increment() {
        let mut table = ResourceTable::new();
        let a = table.insert("a").unwrap();
        let b = table.insert("b").unwrap();
        let c = table.insert("c").unwrap();
        assert_eq!((a.raw(), b.raw(), c.raw()), (1, 2, 3));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_zero_is_no_texture() {
        assert!(TextureHandle::from_raw(0).is_none());
        assert_eq!(TextureHandle::from_raw(9).map(TextureHandle::raw), Some(9));
    }

    #[test]
    fn test_destroy_then_create_never_reuses_handle() {
        let mut table = ResourceTable::new();
        let first = table.insert(10).unwrap();
        assert_eq!(table.remove(first), Some(10));
        let second = table.insert(20).unwrap();
        assert_ne!(first, second);
        assert!(second > first);
        assert!(table.get(first).is_none());
        assert_eq!(table.get(second), Some(&20));
    }

    #[test]
    fn test_stale_slot_key_does_not_alias_new_value() {
        let mut table = ResourceTable::new();
        let old = table.insert('x').unwrap();
        let stale_key = table.key_of(old).unwrap();
        table.remove(old);

        // The freed slot is recycled for the new value.
        let new = table.insert('y').unwrap();
        assert_eq!(table.resolve(stale_key), None);
        assert_eq!(table.resolve(table.key_of(new).unwrap()), Some(&'y'));
    }

    #[test]
    fn test_remove_unknown_is_none() {
        let mut table: ResourceTable<u8> = ResourceTable::new();
        let ghost = TextureHandle::from_raw(42).unwrap();
        assert_eq!(table.remove(ghost), None);
        let h = table.insert(1).unwrap();
        assert_eq!(table.remove(h), Some(1));
        assert_eq!(table.remove(h), None);
    }

    #[test]
    fn test_drain_keeps_counter() {
        let mut table = ResourceTable::new();
        table.insert(1).unwrap();
        table.insert(2).unwrap();
        assert_eq!(table.drain().len(), 2);
        assert!(table.is_empty());
        assert_eq!(table.insert(3).unwrap().raw(), 3);
    }

    #[test]
    fn test_exhausted_handle_space_returns_none() {
        let mut table = ResourceTable::new();
        table.next_handle = Some(NonZeroU32::MAX);
        let last = table.insert('a').unwrap();
        assert_eq!(last.raw(), u32::MAX);
        assert_eq!(table.insert('b'), None);
        assert_eq!(table.insert('c'), None);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(last), Some(&'a'));

        // Freeing a slot does not bring a handle back.
        table.remove(last);
        assert_eq!(table.insert('d'), None);
        assert!(table.is_empty());
    }

    #[test]
    fn test_resolve_texture_live_handle() {
        let (tx, rx) = diagnostics::channel(4);
        let mut table = ResourceTable::new();
        let live = table.insert(()).unwrap();
        assert_eq!(resolve_texture(&table, Some(live), &tx), Some(live));
        assert_eq!(resolve_texture(&table, None, &tx), None);
        assert!(rx.drain().is_empty());
    }

    #[test]
    fn test_resolve_texture_unknown_or_destroyed_falls_back() {
        let (tx, rx) = diagnostics::channel(4);
        let mut table = ResourceTable::new();
        let gone = table.insert(()).unwrap();
        table.remove(gone);
        let never = TextureHandle::from_raw(77);

        assert_eq!(resolve_texture(&table, Some(gone), &tx), None);
        assert_eq!(resolve_texture(&table, never, &tx), None);
        assert_eq!(
            rx.drain(),
            vec![
                Diagnostic::UnknownTextureOnDraw { handle: gone.raw() },
                Diagnostic::UnknownTextureOnDraw { handle: 77 },
            ]
        );
    }
}
