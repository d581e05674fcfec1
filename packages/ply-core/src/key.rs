//! Item keys (§3, §7): the identity the reconciler diffs on. Items
//! themselves stay opaque to the core; a [`KeyFor`] implementation is the
//! only thing allowed to look inside one.

use std::hash::Hash;
use std::rc::{Rc, Weak};

/// The diffing identity of one item. `Named` covers the common case (§3:
/// "otherwise the key is the named attribute of the item"); `Identity` is
/// the `@identity` sentinel, a lazily assigned opaque id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Identity(u64),
    Named(String),
}

impl Key {
    pub fn named(value: impl Into<String>) -> Self {
        Key::Named(value.into())
    }
}

/// A source of keys for a sequence of items of type `T`. Called once per
/// item per [`crate::keyed::KeyedReconciler::sync_list`] call, in order —
/// implementations that assign keys lazily (like [`IdentityKeyer`]) rely on
/// that ordering.
pub trait KeyFor<T> {
    fn key_for(&mut self, item: &T, index: usize) -> Key;
}

/// Keys items by a caller-supplied extractor, the "named attribute" case.
pub struct AttributeKeyer<F>(pub F);

impl<T, F: FnMut(&T) -> Key> KeyFor<T> for AttributeKeyer<F> {
    fn key_for(&mut self, item: &T, _index: usize) -> Key {
        (self.0)(item)
    }
}

/// The `@identity` sentinel (§3, §9) for items already behind an `Rc<U>`:
/// keys are assigned the first time a given allocation is seen, via a
/// `Weak` handle rather than a strong map — §9 explicitly calls out that a
/// strong identity map would leak ("do not silently use object identity via
/// a strong map"). Once an item's `Rc` is dropped, its weak entry is pruned
/// on the next lookup and the address can safely be reused by an unrelated
/// allocation without colliding with a stale key.
///
/// Items that can't produce an `Rc`-backed weak handle can't use this
/// keyer; use [`AttributeKeyer`] with a stable field instead.
pub struct IdentityKeyer<U> {
    next_id: u64,
    seen: Vec<(Weak<U>, Key)>,
}

impl<U> Default for IdentityKeyer<U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U> IdentityKeyer<U> {
    pub fn new() -> Self {
        Self { next_id: 0, seen: Vec::new() }
    }
}

impl<U> KeyFor<Rc<U>> for IdentityKeyer<U> {
    fn key_for(&mut self, item: &Rc<U>, _index: usize) -> Key {
        let addr = Rc::as_ptr(item) as usize;
        self.seen.retain(|(w, _)| w.strong_count() > 0);
        if let Some((_, key)) = self
            .seen
            .iter()
            .find(|(w, _)| w.upgrade().is_some_and(|u| Rc::as_ptr(&u) as usize == addr))
        {
            return key.clone();
        }
        let id = self.next_id;
        self.next_id += 1;
        let key = Key::Identity(id);
        self.seen.push((Rc::downgrade(item), key.clone()));
        key
    }
}

/// The `@identity` fallback for item types that aren't behind an `Rc` (§3:
/// "primitives fall back to `{string(item)}:{index}`"). Unlike
/// [`IdentityKeyer`], this needs no lazily-assigned id table: the key is a
/// pure function of the item's `Display` output and its position, so two
/// equal-looking items at different positions still get distinct keys.
#[derive(Default)]
pub struct DisplayIdentityKeyer;

impl<T: std::fmt::Display> KeyFor<T> for DisplayIdentityKeyer {
    fn key_for(&mut self, item: &T, index: usize) -> Key {
        Key::Named(format!("{item}:{index}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_keyer_uses_the_extractor() {
        let mut keyer = AttributeKeyer(|item: &(u32, &str)| Key::named(item.1));
        assert_eq!(keyer.key_for(&(1, "a"), 0), Key::named("a"));
        assert_eq!(keyer.key_for(&(2, "b"), 1), Key::named("b"));
    }

    #[test]
    fn identity_keyer_assigns_stable_keys_per_allocation() {
        let mut keyer: IdentityKeyer<u32> = IdentityKeyer::new();
        let a = Rc::new(1);
        let b = Rc::new(2);
        let key_a = keyer.key_for(&a, 0);
        let key_b = keyer.key_for(&b, 1);
        assert_ne!(key_a, key_b);
        assert_eq!(keyer.key_for(&a, 0), key_a);
    }

    #[test]
    fn identity_keyer_does_not_alias_a_reused_address() {
        let mut keyer: IdentityKeyer<u32> = IdentityKeyer::new();
        let a = Rc::new(1);
        let key_a = keyer.key_for(&a, 0);
        drop(a);
        // A fresh allocation may or may not reuse the address; either way it
        // must not be handed the stale key once the old `Rc` is gone.
        let c = Rc::new(3);
        let key_c = keyer.key_for(&c, 0);
        assert_ne!(key_c, key_a);
    }

    #[test]
    fn display_identity_keyer_keys_primitives_by_value_and_position() {
        let mut keyer = DisplayIdentityKeyer;
        assert_eq!(keyer.key_for(&7u32, 0), Key::named("7:0"));
        // Same value, different position: distinct keys.
        assert_ne!(keyer.key_for(&7u32, 1), keyer.key_for(&7u32, 0));
    }
}
