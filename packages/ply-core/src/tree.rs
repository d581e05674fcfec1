//! The component tree (§4.3): a forest of owner ids, used to find and tear
//! down a subtree without ever touching a stale id.
//!
//! The spec's own prose flags the ownership check (`TREE[id] is this`) as
//! the single most subtle invariant in the whole system, because in a
//! language with plain-integer ids and a free-list, a released id can be
//! handed back out to a brand new owner before an in-flight async
//! destructor for the *old* owner finishes — and without the check, that
//! destructor would tear down the new owner's subtree instead. §9 names the
//! fix directly: "re-architecture using generational indices... native
//! weak-map semantics". [`slotmap`] *is* that re-architecture: every
//! [`OwnerId`] carries a generation, so a stale key to a freed-and-reused
//! slot fails `get`/`remove` instead of aliasing the new occupant. Grounded
//! on `sycamore_reactive::node::NodeId` (`slotmap::new_key_type!`) and
//! `ReactiveNode { parent, children, .. }`.

use slotmap::SlotMap;

slotmap::new_key_type! {
    /// A component/row handle. Stale keys (from a destroyed-and-reused slot)
    /// are rejected by every [`ComponentTree`] method — this is the
    /// ownership check, enforced structurally rather than by comparison.
    pub struct OwnerId;
}

struct Node {
    parent: Option<OwnerId>,
    children: Vec<OwnerId>,
}

/// `PARENT`/`CHILD`/`TREE` from §4.3, combined into one slot map.
#[derive(Default)]
pub struct ComponentTree {
    slots: SlotMap<OwnerId, Node>,
}

impl ComponentTree {
    pub fn new() -> Self {
        Self { slots: SlotMap::with_key() }
    }

    /// Allocates a new, parentless owner.
    pub fn alloc(&mut self) -> OwnerId {
        self.slots.insert(Node { parent: None, children: Vec::new() })
    }

    /// Records `child` as a child of `parent`. Both must be live owners;
    /// a stale id is silently ignored rather than panicking, since by the
    /// time a caller observes staleness the right response is "nothing to
    /// attach to", not a crash (§4.3: ownership failures are routine, not
    /// exceptional).
    pub fn add_to_tree(&mut self, parent: OwnerId, child: OwnerId) {
        let parent_alive = self.slots.contains_key(parent);
        if let Some(node) = self.slots.get_mut(child) {
            node.parent = if parent_alive { Some(parent) } else { None };
        }
        if parent_alive {
            if let Some(node) = self.slots.get_mut(parent) {
                node.children.push(child);
            }
        }
    }

    /// Returns `id`'s direct children, in insertion order.
    pub fn children(&self, id: OwnerId) -> Vec<OwnerId> {
        self.slots.get(id).map(|n| n.children.clone()).unwrap_or_default()
    }

    pub fn parent_of(&self, id: OwnerId) -> Option<OwnerId> {
        self.slots.get(id).and_then(|n| n.parent)
    }

    pub fn is_alive(&self, id: OwnerId) -> bool {
        self.slots.contains_key(id)
    }

    /// Removes exactly `id`'s own slot and detaches it from its parent's
    /// child list. Does **not** recurse into `id`'s children — callers that
    /// need a whole-subtree teardown (the keyed reconciler's row/owner
    /// destruction) must walk [`ComponentTree::children`] themselves and
    /// remove children before the parent, so that destructor side effects
    /// (via the destroyable registry) run bottom-up.
    ///
    /// This *is* the "`TREE[id] is this`" ownership check (§4.3): if `id`
    /// is stale — its slot was already removed and `OwnerId`'s generation
    /// has moved on, possibly to a brand new owner — `SlotMap::remove`
    /// returns `None` and this is a no-op. Returns whether a live slot was
    /// actually removed.
    pub fn remove(&mut self, id: OwnerId) -> bool {
        let Some(node) = self.slots.remove(id) else {
            return false;
        };
        if let Some(parent) = node.parent {
            if let Some(parent_node) = self.slots.get_mut(parent) {
                parent_node.children.retain(|c| *c != id);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_child_bookkeeping() {
        let mut tree = ComponentTree::new();
        let root = tree.alloc();
        let a = tree.alloc();
        let b = tree.alloc();
        tree.add_to_tree(root, a);
        tree.add_to_tree(root, b);
        assert_eq!(tree.children(root), vec![a, b]);
        assert_eq!(tree.parent_of(a), Some(root));
    }

    #[test]
    fn remove_detaches_from_parent() {
        let mut tree = ComponentTree::new();
        let root = tree.alloc();
        let a = tree.alloc();
        tree.add_to_tree(root, a);
        assert!(tree.remove(a));
        assert_eq!(tree.children(root), Vec::<OwnerId>::new());
        assert!(!tree.is_alive(a));
    }

    #[test]
    fn stale_id_after_reuse_is_rejected() {
        let mut tree = ComponentTree::new();
        let a = tree.alloc();
        assert!(tree.remove(a));
        // A freed slot may be handed back out with a bumped generation; `a`
        // itself must never alias the new occupant.
        let b = tree.alloc();
        assert!(!tree.remove(a));
        assert!(tree.is_alive(b));
    }

    #[test]
    fn double_remove_is_a_no_op() {
        let mut tree = ComponentTree::new();
        let a = tree.alloc();
        assert!(tree.remove(a));
        assert!(!tree.remove(a));
    }
}
