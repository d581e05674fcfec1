//! The keyed reconciler itself (§4.5): syncs a host-tree segment, bounded by
//! two comment markers, to a new keyed array with as few host mutations as
//! possible.
//!
//! Grounded on `sycamore-core::render::reconcile_fragments` /
//! `sycamore-web::iter::Keyed` for the surrounding shape — a marker-bounded
//! segment, a fast path for "replace everything", append-mode batching via
//! a detached fragment — but *not* for the diff itself: the teacher's
//! `reconcile_fragments` is a prefix/suffix-trim-and-swap heuristic with a
//! hash-map fallback, while this algorithm is required to use a longest
//! increasing subsequence (§4.5 Phase 5) to find the minimal move set, so
//! the core loop below is original to this crate (see `src/lis.rs`).

use hashbrown::{HashMap, HashSet};
use std::cell::RefCell;
use std::rc::Rc;

#[cfg(feature = "async")]
use futures::future::{BoxFuture, FutureExt};
#[cfg(feature = "async")]
use futures::future::Shared;

use ply_reactive::{create_signal, Signal, Tag, Unsubscribe};

use crate::destroyable::DestroyableRegistry;
use crate::host::Host;
use crate::key::{Key, KeyFor};
use crate::lis::longest_increasing_subsequence;
use crate::tree::{ComponentTree, OwnerId};

/// The current position of an item within the list, handed to its factory.
/// Reactive in debug builds so item components can render "item N of M"
/// style content that stays correct across reorders; a plain snapshot in
/// release builds, since nothing re-derives it if it goes stale (§4.5,
/// Phase 4 state).
#[derive(Clone)]
pub enum IndexBinding {
    Reactive(Signal<usize>),
    Plain(usize),
}

impl IndexBinding {
    pub fn get(&self) -> usize {
        match self {
            IndexBinding::Reactive(s) => s.get_clone(),
            IndexBinding::Plain(i) => *i,
        }
    }

    fn set(&self, new_index: usize) {
        if let IndexBinding::Reactive(s) = self {
            s.set(new_index);
        }
    }
}

fn make_index_binding(index: usize) -> IndexBinding {
    if cfg!(debug_assertions) {
        IndexBinding::Reactive(create_signal(index))
    } else {
        IndexBinding::Plain(index)
    }
}

/// What an item's factory hands back to the reconciler (§4.5 state: "Row
/// (opaque to the core)"). `nodes` is the row's root host nodes, needed
/// only once, to place them relative to the marker; `owner` is the row's
/// own slot in the component tree, so nested owners (a row that is itself a
/// list) compose into the same ownership-checked teardown; `payload` is
/// whatever the caller wants kept alive for the row's lifetime and is never
/// inspected by the reconciler.
pub struct Row<H: Host, P> {
    pub nodes: Vec<H::Node>,
    pub owner: OwnerId,
    pub payload: P,
}

/// Diffs old against new keyed state and syncs a host-tree segment bounded
/// by `top_marker`/`bottom_marker` to match (§4.5).
pub struct KeyedReconciler<H: Host, T, P> {
    host: H,
    outlet: H::Node,
    top_marker: H::Node,
    bottom_marker: H::Node,
    owner: OwnerId,
    tree: Rc<RefCell<ComponentTree>>,
    registry: Rc<RefCell<DestroyableRegistry<OwnerId>>>,
    key_source: Box<dyn KeyFor<T>>,
    item_component: Box<dyn FnMut(T, IndexBinding, OwnerId) -> Row<H, P>>,

    key_map: HashMap<Key, Row<H, P>>,
    index_map: HashMap<Key, usize>,
    item_markers: HashMap<Key, H::Node>,
    marker_set: HashSet<H::Node>,
    index_bindings: HashMap<Key, IndexBinding>,
    is_first_render: bool,
    tag_unsub: Option<Unsubscribe>,

    #[cfg(feature = "async")]
    destroy_promise: Option<Shared<BoxFuture<'static, ()>>>,
}

impl<H, T, P> KeyedReconciler<H, T, P>
where
    H: Host + 'static,
    T: Clone + 'static,
    P: 'static,
{
    /// Builds a reconciler over `outlet`, syncs it once against `tag`'s
    /// current value, then subscribes so later changes flow in
    /// automatically. `top_marker` must already be connected inside
    /// `outlet`; the reconciler creates and inserts `bottom_marker` itself.
    pub fn new(
        host: H,
        tree: Rc<RefCell<ComponentTree>>,
        registry: Rc<RefCell<DestroyableRegistry<OwnerId>>>,
        ctx: OwnerId,
        outlet: H::Node,
        top_marker: H::Node,
        tag: impl Tag<Vec<T>> + 'static,
        key_source: impl KeyFor<T> + 'static,
        item_component: impl FnMut(T, IndexBinding, OwnerId) -> Row<H, P> + 'static,
    ) -> Rc<RefCell<Self>> {
        let bottom_marker = host.create_comment(None);
        let after_top = host.next_sibling(&top_marker);
        host.insert(&outlet, &bottom_marker, after_top.as_ref());

        let owner = {
            let mut t = tree.borrow_mut();
            let id = t.alloc();
            t.add_to_tree(ctx, id);
            id
        };

        let mut this = Self {
            host,
            outlet,
            top_marker,
            bottom_marker,
            owner,
            tree,
            registry,
            key_source: Box::new(key_source),
            item_component: Box::new(item_component),
            key_map: HashMap::new(),
            index_map: HashMap::new(),
            item_markers: HashMap::new(),
            marker_set: HashSet::new(),
            index_bindings: HashMap::new(),
            is_first_render: true,
            tag_unsub: None,
            #[cfg(feature = "async")]
            destroy_promise: None,
        };
        this.sync_list(tag.get_clone());

        let rc = Rc::new(RefCell::new(this));
        let weak = Rc::downgrade(&rc);
        let unsub = tag.subscribe(Box::new(move |items: &Vec<T>| {
            if let Some(strong) = weak.upgrade() {
                strong.borrow_mut().sync_list(items.clone());
            }
        }));
        rc.borrow_mut().tag_unsub = Some(unsub);
        rc
    }

    /// Syncs the segment to `new_items`, ignoring any deferred async
    /// cleanup a destructor returns (§4.2, §6 "synchronous reconciler").
    #[cfg_attr(feature = "trace", tracing::instrument(skip(self, new_items), fields(new_len = new_items.len())))]
    pub fn sync_list(&mut self, new_items: Vec<T>) {
        if new_items.is_empty() && !self.is_first_render && self.fast_cleanup() {
            self.is_first_render = false;
            return;
        }

        let (keys, keep) = self.compute_unique_keys(&new_items);
        let new_key_set: HashSet<Key> = keys
            .iter()
            .zip(keep.iter())
            .filter(|&(_, &k)| k)
            .map(|(k, _)| k.clone())
            .collect();

        let removed: Vec<(Key, usize)> = self
            .index_map
            .iter()
            .filter(|(k, _)| !new_key_set.contains(*k))
            .map(|(k, &i)| (k.clone(), i))
            .collect();

        let wiped = !self.key_map.is_empty() && removed.len() == self.key_map.len() && self.fast_cleanup();

        if !wiped {
            for (key, _) in &removed {
                self.destroy_row(key);
                self.remove_marker(key);
            }
            self.shift_surviving_indices(removed.iter().map(|(_, i)| *i).collect());
        }

        let deduped = Self::dedupe(new_items, keys, keep);
        self.reconcile_new_order(deduped);
        self.is_first_render = false;
    }

    /// Syncs the segment to `new_items`, returning once every phase through
    /// the move phase has run. If a previous call's async destructors are
    /// still outstanding, awaits them before touching this call's Phase 4
    /// onward (§5, §12 open question #2) — but does *not* wait for this
    /// call's own newly spawned destructors, which may still be in flight
    /// when the returned future resolves; the *next* `sync_list_async` call
    /// is the one that waits for those.
    #[cfg(feature = "async")]
    #[cfg_attr(feature = "trace", tracing::instrument(skip(self, new_items), fields(new_len = new_items.len())))]
    pub async fn sync_list_async(&mut self, new_items: Vec<T>) {
        let mut deferred: Vec<BoxFuture<'static, ()>> = Vec::new();

        if new_items.is_empty() && !self.is_first_render && self.fast_cleanup_async(&mut deferred) {
            self.fold_deferred_into_promise(deferred).await;
            self.is_first_render = false;
            return;
        }

        let (keys, keep) = self.compute_unique_keys(&new_items);
        let new_key_set: HashSet<Key> = keys
            .iter()
            .zip(keep.iter())
            .filter(|&(_, &k)| k)
            .map(|(k, _)| k.clone())
            .collect();

        let removed: Vec<(Key, usize)> = self
            .index_map
            .iter()
            .filter(|(k, _)| !new_key_set.contains(*k))
            .map(|(k, &i)| (k.clone(), i))
            .collect();

        let wiped = !self.key_map.is_empty()
            && removed.len() == self.key_map.len()
            && self.fast_cleanup_async(&mut deferred);

        if !wiped {
            for (key, _) in &removed {
                self.destroy_row_async(key, &mut deferred);
                self.remove_marker(key);
            }
            self.shift_surviving_indices(removed.iter().map(|(_, i)| *i).collect());
        }

        self.fold_deferred_into_promise(deferred).await;

        let deduped = Self::dedupe(new_items, keys, keep);
        self.reconcile_new_order(deduped);
        self.is_first_render = false;
    }

    /// Chains this call's freshly collected deferred destructor futures onto
    /// `destroy_promise`, after first awaiting whatever the *previous* call
    /// left outstanding (§5, §12 open question #2) — shared by every
    /// `fast_cleanup_async`/`destroy_row_async` call site so a full wipe and
    /// a partial removal go through the exact same await contract.
    #[cfg(feature = "async")]
    async fn fold_deferred_into_promise(&mut self, deferred: Vec<BoxFuture<'static, ()>>) {
        let prior = self.destroy_promise.take();
        if !deferred.is_empty() {
            self.destroy_promise = Some(futures::future::join_all(deferred).map(|_| ()).boxed().shared());
        }
        if let Some(prior) = prior {
            prior.await;
        }
    }

    /// Tears the whole reconciler down: unsubscribes from its tag, destroys
    /// every row and marker, removes both sentinels, and releases its own
    /// owner slot.
    pub fn destroy_sync(mut self) {
        if let Some(unsub) = self.tag_unsub.take() {
            unsub.unsubscribe();
        }
        let keys: Vec<Key> = self.key_map.keys().cloned().collect();
        for key in keys {
            self.destroy_row(&key);
            self.remove_marker(&key);
        }
        self.host.destroy(&self.top_marker);
        self.host.destroy(&self.bottom_marker);
        self.tree.borrow_mut().remove(self.owner);
    }

    /// Async teardown: first awaits any outstanding `destroy_promise`, then
    /// tears down every row (collecting and awaiting their own deferred
    /// futures too) before releasing the sentinels and this owner's slot.
    #[cfg(feature = "async")]
    pub async fn destroy_async(mut self) {
        if let Some(p) = self.destroy_promise.take() {
            p.await;
        }
        if let Some(unsub) = self.tag_unsub.take() {
            unsub.unsubscribe();
        }
        let keys: Vec<Key> = self.key_map.keys().cloned().collect();
        let mut deferred: Vec<BoxFuture<'static, ()>> = Vec::new();
        for key in keys {
            self.destroy_row_async(&key, &mut deferred);
            self.remove_marker(&key);
        }
        futures::future::join_all(deferred).await;
        self.host.destroy(&self.top_marker);
        self.host.destroy(&self.bottom_marker);
        self.tree.borrow_mut().remove(self.owner);
    }

    // ---- Phase 0 ------------------------------------------------------

    /// Moves both sentinels into a freshly created, unattached fragment, so
    /// that a subsequent bulk `clear_children` on the outlet destroys every
    /// other child without also destroying the sentinels themselves. `insert`
    /// re-parents an already-connected node rather than requiring a separate
    /// remove (§4.1), which is exactly what moving a live sentinel out from
    /// under the outlet needs.
    fn shield_sentinels(&self) {
        let scratch = self.host.create_fragment();
        self.host.insert(&scratch, &self.top_marker, None);
        self.host.insert(&scratch, &self.bottom_marker, None);
    }

    /// Reinserts both (still-live, untouched) sentinels as the outlet's sole
    /// children, after a bulk clear has removed everything else.
    fn restore_sentinels(&self) {
        self.host.insert(&self.outlet, &self.top_marker, None);
        self.host.insert(&self.outlet, &self.bottom_marker, None);
    }

    /// Bulk-clears the outlet and re-inserts both sentinels, but only when
    /// the sentinels are the outlet's sole children (§4.5 Phase 0, §12 open
    /// question #1): if the outlet holds foreign siblings the reconciler
    /// doesn't own, falling back to clearing them too would violate "no
    /// host node created by a destroyed key remains connected" in the wrong
    /// direction — it would destroy nodes that were never this
    /// reconciler's to destroy. Returns whether the fast path was taken.
    fn fast_cleanup(&mut self) -> bool {
        let first = self.host.first_child(&self.outlet);
        let last = self.host.last_child(&self.outlet);
        if first.as_ref() != Some(&self.top_marker) || last.as_ref() != Some(&self.bottom_marker) {
            return false;
        }

        self.shield_sentinels();

        let keys: Vec<Key> = self.key_map.keys().cloned().collect();
        for key in &keys {
            self.destroy_row(key);
        }
        self.host.clear_children(&self.outlet);
        self.restore_sentinels();

        self.key_map.clear();
        self.index_map.clear();
        self.item_markers.clear();
        self.marker_set.clear();
        self.index_bindings.clear();
        true
    }

    /// Async-aware counterpart of [`KeyedReconciler::fast_cleanup`]: destroys
    /// every row via [`KeyedReconciler::destroy_row_async`] instead of the
    /// synchronous path, so a full wipe folds its destructors' deferred
    /// futures into `deferred` (and from there into `destroy_promise`) the
    /// same way a partial removal does, rather than discarding them (§4.2,
    /// §5: an observer awaiting `destroy_promise` must see every destructor's
    /// deferred work, including a full-clear's).
    #[cfg(feature = "async")]
    fn fast_cleanup_async(&mut self, deferred: &mut Vec<BoxFuture<'static, ()>>) -> bool {
        let first = self.host.first_child(&self.outlet);
        let last = self.host.last_child(&self.outlet);
        if first.as_ref() != Some(&self.top_marker) || last.as_ref() != Some(&self.bottom_marker) {
            return false;
        }

        self.shield_sentinels();

        let keys: Vec<Key> = self.key_map.keys().cloned().collect();
        for key in &keys {
            self.destroy_row_async(key, deferred);
        }
        self.host.clear_children(&self.outlet);
        self.restore_sentinels();

        self.key_map.clear();
        self.index_map.clear();
        self.item_markers.clear();
        self.marker_set.clear();
        self.index_bindings.clear();
        true
    }

    // ---- key bookkeeping -----------------------------------------------

    /// Computes a key per item. In debug builds, a duplicate key panics
    /// immediately (§7: "debug builds: panic"); in release builds every
    /// occurrence after the first is marked for drop (§7: "release builds:
    /// silently collapse to first occurrence"), and `keep[i]` reflects that.
    fn compute_unique_keys(&mut self, items: &[T]) -> (Vec<Key>, Vec<bool>) {
        let mut seen = HashSet::with_capacity(items.len());
        let mut keys = Vec::with_capacity(items.len());
        let mut keep = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let key = self.key_source.key_for(item, i);
            let first = seen.insert(key.clone());
            if !first {
                #[cfg(debug_assertions)]
                panic!("ply_core: key_for_item produced a duplicate key at index {i}");
            }
            keys.push(key);
            keep.push(first);
        }
        (keys, keep)
    }

    fn dedupe(items: Vec<T>, keys: Vec<Key>, keep: Vec<bool>) -> Vec<(Key, T)> {
        items
            .into_iter()
            .zip(keys)
            .zip(keep)
            .filter_map(|((item, key), keep)| keep.then_some((key, item)))
            .collect()
    }

    // ---- Phase 1-3: removal -----------------------------------------

    fn shift_surviving_indices(&mut self, mut removed_old_indices: Vec<usize>) {
        removed_old_indices.sort_unstable();
        for idx in self.index_map.values_mut() {
            let shift = removed_old_indices.partition_point(|&r| r < *idx);
            *idx -= shift;
        }
    }

    fn destroy_row(&mut self, key: &Key) {
        self.index_map.remove(key);
        self.index_bindings.remove(key);
        if let Some(row) = self.key_map.remove(key) {
            self.destroy_owner_recursive(row.owner);
        }
    }

    #[cfg(feature = "async")]
    fn destroy_row_async(&mut self, key: &Key, deferred: &mut Vec<BoxFuture<'static, ()>>) {
        self.index_map.remove(key);
        self.index_bindings.remove(key);
        if let Some(row) = self.key_map.remove(key) {
            self.destroy_owner_recursive_async(row.owner, deferred);
        }
    }

    fn destroy_owner_recursive(&mut self, owner: OwnerId) {
        self.registry.borrow_mut().mark_destruction_started(owner);
        let children = self.tree.borrow().children(owner);
        for child in children {
            self.destroy_owner_recursive(child);
        }
        self.registry.borrow_mut().destroy_sync(owner);
        self.tree.borrow_mut().remove(owner);
    }

    #[cfg(feature = "async")]
    fn destroy_owner_recursive_async(&mut self, owner: OwnerId, deferred: &mut Vec<BoxFuture<'static, ()>>) {
        self.registry.borrow_mut().mark_destruction_started(owner);
        let children = self.tree.borrow().children(owner);
        for child in children {
            self.destroy_owner_recursive_async(child, deferred);
        }
        self.registry.borrow_mut().destroy(owner, deferred);
        self.tree.borrow_mut().remove(owner);
    }

    /// Destroys every host node belonging to `key`'s row, from its marker up
    /// to (excluding) the next marker or `bottom_marker` — the only way the
    /// reconciler can identify "this row's nodes" without inspecting `Row`
    /// itself, since a row may render any number of host nodes.
    fn remove_marker(&mut self, key: &Key) {
        let Some(marker) = self.item_markers.remove(key) else { return };
        self.marker_set.remove(&marker);
        let end = self.find_range_end(&marker);
        let mut cur = Some(marker);
        while let Some(node) = cur {
            if Some(&node) == end.as_ref() {
                break;
            }
            let next = self.host.next_sibling(&node);
            self.host.destroy(&node);
            cur = next;
        }
    }

    /// The host node that ends `marker`'s content range: the next marker in
    /// `marker_set`, or `bottom_marker` if none comes first.
    fn find_range_end(&self, marker: &H::Node) -> Option<H::Node> {
        let mut cur = self.host.next_sibling(marker);
        while let Some(n) = cur {
            if n == self.bottom_marker || self.marker_set.contains(&n) {
                return Some(n);
            }
            cur = self.host.next_sibling(&n);
        }
        None
    }

    // ---- Phase 4-9: reconcile new order -----------------------------

    fn reconcile_new_order(&mut self, deduped: Vec<(Key, T)>) {
        let key_order: Vec<Key> = deduped.iter().map(|(k, _)| k.clone()).collect();
        let total_survivors = self.key_map.len();
        let mut seen_keys = 0usize;
        let mut append_fragment: Option<H::Node> = if total_survivors == 0 {
            Some(self.host.create_fragment())
        } else {
            None
        };

        let mut exist_keys: Vec<Key> = Vec::new();
        let mut exist_old_idx: Vec<usize> = Vec::new();
        let mut fresh_moves: HashSet<Key> = HashSet::new();

        for (index, (key, item)) in deduped.into_iter().enumerate() {
            if let Some(&old_idx) = self.index_map.get(&key) {
                seen_keys += 1;
                exist_keys.push(key.clone());
                exist_old_idx.push(old_idx);
                self.index_map.insert(key.clone(), index);
                if let Some(binding) = self.index_bindings.get(&key) {
                    binding.set(index);
                }
                if append_fragment.is_none() && seen_keys == total_survivors {
                    append_fragment = Some(self.host.create_fragment());
                }
            } else {
                self.create_row(key.clone(), item, index);
                if let Some(frag) = append_fragment.clone() {
                    self.place_row(&key, &frag, None);
                } else {
                    fresh_moves.insert(key);
                }
            }
        }

        // Phase 5: LIS over survivors' old indices picks the rows that need
        // no physical move; everything else lands in `move_set`.
        let mut move_set: HashSet<Key> = HashSet::new();
        if exist_keys.len() == 1 {
            // A single survivor trivially forms its own LIS regardless of
            // its absolute old/new index, but if removals or insertions
            // around it shifted its position it still needs relocating.
            let new_idx = *self.index_map.get(&exist_keys[0]).expect("index_map has every survivor");
            if new_idx != exist_old_idx[0] {
                move_set.insert(exist_keys[0].clone());
            }
        } else if !exist_keys.is_empty() {
            let lis: HashSet<usize> = longest_increasing_subsequence(&exist_old_idx).into_iter().collect();
            for (pos, key) in exist_keys.iter().enumerate() {
                if !lis.contains(&pos) {
                    move_set.insert(key.clone());
                }
            }
        }

        // Phase 6: splice the append fragment in before any moves run, so
        // every marker the move phase might anchor against is already live.
        if let Some(frag) = append_fragment {
            let outlet = self.outlet.clone();
            let bottom = self.bottom_marker.clone();
            self.host.insert(&outlet, &frag, Some(&bottom));
        }

        // Phase 7-8: right-to-left move phase with a running anchor.
        self.move_phase(&key_order, &move_set, &fresh_moves);
    }

    fn create_row(&mut self, key: Key, item: T, index: usize) {
        let owner = {
            let mut tree = self.tree.borrow_mut();
            let id = tree.alloc();
            tree.add_to_tree(self.owner, id);
            id
        };
        let binding = make_index_binding(index);
        let marker = self.host.create_comment(None);
        self.item_markers.insert(key.clone(), marker.clone());
        self.marker_set.insert(marker);
        let row = (self.item_component)(item, binding.clone(), owner);
        self.key_map.insert(key.clone(), row);
        self.index_map.insert(key.clone(), index);
        self.index_bindings.insert(key, binding);
    }

    /// Inserts `key`'s marker into `parent` (before `anchor`, or appended if
    /// `anchor` is `None`), then its row's root nodes in the same spot —
    /// each subsequent insert lands immediately after the previous one
    /// since both are placed right before the same anchor.
    fn place_row(&mut self, key: &Key, parent: &H::Node, anchor: Option<&H::Node>) {
        let marker = self.item_markers.get(key).cloned().expect("marker exists for key");
        self.host.insert(parent, &marker, anchor);
        if let Some(row) = self.key_map.get(key) {
            for node in &row.nodes {
                self.host.insert(parent, node, anchor);
            }
        }
    }

    fn move_phase(&mut self, order: &[Key], move_set: &HashSet<Key>, fresh_moves: &HashSet<Key>) {
        let mut anchor = self.bottom_marker.clone();
        for key in order.iter().rev() {
            if !move_set.contains(key) && !fresh_moves.contains(key) {
                if let Some(marker) = self.item_markers.get(key) {
                    anchor = marker.clone();
                }
                continue;
            }
            if fresh_moves.contains(key) {
                let outlet = self.outlet.clone();
                self.place_row(key, &outlet, Some(&anchor));
            } else {
                self.relocate_item(key, &anchor);
            }
            anchor = self.item_markers.get(key).cloned().expect("marker exists for key");
        }
    }

    /// The relocation primitive (§4.5 Phase 8): moves `key`'s entire marker-
    /// bounded range in front of `anchor` in one batched splice via a
    /// detached fragment, rather than one host call per node.
    #[cfg_attr(feature = "trace", tracing::instrument(skip(self)))]
    fn relocate_item(&mut self, key: &Key, anchor: &H::Node) {
        let marker = self.item_markers.get(key).cloned().expect("marker exists for key");
        let end = self.find_range_end(&marker).unwrap_or_else(|| self.bottom_marker.clone());
        if &end == anchor {
            return;
        }
        let fragment = self.host.create_fragment();
        let mut cur = Some(marker);
        while let Some(node) = cur {
            if node == end {
                break;
            }
            let next = self.host.next_sibling(&node);
            self.host.insert(&fragment, &node, None);
            cur = next;
        }
        let outlet = self.outlet.clone();
        self.host.insert(&outlet, &fragment, Some(anchor));
    }
}

#[cfg(all(test, feature = "async"))]
mod async_tests {
    use super::*;
    use crate::key::AttributeKeyer;
    use crate::test_host::TestHost;
    use futures::executor::block_on;

    #[derive(Clone)]
    struct Item(&'static str);

    /// Holds no side effect of its own — the test tracks destruction solely
    /// through the registry destructor registered alongside each row, so
    /// that awaiting `destroy_promise` is the only thing that can append to
    /// `log`.
    struct Payload;

    fn deferred_destructor(key: &'static str, log: Rc<RefCell<Vec<&'static str>>>) -> Option<BoxFuture<'static, ()>> {
        Some(Box::pin(async move {
            log.borrow_mut().push(key);
        }))
    }

    #[test]
    fn next_sync_waits_for_previous_async_destroy_before_its_own_phase_four() {
        let host = TestHost::new();
        let outlet = host.create_labeled("outlet");
        let top_marker = host.create_comment(Some("top"));
        host.insert(&outlet, &top_marker, None);

        let tree = Rc::new(RefCell::new(ComponentTree::new()));
        let registry = Rc::new(RefCell::new(DestroyableRegistry::new()));
        let ctx = tree.borrow_mut().alloc();
        let log: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

        let registry_for_factory = registry.clone();
        let host_for_factory = host.clone();
        let log_for_factory = log.clone();

        let mut reconciler: KeyedReconciler<TestHost, Item, Payload> = block_on(async {
            let tag = ply_reactive::create_signal(vec![Item("a"), Item("b")]);
            let rc = KeyedReconciler::new(
                host.clone(),
                tree,
                registry,
                ctx,
                outlet.clone(),
                top_marker,
                tag,
                AttributeKeyer(|it: &Item| Key::named(it.0)),
                move |it: Item, _idx, owner| {
                    let node = host_for_factory.create_labeled(it.0);
                    let key = it.0;
                    registry_for_factory
                        .borrow_mut()
                        .register(owner, {
                            let log = log_for_factory.clone();
                            move || deferred_destructor(key, log)
                        });
                    Row { nodes: vec![node], owner, payload: Payload }
                },
            );
            Rc::try_unwrap(rc).ok().expect("sole owner").into_inner()
        });

        block_on(reconciler.sync_list_async(vec![Item("b")]));
        assert!(reconciler.destroy_promise.is_some());
        // The destructor future hasn't necessarily resolved the instant
        // `sync_list_async` returns; drive it to completion for this
        // assertion the way an external scheduler eventually would.
        block_on(async {
            if let Some(p) = reconciler.destroy_promise.clone() {
                p.await;
            }
        });
        assert_eq!(*log.borrow(), vec!["a"]);

        // A partial removal (not a full wipe, so the Phase 0 fast path is
        // never consulted) exercises the ordinary async destroy_row path.
        block_on(reconciler.sync_list_async(vec![Item("c")]));
        block_on(async {
            if let Some(p) = reconciler.destroy_promise.clone() {
                p.await;
            }
        });
        assert_eq!(log.borrow().len(), 2);
    }
}
