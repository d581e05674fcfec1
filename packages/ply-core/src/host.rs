//! The host adapter contract (§4.1): the one seam between the reconciler and
//! whatever tree of "real" nodes it is keeping in sync — a DOM, a terminal
//! widget tree, a scene graph. Grounded on
//! `sycamore-core::generic_node::GenericNode`, trimmed to exactly the
//! operations the reconciler calls.
//!
//! Every method here is total: implementations must not fail. A host that
//! can fail (an IO-backed tree, say) should buffer or panic internally
//! rather than push `Result` through the reconciler — the reconciler has no
//! error path of its own (§9).

/// A tree of nodes the reconciler can create comments in, insert into, and
/// tear down. `Node` is a cheap-to-clone handle (an `Rc`, an index, a raw
/// pointer wrapper) rather than the node's content.
pub trait Host: Clone {
    type Node: Clone + PartialEq + Eq + std::hash::Hash + std::fmt::Debug;

    /// Creates a new, unattached comment node. Comments are the reconciler's
    /// markers (§3) and are never shown to application code.
    fn create_comment(&self, label: Option<&str>) -> Self::Node;

    /// Creates a new, unattached fragment: a container whose children can be
    /// built up off-tree and then spliced into a real parent in one
    /// `insert` call. Host implementations backed by a real DOM should give
    /// this `DocumentFragment` semantics: inserting a fragment moves its
    /// children into the target parent and leaves the fragment itself empty
    /// and unattached.
    fn create_fragment(&self) -> Self::Node;

    /// Inserts `child` into `parent`, immediately before `anchor` if given,
    /// or at the end of `parent`'s children otherwise. If `child` is already
    /// connected somewhere else, this performs a move in addition to a
    /// connect (grounded on `GenericNode::insert_child_before`, which
    /// mutates a live tree in place rather than requiring remove-then-add).
    fn insert(&self, parent: &Self::Node, child: &Self::Node, anchor: Option<&Self::Node>);

    /// Detaches `node` from its parent (if connected) and releases any
    /// resources the host associates with it. Idempotent: destroying an
    /// already-detached node is a no-op.
    fn destroy(&self, node: &Self::Node);

    /// Returns `node`'s current parent, if connected.
    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Removes every child of `parent` without destroying `parent` itself.
    /// Used by the fast-empty path (§4.5 Phase 0) to clear a whole outlet in
    /// one host call instead of one `destroy` per child.
    fn clear_children(&self, parent: &Self::Node);

    /// Returns `true` if `node` is reachable from the host's root (used only
    /// diagnostically; the reconciler never branches production behavior on
    /// it).
    fn is_connected(&self, node: &Self::Node) -> bool;

    /// Returns `node`'s next sibling, if any. The move phase (§4.5 Phase 7)
    /// and marker-range lookups walk sibling chains rather than indexing
    /// into a materialized child list, since the reconciler never needs
    /// random access.
    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Returns `parent`'s first child, if any.
    fn first_child(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Returns `parent`'s last child, if any.
    fn last_child(&self, node: &Self::Node) -> Option<Self::Node>;
}
