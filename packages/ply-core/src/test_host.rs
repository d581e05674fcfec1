//! An in-memory [`Host`] used by this crate's own tests and by downstream
//! integration tests (enabled via the `test-util` feature). Not part of the
//! crate's production surface — a real host is a DOM, a widget tree, or
//! similar, supplied by the embedding application.

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use crate::host::Host;

struct TestNodeData {
    label: String,
    is_fragment: bool,
    destroyed: bool,
    parent: Option<TestNode>,
    children: Vec<TestNode>,
}

/// A node handle into the in-memory test tree. Identity is by allocation
/// (`Rc::ptr_eq`), matching how a real DOM node handle behaves.
#[derive(Clone)]
pub struct TestNode(Rc<RefCell<TestNodeData>>);

impl TestNode {
    fn new(label: impl Into<String>, is_fragment: bool) -> Self {
        Self(Rc::new(RefCell::new(TestNodeData {
            label: label.into(),
            is_fragment,
            destroyed: false,
            parent: None,
            children: Vec::new(),
        })))
    }

    pub fn label(&self) -> String {
        self.0.borrow().label.clone()
    }

    pub fn child_labels(&self) -> Vec<String> {
        self.0.borrow().children.iter().map(|c| c.label()).collect()
    }

    fn is_fragment(&self) -> bool {
        self.0.borrow().is_fragment
    }
}

impl PartialEq for TestNode {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}
impl Eq for TestNode {}

impl Hash for TestNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Rc::as_ptr(&self.0) as usize).hash(state);
    }
}

impl fmt::Debug for TestNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TestNode({})", self.0.borrow().label)
    }
}

/// A stateless handle to the in-memory test tree; all state lives in the
/// [`TestNode`]s themselves, so cloning a `TestHost` is free.
#[derive(Clone, Default)]
pub struct TestHost;

impl TestHost {
    pub fn new() -> Self {
        Self
    }

    /// Creates a detached "content" node with the given label, standing in
    /// for whatever an item component would actually render.
    pub fn create_labeled(&self, label: impl Into<String>) -> TestNode {
        TestNode::new(label, false)
    }

    fn detach(&self, node: &TestNode) {
        let old_parent = node.0.borrow_mut().parent.take();
        if let Some(parent) = old_parent {
            parent.0.borrow_mut().children.retain(|c| c != node);
        }
    }

    fn destroy_recursive(&self, node: &TestNode) {
        let children = std::mem::take(&mut node.0.borrow_mut().children);
        for child in &children {
            self.destroy_recursive(child);
        }
        node.0.borrow_mut().destroyed = true;
    }
}

impl Host for TestHost {
    type Node = TestNode;

    fn create_comment(&self, label: Option<&str>) -> TestNode {
        TestNode::new(format!("#comment({})", label.unwrap_or_default()), false)
    }

    fn create_fragment(&self) -> TestNode {
        TestNode::new("#fragment", true)
    }

    fn insert(&self, parent: &TestNode, child: &TestNode, anchor: Option<&TestNode>) {
        debug_assert!(!parent.0.borrow().destroyed);
        debug_assert!(!child.0.borrow().destroyed);

        if child.is_fragment() {
            let kids = std::mem::take(&mut child.0.borrow_mut().children);
            for kid in kids {
                self.insert(parent, &kid, anchor);
            }
            return;
        }

        self.detach(child);
        {
            let mut p = parent.0.borrow_mut();
            let pos = match anchor {
                Some(a) => p.children.iter().position(|c| c == a).unwrap_or(p.children.len()),
                None => p.children.len(),
            };
            p.children.insert(pos, child.clone());
        }
        child.0.borrow_mut().parent = Some(parent.clone());
    }

    fn destroy(&self, node: &TestNode) {
        self.detach(node);
        self.destroy_recursive(node);
    }

    fn parent(&self, node: &TestNode) -> Option<TestNode> {
        node.0.borrow().parent.clone()
    }

    fn clear_children(&self, parent: &TestNode) {
        let children = std::mem::take(&mut parent.0.borrow_mut().children);
        for child in &children {
            child.0.borrow_mut().parent = None;
            self.destroy_recursive(child);
        }
    }

    fn is_connected(&self, node: &TestNode) -> bool {
        !node.0.borrow().destroyed && node.0.borrow().parent.is_some()
    }

    fn next_sibling(&self, node: &TestNode) -> Option<TestNode> {
        let parent = node.0.borrow().parent.clone()?;
        let p = parent.0.borrow();
        let pos = p.children.iter().position(|c| c == node)?;
        p.children.get(pos + 1).cloned()
    }

    fn first_child(&self, node: &TestNode) -> Option<TestNode> {
        node.0.borrow().children.first().cloned()
    }

    fn last_child(&self, node: &TestNode) -> Option<TestNode> {
        node.0.borrow().children.last().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_before_anchor_preserves_order() {
        let host = TestHost::new();
        let root = host.create_labeled("root");
        let a = host.create_labeled("a");
        let b = host.create_labeled("b");
        host.insert(&root, &b, None);
        host.insert(&root, &a, Some(&b));
        assert_eq!(root.child_labels(), vec!["a", "b"]);
    }

    #[test]
    fn fragment_insert_transplants_children_in_order() {
        let host = TestHost::new();
        let root = host.create_labeled("root");
        let frag = host.create_fragment();
        let a = host.create_labeled("a");
        let b = host.create_labeled("b");
        host.insert(&frag, &a, None);
        host.insert(&frag, &b, None);
        host.insert(&root, &frag, None);
        assert_eq!(root.child_labels(), vec!["a", "b"]);
    }

    #[test]
    fn destroy_detaches_and_marks_destroyed() {
        let host = TestHost::new();
        let root = host.create_labeled("root");
        let a = host.create_labeled("a");
        host.insert(&root, &a, None);
        host.destroy(&a);
        assert!(root.child_labels().is_empty());
    }
}
