//! The destroyable registry (§4.2): associates zero or more teardown
//! closures with an opaque owner, and runs them at most once each. Grounded
//! on `sycamore_reactive2::scope::ReactiveScopeInner::cleanups` (a `Vec` of
//! boxed closures run in registration order on scope disposal) generalized
//! to be keyed by an arbitrary owner rather than implicit "current scope".

use hashbrown::{HashMap, HashSet};
use std::hash::Hash;

#[cfg(feature = "async")]
use futures::future::BoxFuture;

/// A pending async cleanup a destructor may hand back instead of finishing
/// synchronously (§4.2, §5). Ignored by [`DestroyableRegistry::destroy_sync`];
/// collected by [`DestroyableRegistry::destroy`].
#[cfg(feature = "async")]
pub type Deferred = BoxFuture<'static, ()>;

#[cfg(not(feature = "async"))]
type Destructor = Box<dyn FnOnce()>;
#[cfg(feature = "async")]
type Destructor = Box<dyn FnOnce() -> Option<Deferred>>;

/// Tracks registered destructors per owner and enforces "each destructor
/// runs at most once" even under re-entrant or repeated `destroy` calls.
pub struct DestroyableRegistry<O: Eq + Hash + Copy> {
    destructors: HashMap<O, Vec<Destructor>>,
    started: HashSet<O>,
    destroyed: HashSet<O>,
}

impl<O: Eq + Hash + Copy> Default for DestroyableRegistry<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Eq + Hash + Copy> DestroyableRegistry<O> {
    pub fn new() -> Self {
        Self {
            destructors: HashMap::new(),
            started: HashSet::new(),
            destroyed: HashSet::new(),
        }
    }

    /// Registers a destructor under `owner`. Destructors for the same owner
    /// run in registration order when that owner is destroyed.
    #[cfg(not(feature = "async"))]
    pub fn register(&mut self, owner: O, destructor: impl FnOnce() + 'static) {
        self.destructors.entry(owner).or_default().push(Box::new(destructor));
    }

    /// Registers a destructor under `owner`. The destructor may return a
    /// [`Deferred`] future for work that can't finish synchronously (e.g. an
    /// exit transition); [`DestroyableRegistry::destroy_sync`] ignores it,
    /// [`DestroyableRegistry::destroy`] collects it.
    #[cfg(feature = "async")]
    pub fn register(&mut self, owner: O, destructor: impl FnOnce() -> Option<Deferred> + 'static) {
        self.destructors.entry(owner).or_default().push(Box::new(destructor));
    }

    /// Marks `owner` as having started destruction without running any
    /// destructors yet. Lets callers that recurse into an owner's subtree
    /// (the component tree's ownership-checked teardown, §4.3) guard against
    /// re-entering the same owner mid-walk.
    pub fn mark_destruction_started(&mut self, owner: O) {
        self.started.insert(owner);
    }

    pub fn is_destruction_started(&self, owner: O) -> bool {
        self.started.contains(&owner)
    }

    /// Runs every destructor registered for `owner`, in order, discarding
    /// any deferred future they return. A second call for the same owner is
    /// a no-op (double-destroy is explicitly allowed by §4.2, not an error).
    /// A destructor that panics is caught and logged; the remaining
    /// destructors for this owner still run (§7: "Destructor failure: a
    /// single destructor throws → log, continue remaining destructors").
    #[cfg(not(feature = "async"))]
    pub fn destroy_sync(&mut self, owner: O) {
        if !self.destroyed.insert(owner) {
            #[cfg(feature = "trace")]
            tracing::debug!("double-destroy of owner ignored");
            return;
        }
        self.started.insert(owner);
        if let Some(fns) = self.destructors.remove(&owner) {
            for f in fns {
                if std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || f())).is_err() {
                    #[cfg(feature = "trace")]
                    tracing::warn!("destructor panicked; continuing with remaining destructors");
                }
            }
        }
    }

    /// Synchronous destroy: runs every destructor, discarding any deferred
    /// future it returns. Use [`DestroyableRegistry::destroy`] when deferred
    /// futures must be awaited. See [`DestroyableRegistry::destroy`] for the
    /// panic-isolation contract.
    #[cfg(feature = "async")]
    pub fn destroy_sync(&mut self, owner: O) {
        if !self.destroyed.insert(owner) {
            #[cfg(feature = "trace")]
            tracing::debug!("double-destroy of owner ignored");
            return;
        }
        self.started.insert(owner);
        if let Some(fns) = self.destructors.remove(&owner) {
            for f in fns {
                if std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || f())).is_err() {
                    #[cfg(feature = "trace")]
                    tracing::warn!("destructor panicked; continuing with remaining destructors");
                }
            }
        }
    }

    /// Runs every destructor registered for `owner`, pushing any deferred
    /// future each one returns onto `pending` instead of awaiting it inline
    /// (the caller decides when and how to await the batch, §5). A
    /// destructor that panics is caught and logged rather than aborting the
    /// remaining destructors for this owner (§7).
    #[cfg(feature = "async")]
    pub fn destroy(&mut self, owner: O, pending: &mut Vec<Deferred>) {
        if !self.destroyed.insert(owner) {
            return;
        }
        self.started.insert(owner);
        if let Some(fns) = self.destructors.remove(&owner) {
            for f in fns {
                match std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || f())) {
                    Ok(Some(fut)) => pending.push(fut),
                    Ok(None) => {}
                    Err(_) => {
                        #[cfg(feature = "trace")]
                        tracing::warn!("destructor panicked; continuing with remaining destructors");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn runs_destructors_in_registration_order() {
        let mut reg: DestroyableRegistry<u32> = DestroyableRegistry::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let log = log.clone();
            reg.register(1, move || log.borrow_mut().push(i));
        }
        reg.destroy_sync(1);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn double_destroy_is_a_no_op() {
        let mut reg: DestroyableRegistry<u32> = DestroyableRegistry::new();
        let count = Rc::new(RefCell::new(0));
        let count_for_cb = count.clone();
        reg.register(1, move || *count_for_cb.borrow_mut() += 1);
        reg.destroy_sync(1);
        reg.destroy_sync(1);
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn a_panicking_destructor_does_not_stop_the_rest() {
        let mut reg: DestroyableRegistry<u32> = DestroyableRegistry::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        reg.register(1, || panic!("boom"));
        for i in 1..3 {
            let log = log.clone();
            reg.register(1, move || log.borrow_mut().push(i));
        }
        reg.destroy_sync(1);
        assert_eq!(*log.borrow(), vec![1, 2]);
    }

    #[test]
    fn destroy_of_unregistered_owner_is_a_no_op() {
        let mut reg: DestroyableRegistry<u32> = DestroyableRegistry::new();
        reg.destroy_sync(42);
    }

    #[test]
    fn mark_destruction_started_does_not_run_destructors() {
        let mut reg: DestroyableRegistry<u32> = DestroyableRegistry::new();
        let ran = Rc::new(RefCell::new(false));
        let ran_for_cb = ran.clone();
        reg.register(1, move || *ran_for_cb.borrow_mut() = true);
        reg.mark_destruction_started(1);
        assert!(reg.is_destruction_started(1));
        assert!(!*ran.borrow());
    }
}
