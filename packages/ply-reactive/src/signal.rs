//! A minimal read/write signal, grounded on `sycamore_reactive2::signal` but without
//! its dependency-tracking graph (the reconciler only needs the `Tag` contract of
//! `SPEC_FULL.md` §4.4, not automatic re-run-on-read semantics).

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::scheduler::{is_batching, queue_notify};

struct Inner<T> {
    value: T,
    next_id: usize,
    listeners: Vec<(usize, Rc<RefCell<Box<dyn FnMut(&T)>>>)>,
    /// Set while a notification for this signal is queued in the current batch, so
    /// that several `set` calls inside one `batch` coalesce into a single flush
    /// (contract: "multiple invalidations between flushes coalesce into a single
    /// `callback(value)`", §4.4).
    queued: bool,
}

/// The contract the keyed reconciler requires from its reactive source (§4.4): a
/// current value plus a subscribe hook that returns an unsubscribe handle.
pub trait Tag<T: Clone + 'static> {
    /// Returns a clone of the tag's current value.
    fn get_clone(&self) -> T;
    /// Registers `callback` to run whenever the tag's value changes. Returns a
    /// handle that detaches the callback; safe to call from inside `callback`
    /// itself.
    fn subscribe(&self, callback: Box<dyn FnMut(&T)>) -> Unsubscribe;
}

/// A handle returned by [`Tag::subscribe`]. Dropping it does *not* unsubscribe;
/// call [`Unsubscribe::unsubscribe`] explicitly, matching the explicit
/// subscribe/unsubscribe pairing in §4.4 (the reconciler unsubscribes in its own
/// destructor, not via `Drop`, so that unsubscription is ordered with the rest of
/// teardown).
pub struct Unsubscribe(Box<dyn FnOnce()>);

impl Unsubscribe {
    /// Detaches the subscribed callback. A no-op if the signal has already been
    /// dropped.
    pub fn unsubscribe(self) {
        (self.0)()
    }
}

/// A read-write reactive cell.
pub struct Signal<T: 'static>(Rc<RefCell<Inner<T>>>);

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

/// A read-only view of a [`Signal`]. This is what external code should hand the
/// reconciler as its `tag` input (§6): it exposes [`Tag`] but not `set`.
pub struct ReadSignal<T: 'static>(Rc<RefCell<Inner<T>>>);

impl<T> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

/// A write-only handle to a [`Signal`], for code that should update state but not
/// read it back (mirrors `sycamore_reactive2::signal::WriteSignal`).
pub struct WriteSignal<T: 'static>(Rc<RefCell<Inner<T>>>);

impl<T> Clone for WriteSignal<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

/// Creates a new signal with the given initial value.
pub fn create_signal<T: Clone + 'static>(value: T) -> Signal<T> {
    Signal(Rc::new(RefCell::new(Inner {
        value,
        next_id: 0,
        listeners: Vec::new(),
        queued: false,
    })))
}

impl<T: Clone + 'static> Signal<T> {
    /// Returns a read-only view of this signal.
    pub fn read(&self) -> ReadSignal<T> {
        ReadSignal(self.0.clone())
    }

    /// Returns a write-only view of this signal.
    pub fn write(&self) -> WriteSignal<T> {
        WriteSignal(self.0.clone())
    }

    /// Sets the signal's value and notifies subscribers (immediately, or at the end
    /// of the current [`crate::batch`] if one is in progress).
    pub fn set(&self, value: T) {
        self.0.borrow_mut().value = value;
        notify(&self.0);
    }
}

impl<T: Clone + 'static> WriteSignal<T> {
    /// Sets the signal's value. See [`Signal::set`].
    pub fn set(&self, value: T) {
        self.0.borrow_mut().value = value;
        notify(&self.0);
    }
}

fn subscribe<T: Clone + 'static>(
    inner: &Rc<RefCell<Inner<T>>>,
    callback: Box<dyn FnMut(&T)>,
) -> Unsubscribe {
    let id = {
        let mut b = inner.borrow_mut();
        let id = b.next_id;
        b.next_id += 1;
        b.listeners.push((id, Rc::new(RefCell::new(callback))));
        id
    };
    let weak: Weak<RefCell<Inner<T>>> = Rc::downgrade(inner);
    Unsubscribe(Box::new(move || {
        if let Some(inner) = weak.upgrade() {
            inner.borrow_mut().listeners.retain(|(lid, _)| *lid != id);
        }
    }))
}

fn notify<T: Clone + 'static>(inner: &Rc<RefCell<Inner<T>>>) {
    if is_batching() {
        let mut b = inner.borrow_mut();
        if b.queued {
            return;
        }
        b.queued = true;
        drop(b);
        let this = inner.clone();
        queue_notify(Rc::new(move || {
            this.borrow_mut().queued = false;
            do_notify(&this);
        }));
    } else {
        do_notify(inner);
    }
}

/// Clones the listener list (and current value) out from under the borrow before
/// invoking callbacks, so that a callback calling `set` on the same signal, or
/// `Unsubscribe::unsubscribe` on its own subscription, never re-enters a held
/// `RefCell` borrow. Mirrors `sycamore_reactive2::signal::WriteSignal::set`, which
/// clones `dependents` before invoking them for the same reason.
fn do_notify<T: Clone + 'static>(inner: &Rc<RefCell<Inner<T>>>) {
    let (value, listeners) = {
        let b = inner.borrow();
        (b.value.clone(), b.listeners.iter().map(|(_, f)| f.clone()).collect::<Vec<_>>())
    };
    for f in listeners {
        f.borrow_mut()(&value);
    }
}

impl<T: Clone + 'static> Tag<T> for Signal<T> {
    fn get_clone(&self) -> T {
        self.0.borrow().value.clone()
    }

    fn subscribe(&self, callback: Box<dyn FnMut(&T)>) -> Unsubscribe {
        subscribe(&self.0, callback)
    }
}

impl<T: Clone + 'static> Tag<T> for ReadSignal<T> {
    fn get_clone(&self) -> T {
        self.0.borrow().value.clone()
    }

    fn subscribe(&self, callback: Box<dyn FnMut(&T)>) -> Unsubscribe {
        subscribe(&self.0, callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch;

    #[test]
    fn get_set() {
        let state = create_signal(0);
        assert_eq!(state.get_clone(), 0);
        state.set(1);
        assert_eq!(state.get_clone(), 1);
    }

    #[test]
    fn subscribe_called_on_set() {
        let state = create_signal(0);
        let seen = create_signal(Vec::<i32>::new());
        let seen_for_cb = seen.clone();
        let _unsub = state.subscribe(Box::new(move |v| {
            let mut s = seen_for_cb.get_clone();
            s.push(*v);
            seen_for_cb.set(s);
        }));
        state.set(1);
        state.set(2);
        assert_eq!(seen.get_clone(), vec![1, 2]);
    }

    #[test]
    fn unsubscribe_stops_callback() {
        let state = create_signal(0);
        let counter = create_signal(0);
        let counter_for_cb = counter.clone();
        let unsub = state.subscribe(Box::new(move |_| {
            counter_for_cb.set(counter_for_cb.get_clone() + 1);
        }));
        state.set(1);
        assert_eq!(counter.get_clone(), 1);
        unsub.unsubscribe();
        state.set(2);
        assert_eq!(counter.get_clone(), 1);
    }

    #[test]
    fn unsubscribe_from_within_callback_is_safe() {
        let state = create_signal(0);
        let holder: Rc<RefCell<Option<Unsubscribe>>> = Rc::new(RefCell::new(None));
        let holder_for_cb = holder.clone();
        let unsub = state.subscribe(Box::new(move |_| {
            if let Some(u) = holder_for_cb.borrow_mut().take() {
                u.unsubscribe();
            }
        }));
        *holder.borrow_mut() = Some(unsub);
        state.set(1); // Should not panic even though the callback unsubscribes itself.
    }

    #[test]
    fn batch_coalesces_multiple_sets_into_one_notification() {
        let state = create_signal(0);
        let calls = create_signal(0);
        let calls_for_cb = calls.clone();
        let _unsub = state.subscribe(Box::new(move |_| {
            calls_for_cb.set(calls_for_cb.get_clone() + 1);
        }));
        batch(|| {
            state.set(1);
            state.set(2);
            state.set(3);
        });
        assert_eq!(calls.get_clone(), 1);
        assert_eq!(state.get_clone(), 3);
    }
}
