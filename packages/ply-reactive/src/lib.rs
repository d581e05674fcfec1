//! The reactive binding consumed by the `ply-core` keyed-list reconciler.
//!
//! This crate is intentionally small. The reconciler treats the reactive
//! cell/derived-cell primitive that feeds it as an external collaborator (see
//! `SPEC_FULL.md` §1) and only ever talks to it through the [`Tag`] trait:
//! a current value plus a subscribe hook. [`Signal`] is the one concrete `Tag`
//! shipped here, good enough to drive the reconciler in tests and in a real
//! application that doesn't already have its own signals crate.
//!
//! What is deliberately *not* here: dependency tracking, memos, effects that
//! automatically re-run when a signal they read changes. Those belong to the
//! "formula" primitive named in the spec as out of scope; reproducing
//! `sycamore-reactive`'s full dependency graph would be building the
//! collaborator, not the core.

mod scheduler;
mod signal;

pub use scheduler::batch;
pub use signal::{create_signal, ReadSignal, Signal, Tag, Unsubscribe, WriteSignal};
