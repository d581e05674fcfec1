//! Host-agnostic keyed-collection reconciler.
//!
//! Diffs an old keyed array against a new one and syncs a comment-marker-
//! bounded segment of a host node tree to match, moving the fewest nodes
//! possible via a longest-increasing-subsequence diff. Pairs with
//! `ply-reactive`'s [`ply_reactive::Tag`] for the reactive source, but
//! treats it only through that trait — any signals crate implementing
//! `Tag` works.
//!
//! - [`host::Host`] — the adapter a real node tree implements (§4.1).
//! - [`destroyable::DestroyableRegistry`] — per-owner teardown closures
//!   (§4.2).
//! - [`tree::ComponentTree`] — the ownership-checked owner forest (§4.3).
//! - [`keyed::KeyedReconciler`] — the reconciler itself (§4.5).

pub mod destroyable;
pub mod host;
pub mod key;
pub mod keyed;
pub mod lis;
pub mod tree;

#[cfg(any(test, feature = "test-util"))]
pub mod test_host;

pub use destroyable::DestroyableRegistry;
pub use host::Host;
pub use key::{AttributeKeyer, DisplayIdentityKeyer, IdentityKeyer, Key, KeyFor};
pub use keyed::{IndexBinding, KeyedReconciler, Row};
pub use lis::longest_increasing_subsequence;
pub use tree::{ComponentTree, OwnerId};
