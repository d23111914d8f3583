//! A filtered, cursor-tracking view over a `segseq` collection.
//!
//! [`FilteredView`] keeps a materialized copy of the source items accepted by its filter chain
//! (a replaceable primary filter plus any number of secondary filters) and a single cursor.
//! The cursor follows the *identity* of the current item across refreshes: if the item is
//! still visible afterwards the cursor silently moves with it, otherwise it is invalidated to
//! [`Position::BeforeFirst`] and a [`CurrentChanged`] event fires.
//!
//! The view listens to the source's [`ChangeEvents`](segseq::ChangeEvents). Removals are
//! applied in place; every other change rebuilds the view. Refreshes can be held with
//! [`FilteredView::defer_refresh`] so several filter changes cost one rebuild.
#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

#[cfg(test)]
extern crate std;

#[macro_use]
mod macros;

mod cursor;
mod filter;
mod view;


pub use cursor::{
    CurrentChanged, CurrentChanging, CursorAnchor, Position, apply_anchor, capture_anchor,
};
pub use filter::{FilterId, Predicate};
pub use view::{FilteredView, RefreshGuard};
