//! An observable, segmented list container.
//!
//! [`SegmentedSequence`] stores its elements in fixed-size segments, so growing never copies
//! the elements already stored. It can also wrap an externally owned list and redirect every
//! operation to it.
//!
//! Every mutation goes through a two-phase event protocol: a cancelable *changing* event, the
//! mutation itself, then a *changed* event carrying the same payload. Handlers are plain
//! closures; registering one returns a [`Subscription`] that unregisters it when dropped.
//!
//! The crate is single-threaded: handlers live in `Rc`/`RefCell` registries. A filtered,
//! cursor-tracking view over any [`OrderedSource`] lives in the `segseq-view` crate.
#![cfg_attr(not(feature = "std"), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

#[cfg(test)]
extern crate std;

#[macro_use]
mod macros;

mod bridge;
mod change;
mod error;
mod external;
mod notify;
mod options;
mod segments;
mod sequence;

#[cfg(test)]
mod tests;

pub use bridge::{ItemHandler, ObservableItem, PropertyChanged};
pub use change::{
    ChangeAction, ChangeEvents, ChangedHandler, CollectionChange, CollectionChanging,
    OrderedSource, Pending,
};
pub use error::{Error, ErrorKind, Result};
pub use external::{ExternalList, SharedList};
pub use notify::{Handlers, Notifier, Subscription};
pub use options::{MessageHook, NameLookup, NameResolver, SequenceOptions, SetItemTranslator};
pub use sequence::SegmentedSequence;
