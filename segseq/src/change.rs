use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::Cell;
use core::fmt;

use crate::notify::{Handlers, Notifier, Subscription};

/// What kind of structural change happened to a collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChangeAction {
    Add,
    Remove,
    Replace,
    Move,
    /// The contents changed too much to be described item by item.
    Reset,
}

/// Describes one change to an ordered collection.
///
/// With `feature = "serde"`, this type implements `Serialize`/`Deserialize`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CollectionChange<T> {
    pub action: ChangeAction,
    pub new_items: Vec<T>,
    pub new_index: Option<usize>,
    pub old_items: Vec<T>,
    pub old_index: Option<usize>,
}

impl<T> CollectionChange<T> {
    pub fn added(item: T, index: usize) -> Self {
        Self {
            action: ChangeAction::Add,
            new_items: vec![item],
            new_index: Some(index),
            old_items: Vec::new(),
            old_index: None,
        }
    }

    pub fn removed(item: T, index: usize) -> Self {
        Self {
            action: ChangeAction::Remove,
            new_items: Vec::new(),
            new_index: None,
            old_items: vec![item],
            old_index: Some(index),
        }
    }

    pub fn replaced(old: T, new: T, index: usize) -> Self {
        Self {
            action: ChangeAction::Replace,
            new_items: vec![new],
            new_index: Some(index),
            old_items: vec![old],
            old_index: Some(index),
        }
    }

    pub fn moved(item: T, from: usize, to: usize) -> Self
    where
        T: Clone,
    {
        Self {
            action: ChangeAction::Move,
            new_items: vec![item.clone()],
            new_index: Some(to),
            old_items: vec![item],
            old_index: Some(from),
        }
    }

    pub fn reset() -> Self {
        Self {
            action: ChangeAction::Reset,
            new_items: Vec::new(),
            new_index: None,
            old_items: Vec::new(),
            old_index: None,
        }
    }
}

/// A change that is about to happen. Any handler may veto it with [`cancel`](Self::cancel).
pub struct CollectionChanging<T> {
    pub change: CollectionChange<T>,
    cancel: Cell<bool>,
}

impl<T> CollectionChanging<T> {
    pub fn new(change: CollectionChange<T>) -> Self {
        Self {
            change,
            cancel: Cell::new(false),
        }
    }

    pub fn cancel(&self) {
        self.cancel.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.get()
    }

    pub fn into_change(self) -> CollectionChange<T> {
        self.change
    }
}

impl<T: fmt::Debug> fmt::Debug for CollectionChanging<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionChanging")
            .field("change", &self.change)
            .field("cancelled", &self.cancel.get())
            .finish()
    }
}

/// An ordered, index-addressable collection that a view can read from.
pub trait OrderedSource<T> {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a clone of the item at `index`, or `None` when out of range.
    fn item(&self, index: usize) -> Option<T>;

    /// Visits every item in order.
    fn for_each_item(&self, f: &mut dyn FnMut(usize, &T));

    /// The change stream of this collection, if it raises one.
    fn events(&self) -> Option<&ChangeEvents<T>> {
        None
    }
}

/// The payload of a mutation between [`ChangeEvents::prepare`] and [`ChangeEvents::commit`].
#[must_use]
#[derive(Debug)]
pub struct Pending<T>(Option<CollectionChange<T>>);

impl<T> Pending<T> {
    /// A mutation whose events are raised by someone else.
    pub(crate) fn silent() -> Self {
        Self(None)
    }
}

/// Handler for post-change events. The collection passes itself so handlers can read it back.
pub type ChangedHandler<T> = dyn Fn(&dyn OrderedSource<T>, &CollectionChange<T>);

/// The changing/changed event pair raised by an observable collection.
///
/// While a batch is open (see [`begin_batch`](Self::begin_batch)) nothing is dispatched; the
/// batch remembers that something changed and [`end_batch`](Self::end_batch) raises a single
/// `Reset` instead.
pub struct ChangeEvents<T: 'static> {
    changing: Notifier<CollectionChanging<T>>,
    changed: Handlers<ChangedHandler<T>>,
    batch: Rc<BatchState>,
}

#[derive(Default)]
struct BatchState {
    depth: Cell<usize>,
    dirty: Cell<bool>,
}

impl<T: 'static> ChangeEvents<T> {
    pub fn new() -> Self {
        Self {
            changing: Handlers::new(),
            changed: Handlers::new(),
            batch: Rc::new(BatchState::default()),
        }
    }

    pub fn subscribe_changing(
        &self,
        f: impl Fn(&CollectionChanging<T>) + 'static,
    ) -> Subscription {
        self.changing.subscribe(f)
    }

    pub fn subscribe_changed(
        &self,
        f: impl Fn(&dyn OrderedSource<T>, &CollectionChange<T>) + 'static,
    ) -> Subscription {
        self.changed.insert(Rc::new(f))
    }

    /// Whether anyone would observe an event right now.
    pub fn is_observed(&self) -> bool {
        !self.is_batching() && (!self.changing.is_empty() || !self.changed.is_empty())
    }

    /// Runs the pre-change phase of a mutation.
    ///
    /// `build` is only called when a handler will see the payload. Returns `None` when a
    /// changing handler vetoed the mutation; the caller must then leave its state untouched.
    pub fn prepare(&self, build: impl FnOnce() -> CollectionChange<T>) -> Option<Pending<T>> {
        if self.is_batching() {
            self.batch.dirty.set(true);
            return Some(Pending(None));
        }
        if !self.is_observed() {
            return Some(Pending(None));
        }
        self.raise_changing(build()).map(|change| Pending(Some(change)))
    }

    /// Runs the post-change phase of a mutation started with [`prepare`](Self::prepare).
    pub fn commit(&self, source: &dyn OrderedSource<T>, pending: Pending<T>) {
        if let Some(change) = pending.0 {
            self.raise_changed(source, &change);
        }
    }

    pub fn is_batching(&self) -> bool {
        self.batch.depth.get() > 0
    }

    /// Dispatches a pre-change event. Returns the change back unless a handler vetoed it.
    pub fn raise_changing(&self, change: CollectionChange<T>) -> Option<CollectionChange<T>> {
        if self.is_batching() {
            self.batch.dirty.set(true);
            return Some(change);
        }
        if self.changing.is_empty() {
            return Some(change);
        }
        let event = CollectionChanging::new(change);
        self.changing.notify(&event);
        if event.is_cancelled() {
            return None;
        }
        Some(event.into_change())
    }

    /// Re-dispatches a pre-change event raised by another collection, sharing its cancel flag.
    pub fn forward_changing(&self, event: &CollectionChanging<T>) {
        if self.is_batching() {
            self.batch.dirty.set(true);
            return;
        }
        self.changing.notify(event);
    }

    pub fn raise_changed(&self, source: &dyn OrderedSource<T>, change: &CollectionChange<T>) {
        if self.is_batching() {
            self.batch.dirty.set(true);
            return;
        }
        for handler in self.changed.snapshot() {
            handler(source, change);
        }
    }

    pub fn begin_batch(&self) {
        let depth = self.batch.depth.get();
        self.batch.depth.set(depth.saturating_add(1));
    }

    /// Closes a batch. When the outermost batch closes after a change, raises one `Reset`.
    pub fn end_batch(&self, source: &dyn OrderedSource<T>) {
        let depth = self.batch.depth.get();
        debug_assert!(depth > 0, "batch depth underflow");
        let next = depth.saturating_sub(1);
        self.batch.depth.set(next);
        if next == 0 && self.batch.dirty.replace(false) {
            self.raise_changed(source, &CollectionChange::reset());
        }
    }

    /// Closes a batch without raising anything. Used by operations that raise their own
    /// `Reset` pair around a multi-step mutation.
    pub fn end_batch_discarding(&self) {
        let depth = self.batch.depth.get();
        debug_assert!(depth > 0, "batch depth underflow");
        let next = depth.saturating_sub(1);
        self.batch.depth.set(next);
        if next == 0 {
            self.batch.dirty.set(false);
        }
    }

    pub fn changing_handlers(&self) -> usize {
        self.changing.len()
    }

    pub fn changed_handlers(&self) -> usize {
        self.changed.len()
    }
}

impl<T: 'static> Default for ChangeEvents<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Clone for ChangeEvents<T> {
    fn clone(&self) -> Self {
        Self {
            changing: self.changing.clone(),
            changed: self.changed.clone(),
            batch: Rc::clone(&self.batch),
        }
    }
}

impl<T: 'static> fmt::Debug for ChangeEvents<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeEvents")
            .field("changing", &self.changing.len())
            .field("changed", &self.changed.len())
            .field("batch_depth", &self.batch.depth.get())
            .finish()
    }
}
