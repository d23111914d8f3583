use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::any::{Any, type_name};
use core::cell::{RefCell, RefMut};
use core::fmt;

use crate::bridge::{ItemBridges, ObservableItem, PropertyChanged};
use crate::change::{ChangeEvents, CollectionChange, CollectionChanging, OrderedSource, Pending};
use crate::external::{ExternalList, SharedList};
use crate::notify::{Handlers, Notifier, Subscription};
use crate::options::{NameLookup, SequenceOptions};
use crate::segments::Segments;
use crate::{Error, ErrorKind, Result};

enum Storage<T: 'static> {
    Owned(Segments<T>),
    Wrapped(Wrapped<T>),
}

struct Wrapped<T: 'static> {
    list: SharedList<T>,
    /// The list raises its own events, which are forwarded instead of raising ours.
    observable: bool,
    _forwarding: Vec<Subscription>,
}

impl<T: Clone + Default + 'static> Storage<T> {
    fn len(&self) -> usize {
        match self {
            Self::Owned(seg) => seg.len(),
            Self::Wrapped(w) => w.list.borrow().len(),
        }
    }

    fn item(&self, index: usize) -> Option<T> {
        match self {
            Self::Owned(seg) => seg.get(index).cloned(),
            Self::Wrapped(w) => w.list.borrow().item(index),
        }
    }

    fn with_item(&self, index: usize, f: impl FnOnce(&T)) {
        match self {
            Self::Owned(seg) => {
                if let Some(item) = seg.get(index) {
                    f(item);
                }
            }
            Self::Wrapped(w) => {
                if let Some(item) = w.list.borrow().item(index) {
                    f(&item);
                }
            }
        }
    }

    fn for_each(&self, f: &mut dyn FnMut(usize, &T)) {
        match self {
            Self::Owned(seg) => {
                for (i, item) in seg.iter().enumerate() {
                    f(i, item);
                }
            }
            Self::Wrapped(w) => w.list.borrow().for_each_item(f),
        }
    }

    fn position(&self, mut pred: impl FnMut(&T) -> bool) -> Option<usize> {
        match self {
            Self::Owned(seg) => seg.iter().position(pred),
            Self::Wrapped(w) => {
                let mut found = None;
                w.list.borrow().for_each_item(&mut |i, item| {
                    if found.is_none() && pred(item) {
                        found = Some(i);
                    }
                });
                found
            }
        }
    }
}

/// A growable sequence that never moves its elements in bulk.
///
/// Storage is a list of fixed-size segments. Growth appends segments; existing segments are
/// never copied or resized. Alternatively the sequence can wrap an external list, in which
/// case every operation is redirected to it.
///
/// Every mutation is bracketed by a cancelable *changing* event and a *changed* event (see
/// [`ChangeEvents`]). Handlers run synchronously on the mutating call stack. A handler cannot
/// mutate the sequence that is notifying it: the sequence is exclusively borrowed for the
/// whole operation.
pub struct SegmentedSequence<T: 'static> {
    options: SequenceOptions<T>,
    storage: Storage<T>,
    locked: bool,
    events: ChangeEvents<T>,
    item_changed: Notifier<PropertyChanged>,
    bridges: Rc<RefCell<Option<ItemBridges<T>>>>,
}

impl<T: Clone + Default + PartialEq + 'static> SegmentedSequence<T> {
    /// Creates an empty sequence with default options.
    pub fn new() -> Self {
        Self::from_storage(SequenceOptions::new(), Segments::new)
    }

    pub fn with_options(options: SequenceOptions<T>) -> Result<Self> {
        options.validate()?;
        Ok(Self::from_storage(options, Segments::new))
    }

    /// Creates an empty sequence whose first segment holds `capacity` slots.
    pub fn with_capacity(capacity: usize, options: SequenceOptions<T>) -> Result<Self> {
        options.validate()?;
        if capacity == 0 {
            return Err(Error::invalid_arg("capacity", "must be at least 1"));
        }
        Ok(Self::from_storage(options, |step| {
            Segments::with_capacity(step, capacity)
        }))
    }

    /// Adopts `items` as the first segment without copying the elements.
    pub fn from_vec(items: Vec<T>, options: SequenceOptions<T>) -> Result<Self> {
        options.validate()?;
        Ok(Self::from_storage(options, |step| {
            Segments::from_vec(step, items)
        }))
    }

    /// Creates a sequence that redirects every operation to `list`.
    pub fn wrapping(list: SharedList<T>, options: SequenceOptions<T>) -> Result<Self> {
        let mut seq = Self::with_options(options)?;
        seq.wrap_external(list)?;
        Ok(seq)
    }

    fn from_storage(
        options: SequenceOptions<T>,
        storage: impl FnOnce(usize) -> Segments<T>,
    ) -> Self {
        let segments = storage(options.growth_step);
        Self {
            options,
            storage: Storage::Owned(segments),
            locked: false,
            events: ChangeEvents::new(),
            item_changed: Handlers::new(),
            bridges: Rc::new(RefCell::new(None)),
        }
    }

    pub fn options(&self) -> &SequenceOptions<T> {
        &self.options
    }

    /// Replaces the options. A new growth step applies to segments allocated from now on.
    pub fn set_options(&mut self, options: SequenceOptions<T>) -> Result<()> {
        options.validate()?;
        if let Storage::Owned(seg) = &mut self.storage {
            seg.set_step(options.growth_step);
        }
        self.options = options;
        Ok(())
    }

    /// Clones the current options, applies `f`, then delegates to `set_options`.
    pub fn update_options(&mut self, f: impl FnOnce(&mut SequenceOptions<T>)) -> Result<()> {
        let mut next = self.options.clone();
        f(&mut next);
        self.set_options(next)
    }

    pub fn events(&self) -> &ChangeEvents<T> {
        &self.events
    }

    pub fn subscribe_changing(
        &self,
        f: impl Fn(&CollectionChanging<T>) + 'static,
    ) -> Subscription {
        self.events.subscribe_changing(f)
    }

    pub fn subscribe_changed(
        &self,
        f: impl Fn(&dyn OrderedSource<T>, &CollectionChange<T>) + 'static,
    ) -> Subscription {
        self.events.subscribe_changed(f)
    }

    /// Subscribes to element-level notifications re-raised by [`observe_items`].
    ///
    /// [`observe_items`]: Self::observe_items
    pub fn subscribe_item_changed(&self, f: impl Fn(&PropertyChanged) + 'static) -> Subscription {
        self.item_changed.subscribe(f)
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total slots across all segments. Equals `len()` when wrapping an external list.
    pub fn capacity(&self) -> usize {
        match &self.storage {
            Storage::Owned(seg) => seg.capacity(),
            Storage::Wrapped(w) => w.list.borrow().len(),
        }
    }

    pub fn segment_count(&self) -> usize {
        match &self.storage {
            Storage::Owned(seg) => seg.segment_count(),
            Storage::Wrapped(_) => 0,
        }
    }

    pub fn segment_capacities(&self) -> Vec<usize> {
        match &self.storage {
            Storage::Owned(seg) => seg.segment_capacities(),
            Storage::Wrapped(_) => Vec::new(),
        }
    }

    #[cfg(test)]
    pub(crate) fn segment_addrs(&self) -> Vec<usize> {
        match &self.storage {
            Storage::Owned(seg) => seg.block_addrs(),
            Storage::Wrapped(_) => Vec::new(),
        }
    }

    pub fn growth_step(&self) -> usize {
        match &self.storage {
            Storage::Owned(seg) => seg.step(),
            Storage::Wrapped(_) => self.options.growth_step,
        }
    }

    pub fn is_wrapped(&self) -> bool {
        matches!(self.storage, Storage::Wrapped(_))
    }

    pub fn is_read_only(&self) -> bool {
        self.options.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.options.read_only = read_only;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Permanently rejects further mutation with `Locked`.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    fn check_writable(&self) -> Result<()> {
        if self.locked {
            return Err(ErrorKind::Locked.into());
        }
        if self.options.read_only {
            return Err(ErrorKind::ReadOnly.into());
        }
        Ok(())
    }

    fn bounds_violation<R>(&self, index: usize, len: usize, quiet: impl FnOnce() -> R) -> Result<R> {
        if self.options.suppress_bounds_errors {
            return Ok(quiet());
        }
        Err(Error::out_of_bounds(index, len))
    }

    fn forwards_events(&self) -> bool {
        matches!(&self.storage, Storage::Wrapped(w) if w.observable)
    }

    /// Pre-change phase for operations whose events come from the wrapped list when it
    /// raises its own.
    fn prepare(&self, build: impl FnOnce() -> CollectionChange<T>) -> Option<Pending<T>> {
        if self.forwards_events() {
            return Some(Pending::silent());
        }
        self.events.prepare(build)
    }

    fn commit(&self, pending: Pending<T>) {
        self.events.commit(self, pending);
    }

    /// Returns a clone of the item at `index`.
    pub fn get(&self, index: usize) -> Result<T> {
        match self.storage.item(index) {
            Some(item) => Ok(item),
            None => self.bounds_violation(index, self.len(), T::default),
        }
    }

    /// Returns `Ok(true)` when the value was written. `Ok(false)` means a translator turned
    /// the write into a no-op, a changing handler vetoed it, or the index was out of range with
    /// bounds errors suppressed.
    pub fn set(&mut self, index: usize, value: T) -> Result<bool> {
        self.check_writable()?;
        let Some(old) = self.storage.item(index) else {
            return self.bounds_violation(index, self.len(), || false);
        };
        let value = match &self.options.set_item_translator {
            Some(translate) => {
                let translated = translate(&old, value);
                if translated == old {
                    return Ok(false);
                }
                translated
            }
            None => value,
        };

        let Some(pending) =
            self.prepare(|| CollectionChange::replaced(old.clone(), value.clone(), index))
        else {
            return Ok(false);
        };
        let applied = match &mut self.storage {
            Storage::Owned(seg) => {
                seg.set(index, value);
                true
            }
            Storage::Wrapped(w) => w.list.borrow_mut().set_item(index, value)?.is_some(),
        };
        if !applied {
            return Ok(false);
        }
        if let Some(mut bridges) = self.own_bridges() {
            self.storage
                .with_item(index, |item| bridges.replace(index, item));
        }
        strace!(index, "set");
        self.commit(pending);
        Ok(true)
    }

    /// Untyped write. Fails with `TypeMismatch` before touching anything when `value` is not
    /// a `T`.
    pub fn set_any(&mut self, index: usize, value: Box<dyn Any>) -> Result<bool> {
        self.check_writable()?;
        let value = value.downcast::<T>().map_err(|_| ErrorKind::TypeMismatch {
            expected: type_name::<T>(),
        })?;
        self.set(index, *value)
    }

    /// Inserts `value` at `index` (`0..=len`).
    pub fn insert(&mut self, index: usize, value: T) -> Result<bool> {
        self.check_writable()?;
        let len = self.len();
        if index > len {
            return self.bounds_violation(index, len, || false);
        }
        self.check_duplicate_name(&value)?;

        let Some(pending) = self.prepare(|| CollectionChange::added(value.clone(), index)) else {
            return Ok(false);
        };
        let applied = match &mut self.storage {
            Storage::Owned(seg) => {
                seg.insert(index, value);
                true
            }
            Storage::Wrapped(w) => w.list.borrow_mut().insert_item(index, value)?,
        };
        if !applied {
            return Ok(false);
        }
        if let Some(mut bridges) = self.own_bridges() {
            self.storage
                .with_item(index, |item| bridges.insert(index, item));
        }
        strace!(index, len = len + 1, "insert");
        self.commit(pending);
        Ok(true)
    }

    pub fn add(&mut self, value: T) -> Result<bool> {
        let len = self.len();
        self.insert(len, value)
    }

    /// Adds every item in order. Returns how many were applied.
    pub fn add_range(&mut self, items: impl IntoIterator<Item = T>) -> Result<usize> {
        let mut applied = 0usize;
        for item in items {
            if self.add(item)? {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Removes and returns the item at `index` (`0..len`). `Ok(None)` means the removal was
    /// vetoed or the index was out of range with bounds errors suppressed.
    pub fn remove_at(&mut self, index: usize) -> Result<Option<T>> {
        self.check_writable()?;
        let len = self.len();
        if index >= len {
            return self.bounds_violation(index, len, || None);
        }

        let Some(pending) = self.prepare(|| {
            CollectionChange::removed(self.storage.item(index).unwrap_or_default(), index)
        }) else {
            return Ok(None);
        };
        let removed = match &mut self.storage {
            Storage::Owned(seg) => Some(seg.remove(index)),
            Storage::Wrapped(w) => w.list.borrow_mut().remove_item(index)?,
        };
        if removed.is_some() {
            if let Some(mut bridges) = self.own_bridges() {
                bridges.remove(index);
            }
            strace!(index, len = len - 1, "remove_at");
            self.commit(pending);
        }
        Ok(removed)
    }

    /// Removes the first item equal to `value`.
    pub fn remove(&mut self, value: &T) -> Result<bool> {
        match self.index_of(value) {
            Some(index) => Ok(self.remove_at(index)?.is_some()),
            None => Ok(false),
        }
    }

    /// Moves the item at `from` to `to`, raising a single `Move` pair.
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<bool> {
        self.check_writable()?;
        let len = self.len();
        if from >= len {
            return self.bounds_violation(from, len, || false);
        }
        if to >= len {
            return self.bounds_violation(to, len, || false);
        }
        if from == to {
            return Ok(true);
        }

        let Some(pending) = self.prepare(|| {
            CollectionChange::moved(self.storage.item(from).unwrap_or_default(), from, to)
        }) else {
            return Ok(false);
        };
        let applied = match &mut self.storage {
            Storage::Owned(seg) => {
                let item = seg.remove(from);
                seg.insert(to, item);
                true
            }
            Storage::Wrapped(w) => {
                let mut list = w.list.borrow_mut();
                match list.remove_item(from)? {
                    Some(item) => list.insert_item(to, item)?,
                    None => false,
                }
            }
        };
        if !applied {
            return Ok(false);
        }
        if let Some(mut bridges) = self.own_bridges() {
            bridges.relocate(from, to);
        }
        self.commit(pending);
        Ok(true)
    }

    /// Removes everything, raising one `Reset` pair.
    pub fn clear(&mut self) -> Result<bool> {
        self.check_writable()?;
        let Some(pending) = self.events.prepare(CollectionChange::reset) else {
            return Ok(false);
        };
        self.events.begin_batch();
        let outcome = match &mut self.storage {
            Storage::Owned(seg) => {
                seg.clear();
                Ok(true)
            }
            Storage::Wrapped(w) => w.list.borrow_mut().clear_items(),
        };
        self.events.end_batch_discarding();
        let applied = outcome?;
        if let Some(bridges) = self.bridges.borrow_mut().as_mut() {
            bridges.clear();
        }
        self.commit(pending);
        Ok(applied)
    }

    /// Drops every segment and pre-sizes a fresh first segment of `capacity` slots.
    ///
    /// When wrapping an external list this clears the list; `capacity` is ignored.
    pub fn reset(&mut self, capacity: usize) -> Result<bool> {
        if self.is_wrapped() {
            return self.clear();
        }
        self.check_writable()?;
        let Some(pending) = self.events.prepare(CollectionChange::reset) else {
            return Ok(false);
        };
        if let Storage::Owned(seg) = &mut self.storage {
            seg.reset(capacity);
        }
        if let Some(bridges) = self.bridges.borrow_mut().as_mut() {
            bridges.clear();
        }
        self.commit(pending);
        Ok(true)
    }

    /// Rebuilds owned storage as a single segment holding exactly `len` slots.
    pub fn compact(&mut self) {
        if let Storage::Owned(seg) = &mut self.storage {
            seg.compact();
        }
    }

    /// Replaces the whole contents, raising one `Reset` pair.
    pub fn assign(&mut self, items: impl IntoIterator<Item = T>) -> Result<bool> {
        self.assign_vec(items.into_iter().collect())
    }

    /// Replaces the contents with a range of `items`.
    ///
    /// A positive `count` copies exactly `count` items starting at `start`, padding with
    /// `T::default()` past the end of `items`. Zero or a negative `count` copies everything
    /// from `start` except the last `|count|` items.
    pub fn assign_slice(&mut self, items: &[T], start: usize, count: isize) -> Result<bool> {
        let available = items.get(start..).unwrap_or_default();
        let selected = select_range(available.iter().cloned(), available.len(), count);
        self.assign_vec(selected)
    }

    /// Like [`assign_slice`](Self::assign_slice) for any iterable.
    pub fn assign_iter(
        &mut self,
        items: impl IntoIterator<Item = T>,
        start: usize,
        count: isize,
    ) -> Result<bool> {
        let available: Vec<T> = items.into_iter().skip(start).collect();
        let len = available.len();
        self.assign_vec(select_range(available.into_iter(), len, count))
    }

    fn assign_vec(&mut self, items: Vec<T>) -> Result<bool> {
        self.check_writable()?;
        let Some(pending) = self.events.prepare(CollectionChange::reset) else {
            return Ok(false);
        };
        self.events.begin_batch();
        let outcome = match &mut self.storage {
            Storage::Owned(seg) => {
                *seg = Segments::from_vec(seg.step(), items);
                Ok(true)
            }
            Storage::Wrapped(w) => w.list.borrow_mut().replace_items(items),
        };
        self.events.end_batch_discarding();
        let applied = outcome?;
        self.rebuild_bridges();
        self.commit(pending);
        Ok(applied)
    }

    /// Redirects all storage to `list`. Native storage is released first.
    ///
    /// If `list` raises its own change events they are forwarded verbatim as this sequence's
    /// events, and operations delegated to the list no longer raise events of their own.
    pub fn wrap_external(&mut self, list: SharedList<T>) -> Result<bool> {
        self.check_writable()?;
        let Some(pending) = self.events.prepare(CollectionChange::reset) else {
            return Ok(false);
        };
        if let Some(bridges) = self.bridges.borrow_mut().as_mut() {
            bridges.clear();
        }

        let mut forwarding = Vec::new();
        if let Some(theirs) = list.borrow().events() {
            let ours = self.events.clone();
            forwarding.push(theirs.subscribe_changing(move |event| {
                ours.forward_changing(event);
            }));
            let ours = self.events.clone();
            let bridges = Rc::clone(&self.bridges);
            forwarding.push(theirs.subscribe_changed(move |source, change| {
                if let Ok(mut slot) = bridges.try_borrow_mut() {
                    if let Some(bridges) = slot.as_mut() {
                        bridges.apply(source, change);
                    }
                }
                ours.raise_changed(source, change);
            }));
        }
        let observable = !forwarding.is_empty();
        self.storage = Storage::Wrapped(Wrapped {
            list,
            observable,
            _forwarding: forwarding,
        });
        sdebug!(observable, len = self.len(), "wrap_external");

        self.rebuild_bridges();
        self.commit(pending);
        Ok(true)
    }

    /// Leaves wrapped mode and returns the list handle. The sequence becomes empty.
    pub fn detach_external(&mut self) -> Result<Option<SharedList<T>>> {
        if !self.is_wrapped() {
            return Ok(None);
        }
        self.check_writable()?;
        let Some(pending) = self.events.prepare(CollectionChange::reset) else {
            return Ok(None);
        };
        let storage = core::mem::replace(
            &mut self.storage,
            Storage::Owned(Segments::new(self.options.growth_step)),
        );
        if let Some(bridges) = self.bridges.borrow_mut().as_mut() {
            bridges.clear();
        }
        sdebug!("detach_external");
        self.commit(pending);
        match storage {
            Storage::Wrapped(w) => Ok(Some(w.list)),
            Storage::Owned(_) => Ok(None),
        }
    }

    /// Runs `f` with per-operation events suppressed, then raises a single `Reset` if anything
    /// changed.
    pub fn batch_update(&mut self, f: impl FnOnce(&mut Self)) {
        self.events.begin_batch();
        f(self);
        self.events.end_batch(self);
    }

    pub fn swap(&mut self, a: usize, b: usize) -> Result<bool> {
        let first = self.get(a)?;
        let second = self.get(b)?;
        if a == b {
            return Ok(true);
        }
        Ok(self.set(a, second)? && self.set(b, first)?)
    }

    pub fn push(&mut self, value: T) -> Result<bool> {
        self.add(value)
    }

    /// Removes and returns the last item. `Ok(None)` means the removal was vetoed.
    ///
    /// # Panics
    ///
    /// Panics if the sequence is empty.
    pub fn pop(&mut self) -> Result<Option<T>> {
        let len = self.len();
        assert!(len > 0, "SegmentedSequence::pop called on an empty sequence");
        self.remove_at(len - 1)
    }

    pub fn first(&self) -> Result<T> {
        self.get(0)
    }

    pub fn last(&self) -> Result<T> {
        match self.len().checked_sub(1) {
            Some(index) => self.get(index),
            None => self.bounds_violation(0, 0, T::default),
        }
    }

    pub fn index_of(&self, value: &T) -> Option<usize> {
        self.storage.position(|item| item == value)
    }

    pub fn contains(&self, value: &T) -> bool {
        self.index_of(value).is_some()
    }

    /// Finds the first item named `name`, using the configured case sensitivity.
    pub fn index_of_name(&self, name: &str) -> Result<Option<usize>> {
        let lookup = NameLookup {
            ignore_case: self.options.ignore_name_case,
            required: false,
        };
        self.index_of_name_with(name, lookup)
    }

    /// Finds the first item named `name` by linear scan.
    ///
    /// Names are resolved from the live elements on every call, so they are never stale.
    pub fn index_of_name_with(&self, name: &str, lookup: NameLookup) -> Result<Option<usize>> {
        let resolver = self
            .options
            .name_resolver
            .as_ref()
            .ok_or(ErrorKind::NoNameResolver)?;
        let found = self.storage.position(|item| {
            resolver(item).is_some_and(|candidate| names_equal(&candidate, name, lookup.ignore_case))
        });
        match found {
            Some(index) => Ok(Some(index)),
            None if lookup.required => match self.options.not_found_message(name) {
                Some(message) => Err(ErrorKind::NameNotFound {
                    name: name.into(),
                    message,
                }
                .into()),
                None => Ok(None),
            },
            None => Ok(None),
        }
    }

    /// Named indexer. Fails with `NameNotFound` unless the not-found hook suppresses it.
    pub fn get_by_name(&self, name: &str) -> Result<Option<T>> {
        let lookup = NameLookup {
            ignore_case: self.options.ignore_name_case,
            required: true,
        };
        match self.index_of_name_with(name, lookup)? {
            Some(index) => self.get(index).map(Some),
            None => Ok(None),
        }
    }

    fn check_duplicate_name(&self, value: &T) -> Result<()> {
        if self.options.allow_duplicate_names {
            return Ok(());
        }
        let Some(resolver) = self.options.name_resolver.as_ref() else {
            return Ok(());
        };
        let Some(name) = resolver(value) else {
            return Ok(());
        };
        let ignore_case = self.options.ignore_name_case;
        let taken = self
            .storage
            .position(|item| {
                resolver(item).is_some_and(|other| names_equal(&other, &name, ignore_case))
            })
            .is_some();
        if !taken {
            return Ok(());
        }
        match self.options.duplicate_message(&name) {
            Some(message) => Err(ErrorKind::DuplicateName { name, message }.into()),
            None => Ok(()),
        }
    }

    /// Visits every item in order without allocating.
    pub fn for_each(&self, mut f: impl FnMut(usize, &T)) {
        self.storage.for_each(&mut f);
    }

    pub fn to_vec(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len());
        self.for_each(|_, item| out.push(item.clone()));
        out
    }

    /// Stops re-raising element notifications and releases every element subscription.
    pub fn stop_observing_items(&mut self) {
        *self.bridges.borrow_mut() = None;
    }

    /// Number of live element subscriptions held by the sequence.
    pub fn observed_items(&self) -> usize {
        self.bridges.borrow().as_ref().map_or(0, ItemBridges::len)
    }

    fn rebuild_bridges(&mut self) {
        let mut slot = self.bridges.borrow_mut();
        let Some(bridges) = slot.as_mut() else {
            return;
        };
        bridges.clear();
        self.storage.for_each(&mut |_, item| bridges.push(item));
    }

    /// The bridges this sequence keeps in step itself. A wrapped list with its own events
    /// drives them through the forwarding subscription instead.
    fn own_bridges(&self) -> Option<RefMut<'_, ItemBridges<T>>> {
        if matches!(&self.storage, Storage::Wrapped(w) if w.observable) {
            return None;
        }
        RefMut::filter_map(self.bridges.borrow_mut(), Option::as_mut).ok()
    }
}

impl<T: ObservableItem + Clone + Default + PartialEq + 'static> SegmentedSequence<T> {
    /// Subscribes to every element's own change notifications and re-raises them through
    /// [`subscribe_item_changed`](Self::subscribe_item_changed).
    ///
    /// Elements are subscribed when they enter the sequence and released when they leave it
    /// (removal, replacement, clear, assign, re-wrap).
    pub fn observe_items(&mut self) {
        if self.bridges.borrow().is_some() {
            return;
        }
        *self.bridges.borrow_mut() = Some(ItemBridges::new(
            <T as ObservableItem>::observe,
            self.item_changed.clone(),
        ));
        self.rebuild_bridges();
    }
}

fn names_equal(a: &str, b: &str, ignore_case: bool) -> bool {
    if !ignore_case {
        return a == b;
    }
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

fn select_range<T: Default>(items: impl Iterator<Item = T>, available: usize, count: isize) -> Vec<T> {
    if count > 0 {
        let count = count as usize;
        let mut out: Vec<T> = items.take(count).collect();
        out.resize_with(count, T::default);
        out
    } else {
        let keep = available.saturating_sub(count.unsigned_abs());
        items.take(keep).collect()
    }
}

impl<T: Clone + Default + PartialEq + 'static> OrderedSource<T> for SegmentedSequence<T> {
    fn len(&self) -> usize {
        self.storage.len()
    }

    fn item(&self, index: usize) -> Option<T> {
        self.storage.item(index)
    }

    fn for_each_item(&self, f: &mut dyn FnMut(usize, &T)) {
        self.storage.for_each(f);
    }

    fn events(&self) -> Option<&ChangeEvents<T>> {
        Some(&self.events)
    }
}

impl<T: Clone + Default + PartialEq + 'static> ExternalList<T> for SegmentedSequence<T> {
    fn set_item(&mut self, index: usize, value: T) -> Result<Option<T>> {
        let old = self.get(index)?;
        Ok(self.set(index, value)?.then_some(old))
    }

    fn insert_item(&mut self, index: usize, value: T) -> Result<bool> {
        self.insert(index, value)
    }

    fn remove_item(&mut self, index: usize) -> Result<Option<T>> {
        self.remove_at(index)
    }

    fn clear_items(&mut self) -> Result<bool> {
        self.clear()
    }

    fn replace_items(&mut self, items: Vec<T>) -> Result<bool> {
        self.assign_vec(items)
    }
}

impl<T: Clone + Default + PartialEq + 'static> Default for SegmentedSequence<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Default + PartialEq + 'static> FromIterator<T> for SegmentedSequence<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let items: Vec<T> = iter.into_iter().collect();
        Self::from_storage(SequenceOptions::new(), |step| Segments::from_vec(step, items))
    }
}

impl<T: Clone + Default + PartialEq + fmt::Debug + 'static> fmt::Debug for SegmentedSequence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmentedSequence")
            .field("items", &self.to_vec())
            .field("segments", &self.segment_capacities())
            .field("wrapped", &self.is_wrapped())
            .field("locked", &self.locked)
            .finish_non_exhaustive()
    }
}
