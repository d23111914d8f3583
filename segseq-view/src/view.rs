use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::fmt;

use segseq::{
    ChangeAction, ChangeEvents, CollectionChange, Error, ErrorKind, Handlers, Notifier,
    OrderedSource, Result, SegmentedSequence, Subscription,
};

use crate::cursor::{
    CurrentChanged, CurrentChanging, CursorAnchor, Position, apply_anchor, capture_anchor,
};
use crate::filter::{FilterChain, FilterId, Predicate};

/// A filtered, cursor-tracking projection of an ordered source.
///
/// The view keeps its own materialized copy of the accepted items, in source order. It
/// refreshes once on construction, after every filter change and whenever the source reports
/// a change (removals are applied in place). A single cursor tracks the current item across
/// refreshes by identity rather than by index.
///
/// All methods take `&self`; the view is meant to be shared by `Rc` between the code that
/// drives it and the handlers that observe it.
pub struct FilteredView<T: 'static, S: OrderedSource<T> + 'static = SegmentedSequence<T>> {
    source: Rc<RefCell<S>>,
    shared: Rc<Shared<T>>,
    _source_changed: Option<Subscription>,
}

struct Shared<T: 'static> {
    state: RefCell<ViewState<T>>,
    locks: Cell<usize>,
    pending: Cell<bool>,
    refreshing: Cell<bool>,
    events: ChangeEvents<T>,
    current_changing: Notifier<CurrentChanging>,
    current_changed: Notifier<CurrentChanged>,
}

struct ViewState<T: 'static> {
    items: SegmentedSequence<T>,
    filters: FilterChain<T>,
    position: Position,
    generation: u64,
}

impl<T: Clone + Default + PartialEq + 'static> ViewState<T> {
    /// Points the cursor back at the anchored item. Returns `true` when the item is gone and
    /// the cursor was reset to `BeforeFirst`.
    fn reanchor(&mut self, anchor: Option<&CursorAnchor<T>>) -> bool {
        let Some(anchor) = anchor else {
            return false;
        };
        match apply_anchor(&self.items, anchor) {
            Some(index) => {
                self.position = Position::At(index);
                false
            }
            None => {
                self.position = Position::BeforeFirst;
                true
            }
        }
    }
}

impl<T: Clone + Default + PartialEq + 'static> Shared<T> {
    fn new() -> Self {
        Self {
            state: RefCell::new(ViewState {
                items: SegmentedSequence::new(),
                filters: FilterChain::new(),
                position: Position::BeforeFirst,
                generation: 0,
            }),
            locks: Cell::new(0),
            pending: Cell::new(false),
            refreshing: Cell::new(false),
            events: ChangeEvents::new(),
            current_changing: Handlers::new(),
            current_changed: Handlers::new(),
        }
    }

    /// Returns `true` when the work must wait: a refresh lock is held or a refresh is already
    /// running further up the stack.
    fn defer(&self) -> bool {
        if self.locks.get() > 0 || self.refreshing.get() {
            self.pending.set(true);
            return true;
        }
        false
    }

    fn refresh_from(&self, source: &dyn OrderedSource<T>) {
        if self.defer() {
            return;
        }
        self.refreshing.set(true);
        loop {
            self.pending.set(false);
            self.rebuild(source);
            if !self.pending.get() {
                break;
            }
            vtrace!("refresh requested during refresh; running again");
        }
        self.refreshing.set(false);
    }

    fn rebuild(&self, source: &dyn OrderedSource<T>) {
        let (filters, anchor) = {
            let state = self.state.borrow();
            (
                state.filters.clone(),
                capture_anchor(&state.items, state.position),
            )
        };

        let mut accepted = Vec::new();
        source.for_each_item(&mut |_, item| {
            if filters.accepts(item) {
                accepted.push(item.clone());
            }
        });

        let (lost, previous) = {
            let mut state = self.state.borrow_mut();
            state.items = accepted.into_iter().collect();
            state.generation += 1;
            let previous = state.position;
            let lost = state.reanchor(anchor.as_ref());
            vdebug!(
                generation = state.generation,
                len = state.items.len(),
                lost,
                "view refreshed"
            );
            (lost, previous)
        };

        if lost {
            self.current_changed.notify(&CurrentChanged {
                previous,
                position: Position::BeforeFirst,
            });
        }
        self.raise_changed(&[CollectionChange::reset()]);
    }

    /// Removes the accepted items of a contiguous source removal at `at`, then re-anchors the
    /// cursor. Falls back to a full refresh when the view does not hold the expected items.
    fn apply_removal(&self, source: &dyn OrderedSource<T>, removed: &[T], at: usize) {
        if self.defer() {
            return;
        }
        // A deferred refresh leaves `items` stale, so positions no longer map onto the source.
        if self.pending.get() {
            self.refresh_from(source);
            return;
        }
        let filters = self.state.borrow().filters.clone();
        let accepted: Vec<&T> = removed.iter().filter(|item| filters.accepts(item)).collect();
        if accepted.is_empty() {
            return;
        }

        // Source items before `at` are untouched, so they map onto the first `offset` view items.
        let mut offset = 0usize;
        source.for_each_item(&mut |i, item| {
            if i < at && filters.accepts(item) {
                offset += 1;
            }
        });

        let outcome = {
            let mut state = self.state.borrow_mut();
            let anchor = capture_anchor(&state.items, state.position);
            let expected = accepted.len();
            let mut changes = Vec::with_capacity(expected);
            for item in accepted {
                if state.items.get(offset).ok().as_ref() != Some(item) {
                    break;
                }
                if let Ok(Some(old)) = state.items.remove_at(offset) {
                    changes.push(CollectionChange::removed(old, offset));
                }
            }
            if changes.len() == expected {
                state.generation += 1;
                let previous = state.position;
                let lost = state.reanchor(anchor.as_ref());
                Some((changes, lost, previous))
            } else {
                None
            }
        };

        let Some((changes, lost, previous)) = outcome else {
            vdebug!(at, "view out of step with removal; refreshing");
            self.refresh_from(source);
            return;
        };
        vtrace!(at, removed = changes.len(), lost, "view applied removal");
        if lost {
            self.current_changed.notify(&CurrentChanged {
                previous,
                position: Position::BeforeFirst,
            });
        }
        self.raise_changed(&changes);
    }

    fn on_source_changed(&self, source: &dyn OrderedSource<T>, change: &CollectionChange<T>) {
        match (change.action, change.old_index) {
            (ChangeAction::Remove, Some(at)) if !change.old_items.is_empty() => {
                self.apply_removal(source, &change.old_items, at)
            }
            _ => self.refresh_from(source),
        }
    }

    /// Dispatches view changes against a snapshot, so handlers may freely call back into the
    /// view.
    fn raise_changed(&self, changes: &[CollectionChange<T>]) {
        if self.events.changed_handlers() == 0 {
            return;
        }
        let snapshot = self.state.borrow().items.to_vec();
        for change in changes {
            self.events.raise_changed(&snapshot, change);
        }
    }
}

impl<T, S> FilteredView<T, S>
where
    T: Clone + Default + PartialEq + 'static,
    S: OrderedSource<T> + 'static,
{
    /// Creates a view over `source` and populates it.
    ///
    /// When the source raises change events the view follows them for as long as it lives.
    pub fn new(source: Rc<RefCell<S>>) -> Self {
        let shared = Rc::new(Shared::new());
        let source_changed = source.borrow().events().map(|events| {
            let weak: Weak<Shared<T>> = Rc::downgrade(&shared);
            events.subscribe_changed(move |source, change| {
                if let Some(shared) = weak.upgrade() {
                    shared.on_source_changed(source, change);
                }
            })
        });
        let view = Self {
            source,
            shared,
            _source_changed: source_changed,
        };
        view.refresh();
        view
    }

    pub fn source(&self) -> &Rc<RefCell<S>> {
        &self.source
    }

    /// Rebuilds the materialized items from the source.
    ///
    /// While a refresh lock is held, or while the source is being mutated, the refresh is
    /// recorded and runs later.
    pub fn refresh(&self) {
        match self.source.try_borrow() {
            Ok(source) => self.shared.refresh_from(&*source),
            Err(_) => {
                self.shared.pending.set(true);
                vwarn!("source is busy; refresh deferred");
            }
        }
    }

    /// Holds refreshes until the returned guard (and every other guard) is dropped. Exactly
    /// one refresh runs then, if any was requested meanwhile.
    pub fn defer_refresh(&self) -> RefreshGuard<'_, T, S> {
        self.shared.locks.set(self.shared.locks.get() + 1);
        RefreshGuard { view: self }
    }

    /// Runs `f` under a refresh lock.
    pub fn batch_update<R>(&self, f: impl FnOnce(&Self) -> R) -> R {
        let _guard = self.defer_refresh();
        f(self)
    }

    pub fn is_refresh_deferred(&self) -> bool {
        self.shared.locks.get() > 0
    }

    /// Replaces the primary filter.
    pub fn set_filter(&self, predicate: impl Fn(&T) -> bool + 'static) {
        let predicate: Predicate<T> = Rc::new(predicate);
        self.shared
            .state
            .borrow_mut()
            .filters
            .set_primary(Some(predicate));
        self.refresh();
    }

    pub fn clear_filter(&self) {
        self.shared.state.borrow_mut().filters.set_primary(None);
        self.refresh();
    }

    pub fn has_filter(&self) -> bool {
        self.shared.state.borrow().filters.has_primary()
    }

    /// Appends a secondary filter, evaluated after the primary one and every earlier secondary.
    pub fn add_filter(&self, predicate: impl Fn(&T) -> bool + 'static) -> FilterId {
        let id = self.shared.state.borrow_mut().filters.add(Rc::new(predicate));
        self.refresh();
        id
    }

    /// Removes a secondary filter. Returns `false` (and does not refresh) for an unknown id.
    pub fn remove_filter(&self, id: FilterId) -> bool {
        let removed = self.shared.state.borrow_mut().filters.remove(id);
        if removed {
            self.refresh();
        }
        removed
    }

    /// Number of active filters, primary included.
    pub fn filter_count(&self) -> usize {
        self.shared.state.borrow().filters.len()
    }

    pub fn len(&self) -> usize {
        self.shared.state.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<T> {
        self.shared.state.borrow().items.get(index).ok()
    }

    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.shared.state.borrow().items.index_of(item)
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.shared.state.borrow().items.to_vec()
    }

    /// Incremented by every refresh and every in-place removal.
    pub fn generation(&self) -> u64 {
        self.shared.state.borrow().generation
    }

    pub fn current_position(&self) -> Position {
        self.shared.state.borrow().position
    }

    /// The cursor as a number in `-1..=len`.
    pub fn current_index(&self) -> isize {
        let state = self.shared.state.borrow();
        state.position.to_index(state.items.len())
    }

    pub fn current(&self) -> Option<T> {
        let state = self.shared.state.borrow();
        let index = state.position.index()?;
        state.items.get(index).ok()
    }

    /// Change events for the materialized items: `Reset` after each refresh and `Remove` for
    /// each in-place removal. Only changed events are raised.
    pub fn events(&self) -> &ChangeEvents<T> {
        &self.shared.events
    }

    pub fn subscribe_changed(
        &self,
        f: impl Fn(&dyn OrderedSource<T>, &CollectionChange<T>) + 'static,
    ) -> Subscription {
        self.shared.events.subscribe_changed(f)
    }

    pub fn subscribe_current_changing(
        &self,
        f: impl Fn(&CurrentChanging) + 'static,
    ) -> Subscription {
        self.shared.current_changing.subscribe(f)
    }

    pub fn subscribe_current_changed(
        &self,
        f: impl Fn(&CurrentChanged) + 'static,
    ) -> Subscription {
        self.shared.current_changed.subscribe(f)
    }

    /// Moves the cursor onto `item`, or clears the selection for `None`.
    ///
    /// Clearing cannot be vetoed. Fails with `ItemNotFound` when `item` is not in the view.
    pub fn move_to(&self, item: Option<&T>) -> Result<bool> {
        let Some(item) = item else {
            let previous = self.read_position()?;
            if previous == Position::BeforeFirst {
                return Ok(true);
            }
            self.write_position(Position::BeforeFirst)?;
            self.shared.current_changed.notify(&CurrentChanged {
                previous,
                position: Position::BeforeFirst,
            });
            return Ok(true);
        };
        let index = self.index_of(item).ok_or(ErrorKind::ItemNotFound)?;
        self.move_cursor(Position::At(index))
    }

    /// Moves the cursor to a numeric position in `-1..=len`.
    pub fn move_to_position(&self, index: isize) -> Result<bool> {
        let count = self.len();
        let Some(target) = Position::from_index(index, count) else {
            if index < 0 {
                return Err(Error::invalid_arg("position", "must be at least -1"));
            }
            return Err(Error::out_of_bounds(index as usize, count));
        };
        self.move_cursor(target)
    }

    /// Moves to the first item. Returns `Ok(false)` on an empty view.
    pub fn move_first(&self) -> Result<bool> {
        if self.is_empty() {
            return Ok(false);
        }
        self.move_cursor(Position::At(0))
    }

    /// Moves to the last item. Returns `Ok(false)` on an empty view.
    pub fn move_last(&self) -> Result<bool> {
        match self.len().checked_sub(1) {
            Some(last) => self.move_cursor(Position::At(last)),
            None => Ok(false),
        }
    }

    /// Moves one item forward. Past the last item the cursor becomes `AfterLast`; from there
    /// this is a no-op returning `Ok(false)`.
    pub fn move_next(&self) -> Result<bool> {
        let count = self.len();
        let target = match self.read_position()? {
            Position::AfterLast => return Ok(false),
            Position::BeforeFirst if count > 0 => Position::At(0),
            Position::At(i) if i + 1 < count => Position::At(i + 1),
            _ => Position::AfterLast,
        };
        self.move_cursor(target)
    }

    /// Moves one item back. Before the first item the cursor becomes `BeforeFirst`; from
    /// there this is a no-op returning `Ok(false)`.
    pub fn move_previous(&self) -> Result<bool> {
        let count = self.len();
        let target = match self.read_position()? {
            Position::BeforeFirst => return Ok(false),
            Position::AfterLast if count > 0 => Position::At(count - 1),
            Position::At(i) if i > 0 => Position::At(i - 1),
            _ => Position::BeforeFirst,
        };
        self.move_cursor(target)
    }

    fn read_position(&self) -> Result<Position> {
        let state = self
            .shared
            .state
            .try_borrow()
            .map_err(|_| Error::reentrant("read cursor"))?;
        Ok(state.position)
    }

    fn write_position(&self, position: Position) -> Result<()> {
        let mut state = self
            .shared
            .state
            .try_borrow_mut()
            .map_err(|_| Error::reentrant("move cursor"))?;
        state.position = position;
        Ok(())
    }

    /// Returns `Ok(false)` when a handler vetoed the move.
    fn move_cursor(&self, target: Position) -> Result<bool> {
        let from = self.read_position()?;
        if from == target {
            return Ok(true);
        }
        let event = CurrentChanging::new(from, target);
        self.shared.current_changing.notify(&event);
        if event.is_cancelled() {
            vtrace!(?from, ?target, "cursor move vetoed");
            return Ok(false);
        }
        self.write_position(target)?;
        self.shared.current_changed.notify(&CurrentChanged {
            previous: from,
            position: target,
        });
        Ok(true)
    }
}

impl<T, S> OrderedSource<T> for FilteredView<T, S>
where
    T: Clone + Default + PartialEq + 'static,
    S: OrderedSource<T> + 'static,
{
    fn len(&self) -> usize {
        FilteredView::len(self)
    }

    fn item(&self, index: usize) -> Option<T> {
        self.get(index)
    }

    fn for_each_item(&self, f: &mut dyn FnMut(usize, &T)) {
        self.shared.state.borrow().items.for_each(f);
    }

    fn events(&self) -> Option<&ChangeEvents<T>> {
        Some(&self.shared.events)
    }
}

impl<T, S> fmt::Debug for FilteredView<T, S>
where
    T: Clone + Default + PartialEq + fmt::Debug + 'static,
    S: OrderedSource<T> + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("FilteredView")
            .field("items", &state.items.to_vec())
            .field("position", &state.position)
            .field("filters", &state.filters)
            .field("generation", &state.generation)
            .finish_non_exhaustive()
    }
}

/// Scoped refresh lock returned by [`FilteredView::defer_refresh`].
#[must_use = "dropping the guard releases the refresh lock immediately"]
pub struct RefreshGuard<'a, T, S>
where
    T: Clone + Default + PartialEq + 'static,
    S: OrderedSource<T> + 'static,
{
    view: &'a FilteredView<T, S>,
}

impl<T, S> Drop for RefreshGuard<'_, T, S>
where
    T: Clone + Default + PartialEq + 'static,
    S: OrderedSource<T> + 'static,
{
    fn drop(&mut self) {
        let shared = &self.view.shared;
        let locks = shared.locks.get().saturating_sub(1);
        shared.locks.set(locks);
        if locks == 0 && shared.pending.get() {
            vdebug!("refresh lock released; running deferred refresh");
            self.view.refresh();
        }
    }
}

impl<T, S> fmt::Debug for RefreshGuard<'_, T, S>
where
    T: Clone + Default + PartialEq + 'static,
    S: OrderedSource<T> + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshGuard")
            .field("locks", &self.view.shared.locks.get())
            .finish()
    }
}
