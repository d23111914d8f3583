use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::mem;

use crate::change::{ChangeAction, CollectionChange, OrderedSource};
use crate::notify::{Notifier, Subscription};

/// An element-level "value changed" notification.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PropertyChanged {
    pub property: String,
}

impl PropertyChanged {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
        }
    }
}

pub type ItemHandler = Rc<dyn Fn(&PropertyChanged)>;

/// Implemented by element types that raise their own change notifications.
///
/// A sequence with [`observe_items`](crate::SegmentedSequence::observe_items) enabled calls
/// `observe` once for every element it stores and keeps the returned token for exactly as long
/// as the element stays in the sequence.
pub trait ObservableItem {
    fn observe(&self, handler: ItemHandler) -> Subscription;
}

/// Per-position subscriptions into the sequence's elements.
pub(crate) struct ItemBridges<T> {
    attach: fn(&T, ItemHandler) -> Subscription,
    handler: ItemHandler,
    tokens: Vec<Subscription>,
}

impl<T> ItemBridges<T> {
    pub(crate) fn new(
        attach: fn(&T, ItemHandler) -> Subscription,
        sink: Notifier<PropertyChanged>,
    ) -> Self {
        Self {
            attach,
            handler: Rc::new(move |event: &PropertyChanged| sink.notify(event)),
            tokens: Vec::new(),
        }
    }

    fn subscribe(&self, item: &T) -> Subscription {
        (self.attach)(item, Rc::clone(&self.handler))
    }

    pub(crate) fn insert(&mut self, index: usize, item: &T) {
        let token = self.subscribe(item);
        self.tokens.insert(index, token);
    }

    pub(crate) fn push(&mut self, item: &T) {
        let token = self.subscribe(item);
        self.tokens.push(token);
    }

    pub(crate) fn remove(&mut self, index: usize) {
        if index < self.tokens.len() {
            drop(self.tokens.remove(index));
        }
    }

    /// Releases the old element's token before attaching to the new element.
    pub(crate) fn replace(&mut self, index: usize, item: &T) {
        let Some(slot) = self.tokens.get_mut(index) else {
            return;
        };
        drop(mem::replace(slot, Subscription::detached()));
        *slot = (self.attach)(item, Rc::clone(&self.handler));
    }

    pub(crate) fn relocate(&mut self, from: usize, to: usize) {
        if from < self.tokens.len() && to < self.tokens.len() {
            let token = self.tokens.remove(from);
            self.tokens.insert(to, token);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.tokens.clear();
    }

    /// Re-attaches every element of `source`, in order.
    pub(crate) fn rebuild(&mut self, source: &dyn OrderedSource<T>) {
        self.tokens.clear();
        source.for_each_item(&mut |_, item| self.push(item));
    }

    /// Follows a change the collection made on its own. `source` is the collection after it.
    pub(crate) fn apply(&mut self, source: &dyn OrderedSource<T>, change: &CollectionChange<T>) {
        match (change.action, change.old_index, change.new_index) {
            (ChangeAction::Add, _, Some(at)) => {
                for (k, item) in change.new_items.iter().enumerate() {
                    self.insert(at + k, item);
                }
            }
            (ChangeAction::Remove, Some(at), _) => {
                for _ in &change.old_items {
                    self.remove(at);
                }
            }
            (ChangeAction::Replace, _, Some(at)) => {
                for (k, item) in change.new_items.iter().enumerate() {
                    self.replace(at + k, item);
                }
            }
            (ChangeAction::Move, Some(from), Some(to)) => self.relocate(from, to),
            _ => self.rebuild(source),
        }
        if self.tokens.len() != source.len() {
            self.rebuild(source);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.tokens.len()
    }
}
