use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::mem;

use crate::change::OrderedSource;
use crate::{Error, Result};

/// An externally owned list that a [`SegmentedSequence`](crate::SegmentedSequence) can wrap.
///
/// Mutators return whether they were applied: an observable list may let its own changing
/// handlers veto a mutation, in which case it must leave its contents untouched and return
/// `false` / `None`.
pub trait ExternalList<T>: OrderedSource<T> {
    /// Replaces the item at `index`, returning the previous one.
    fn set_item(&mut self, index: usize, value: T) -> Result<Option<T>>;

    fn insert_item(&mut self, index: usize, value: T) -> Result<bool>;

    fn remove_item(&mut self, index: usize) -> Result<Option<T>>;

    fn clear_items(&mut self) -> Result<bool>;

    /// Replaces the whole contents. The default clears and re-inserts item by item.
    fn replace_items(&mut self, items: Vec<T>) -> Result<bool> {
        if !self.clear_items()? {
            return Ok(false);
        }
        for (i, item) in items.into_iter().enumerate() {
            self.insert_item(i, item)?;
        }
        Ok(true)
    }
}

/// A shared handle to an external list.
pub type SharedList<T> = Rc<RefCell<dyn ExternalList<T>>>;

impl<T: Clone> OrderedSource<T> for Vec<T> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn item(&self, index: usize) -> Option<T> {
        self.as_slice().get(index).cloned()
    }

    fn for_each_item(&self, f: &mut dyn FnMut(usize, &T)) {
        for (i, item) in self.iter().enumerate() {
            f(i, item);
        }
    }
}

impl<T: Clone> ExternalList<T> for Vec<T> {
    fn set_item(&mut self, index: usize, value: T) -> Result<Option<T>> {
        let len = self.as_slice().len();
        let slot = self
            .get_mut(index)
            .ok_or_else(|| Error::out_of_bounds(index, len))?;
        Ok(Some(mem::replace(slot, value)))
    }

    fn insert_item(&mut self, index: usize, value: T) -> Result<bool> {
        let len = self.as_slice().len();
        if index > len {
            return Err(Error::out_of_bounds(index, len));
        }
        self.insert(index, value);
        Ok(true)
    }

    fn remove_item(&mut self, index: usize) -> Result<Option<T>> {
        let len = self.as_slice().len();
        if index >= len {
            return Err(Error::out_of_bounds(index, len));
        }
        Ok(Some(self.remove(index)))
    }

    fn clear_items(&mut self) -> Result<bool> {
        self.clear();
        Ok(true)
    }

    fn replace_items(&mut self, items: Vec<T>) -> Result<bool> {
        *self = items;
        Ok(true)
    }
}
