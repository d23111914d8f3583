use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt;

/// A filter predicate. `true` keeps the item in the view.
pub type Predicate<T> = Rc<dyn Fn(&T) -> bool>;

/// Identifies a secondary filter registered with
/// [`FilteredView::add_filter`](crate::FilteredView::add_filter).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilterId(u64);

/// The primary filter followed by the secondary filters in registration order.
pub(crate) struct FilterChain<T> {
    primary: Option<Predicate<T>>,
    secondary: Vec<(FilterId, Predicate<T>)>,
    next_id: u64,
}

impl<T> FilterChain<T> {
    pub(crate) fn new() -> Self {
        Self {
            primary: None,
            secondary: Vec::new(),
            next_id: 0,
        }
    }

    pub(crate) fn set_primary(&mut self, predicate: Option<Predicate<T>>) {
        self.primary = predicate;
    }

    pub(crate) fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    pub(crate) fn add(&mut self, predicate: Predicate<T>) -> FilterId {
        let id = FilterId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.secondary.push((id, predicate));
        id
    }

    pub(crate) fn remove(&mut self, id: FilterId) -> bool {
        let before = self.secondary.len();
        self.secondary.retain(|(k, _)| *k != id);
        self.secondary.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        usize::from(self.primary.is_some()) + self.secondary.len()
    }

    /// Stops at the first predicate that rejects `item`.
    pub(crate) fn accepts(&self, item: &T) -> bool {
        if let Some(primary) = &self.primary {
            if !primary(item) {
                return false;
            }
        }
        self.secondary.iter().all(|(_, predicate)| predicate(item))
    }
}

impl<T> Clone for FilterChain<T> {
    fn clone(&self) -> Self {
        Self {
            primary: self.primary.clone(),
            secondary: self.secondary.clone(),
            next_id: self.next_id,
        }
    }
}

impl<T> fmt::Debug for FilterChain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("primary", &self.primary.is_some())
            .field("secondary", &self.secondary.len())
            .finish()
    }
}
