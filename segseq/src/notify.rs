use alloc::boxed::Box;
use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

struct Registry<F: ?Sized> {
    next_id: u64,
    entries: Vec<(u64, Rc<F>)>,
}

/// A registry of event handlers of type `F` (usually `dyn Fn(..)`).
///
/// Cloning a `Handlers` yields another handle to the same registry. Handlers are invoked
/// from a snapshot, so a handler may subscribe or drop subscriptions while being dispatched.
pub struct Handlers<F: ?Sized> {
    inner: Rc<RefCell<Registry<F>>>,
}

impl<F: ?Sized + 'static> Handlers<F> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Registry {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Registers a handler. The handler stays registered until the returned token is dropped.
    pub fn insert(&self, handler: Rc<F>) -> Subscription {
        let id = {
            let mut reg = self.inner.borrow_mut();
            let id = reg.next_id;
            reg.next_id = reg.next_id.wrapping_add(1);
            reg.entries.push((id, handler));
            id
        };
        let weak: Weak<RefCell<Registry<F>>> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.borrow_mut().entries.retain(|(k, _)| *k != id);
            }
        })
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }

    /// Returns the handlers registered at this moment, in registration order.
    pub fn snapshot(&self) -> Vec<Rc<F>> {
        self.inner
            .borrow()
            .entries
            .iter()
            .map(|(_, h)| Rc::clone(h))
            .collect()
    }
}

impl<F: ?Sized + 'static> Default for Handlers<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> Clone for Handlers<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<F: ?Sized> fmt::Debug for Handlers<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("len", &self.inner.borrow().entries.len())
            .finish()
    }
}

/// A single-argument event registry.
pub type Notifier<E> = Handlers<dyn Fn(&E)>;

impl<E: 'static> Handlers<dyn Fn(&E)> {
    pub fn subscribe(&self, f: impl Fn(&E) + 'static) -> Subscription {
        self.insert(Rc::new(f))
    }

    pub fn notify(&self, event: &E) {
        for handler in self.snapshot() {
            handler(event);
        }
    }
}

/// Ownership token for a registered handler.
///
/// Dropping the token unregisters the handler. The token only holds a weak reference to the
/// registry, so it never keeps the event source alive.
#[must_use = "dropping a Subscription immediately unregisters its handler"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A token that is not attached to anything.
    pub fn detached() -> Self {
        Self { release: None }
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    /// Unregisters the handler now. Equivalent to dropping the token.
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
