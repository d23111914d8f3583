use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use core::fmt;

use crate::{Error, Result};

/// Maps an element to its name. `None` means the element has no name.
pub type NameResolver<T> = Rc<dyn Fn(&T) -> Option<String>>;

/// Called by `set` with `(old, new)`; returns the value to store.
///
/// Returning a value equal to `old` turns the write into a no-op.
pub type SetItemTranslator<T> = Rc<dyn Fn(&T, T) -> T>;

/// Produces the message for a named-index error. Returning `None` suppresses the error.
pub type MessageHook = Rc<dyn Fn(&str) -> Option<String>>;

/// Configuration for [`crate::SegmentedSequence`].
///
/// Hooks are stored in `Rc`s so options are cheap to clone and update through
/// `SegmentedSequence::update_options`.
pub struct SequenceOptions<T> {
    /// Slots per newly allocated segment. Must be non-zero.
    pub growth_step: usize,

    /// When set, out-of-range reads return `T::default()` and out-of-range writes are ignored
    /// instead of failing with `IndexOutOfBounds`.
    pub suppress_bounds_errors: bool,

    /// Rejects every mutation with `ReadOnly`.
    pub read_only: bool,

    pub name_resolver: Option<NameResolver<T>>,
    /// Named lookups compare case-insensitively unless a lookup says otherwise.
    pub ignore_name_case: bool,
    pub allow_duplicate_names: bool,
    pub duplicate_name_message: Option<MessageHook>,
    pub name_not_found_message: Option<MessageHook>,

    pub set_item_translator: Option<SetItemTranslator<T>>,
}

impl<T> SequenceOptions<T> {
    pub const DEFAULT_GROWTH_STEP: usize = 16;

    pub fn new() -> Self {
        Self {
            growth_step: Self::DEFAULT_GROWTH_STEP,
            suppress_bounds_errors: false,
            read_only: false,
            name_resolver: None,
            ignore_name_case: true,
            allow_duplicate_names: false,
            duplicate_name_message: None,
            name_not_found_message: None,
            set_item_translator: None,
        }
    }

    pub fn with_growth_step(mut self, growth_step: usize) -> Self {
        self.growth_step = growth_step;
        self
    }

    pub fn with_suppressed_bounds_errors(mut self) -> Self {
        self.suppress_bounds_errors = true;
        self
    }

    pub fn with_read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn with_name_resolver(mut self, f: impl Fn(&T) -> Option<String> + 'static) -> Self {
        self.name_resolver = Some(Rc::new(f));
        self
    }

    pub fn with_case_sensitive_names(mut self) -> Self {
        self.ignore_name_case = false;
        self
    }

    pub fn with_duplicate_names(mut self) -> Self {
        self.allow_duplicate_names = true;
        self
    }

    pub fn with_duplicate_name_message(
        mut self,
        f: impl Fn(&str) -> Option<String> + 'static,
    ) -> Self {
        self.duplicate_name_message = Some(Rc::new(f));
        self
    }

    pub fn with_name_not_found_message(
        mut self,
        f: impl Fn(&str) -> Option<String> + 'static,
    ) -> Self {
        self.name_not_found_message = Some(Rc::new(f));
        self
    }

    pub fn with_set_item_translator(mut self, f: impl Fn(&T, T) -> T + 'static) -> Self {
        self.set_item_translator = Some(Rc::new(f));
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.growth_step == 0 {
            return Err(Error::invalid_arg("growth_step", "must be at least 1"));
        }
        Ok(())
    }

    pub(crate) fn duplicate_message(&self, name: &str) -> Option<String> {
        match &self.duplicate_name_message {
            Some(hook) => hook(name),
            None => Some(format!("an item named '{name}' already exists")),
        }
    }

    pub(crate) fn not_found_message(&self, name: &str) -> Option<String> {
        match &self.name_not_found_message {
            Some(hook) => hook(name),
            None => Some(format!("no item named '{name}'")),
        }
    }
}

impl<T: AsRef<str> + 'static> SequenceOptions<T> {
    /// Uses each string element as its own name.
    pub fn value_names(self) -> Self {
        self.with_name_resolver(|item: &T| Some(String::from(item.as_ref())))
    }
}

impl<T> Default for SequenceOptions<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for SequenceOptions<T> {
    fn clone(&self) -> Self {
        Self {
            growth_step: self.growth_step,
            suppress_bounds_errors: self.suppress_bounds_errors,
            read_only: self.read_only,
            name_resolver: self.name_resolver.clone(),
            ignore_name_case: self.ignore_name_case,
            allow_duplicate_names: self.allow_duplicate_names,
            duplicate_name_message: self.duplicate_name_message.clone(),
            name_not_found_message: self.name_not_found_message.clone(),
            set_item_translator: self.set_item_translator.clone(),
        }
    }
}

impl<T> fmt::Debug for SequenceOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceOptions")
            .field("growth_step", &self.growth_step)
            .field("suppress_bounds_errors", &self.suppress_bounds_errors)
            .field("read_only", &self.read_only)
            .field("name_resolver", &self.name_resolver.is_some())
            .field("ignore_name_case", &self.ignore_name_case)
            .field("allow_duplicate_names", &self.allow_duplicate_names)
            .field("set_item_translator", &self.set_item_translator.is_some())
            .finish_non_exhaustive()
    }
}

/// How a named lookup matches and what it does when nothing matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NameLookup {
    pub ignore_case: bool,
    /// Fail with `NameNotFound` instead of returning `None`.
    pub required: bool,
}

impl NameLookup {
    pub fn new() -> Self {
        Self {
            ignore_case: true,
            required: false,
        }
    }

    pub fn case_sensitive(mut self) -> Self {
        self.ignore_case = false;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

impl Default for NameLookup {
    fn default() -> Self {
        Self::new()
    }
}
