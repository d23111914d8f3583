use core::cell::Cell;
use core::fmt;

use segseq::OrderedSource;

/// Where a view's cursor points.
///
/// Numerically a position is in `-1..=count`: `-1` is before the first item, `count` is after
/// the last one, anything in between addresses an item.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Position {
    #[default]
    BeforeFirst,
    At(usize),
    AfterLast,
}

impl Position {
    /// Maps a numeric position onto a view of `count` items. Returns `None` outside
    /// `-1..=count`.
    pub fn from_index(index: isize, count: usize) -> Option<Self> {
        if index == -1 {
            return Some(Self::BeforeFirst);
        }
        let index = usize::try_from(index).ok()?;
        match index.cmp(&count) {
            core::cmp::Ordering::Less => Some(Self::At(index)),
            core::cmp::Ordering::Equal => Some(Self::AfterLast),
            core::cmp::Ordering::Greater => None,
        }
    }

    pub fn to_index(self, count: usize) -> isize {
        match self {
            Self::BeforeFirst => -1,
            Self::At(i) => i as isize,
            Self::AfterLast => count as isize,
        }
    }

    /// The addressed item index, if any.
    pub fn index(self) -> Option<usize> {
        match self {
            Self::At(i) => Some(i),
            _ => None,
        }
    }
}

/// The identity of the current item, used to find it again after the view changes.
///
/// Equal items are told apart by their occurrence ordinal: the anchor for the second `3` in
/// `[3, 1, 3]` is `(3, 1)`.
#[derive(Clone, PartialEq, Eq)]
pub struct CursorAnchor<T> {
    pub item: T,
    pub occurrence: usize,
}

impl<T: fmt::Debug> fmt::Debug for CursorAnchor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CursorAnchor")
            .field("item", &self.item)
            .field("occurrence", &self.occurrence)
            .finish()
    }
}

/// Captures an anchor for the item at `position`.
///
/// Returns `None` when the position does not address an item.
pub fn capture_anchor<T: PartialEq>(
    items: &dyn OrderedSource<T>,
    position: Position,
) -> Option<CursorAnchor<T>> {
    let index = position.index()?;
    let item = items.item(index)?;
    let mut occurrence = 0usize;
    items.for_each_item(&mut |i, other| {
        if i < index && *other == item {
            occurrence += 1;
        }
    });
    Some(CursorAnchor { item, occurrence })
}

/// Finds the anchored item in `items`.
///
/// When fewer equal items remain than the anchor's ordinal, the last equal item is used.
/// Returns `None` when no equal item is left.
pub fn apply_anchor<T: PartialEq>(
    items: &dyn OrderedSource<T>,
    anchor: &CursorAnchor<T>,
) -> Option<usize> {
    let mut seen = 0usize;
    let mut found = None;
    items.for_each_item(&mut |i, other| {
        if seen <= anchor.occurrence && *other == anchor.item {
            found = Some(i);
            seen += 1;
        }
    });
    found
}

/// Raised before the cursor moves. Any handler may veto the move.
pub struct CurrentChanging {
    pub from: Position,
    pub to: Position,
    cancel: Cell<bool>,
}

impl CurrentChanging {
    pub fn new(from: Position, to: Position) -> Self {
        Self {
            from,
            to,
            cancel: Cell::new(false),
        }
    }

    pub fn cancel(&self) {
        self.cancel.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.get()
    }
}

impl fmt::Debug for CurrentChanging {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurrentChanging")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("cancelled", &self.cancel.get())
            .finish()
    }
}

/// Raised after the cursor moved, or after a refresh lost the current item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CurrentChanged {
    pub previous: Position,
    pub position: Position,
}
