//! Selector state and its reducer.
//!
//! The state is a plain value; [`reduce`] consumes it with an event and
//! returns the next one. Nothing here touches the terminal.

/// Anything a selector can list.
pub trait SelectorItem {
    fn label(&self) -> &str;

    /// Single key that selects and confirms this item directly.
    fn shortcut(&self) -> Option<char> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorEvent {
    Up,
    Down,
    First,
    Last,
    /// Append a character to the filter
    Type(char),
    Backspace,
    ClearFilter,
    Shortcut(char),
    Confirm,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectorStatus {
    Open,
    Confirmed(usize),
    Cancelled,
}

/// Items, filter text, and a cursor into the filtered list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorState<T> {
    items: Vec<T>,
    query: String,
    /// Indices into `items` that match `query`
    visible: Vec<usize>,
    /// Position within `visible`
    cursor: usize,
    status: SelectorStatus,
}

impl<T: SelectorItem> SelectorState<T> {
    pub fn new(items: Vec<T>) -> Self {
        let visible = (0..items.len()).collect();
        Self {
            items,
            query: String::new(),
            visible,
            cursor: 0,
            status: SelectorStatus::Open,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn status(&self) -> &SelectorStatus {
        &self.status
    }

    pub fn is_open(&self) -> bool {
        self.status == SelectorStatus::Open
    }

    /// Items that pass the filter, in order.
    pub fn visible(&self) -> impl Iterator<Item = &T> {
        self.visible.iter().map(|&i| &self.items[i])
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Item under the cursor, if any pass the filter.
    pub fn highlighted(&self) -> Option<&T> {
        self.visible.get(self.cursor).map(|&i| &self.items[i])
    }

    /// The confirmed item, once the selector is closed with one.
    pub fn selected(&self) -> Option<&T> {
        match self.status {
            SelectorStatus::Confirmed(i) => self.items.get(i),
            _ => None,
        }
    }

    fn refilter(mut self) -> Self {
        let query = self.query.to_lowercase();
        self.visible = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.label().to_lowercase().contains(&query))
            .map(|(i, _)| i)
            .collect();
        self.cursor = self.cursor.min(self.visible.len().saturating_sub(1));
        self
    }
}

/// Apply one event. A closed selector ignores further events.
pub fn reduce<T: SelectorItem>(state: SelectorState<T>, event: SelectorEvent) -> SelectorState<T> {
    if !state.is_open() {
        return state;
    }
    let mut state = state;
    let count = state.visible.len();
    match event {
        SelectorEvent::Up => {
            if count > 0 {
                state.cursor = (state.cursor + count - 1) % count;
            }
            state
        }
        SelectorEvent::Down => {
            if count > 0 {
                state.cursor = (state.cursor + 1) % count;
            }
            state
        }
        SelectorEvent::First => {
            state.cursor = 0;
            state
        }
        SelectorEvent::Last => {
            state.cursor = count.saturating_sub(1);
            state
        }
        SelectorEvent::Type(c) => {
            state.query.push(c);
            state.refilter()
        }
        SelectorEvent::Backspace => {
            state.query.pop();
            state.refilter()
        }
        SelectorEvent::ClearFilter => {
            state.query.clear();
            state.refilter()
        }
        SelectorEvent::Shortcut(key) => {
            let key = key.to_ascii_lowercase();
            if let Some(index) = state
                .items
                .iter()
                .position(|item| item.shortcut().map(|c| c.to_ascii_lowercase()) == Some(key))
            {
                state.status = SelectorStatus::Confirmed(index);
            }
            state
        }
        SelectorEvent::Confirm => {
            if let Some(&index) = state.visible.get(state.cursor) {
                state.status = SelectorStatus::Confirmed(index);
            }
            state
        }
        SelectorEvent::Cancel => {
            state.status = SelectorStatus::Cancelled;
            state
        }
    }
}
