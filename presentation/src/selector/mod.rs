//! Generic list selector: a pure `(state, event) -> state` reducer plus a
//! stateless render function. Every picker in the terminal UI reuses it.

mod state;

pub use state::{SelectorEvent, SelectorItem, SelectorState, SelectorStatus, reduce};

/// Render the visible items, marking the highlighted one.
pub fn render<T: SelectorItem>(state: &SelectorState<T>) -> Vec<String> {
    let mut lines: Vec<String> = state
        .visible()
        .enumerate()
        .map(|(i, item)| {
            let marker = if i == state.cursor() { ">" } else { " " };
            match item.shortcut() {
                Some(key) => format!("{} [{}] {}", marker, key, item.label()),
                None => format!("{}     {}", marker, item.label()),
            }
        })
        .collect();
    if !state.query().is_empty() {
        lines.insert(0, format!("  filter: {}", state.query()));
    }
    if lines.is_empty() {
        lines.push("  (no matches)".to_string());
    }
    lines
}

/// Translate one line of terminal input into selector events.
///
/// - empty line: confirm the highlighted item
/// - `j` / `k`: move down / up
/// - `/text`: filter by `text`
/// - `q`: cancel
/// - any other single character: shortcut
pub fn events_from_line(line: &str) -> Vec<SelectorEvent> {
    let line = line.trim();
    if line.is_empty() {
        return vec![SelectorEvent::Confirm];
    }
    if let Some(filter) = line.strip_prefix('/') {
        let mut events = vec![SelectorEvent::ClearFilter];
        events.extend(filter.chars().map(SelectorEvent::Type));
        return events;
    }
    match line {
        "j" | "down" => vec![SelectorEvent::Down],
        "k" | "up" => vec![SelectorEvent::Up],
        "q" | "esc" => vec![SelectorEvent::Cancel],
        _ => {
            let mut chars = line.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => vec![SelectorEvent::Shortcut(c)],
                _ => Vec::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Choice(&'static str, char);

    impl SelectorItem for Choice {
        fn label(&self) -> &str {
            self.0
        }
        fn shortcut(&self) -> Option<char> {
            Some(self.1)
        }
    }

    #[test]
    fn test_render_marks_cursor() {
        let state = SelectorState::new(vec![Choice("Yes", 'y'), Choice("No", 'n')]);
        let state = reduce(state, SelectorEvent::Down);
        assert_eq!(render(&state), vec!["  [y] Yes", "> [n] No"]);
    }

    #[test]
    fn test_render_empty_filter() {
        let state = SelectorState::new(vec![Choice("Yes", 'y')]);
        let state = reduce(state, SelectorEvent::Type('z'));
        assert_eq!(render(&state), vec!["  filter: z"]);
        let empty: SelectorState<Choice> = SelectorState::new(vec![]);
        assert_eq!(render(&empty), vec!["  (no matches)"]);
    }

    #[test]
    fn test_events_from_line() {
        assert_eq!(events_from_line(""), vec![SelectorEvent::Confirm]);
        assert_eq!(events_from_line(" j "), vec![SelectorEvent::Down]);
        assert_eq!(events_from_line("y"), vec![SelectorEvent::Shortcut('y')]);
        assert_eq!(
            events_from_line("/ab"),
            vec![
                SelectorEvent::ClearFilter,
                SelectorEvent::Type('a'),
                SelectorEvent::Type('b')
            ]
        );
        assert!(events_from_line("yes please").is_empty());
    }
}
