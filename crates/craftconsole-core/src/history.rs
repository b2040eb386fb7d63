// `cursor` is `None` while the user is not browsing. Up walks toward older
// entries and stops at the oldest; down walks toward newer entries and leaves
// browsing mode (empty input) when it passes the newest.
#[derive(Clone, Debug, Default)]
pub struct CommandHistory {
    entries: Vec<String>,
    cursor: Option<usize>,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<String>) -> Self {
        Self {
            entries,
            cursor: None,
        }
    }

    pub fn record(&mut self, command: impl Into<String>) {
        self.entries.push(command.into());
        self.cursor = None;
    }

    pub fn reset(&mut self) {
        self.cursor = None;
    }

    pub fn up(&mut self) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        let next = match self.cursor {
            None => self.entries.len() - 1,
            Some(i) => i.saturating_sub(1),
        };
        self.cursor = Some(next);
        self.entries.get(next).map(String::as_str)
    }

    pub fn down(&mut self) -> &str {
        match self.cursor {
            Some(i) if i + 1 < self.entries.len() => {
                self.cursor = Some(i + 1);
                &self.entries[i + 1]
            }
            _ => {
                self.cursor = None;
                ""
            }
        }
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn up_up_down_walks_history() {
        let mut history = CommandHistory::new();
        history.record("a");
        history.record("b");
        assert_eq!(history.up(), Some("b"));
        assert_eq!(history.up(), Some("a"));
        assert_eq!(history.down(), "b");
        assert_eq!(history.down(), "");
        assert_eq!(history.cursor(), None);
    }

    #[test]
    fn up_clamps_at_oldest() {
        let mut history = CommandHistory::from_entries(vec!["only".to_string()]);
        assert_eq!(history.up(), Some("only"));
        assert_eq!(history.up(), Some("only"));
        assert_eq!(history.cursor(), Some(0));
    }

    #[test]
    fn empty_history_does_nothing() {
        let mut history = CommandHistory::new();
        assert_eq!(history.up(), None);
        assert_eq!(history.down(), "");
    }

    #[test]
    fn recording_resets_browsing() {
        let mut history = CommandHistory::new();
        history.record("a");
        history.up();
        history.record("b");
        assert_eq!(history.cursor(), None);
        assert_eq!(history.up(), Some("b"));
    }
}
