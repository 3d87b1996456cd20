use std::collections::VecDeque;

use super::record::SharedRecord;

pub const MAX_HISTORY: usize = 50;

/// Previously shown records plus a cursor into them.
///
/// The cursor is `None` exactly when the history is empty. Stepping back and
/// then showing a record that is not the next entry drops everything after
/// the cursor first.
#[derive(Debug)]
pub struct History {
    entries: VecDeque<SharedRecord>,
    cursor: Option<usize>,
    limit: usize,
}

impl History {
    pub fn new() -> Self {
        Self::with_limit(MAX_HISTORY)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: None,
            limit: limit.max(1),
        }
    }

    pub fn append(&mut self, record: SharedRecord) {
        let Some(cursor) = self.cursor else {
            self.push(record);
            return;
        };

        if let Some(next) = self.entries.get(cursor + 1) {
            if next.source_url == record.source_url {
                self.cursor = Some(cursor + 1);
                return;
            }
            self.entries.truncate(cursor + 1);
        } else if self.entries[cursor].source_url == record.source_url {
            return;
        }

        self.push(record);
    }

    fn push(&mut self, record: SharedRecord) {
        self.entries.push_back(record);
        if self.entries.len() > self.limit {
            self.entries.pop_front();
        }
        self.cursor = Some(self.entries.len() - 1);
    }

    pub fn current(&self) -> Option<SharedRecord> {
        self.cursor.and_then(|i| self.entries.get(i).cloned())
    }

    pub fn step_forward(&mut self) -> Option<SharedRecord> {
        let cursor = self.cursor?;
        if cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor = Some(cursor + 1);
        self.current()
    }

    pub fn step_backward(&mut self) -> Option<SharedRecord> {
        let cursor = self.cursor?;
        if cursor == 0 {
            return None;
        }
        self.cursor = Some(cursor - 1);
        self.current()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }

    /// True when there is nothing to replay forward.
    pub fn is_at_end(&self) -> bool {
        match self.cursor {
            Some(cursor) => cursor + 1 >= self.entries.len(),
            None => true,
        }
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &SharedRecord> {
        self.entries.iter()
    }

    /// 1-based position and length, for status display.
    pub fn position(&self) -> Option<(usize, usize)> {
        self.cursor.map(|i| (i + 1, self.entries.len()))
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}
