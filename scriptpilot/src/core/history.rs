//! In-memory conversation with a bounded request window.

use crate::core::types::Turn;

/// Ordered, append-only list of turns for one session.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Last `history_offset` turns, oldest first.
    pub fn window(&self, history_offset: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(history_offset);
        &self.turns[start..]
    }

    /// Build the request sent to the model: the intro (if any) followed by the
    /// trailing window of history.
    pub fn request(&self, intro: Option<&Turn>, history_offset: usize) -> Vec<Turn> {
        let window = self.window(history_offset);
        let mut request = Vec::with_capacity(window.len() + 1);
        request.extend(intro.cloned());
        request.extend_from_slice(window);
        request
    }
}
