//! Bounded linear undo/redo over whole-diagram snapshots.

use std::collections::VecDeque;

use crate::model::{Diagram, Edge, Node};

/// Immutable copy of the diagram at one point in time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Snapshot {
    pub fn of(diagram: &Diagram) -> Self {
        Self {
            nodes: diagram.nodes.clone(),
            edges: diagram.edges.clone(),
        }
    }

    pub fn into_diagram(self) -> Diagram {
        Diagram::from_parts(self.nodes, self.edges)
    }
}

/// `entries[cursor]` is the present; everything after it is redo state.
///
/// [`History::undo`] and [`History::redo`] open a replay window in which
/// [`History::push`] is ignored, so restoring a snapshot cannot record it
/// again. The caller closes the window with [`History::finish_replay`] once the
/// restored state has been applied.
#[derive(Debug, Clone)]
pub struct History<T> {
    entries: VecDeque<T>,
    cursor: usize,
    max_entries: usize,
    replaying: bool,
}

impl<T> History<T> {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: 0,
            max_entries: max_entries.max(1),
            replaying: false,
        }
    }

    pub fn with_initial(initial: T, max_entries: usize) -> Self {
        let mut history = Self::new(max_entries);
        history.entries.push_back(initial);
        history
    }

    /// Records `state` as the new present, dropping any redo entries and, past
    /// the bound, the oldest entry. Returns false if suppressed by a replay.
    pub fn push(&mut self, state: T) -> bool {
        if self.replaying {
            return false;
        }
        if !self.entries.is_empty() {
            self.entries.truncate(self.cursor + 1);
        }
        self.entries.push_back(state);
        if self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
        self.cursor = self.entries.len() - 1;
        true
    }

    pub fn undo(&mut self) -> Option<&T> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        self.replaying = true;
        self.entries.get(self.cursor)
    }

    pub fn redo(&mut self) -> Option<&T> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        self.replaying = true;
        self.entries.get(self.cursor)
    }

    pub fn finish_replay(&mut self) {
        self.replaying = false;
    }

    pub fn is_replaying(&self) -> bool {
        self.replaying
    }

    /// Discards everything and reseeds with `initial`.
    pub fn reset(&mut self, initial: T) {
        self.entries.clear();
        self.entries.push_back(initial);
        self.cursor = 0;
        self.replaying = false;
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn current(&self) -> Option<&T> {
        self.entries.get(self.cursor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}
