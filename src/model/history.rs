use super::command::Command;
use crate::filter::{FilterError, NodeId};
use std::collections::VecDeque;
use thiserror::Error;

pub const DEFAULT_HISTORY_LIMIT: usize = 100;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("Failed to apply edit: {0}")]
    Apply(#[from] FilterError),
}

#[derive(Debug, Clone)]
struct Entry {
    command: Command,
    text: String,
}

/// Undo and redo stacks of applied commands.
///
/// The history never touches the tree itself; callers pass the executor
/// that applies a command. Commands pushed out of the history are handed
/// back so the caller can release whatever they kept alive.
#[derive(Debug, Clone)]
pub struct History {
    undo_stack: VecDeque<Entry>,
    redo_stack: VecDeque<Entry>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn undo_text(&self) -> Option<&str> {
        self.undo_stack.back().map(|entry| entry.text.as_str())
    }

    pub fn redo_text(&self) -> Option<&str> {
        self.redo_stack.back().map(|entry| entry.text.as_str())
    }

    /// Record an already applied command. Clears redo history and returns
    /// every command that left the history.
    pub fn push(&mut self, command: Command, text: impl Into<String>) -> Vec<Command> {
        let mut dropped: Vec<Command> = self.redo_stack.drain(..).map(|e| e.command).collect();
        self.undo_stack.push_back(Entry {
            command,
            text: text.into(),
        });
        while self.undo_stack.len() > self.limit {
            if let Some(entry) = self.undo_stack.pop_front() {
                dropped.push(entry.command);
            }
        }
        dropped
    }

    /// Revert the latest command with `execute`. A command that fails to
    /// revert stays on the undo stack.
    pub fn undo<F>(&mut self, execute: F) -> Result<(), HistoryError>
    where
        F: FnOnce(&Command) -> Result<(), FilterError>,
    {
        let entry = self
            .undo_stack
            .pop_back()
            .ok_or(HistoryError::NothingToUndo)?;
        match execute(&entry.command) {
            Ok(()) => {
                self.redo_stack.push_back(entry);
                Ok(())
            }
            Err(err) => {
                self.undo_stack.push_back(entry);
                Err(err.into())
            }
        }
    }

    /// Re-apply the latest undone command with `execute`
    pub fn redo<F>(&mut self, execute: F) -> Result<(), HistoryError>
    where
        F: FnOnce(&Command) -> Result<(), FilterError>,
    {
        let entry = self
            .redo_stack
            .pop_back()
            .ok_or(HistoryError::NothingToRedo)?;
        match execute(&entry.command) {
            Ok(()) => {
                self.undo_stack.push_back(entry);
                Ok(())
            }
            Err(err) => {
                self.redo_stack.push_back(entry);
                Err(err.into())
            }
        }
    }

    /// Empty both stacks, returning the commands they held
    pub fn clear(&mut self) -> Vec<Command> {
        self.undo_stack
            .drain(..)
            .chain(self.redo_stack.drain(..))
            .map(|entry| entry.command)
            .collect()
    }

    /// Nodes referenced by any command still in the history
    pub fn referenced_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.undo_stack
            .iter()
            .chain(self.redo_stack.iter())
            .flat_map(|entry| {
                entry
                    .command
                    .nodes()
                    .iter()
                    .copied()
                    .chain(entry.command.parent())
            })
    }
}
