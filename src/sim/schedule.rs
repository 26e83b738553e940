//! Delayed operations keyed by simulation tick
//!
//! Tasks due on the same tick run in the order they were scheduled, so a
//! removal scheduled before a merge always runs first when their delays match.

use super::block::{BlockId, MergeIntent};

/// A deferred session operation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Remove a block that merged away
    RemoveBlock(BlockId),
    /// Spawn the successor of a merge (issued by the executing side only)
    ExecuteMerge(MergeIntent),
    /// Re-enable the preview after the post-drop cooldown
    ShowPreview,
    /// Latch the game-over state after the grace period
    EnterGameOver,
}

#[derive(Debug, Clone)]
struct Task {
    due_tick: u64,
    seq: u64,
    action: Action,
}

/// Pending delayed operations for one session
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    tasks: Vec<Task>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `action` to run once the clock reaches `due_tick`
    pub fn schedule(&mut self, due_tick: u64, action: Action) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.tasks.push(Task {
            due_tick,
            seq,
            action,
        });
    }

    /// Remove and return every action due at or before `now`, in run order
    pub fn take_due(&mut self, now: u64) -> Vec<Action> {
        let mut due: Vec<Task> = Vec::new();
        self.tasks.retain(|t| {
            if t.due_tick <= now {
                due.push(t.clone());
                false
            } else {
                true
            }
        });
        due.sort_by_key(|t| (t.due_tick, t.seq));
        due.into_iter().map(|t| t.action).collect()
    }

    /// Drop everything (session reset)
    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
