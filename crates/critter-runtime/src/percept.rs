//! [`PerceptStore`] – the latest sensor frame and internal-state snapshot.
//!
//! The store has a single writer (the ingest path in
//! [`AgentLoop`][crate::agent_loop::AgentLoop]) and many readers (goals and
//! sensing predicates, which only ever see it through a shared reference in
//! [`GoalContext`][crate::goals::GoalContext]). A new frame replaces the old
//! one as a whole between ticks, so a goal can never observe a half-updated
//! frame.

use critter_types::{AgentState, CritterError, PerceptFrame};

#[derive(Debug, Clone, Default)]
pub struct PerceptStore {
    frame: PerceptFrame,
    state: AgentState,
    /// Fixed by the first frame; later frames must match.
    ray_count: Option<usize>,
    frames_seen: u64,
}

impl PerceptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store already holding `frame` and `state`.
    pub fn with_snapshot(frame: PerceptFrame, state: AgentState) -> Self {
        let mut store = Self::new();
        store.replace(frame, state);
        store
    }

    /// Replace the current frame and state.
    ///
    /// # Errors
    ///
    /// Returns [`CritterError::Malformed`] when the frame's ray count differs
    /// from the first frame ever ingested. The previous snapshot is kept.
    pub fn ingest(&mut self, frame: PerceptFrame, state: AgentState) -> Result<(), CritterError> {
        if let Some(expected) = self.ray_count
            && frame.len() != expected
        {
            return Err(CritterError::Malformed(format!(
                "sensor frame has {} rays, expected {expected}",
                frame.len()
            )));
        }
        self.replace(frame, state);
        Ok(())
    }

    pub fn frame(&self) -> &PerceptFrame {
        &self.frame
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    fn replace(&mut self, frame: PerceptFrame, state: AgentState) {
        self.ray_count.get_or_insert(frame.len());
        self.frame = frame;
        self.state = state;
        self.frames_seen += 1;
    }
}
