//! Fixed timestep simulation tick
//!
//! Applies one frame of host input, advances the delayed-task clock and runs
//! the height monitor.

use glam::Vec2;

use super::block::{BlockId, ContactEvent};
use super::state::{GamePhase, GameState};

/// Pointer input for a single tick (already in container space)
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AimInput {
    /// Pointer pressed at x
    Begin(f32),
    /// Pointer dragged to x
    Move(f32),
}

/// Block position reported by the physics collaborator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockPose {
    pub id: BlockId,
    pub pos: Vec2,
}

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Start (or restart) a run
    pub restart: bool,
    /// Positions after this frame's physics step
    pub poses: Vec<BlockPose>,
    /// Begin-contact callbacks from this frame's physics step
    pub contacts: Vec<ContactEvent>,
    pub aim: Option<AimInput>,
    /// Pointer released
    pub drop: bool,
}

/// Advance the session by one fixed timestep
pub fn tick(state: &mut GameState, input: &TickInput) {
    if input.restart {
        state.start_or_reset();
        return;
    }

    if state.phase() == GamePhase::Ready {
        return;
    }

    for pose in &input.poses {
        state.sync_position(pose.id, pose.pos);
    }

    for contact in &input.contacts {
        state.handle_contact(*contact);
    }

    match input.aim {
        Some(AimInput::Begin(x)) => state.begin_aim(x),
        Some(AimInput::Move(x)) => state.update_aim(x),
        None => {}
    }

    if input.drop {
        state.drop_at_aim();
    }

    state.advance_clock();
    state.scan_heights();
}
