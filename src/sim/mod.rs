//! Deterministic simulation module
//!
//! All gameplay rules live here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Delayed work runs off the tick counter, never wall-clock time
//! - No rendering, audio or platform dependencies

pub mod block;
pub mod schedule;
pub mod state;
pub mod tick;

pub use block::{
    Block, BlockId, Contact, ContactEvent, ContactOutcome, MergeIntent, Peer, merge_position,
};
pub use schedule::{Action, Scheduler};
pub use state::{GameEvent, GamePhase, GameState, Preview, SessionSnapshot};
pub use tick::{AimInput, BlockPose, TickInput, tick};
