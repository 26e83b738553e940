//! Game session state and the operations that drive it
//!
//! The session owns every block, the score, the preview queue and the
//! delayed-task schedule. It never touches visuals or audio directly; every
//! observable change is queued as a `GameEvent` for the host to drain.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::block::{Block, BlockId, Contact, ContactEvent, ContactOutcome, MergeIntent};
use super::schedule::{Action, Scheduler};
use crate::audio::SoundEffect;
use crate::settings::{Settings, SettingsError};

/// Current phase of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Created, waiting for `start_or_reset`
    Ready,
    /// Accepting input, contacts and merges
    Playing,
    /// Run ended (terminal until the next reset)
    GameOver,
}

/// The block waiting on the drop rail
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Preview {
    pub rank: u8,
    /// Horizontal aim (container space)
    pub x: f32,
    /// Hidden during the post-drop cooldown
    pub visible: bool,
}

/// Observable session changes, drained by the host
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// Container cleared for a new run
    SessionReset,
    /// New block; `settle` asks for the merge pop animation
    BlockSpawned {
        id: BlockId,
        rank: u8,
        pos: Vec2,
        settle: bool,
    },
    BlockRemoved {
        id: BlockId,
    },
    ScoreChanged(u64),
    Sound(SoundEffect),
    /// Warning line visibility changed
    WarningLine(bool),
    PreviewShown {
        rank: u8,
        x: f32,
    },
    PreviewMoved {
        x: f32,
    },
    PreviewHidden,
    GameOver {
        final_score: u64,
    },
}

/// Serializable view of a session for hosts and debugging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub phase: GamePhase,
    pub score: u64,
    pub time_ticks: u64,
    pub preview: Preview,
    pub warning_active: bool,
    pub game_over_pending: bool,
    pub blocks: Vec<Block>,
}

/// One merge/drop session
#[derive(Debug, Clone)]
pub struct GameState {
    settings: Settings,
    /// Run seed for reproducibility
    seed: u64,
    rng: Pcg32,
    phase: GamePhase,
    score: u64,
    /// Simulation tick counter
    time_ticks: u64,
    /// Live blocks in spawn order
    blocks: Vec<Block>,
    preview: Preview,
    /// Set by `begin_aim`, consumed by a drop
    aiming: bool,
    warning_active: bool,
    /// Game-over grace period already running
    game_over_pending: bool,
    scheduler: Scheduler,
    events: Vec<GameEvent>,
    /// Next block ID (never reset, so stale IDs from a previous run cannot collide)
    next_id: u32,
}

impl GameState {
    /// Create a session in the `Ready` phase, rejecting settings that fail
    /// [`Settings::validate`]
    pub fn new(seed: u64, settings: Settings) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self::build(seed, settings))
    }

    /// Create a session with reference settings
    pub fn with_defaults(seed: u64) -> Self {
        Self::build(seed, Settings::default())
    }

    fn build(seed: u64, settings: Settings) -> Self {
        Self {
            preview: Preview {
                rank: 1,
                x: 0.0,
                visible: false,
            },
            settings,
            seed,
            rng: Pcg32::seed_from_u64(seed),
            phase: GamePhase::Ready,
            score: 0,
            time_ticks: 0,
            blocks: Vec::new(),
            aiming: false,
            warning_active: false,
            game_over_pending: false,
            scheduler: Scheduler::new(),
            events: Vec::new(),
            next_id: 1,
        }
    }

    // === Accessors ===

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn is_game_over(&self) -> bool {
        self.phase == GamePhase::GameOver
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn time_ticks(&self) -> u64 {
        self.time_ticks
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn preview(&self) -> Preview {
        self.preview
    }

    pub fn is_aiming(&self) -> bool {
        self.aiming
    }

    pub fn warning_active(&self) -> bool {
        self.warning_active
    }

    pub fn game_over_pending(&self) -> bool {
        self.game_over_pending
    }

    /// Number of delayed operations still queued
    pub fn pending_tasks(&self) -> usize {
        self.scheduler.len()
    }

    /// Events queued since the last drain
    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    /// Take all queued events
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            score: self.score,
            time_ticks: self.time_ticks,
            preview: self.preview,
            warning_active: self.warning_active,
            game_over_pending: self.game_over_pending,
            blocks: self.blocks.clone(),
        }
    }

    // === Lifecycle ===

    /// Start a fresh run: empty container, zero score, new preview.
    ///
    /// Pending removals, merges and game-over latches from the previous run
    /// are cancelled.
    pub fn start_or_reset(&mut self) {
        log::info!(
            "Starting run (previous phase {:?}, score {}, {} pending tasks dropped)",
            self.phase,
            self.score,
            self.scheduler.len()
        );

        self.scheduler.clear();
        self.blocks.clear();
        self.score = 0;
        self.phase = GamePhase::Playing;
        self.warning_active = false;
        self.game_over_pending = false;
        self.aiming = false;

        self.events.push(GameEvent::SessionReset);
        self.events.push(GameEvent::ScoreChanged(0));

        self.preview.rank = self.draw_preview_rank();
        self.show_preview();
    }

    fn draw_preview_rank(&mut self) -> u8 {
        self.rng.random_range(1..=self.settings.preview_rank_max)
    }

    fn show_preview(&mut self) {
        self.preview.x = 0.0;
        self.preview.visible = true;
        self.events.push(GameEvent::PreviewShown {
            rank: self.preview.rank,
            x: self.preview.x,
        });
    }

    // === Input ===

    /// Pointer down: start aiming at `x`
    pub fn begin_aim(&mut self, x: f32) {
        if self.phase != GamePhase::Playing {
            return;
        }
        self.aiming = true;
        self.move_aim(x);
    }

    /// Pointer moved: follow `x` while the preview is up
    pub fn update_aim(&mut self, x: f32) {
        if self.phase != GamePhase::Playing || !self.preview.visible || !self.aiming {
            return;
        }
        self.move_aim(x);
    }

    fn move_aim(&mut self, x: f32) {
        let half = self.settings.container_half_width;
        self.preview.x = x.clamp(-half, half);
        if self.preview.visible {
            self.events.push(GameEvent::PreviewMoved { x: self.preview.x });
        }
    }

    /// Pointer up: drop the preview block at the aim position.
    ///
    /// Ignored after game over, without an active aim, or during the cooldown.
    pub fn drop_at_aim(&mut self) -> Option<BlockId> {
        if self.phase != GamePhase::Playing || !self.aiming || !self.preview.visible {
            return None;
        }

        self.aiming = false;
        self.preview.visible = false;
        self.events.push(GameEvent::PreviewHidden);

        let pos = Vec2::new(self.preview.x, self.settings.drop_rail_y);
        let id = self.spawn_block(self.preview.rank, pos, false);

        self.preview.rank = self.draw_preview_rank();
        let due = self.time_ticks + self.settings.cooldown_ticks();
        self.scheduler.schedule(due, Action::ShowPreview);

        Some(id)
    }

    // === Physics collaborator ===

    /// Record the position the physics engine reports for a block
    pub fn sync_position(&mut self, id: BlockId, pos: Vec2) {
        if let Some(block) = self.blocks.iter_mut().find(|b| b.id == id) {
            block.pos = pos;
        }
    }

    /// Deliver one side of a begin-contact event.
    ///
    /// Contacts for blocks that are gone are no-ops; a contact with a block
    /// that is gone counts as touching a wall.
    pub fn handle_contact(&mut self, event: ContactEvent) -> ContactOutcome {
        if self.phase != GamePhase::Playing {
            return ContactOutcome::Ignored;
        }

        let other = match event.other {
            Some(other_id) => match self.block(other_id) {
                Some(other) => Contact::Block(other.as_peer()),
                None => Contact::Surface,
            },
            None => Contact::Surface,
        };

        let max_rank = self.settings.max_rank;
        let Some(block) = self.blocks.iter_mut().find(|b| b.id == event.block) else {
            return ContactOutcome::Ignored;
        };
        let first_contact = !block.collided;
        let outcome = block.on_contact(&other, max_rank);
        let id = block.id;

        match outcome {
            ContactOutcome::Ignored => {
                if first_contact {
                    self.events.push(GameEvent::Sound(SoundEffect::Knock));
                }
            }
            ContactOutcome::Yield { partner } => {
                self.claim_partner(id, partner);
                self.schedule_removal(id);
            }
            ContactOutcome::Execute { partner, intent } => {
                self.claim_partner(id, partner);
                self.schedule_removal(id);
                let due = self.time_ticks + self.settings.merge_ticks();
                self.scheduler.schedule(due, Action::ExecuteMerge(intent));
                log::debug!(
                    "Block {:?} merging with {:?} -> rank {} at {:?}",
                    id,
                    partner,
                    intent.new_rank,
                    intent.position
                );
            }
        }

        outcome
    }

    /// Reserve `partner` for `claimer` unless it already committed elsewhere
    fn claim_partner(&mut self, claimer: BlockId, partner: BlockId) {
        if let Some(p) = self.blocks.iter_mut().find(|b| b.id == partner) {
            if p.partner.is_none() {
                p.partner = Some(claimer);
            }
        }
    }

    fn schedule_removal(&mut self, id: BlockId) {
        let due = self.time_ticks + self.settings.removal_ticks();
        self.scheduler.schedule(due, Action::RemoveBlock(id));
    }

    // === Merges and spawns ===

    /// Apply a merge: award score, spawn the successor, play the boom.
    ///
    /// Returns the successor's ID, or `None` if the session is not playing.
    pub fn resolve_merge(&mut self, intent: MergeIntent) -> Option<BlockId> {
        if self.phase != GamePhase::Playing {
            log::debug!("Discarding merge to rank {} after game over", intent.new_rank);
            return None;
        }

        self.score += intent.score_award;
        self.events.push(GameEvent::ScoreChanged(self.score));

        let rank = intent.new_rank.min(self.settings.max_rank);
        let id = self.spawn_block(rank, intent.position, true);
        self.events.push(GameEvent::Sound(SoundEffect::Boom));
        Some(id)
    }

    /// Spawn factory: allocate an ID, add the block to the container and announce it
    pub fn spawn_block(&mut self, rank: u8, pos: Vec2, settle: bool) -> BlockId {
        let id = BlockId(self.next_id);
        self.next_id += 1;
        self.blocks.push(Block::new(id, rank, pos));
        self.events.push(GameEvent::BlockSpawned {
            id,
            rank,
            pos,
            settle,
        });
        log::debug!("Spawned block {:?} rank {} at {:?}", id, rank, pos);
        id
    }

    fn remove_block(&mut self, id: BlockId) {
        let Some(idx) = self.blocks.iter().position(|b| b.id == id) else {
            return;
        };
        self.blocks.remove(idx);
        self.events.push(GameEvent::BlockRemoved { id });

        // Release blocks that were reserved by the removed block but never committed
        for b in self.blocks.iter_mut() {
            if b.partner == Some(id) && !b.upscaling {
                b.partner = None;
            }
        }
    }

    // === Clock ===

    /// Advance the clock one tick and run every delayed operation that came due
    pub fn advance_clock(&mut self) {
        self.time_ticks += 1;
        for action in self.scheduler.take_due(self.time_ticks) {
            self.run_action(action);
        }
    }

    fn run_action(&mut self, action: Action) {
        match action {
            Action::RemoveBlock(id) => self.remove_block(id),
            Action::ExecuteMerge(intent) => {
                self.resolve_merge(intent);
            }
            Action::ShowPreview => {
                if self.phase == GamePhase::Playing {
                    self.show_preview();
                }
            }
            Action::EnterGameOver => self.enter_game_over(),
        }
    }

    // === Height monitor ===

    /// Evaluate settled block heights against the warning and limit lines.
    ///
    /// The warning is active while any settled block is above the warning
    /// height. Crossing the limit starts the game-over grace period once.
    pub fn scan_heights(&mut self) {
        if self.phase != GamePhase::Playing {
            return;
        }

        let limit = self.settings.limit_height;
        let warning = self.settings.warning_height;
        let mut over_limit = false;
        let mut over_warning = false;

        for block in self.blocks.iter().filter(|b| b.collided) {
            if block.pos.y > limit {
                over_limit = true;
            }
            if block.pos.y > warning {
                over_warning = true;
            }
        }

        if over_limit {
            self.latch_game_over();
        }
        self.set_warning(over_warning);
    }

    fn set_warning(&mut self, active: bool) {
        if self.warning_active != active {
            self.warning_active = active;
            self.events.push(GameEvent::WarningLine(active));
        }
    }

    fn latch_game_over(&mut self) {
        if self.game_over_pending {
            return;
        }
        self.game_over_pending = true;
        let due = self.time_ticks + self.settings.game_over_ticks();
        self.scheduler.schedule(due, Action::EnterGameOver);
        log::info!("Limit height crossed at tick {}, game over pending", self.time_ticks);
    }

    fn enter_game_over(&mut self) {
        if self.phase != GamePhase::Playing {
            return;
        }
        self.phase = GamePhase::GameOver;
        self.aiming = false;
        self.set_warning(false);
        if self.preview.visible {
            self.preview.visible = false;
            self.events.push(GameEvent::PreviewHidden);
        }
        self.events.push(GameEvent::GameOver {
            final_score: self.score,
        });
        log::info!("Game over with score {}", self.score);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing() -> GameState {
        let mut state = GameState::with_defaults(12345);
        state.start_or_reset();
        state.drain_events();
        state
    }

    fn run_ticks(state: &mut GameState, n: u64) {
        for _ in 0..n {
            state.advance_clock();
            state.scan_heights();
        }
    }

    #[test]
    fn test_new_session_is_ready() {
        let mut state = GameState::with_defaults(1);
        assert_eq!(state.phase(), GamePhase::Ready);
        state.begin_aim(10.0);
        assert_eq!(state.drop_at_aim(), None);
        assert!(state.blocks().is_empty());
    }

    #[test]
    fn test_start_draws_preview_in_range() {
        for seed in 0..50 {
            let mut state = GameState::with_defaults(seed);
            state.start_or_reset();
            let rank = state.preview().rank;
            assert!((1..=5).contains(&rank), "seed {} drew rank {}", seed, rank);
            assert!(state.preview().visible);
            assert_eq!(state.phase(), GamePhase::Playing);
        }
    }

    #[test]
    fn test_drop_spawns_at_aim_on_rail() {
        let mut state = playing();
        let rank = state.preview().rank;
        state.begin_aim(42.0);
        let id = state.drop_at_aim().expect("drop accepted");

        let block = state.block(id).expect("spawned");
        assert_eq!(block.rank, rank);
        assert_eq!(block.pos, Vec2::new(42.0, 530.0));
        assert!(!block.collided);
        assert!(!block.upscaling);
        assert!(!state.preview().visible);
    }

    #[test]
    fn test_drop_requires_aim_and_respects_cooldown() {
        let mut state = playing();
        assert_eq!(state.drop_at_aim(), None);

        state.begin_aim(0.0);
        assert!(state.drop_at_aim().is_some());

        // Cooldown: preview hidden, second drop refused
        state.begin_aim(0.0);
        assert_eq!(state.drop_at_aim(), None);

        let cooldown = state.settings().cooldown_ticks();
        run_ticks(&mut state, cooldown - 1);
        assert!(!state.preview().visible);
        run_ticks(&mut state, 1);
        assert!(state.preview().visible);
        assert_eq!(state.preview().x, 0.0);
    }

    #[test]
    fn test_aim_is_clamped() {
        let mut state = playing();
        state.begin_aim(10_000.0);
        assert_eq!(state.preview().x, 320.0);
        state.update_aim(-10_000.0);
        assert_eq!(state.preview().x, -320.0);
    }

    #[test]
    fn test_update_aim_needs_begin() {
        let mut state = playing();
        state.update_aim(50.0);
        assert_eq!(state.preview().x, 0.0);
    }

    #[test]
    fn test_merge_exactly_once_both_orders() {
        for reversed in [false, true] {
            let mut state = playing();
            let a = state.spawn_block(2, Vec2::new(0.0, 10.0), false);
            let b = state.spawn_block(2, Vec2::new(0.0, 50.0), false);

            let events = if reversed {
                ContactEvent::pair(b, a)
            } else {
                ContactEvent::pair(a, b)
            };
            let outcomes: Vec<_> = events.into_iter().map(|e| state.handle_contact(e)).collect();
            let executes = outcomes
                .iter()
                .filter(|o| matches!(o, ContactOutcome::Execute { .. }))
                .count();
            assert_eq!(executes, 1);

            run_ticks(&mut state, 10);
            assert_eq!(state.score(), 2);
            assert_eq!(state.blocks().len(), 1);
            assert_eq!(state.blocks()[0].rank, 3);
            assert_eq!(state.blocks()[0].pos, Vec2::new(0.0, 10.0));
        }
    }

    #[test]
    fn test_duplicate_contacts_award_once() {
        let mut state = playing();
        let a = state.spawn_block(2, Vec2::new(0.0, 0.0), false);
        let b = state.spawn_block(2, Vec2::new(10.0, 0.0), false);

        for _ in 0..3 {
            for e in ContactEvent::pair(a, b) {
                state.handle_contact(e);
            }
        }
        run_ticks(&mut state, 10);
        assert_eq!(state.score(), 2);
        assert_eq!(state.blocks().len(), 1);
    }

    #[test]
    fn test_removal_precedes_successor_spawn() {
        let mut state = playing();
        let a = state.spawn_block(1, Vec2::new(0.0, 0.0), false);
        let b = state.spawn_block(1, Vec2::new(10.0, 5.0), false);
        for e in ContactEvent::pair(a, b) {
            state.handle_contact(e);
        }
        state.drain_events();
        run_ticks(&mut state, 10);

        let events = state.drain_events();
        let spawn_idx = events
            .iter()
            .position(|e| matches!(e, GameEvent::BlockSpawned { .. }))
            .expect("successor spawned");
        let removed: Vec<_> = events[..spawn_idx]
            .iter()
            .filter(|e| matches!(e, GameEvent::BlockRemoved { .. }))
            .collect();
        assert_eq!(removed.len(), 2);
        assert!(matches!(
            events[spawn_idx],
            GameEvent::BlockSpawned { rank: 2, settle: true, .. }
        ));
        assert!(events.contains(&GameEvent::Sound(SoundEffect::Boom)));
    }

    #[test]
    fn test_three_way_pileup_merges_one_pair() {
        let mut state = playing();
        let a = state.spawn_block(3, Vec2::new(0.0, 0.0), false);
        let b = state.spawn_block(3, Vec2::new(10.0, 0.0), false);
        let c = state.spawn_block(3, Vec2::new(20.0, 0.0), false);

        state.handle_contact(ContactEvent::new(a, b));
        // b was claimed by a; c cannot take it
        assert_eq!(state.handle_contact(ContactEvent::new(b, c)), ContactOutcome::Ignored);
        assert_eq!(state.handle_contact(ContactEvent::new(c, b)), ContactOutcome::Ignored);
        assert!(state.handle_contact(ContactEvent::new(b, a)).is_merge());

        run_ticks(&mut state, 10);
        assert_eq!(state.score(), 3);
        let ranks: Vec<u8> = state.blocks().iter().map(|blk| blk.rank).collect();
        assert_eq!(ranks, vec![3, 4]);
    }

    #[test]
    fn test_first_surface_contact_knocks_once() {
        let mut state = playing();
        let a = state.spawn_block(1, Vec2::new(0.0, 0.0), false);
        state.drain_events();
        state.handle_contact(ContactEvent::surface(a));
        state.handle_contact(ContactEvent::surface(a));
        let knocks = state
            .drain_events()
            .into_iter()
            .filter(|e| *e == GameEvent::Sound(SoundEffect::Knock))
            .count();
        assert_eq!(knocks, 1);
        assert!(state.block(a).is_some_and(|blk| blk.collided));
    }

    #[test]
    fn test_contact_for_removed_block_is_noop() {
        let mut state = playing();
        let a = state.spawn_block(1, Vec2::ZERO, false);
        assert_eq!(
            state.handle_contact(ContactEvent::new(BlockId(999), a)),
            ContactOutcome::Ignored
        );
        // Missing peer counts as a wall
        assert_eq!(
            state.handle_contact(ContactEvent::new(a, BlockId(999))),
            ContactOutcome::Ignored
        );
        assert!(state.block(a).is_some_and(|blk| blk.collided));
    }

    #[test]
    fn test_uncollided_blocks_are_not_monitored() {
        let mut state = playing();
        state.spawn_block(1, Vec2::new(0.0, 500.0), false);
        run_ticks(&mut state, 200);
        assert_eq!(state.phase(), GamePhase::Playing);
        assert!(!state.warning_active());
    }

    #[test]
    fn test_warning_toggles() {
        let mut state = playing();
        let a = state.spawn_block(1, Vec2::new(0.0, 300.0), false);
        state.handle_contact(ContactEvent::surface(a));

        state.scan_heights();
        assert!(state.warning_active());

        state.sync_position(a, Vec2::new(0.0, 100.0));
        state.scan_heights();
        assert!(!state.warning_active());

        let toggles: Vec<_> = state
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::WarningLine(_)))
            .collect();
        assert_eq!(
            toggles,
            vec![GameEvent::WarningLine(true), GameEvent::WarningLine(false)]
        );
    }

    #[test]
    fn test_warning_is_or_across_blocks() {
        let mut state = playing();
        let high = state.spawn_block(1, Vec2::new(0.0, 300.0), false);
        let low = state.spawn_block(2, Vec2::new(50.0, 10.0), false);
        state.handle_contact(ContactEvent::surface(high));
        state.handle_contact(ContactEvent::surface(low));
        state.scan_heights();
        // The last block is low, but one block is still over the line
        assert!(state.warning_active());
    }

    #[test]
    fn test_game_over_latch() {
        let mut state = playing();
        let a = state.spawn_block(1, Vec2::new(0.0, 450.0), false);
        state.handle_contact(ContactEvent::surface(a));

        state.scan_heights();
        assert!(state.game_over_pending());
        assert_eq!(state.pending_tasks(), 1);

        // Repeated scans don't restart the grace period
        let grace = state.settings().game_over_ticks();
        run_ticks(&mut state, grace - 1);
        assert_eq!(state.phase(), GamePhase::Playing);
        run_ticks(&mut state, 1);
        assert_eq!(state.phase(), GamePhase::GameOver);
        assert!(!state.warning_active());

        let game_overs = state
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::GameOver { .. }))
            .count();
        assert_eq!(game_overs, 1);

        // Stays over even with the container emptied
        state.sync_position(a, Vec2::ZERO);
        run_ticks(&mut state, 100);
        assert!(state.is_game_over());
        state.begin_aim(0.0);
        assert_eq!(state.drop_at_aim(), None);
    }

    #[test]
    fn test_game_over_survives_emptied_container() {
        let mut state = playing();
        let a = state.spawn_block(1, Vec2::new(0.0, 450.0), false);
        let b = state.spawn_block(1, Vec2::new(40.0, 450.0), false);
        state.handle_contact(ContactEvent::surface(a));
        state.scan_heights();
        assert!(state.game_over_pending());

        // The pair merges away during the grace period: removals land just
        // after the latch fires and the merge itself comes due after game over
        let grace = state.settings().game_over_ticks();
        run_ticks(&mut state, grace - 2);
        for contact in ContactEvent::pair(a, b) {
            state.handle_contact(contact);
        }
        run_ticks(&mut state, 10);

        assert!(state.is_game_over());
        assert!(state.blocks().is_empty());
        assert_eq!(state.score(), 0);
        assert_eq!(state.pending_tasks(), 0);

        run_ticks(&mut state, 100);
        assert!(state.is_game_over());
    }

    #[test]
    fn test_merges_discarded_after_game_over() {
        let mut state = playing();
        let top = state.spawn_block(5, Vec2::new(0.0, 450.0), false);
        state.handle_contact(ContactEvent::surface(top));
        state.scan_heights();
        let grace = state.settings().game_over_ticks();
        run_ticks(&mut state, grace);
        assert!(state.is_game_over());

        let before = state.score();
        assert_eq!(
            state.resolve_merge(MergeIntent {
                new_rank: 2,
                position: Vec2::ZERO,
                score_award: 1,
            }),
            None
        );
        assert_eq!(state.score(), before);
    }

    #[test]
    fn test_claimed_block_released_when_claimer_removed() {
        let mut state = playing();
        let a = state.spawn_block(1, Vec2::new(0.0, 0.0), false);
        let b = state.spawn_block(1, Vec2::new(40.0, 0.0), false);
        let c = state.spawn_block(1, Vec2::new(80.0, 0.0), false);

        // `a` yields to `b` and reserves it, but `b` never reports the contact
        assert!(matches!(
            state.handle_contact(ContactEvent::new(a, b)),
            ContactOutcome::Yield { partner } if partner == b
        ));
        assert_eq!(state.block(b).and_then(|blk| blk.partner), Some(a));

        run_ticks(&mut state, 10);
        assert!(state.block(a).is_none());
        assert_eq!(state.block(b).and_then(|blk| blk.partner), None);

        // Released, `b` can still pair with `c`
        assert!(matches!(
            state.handle_contact(ContactEvent::new(c, b)),
            ContactOutcome::Execute { .. }
        ));
        assert!(matches!(
            state.handle_contact(ContactEvent::new(b, c)),
            ContactOutcome::Yield { .. }
        ));
        run_ticks(&mut state, 10);

        assert_eq!(state.score(), 1);
        let ranks: Vec<u8> = state.blocks().iter().map(|blk| blk.rank).collect();
        assert_eq!(ranks, vec![2]);
    }

    #[test]
    fn test_new_rejects_invalid_settings() {
        let settings = Settings {
            preview_rank_max: 0,
            ..Default::default()
        };
        assert!(matches!(
            GameState::new(1, settings),
            Err(SettingsError::Invalid(_))
        ));
        assert!(GameState::new(1, Settings::default()).is_ok());
    }

    #[test]
    fn test_reset_cancels_pending_work() {
        let mut state = playing();
        let a = state.spawn_block(1, Vec2::new(0.0, 450.0), false);
        let b = state.spawn_block(1, Vec2::new(10.0, 460.0), false);
        for e in ContactEvent::pair(a, b) {
            state.handle_contact(e);
        }
        state.scan_heights();
        assert!(state.pending_tasks() > 0);

        state.start_or_reset();
        assert_eq!(state.pending_tasks(), 0);
        assert_eq!(state.score(), 0);
        assert!(state.blocks().is_empty());
        assert!(!state.game_over_pending());

        run_ticks(&mut state, 200);
        assert_eq!(state.score(), 0);
        assert!(state.blocks().is_empty());
        assert_eq!(state.phase(), GamePhase::Playing);
    }

    #[test]
    fn test_max_rank_blocks_do_not_merge() {
        let mut state = playing();
        let a = state.spawn_block(11, Vec2::ZERO, false);
        let b = state.spawn_block(11, Vec2::new(10.0, 0.0), false);
        for e in ContactEvent::pair(a, b) {
            assert_eq!(state.handle_contact(e), ContactOutcome::Ignored);
        }
        run_ticks(&mut state, 10);
        assert_eq!(state.blocks().len(), 2);
        assert_eq!(state.score(), 0);
    }

    #[test]
    fn test_ids_not_reused_across_reset() {
        let mut state = playing();
        let a = state.spawn_block(1, Vec2::ZERO, false);
        state.start_or_reset();
        let b = state.spawn_block(1, Vec2::ZERO, false);
        assert!(b > a);
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut state = playing();
        state.spawn_block(3, Vec2::new(1.0, 2.0), false);
        let json = serde_json::to_string(&state.snapshot()).expect("serialize");
        let back: SessionSnapshot = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.blocks.len(), 1);
        assert_eq!(back.phase, GamePhase::Playing);
    }
}
