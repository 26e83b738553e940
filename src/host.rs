//! Host presentation layer boundary
//!
//! The engine describes what happened; the host decides how it looks.

use glam::Vec2;

use crate::audio::{AudioManager, AudioSink};
use crate::sim::{BlockId, GameEvent};

/// Visual side of the host engine (scene graph, sprites, HUD)
pub trait Presenter {
    /// Clear all block visuals and hide the warning line and game-over screen
    fn reset(&mut self);
    /// Create the visual and physics body for a block; `settle` plays the merge pop
    fn spawn_block(&mut self, id: BlockId, rank: u8, pos: Vec2, settle: bool);
    fn remove_block(&mut self, id: BlockId);
    fn set_score_text(&mut self, score: u64);
    fn set_warning_line_visible(&mut self, visible: bool);
    fn show_game_over_screen(&mut self, final_score: u64);
    fn show_preview(&mut self, rank: u8, x: f32);
    fn move_preview(&mut self, x: f32);
    fn hide_preview(&mut self);
}

/// Forward drained session events to the host collaborators, in order
pub fn dispatch_events<P, S>(events: &[GameEvent], presenter: &mut P, audio: &mut AudioManager<S>)
where
    P: Presenter + ?Sized,
    S: AudioSink,
{
    for event in events {
        match *event {
            GameEvent::SessionReset => presenter.reset(),
            GameEvent::BlockSpawned {
                id,
                rank,
                pos,
                settle,
            } => presenter.spawn_block(id, rank, pos, settle),
            GameEvent::BlockRemoved { id } => presenter.remove_block(id),
            GameEvent::ScoreChanged(score) => presenter.set_score_text(score),
            GameEvent::Sound(effect) => audio.play(effect),
            GameEvent::WarningLine(visible) => presenter.set_warning_line_visible(visible),
            GameEvent::PreviewShown { rank, x } => presenter.show_preview(rank, x),
            GameEvent::PreviewMoved { x } => presenter.move_preview(x),
            GameEvent::PreviewHidden => presenter.hide_preview(),
            GameEvent::GameOver { final_score } => presenter.show_game_over_screen(final_score),
        }
    }
}
