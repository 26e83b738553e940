//! Merge Drop headless demo
//!
//! Plays a short scripted run with a logging host: two rank-1 drops that land
//! on each other and merge, then a stack that crosses the limit line.
//!
//! Usage: `merge-drop [settings.json]`

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    demo::run(std::env::args().nth(1))
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The engine is embedded by the web host; nothing to run standalone
}

#[cfg(not(target_arch = "wasm32"))]
mod demo {
    use glam::Vec2;
    use merge_drop::sim::{AimInput, BlockId, BlockPose, ContactEvent, GameState, TickInput, tick};
    use merge_drop::{AudioManager, AudioSink, Presenter, Settings, SoundEffect, dispatch_events};

    /// Host stand-in that logs every presentation call
    struct LogPresenter;

    impl Presenter for LogPresenter {
        fn reset(&mut self) {
            log::info!("[scene] cleared");
        }
        fn spawn_block(&mut self, id: BlockId, rank: u8, pos: Vec2, settle: bool) {
            log::info!("[scene] spawn {:?} rank {} at ({}, {}) settle={}", id, rank, pos.x, pos.y, settle);
        }
        fn remove_block(&mut self, id: BlockId) {
            log::info!("[scene] remove {:?}", id);
        }
        fn set_score_text(&mut self, score: u64) {
            log::info!("[hud] score {}", score);
        }
        fn set_warning_line_visible(&mut self, visible: bool) {
            log::info!("[hud] warning line {}", if visible { "shown" } else { "hidden" });
        }
        fn show_game_over_screen(&mut self, final_score: u64) {
            log::info!("[hud] GAME OVER - final score {}", final_score);
        }
        fn show_preview(&mut self, rank: u8, x: f32) {
            log::info!("[rail] preview rank {} at x={}", rank, x);
        }
        fn move_preview(&mut self, x: f32) {
            log::debug!("[rail] preview x={}", x);
        }
        fn hide_preview(&mut self) {
            log::debug!("[rail] preview hidden");
        }
    }

    struct LogSpeaker;

    impl AudioSink for LogSpeaker {
        fn play(&mut self, effect: SoundEffect, volume: f32) {
            log::info!("[audio] {:?} at {:.2}", effect, volume);
        }
    }

    fn load_settings(path: Option<String>) -> Settings {
        match path {
            Some(path) => match Settings::load(&path) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!("{} ({}), using defaults", e, path);
                    Settings::default()
                }
            },
            None => Settings::default(),
        }
    }

    struct Host {
        state: GameState,
        presenter: LogPresenter,
        audio: AudioManager<LogSpeaker>,
    }

    impl Host {
        fn step(&mut self, input: &TickInput) {
            tick(&mut self.state, input);
            let events = self.state.drain_events();
            dispatch_events(&events, &mut self.presenter, &mut self.audio);
        }

        fn idle(&mut self, ticks: usize) {
            for _ in 0..ticks {
                self.step(&TickInput::default());
            }
        }

        fn drop_at(&mut self, x: f32) -> Option<BlockId> {
            let before = self.state.blocks().last().map(|b| b.id);
            self.step(&TickInput {
                aim: Some(AimInput::Begin(x)),
                drop: true,
                ..Default::default()
            });
            let after = self.state.blocks().last().map(|b| b.id);
            if after != before { after } else { None }
        }

        /// Report where the (external) physics engine settled a block
        fn land(&mut self, id: BlockId, pos: Vec2, touching: Option<BlockId>) {
            let mut contacts = vec![ContactEvent::surface(id)];
            if let Some(other) = touching {
                contacts.extend(ContactEvent::pair(id, other));
            }
            self.step(&TickInput {
                poses: vec![BlockPose { id, pos }],
                contacts,
                ..Default::default()
            });
        }
    }

    pub fn run(settings_path: Option<String>) -> anyhow::Result<()> {
        let mut settings = load_settings(settings_path);
        // Force rank-1 previews so the scripted merge is guaranteed
        settings.preview_rank_max = 1;

        let audio = AudioManager::from_settings(LogSpeaker, &settings);
        let seed = 20240601;
        let mut host = Host {
            state: GameState::new(seed, settings)?,
            presenter: LogPresenter,
            audio,
        };
        log::info!("Merge Drop demo starting with seed {}", seed);

        host.step(&TickInput {
            restart: true,
            ..Default::default()
        });

        let cooldown = host.state.settings().cooldown_ticks() as usize;
        let first = host.drop_at(0.0).ok_or_else(|| anyhow::anyhow!("first drop refused"))?;
        host.land(first, Vec2::new(0.0, -300.0), None);
        host.idle(cooldown);

        let second = host.drop_at(0.0).ok_or_else(|| anyhow::anyhow!("second drop refused"))?;
        host.land(second, Vec2::new(0.0, -250.0), Some(first));
        host.idle(cooldown);
        log::info!(
            "After merge: score {}, {} block(s) in container",
            host.state.score(),
            host.state.blocks().len()
        );

        // Pile blocks up until one settles above the limit line
        let limit = host.state.settings().limit_height;
        let mut height: f32 = -250.0;
        while !host.state.is_game_over() {
            let Some(id) = host.drop_at(80.0) else {
                host.idle(1);
                continue;
            };
            height += 120.0;
            host.land(id, Vec2::new(80.0, height.min(limit + 10.0)), None);
            host.idle(cooldown);
        }

        let snapshot = serde_json::to_string_pretty(&host.state.snapshot())?;
        println!("{}", snapshot);
        Ok(())
    }
}
