//! Deterministic in-process stand-in for the emulator.
//!
//! The game is reduced to a player walking right across a flat level: the
//! distance counter grows while Right is held (faster with B), a coin and
//! 200 points are awarded every 100 distance units, the clock ticks down
//! every 24 frames, and the level is cleared at `level_length`. Fault
//! injection knobs on [`MockConfig`] let tests exercise launch failures,
//! display fallback, hangs and deaths.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::{
    Buttons, DisplayMode, GameInfo, LaunchOptions, NesBackend, NesError, NesLauncher, PixelFrame,
    Rgb, RomTarget, Tile, TileGrid, LEVEL_COUNT, TILE_COLS,
};

const START_DISTANCE: i32 = 40;
const FRAMES_PER_CLOCK_TICK: u32 = 24;
const SKY: Rgb = Rgb::new(92, 148, 252);
const GROUND: Rgb = Rgb::new(200, 76, 12);
const PLAYER: Rgb = Rgb::new(216, 40, 0);
const PLAYER_SCREEN_LIMIT: i32 = 112;

#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Every launch fails as if the emulator binary were missing.
    pub refuse_launch: bool,
    /// Launches asking for fullscreen fail with [`NesError::FullscreenRejected`].
    pub refuse_fullscreen: bool,
    /// After this many input frames in one backend, each frame stalls for `hang_for`.
    pub hang_after: Option<u32>,
    /// The first this many launches of a launcher stall for `hang_for`.
    pub hang_launches: usize,
    /// The first this many resets across a launcher's backends stall for `hang_for`.
    pub hang_resets: usize,
    pub hang_for: Duration,
    /// Episode frame on which the player loses a life and the episode ends.
    pub die_at_frame: Option<u32>,
    pub level_length: i32,
    pub start_lives: i32,
    pub start_time: i32,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            refuse_launch: false,
            refuse_fullscreen: false,
            hang_after: None,
            hang_launches: 0,
            hang_resets: 0,
            hang_for: Duration::from_secs(5),
            die_at_frame: None,
            level_length: 3_000,
            start_lives: 3,
            start_time: 400,
        }
    }
}

/// Launcher handing out [`MockNes`] instances and counting their lifecycle.
#[derive(Debug, Default, Clone)]
pub struct MockLauncher {
    config: MockConfig,
    launches: Arc<AtomicUsize>,
    resets: Arc<AtomicUsize>,
    shutdowns: Arc<AtomicUsize>,
}

impl MockLauncher {
    #[must_use]
    pub fn new(config: MockConfig) -> Self {
        Self { config, ..Self::default() }
    }

    /// Successful launches so far, slow ones included.
    #[must_use]
    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Backends released so far, by shutdown or drop.
    #[must_use]
    pub fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl NesLauncher for MockLauncher {
    fn launch(&self, _rom: RomTarget, options: &LaunchOptions) -> Result<Box<dyn NesBackend>, NesError> {
        if self.config.refuse_launch {
            return Err(NesError::Unavailable("mock emulator configured to refuse launch".into()));
        }
        if self.config.refuse_fullscreen && options.display == DisplayMode::Fullscreen {
            return Err(NesError::FullscreenRejected);
        }
        if self.launches.fetch_add(1, Ordering::SeqCst) < self.config.hang_launches {
            std::thread::sleep(self.config.hang_for);
        }
        Ok(Box::new(MockNes::new(
            self.config.clone(),
            Arc::clone(&self.resets),
            Arc::clone(&self.shutdowns),
        )))
    }
}

pub struct MockNes {
    config: MockConfig,
    resets: Arc<AtomicUsize>,
    shutdowns: Arc<AtomicUsize>,
    info: GameInfo,
    finished: bool,
    closed: bool,
    total_frames: u32,
    episode_frame: u32,
    pending_noop: u8,
}

impl MockNes {
    fn new(config: MockConfig, resets: Arc<AtomicUsize>, shutdowns: Arc<AtomicUsize>) -> Self {
        let mut nes = Self {
            config,
            resets,
            shutdowns,
            info: GameInfo::default(),
            finished: false,
            closed: false,
            total_frames: 0,
            episode_frame: 0,
            pending_noop: 0,
        };
        nes.load(0);
        nes
    }

    fn load(&mut self, level: u8) {
        let level = level % LEVEL_COUNT;
        self.info = GameInfo {
            distance: START_DISTANCE,
            score: 0,
            coins: 0,
            life: self.config.start_lives,
            time: self.config.start_time,
            player_status: 0,
            level: i32::from(level),
            world: i32::from(level / 4) + 1,
            stage: i32::from(level % 4) + 1,
        };
        self.finished = false;
        self.episode_frame = 0;
    }

    fn tick(&mut self, buttons: Buttons) {
        self.episode_frame += 1;
        if self.episode_frame % FRAMES_PER_CLOCK_TICK == 0 {
            self.info.time -= 1;
        }

        let before = self.info.distance;
        if buttons.right {
            self.info.distance += if buttons.b { 2 } else { 1 };
        } else if buttons.left {
            self.info.distance = (self.info.distance - 1).max(0);
        }
        let milestones = self.info.distance / 100 - before / 100;
        if milestones > 0 {
            self.info.coins += milestones;
            self.info.score += 200 * milestones;
        }

        if self.config.die_at_frame == Some(self.episode_frame) {
            self.info.life -= 1;
            self.finished = true;
        }
        if self.info.distance >= self.config.level_length || self.info.time <= 0 {
            self.finished = true;
        }
    }

    fn player_screen_x(&self) -> usize {
        usize::try_from(self.info.distance.clamp(0, PLAYER_SCREEN_LIMIT)).unwrap_or(0)
    }
}

impl NesBackend for MockNes {
    fn reset(&mut self, level: u8, noop_seed: u8) -> Result<(), NesError> {
        if self.closed {
            return Err(NesError::Closed);
        }
        if self.resets.fetch_add(1, Ordering::SeqCst) < self.config.hang_resets {
            std::thread::sleep(self.config.hang_for);
        }
        self.load(level);
        self.pending_noop = noop_seed;
        Ok(())
    }

    fn apply_input(&mut self, buttons: Buttons) -> Result<u32, NesError> {
        if self.closed {
            return Err(NesError::Closed);
        }
        self.total_frames += 1;
        if self.config.hang_after.is_some_and(|limit| self.total_frames > limit) {
            std::thread::sleep(self.config.hang_for);
        }
        for _ in 0..std::mem::take(&mut self.pending_noop) {
            self.tick(Buttons::NONE);
        }
        if !self.finished {
            self.tick(buttons);
        }
        Ok(self.episode_frame)
    }

    fn frame_buffer(&self) -> PixelFrame {
        let mut frame = PixelFrame::filled(SKY);
        frame.fill_rect(0, 208, crate::SCREEN_WIDTH, 16, GROUND);
        frame.fill_rect(self.player_screen_x(), 192, 16, 16, PLAYER);
        frame
    }

    fn tile_memory(&self) -> TileGrid {
        let mut grid = TileGrid::default();
        for col in 0..TILE_COLS {
            grid.set(11, col, Tile::Solid);
            grid.set(12, col, Tile::Solid);
        }
        let enemy_col = TILE_COLS - 1 - (self.episode_frame as usize / 8) % TILE_COLS;
        grid.set(10, enemy_col, Tile::Enemy);
        grid.set(10, self.player_screen_x() / 16, Tile::Player);
        grid
    }

    fn game_info(&self) -> GameInfo {
        self.info
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn shutdown(&mut self) {
        if !self.closed {
            self.closed = true;
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MockNes {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;

    fn boot(config: MockConfig) -> (MockLauncher, Box<dyn NesBackend>) {
        let launcher = MockLauncher::new(config);
        let nes = launcher
            .launch(RomTarget::SuperMarioBros, &LaunchOptions::new("unused.nes"))
            .unwrap();
        (launcher, nes)
    }

    #[test]
    fn running_right_earns_distance_and_coins() {
        let (_launcher, mut nes) = boot(MockConfig::default());
        nes.reset(0, 0).unwrap();
        let right_b = Buttons::from_array([0, 0, 0, 1, 0, 1]);
        for _ in 0..40 {
            nes.apply_input(right_b).unwrap();
        }
        let info = nes.game_info();
        assert_eq!(info.distance, START_DISTANCE + 80);
        assert_eq!(info.coins, 1);
        assert_eq!(info.score, 200);
        assert!(!nes.is_finished());
    }

    #[test]
    fn noop_seed_idles_before_first_input() {
        let (_launcher, mut nes) = boot(MockConfig::default());
        nes.reset(5, 10).unwrap();
        assert_eq!(nes.apply_input(Buttons::NONE).unwrap(), 11);
        assert_eq!(nes.game_info().world, 2);
        assert_eq!(nes.game_info().stage, 2);
    }

    #[test]
    fn scripted_death_finishes_episode() {
        let (_launcher, mut nes) = boot(MockConfig { die_at_frame: Some(3), ..MockConfig::default() });
        nes.reset(0, 0).unwrap();
        for _ in 0..3 {
            nes.apply_input(Buttons::NONE).unwrap();
        }
        assert!(nes.is_finished());
        assert_eq!(nes.game_info().life, 2);
    }

    #[test]
    fn fullscreen_refusal_only_hits_fullscreen() {
        let launcher = MockLauncher::new(MockConfig { refuse_fullscreen: true, ..MockConfig::default() });
        let fullscreen = LaunchOptions::new("unused.nes").with_display(DisplayMode::Fullscreen);
        assert!(matches!(
            launcher.launch(RomTarget::SuperMarioBros, &fullscreen),
            Err(NesError::FullscreenRejected)
        ));
        let windowed = LaunchOptions::new("unused.nes");
        assert!(launcher.launch(RomTarget::SuperMarioBros, &windowed).is_ok());
    }

    #[test]
    fn only_the_first_resets_stall() {
        let config = MockConfig { hang_resets: 1, hang_for: Duration::from_millis(200), ..MockConfig::default() };
        let (launcher, mut first) = boot(config);
        let started = std::time::Instant::now();
        first.reset(0, 0).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(200));

        let mut second = launcher
            .launch(RomTarget::SuperMarioBros, &LaunchOptions::new("unused.nes"))
            .unwrap();
        let started = std::time::Instant::now();
        second.reset(0, 0).unwrap();
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[test]
    fn drop_counts_as_shutdown() {
        let (launcher, mut nes) = boot(MockConfig::default());
        nes.shutdown();
        assert!(matches!(nes.apply_input(Buttons::NONE), Err(NesError::Closed)));
        drop(nes);
        assert_eq!(launcher.shutdown_count(), 1);
    }

    #[test]
    fn observations_have_player_marks() {
        let (_launcher, mut nes) = boot(MockConfig::default());
        nes.reset(0, 0).unwrap();
        let tiles = nes.tile_memory();
        assert_eq!(tiles.get(10, 2), Some(Tile::Player));
        assert_eq!(tiles.get(12, 0), Some(Tile::Solid));
        assert_eq!(nes.frame_buffer().get(40, 200), Some(PLAYER));
    }
}
